//! Account-store seam.
//!
//! The auth core owns no session state; principals and their token histories
//! live in whatever durable store the caller provides.

use std::collections::HashMap;
use std::sync::RwLock;

use thiserror::Error;

use hse_core::{ExpectedVersion, PrincipalId};

use crate::Role;
use crate::ledger::TokenHistory;
use crate::principal::{Principal, normalize_identifier};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("principal not found")]
    NotFound,

    /// A version-checked write found a newer stored history.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("account store unavailable: {0}")]
    Unavailable(String),
}

/// External account store consumed by the session layer.
pub trait AccountStore: Send + Sync {
    /// Look a principal up by login identifier (email).
    fn load_principal(&self, identifier: &str) -> Result<Principal, StoreError>;

    fn load_principal_by_id(&self, id: PrincipalId) -> Result<Principal, StoreError>;

    /// Replace the principal's whole token history.
    ///
    /// Returns the new history version. `expected` is checked against the
    /// stored version; a mismatch is [`StoreError::Conflict`].
    fn save_token_history(
        &self,
        id: PrincipalId,
        history: &TokenHistory,
        expected: ExpectedVersion,
    ) -> Result<u64, StoreError>;
}

/// In-memory account store.
///
/// Intended for tests/dev. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryAccountStore {
    accounts: RwLock<HashMap<PrincipalId, Principal>>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an account.
    pub fn insert(&self, principal: Principal) -> Result<(), StoreError> {
        let mut accounts = self.write()?;
        accounts.insert(principal.id, principal);
        Ok(())
    }

    pub fn set_secret_hash(&self, id: PrincipalId, secret_hash: String) -> Result<(), StoreError> {
        let mut accounts = self.write()?;
        let principal = accounts.get_mut(&id).ok_or(StoreError::NotFound)?;
        principal.secret_hash = secret_hash;
        Ok(())
    }

    pub fn set_role(&self, id: PrincipalId, role: Role) -> Result<(), StoreError> {
        let mut accounts = self.write()?;
        let principal = accounts.get_mut(&id).ok_or(StoreError::NotFound)?;
        principal.role = role;
        Ok(())
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<PrincipalId, Principal>>, StoreError> {
        self.accounts
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<PrincipalId, Principal>>, StoreError> {
        self.accounts
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }
}

impl AccountStore for InMemoryAccountStore {
    fn load_principal(&self, identifier: &str) -> Result<Principal, StoreError> {
        let identifier = normalize_identifier(identifier);
        self.read()?
            .values()
            .find(|p| p.email == identifier)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    fn load_principal_by_id(&self, id: PrincipalId) -> Result<Principal, StoreError> {
        self.read()?.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    fn save_token_history(
        &self,
        id: PrincipalId,
        history: &TokenHistory,
        expected: ExpectedVersion,
    ) -> Result<u64, StoreError> {
        let mut accounts = self.write()?;
        let principal = accounts.get_mut(&id).ok_or(StoreError::NotFound)?;

        expected
            .check(principal.history_version)
            .map_err(|e| StoreError::Conflict(e.to_string()))?;

        principal.token_history = history.clone();
        principal.history_version += 1;
        Ok(principal.history_version)
    }
}
