//! `hse-auth` — session/token lifecycle and RBAC for the HSE platform.
//!
//! This crate is intentionally decoupled from HTTP and storage: it consumes a
//! principal record (through [`AccountStore`]) and a [`Clock`](hse_core::Clock),
//! and returns verdicts for the caller to act on.

pub mod authorize;
pub mod claims;
pub mod config;
pub mod credential;
pub mod error;
pub mod ledger;
pub mod permissions;
pub mod principal;
pub mod resolver;
pub mod roles;
pub mod session;
pub mod store;
pub mod token;

pub use authorize::{AuthorizationExplanation, AuthzError, Subject, authorize, explain_authorization};
pub use claims::{AccessClaims, Jti, RefreshClaims, TokenValidationError, validate_claims, validate_claims_with_leeway};
pub use config::{AuthConfig, ConfigError, HistoryWriteMode};
pub use credential::{CredentialError, hash_secret, verify_secret};
pub use error::{AuthError, PublicAuthError};
pub use ledger::{HistoryBlobError, RefreshLedger, RefreshRecord, TokenHistory};
pub use permissions::{Permission, PermissionSet};
pub use principal::{Principal, PrincipalPublicView};
pub use resolver::{PermissionResolver, RoleTable};
pub use roles::Role;
pub use session::{LoginOutcome, SessionService};
pub use store::{AccountStore, InMemoryAccountStore, StoreError};
pub use token::{SignedRefreshToken, TokenIssuer, TokenKind, TokenPair, TokenRejection, TokenVerifier};
