#![allow(dead_code)]

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use hse_auth::{AccountStore, AuthConfig, Principal, Role, RoleTable, SessionService, hash_secret};
use hse_core::{ManualClock, PrincipalId, TenantId};

pub const ACCESS_SECRET: &str = "test-access-secret-0123456789abcdefghij";
pub const REFRESH_SECRET: &str = "test-refresh-secret-0123456789abcdefghij";
pub const PASSWORD: &str = "Sup3r-secret!";

/// bcrypt's minimum cost keeps tests fast.
pub const TEST_BCRYPT_COST: u32 = 4;

pub fn config() -> AuthConfig {
    let mut config = AuthConfig::new(ACCESS_SECRET, REFRESH_SECRET);
    config.bcrypt_cost = TEST_BCRYPT_COST;
    config
}

pub fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap()))
}

pub fn service(config: AuthConfig, store: Arc<dyn AccountStore>, clock: Arc<ManualClock>) -> SessionService {
    SessionService::new(config, store, clock, Arc::new(RoleTable::standard())).expect("valid test config")
}

pub fn principal(email: &str, role: Role, tenant_id: Option<TenantId>) -> Principal {
    let hash = hash_secret(PASSWORD, TEST_BCRYPT_COST).expect("hash");
    Principal::new(PrincipalId::new(), email, "Test User", role, tenant_id, hash).verified()
}
