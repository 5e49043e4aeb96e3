//! Authentication configuration.
//!
//! Both signing secrets are mandatory. There is no insecure default: a process
//! that cannot produce two distinct, sufficiently long secrets must not start.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use hse_core::ExpectedVersion;

use crate::ledger::DEFAULT_MAX_SESSIONS;

pub const MIN_SECRET_LEN: usize = 32;
pub const DEFAULT_ISSUER: &str = "hse-digital";
pub const DEFAULT_ACCESS_TOKEN_TTL_SECS: u64 = 60 * 60;
pub const DEFAULT_REFRESH_TOKEN_TTL_SECS: u64 = 7 * 24 * 60 * 60;
/// Upper bound for either token lifetime.
pub const MAX_TOKEN_TTL_SECS: u64 = 366 * 24 * 60 * 60;
/// Tolerated clock difference between the issuing and the verifying node.
pub const DEFAULT_CLOCK_SKEW_LEEWAY_SECS: u64 = 60;
pub const MAX_CLOCK_SKEW_LEEWAY_SECS: u64 = 10 * 60;

const ENV_PREFIX: &str = "HSE_AUTH_";

/// How token-history writes are guarded against concurrent rotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryWriteMode {
    /// Reject a write whose read is stale (`Conflict`); the caller retries.
    #[default]
    CompareAndSwap,
    /// Overwrite unconditionally; a concurrent rotation may be lost.
    LastWriterWins,
}

impl HistoryWriteMode {
    pub fn expected(self, observed_version: u64) -> ExpectedVersion {
        match self {
            HistoryWriteMode::CompareAndSwap => ExpectedVersion::Exact(observed_version),
            HistoryWriteMode::LastWriterWins => ExpectedVersion::Any,
        }
    }
}

/// Which of the two signing secrets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretKind {
    Access,
    Refresh,
}

impl core::fmt::Display for SecretKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SecretKind::Access => f.write_str("access"),
            SecretKind::Refresh => f.write_str("refresh"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} token secret is required (set HSE_AUTH_{var})", var = env_var_for(.0))]
    MissingSecret(SecretKind),

    #[error("{0} token secret must be at least {min} bytes", min = MIN_SECRET_LEN)]
    SecretTooShort(SecretKind),

    #[error("access and refresh token secrets must differ")]
    SecretsNotDistinct,

    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

fn env_var_for(kind: &SecretKind) -> &'static str {
    match kind {
        SecretKind::Access => "ACCESS_SECRET",
        SecretKind::Refresh => "REFRESH_SECRET",
    }
}

/// Authentication configuration.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub access_token_secret: Option<String>,
    pub refresh_token_secret: Option<String>,
    /// Value of the `iss` claim; tokens from any other issuer are rejected.
    pub issuer: String,
    pub access_token_ttl_secs: u64,
    pub refresh_token_ttl_secs: u64,
    /// How far a token's issue time may lie ahead of the verifier's clock.
    pub clock_skew_leeway_secs: u64,
    /// Sliding-window bound on live refresh tokens per principal.
    pub max_sessions: usize,
    pub bcrypt_cost: u32,
    pub require_verified_email: bool,
    pub history_write: HistoryWriteMode,
    pub revoke_sessions_on_password_change: bool,
    pub revoke_sessions_on_role_change: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_token_secret: None,
            refresh_token_secret: None,
            issuer: DEFAULT_ISSUER.to_string(),
            access_token_ttl_secs: DEFAULT_ACCESS_TOKEN_TTL_SECS,
            refresh_token_ttl_secs: DEFAULT_REFRESH_TOKEN_TTL_SECS,
            clock_skew_leeway_secs: DEFAULT_CLOCK_SKEW_LEEWAY_SECS,
            max_sessions: DEFAULT_MAX_SESSIONS,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            require_verified_email: true,
            history_write: HistoryWriteMode::default(),
            revoke_sessions_on_password_change: true,
            revoke_sessions_on_role_change: true,
        }
    }
}

impl core::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let redact = |s: &Option<String>| s.as_ref().map(|_| "<redacted>");
        f.debug_struct("AuthConfig")
            .field("access_token_secret", &redact(&self.access_token_secret))
            .field("refresh_token_secret", &redact(&self.refresh_token_secret))
            .field("issuer", &self.issuer)
            .field("access_token_ttl_secs", &self.access_token_ttl_secs)
            .field("refresh_token_ttl_secs", &self.refresh_token_ttl_secs)
            .field("clock_skew_leeway_secs", &self.clock_skew_leeway_secs)
            .field("max_sessions", &self.max_sessions)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("require_verified_email", &self.require_verified_email)
            .field("history_write", &self.history_write)
            .field("revoke_sessions_on_password_change", &self.revoke_sessions_on_password_change)
            .field("revoke_sessions_on_role_change", &self.revoke_sessions_on_role_change)
            .finish()
    }
}

impl AuthConfig {
    /// Defaults plus the two signing secrets.
    pub fn new(access_token_secret: impl Into<String>, refresh_token_secret: impl Into<String>) -> Self {
        Self {
            access_token_secret: Some(access_token_secret.into()),
            refresh_token_secret: Some(refresh_token_secret.into()),
            ..Self::default()
        }
    }

    /// Load from `HSE_AUTH_*` environment variables and validate.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup (keys carry the `HSE_AUTH_` prefix) and validate.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(&format!("{ENV_PREFIX}{name}"))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut config = Self {
            access_token_secret: get("ACCESS_SECRET"),
            refresh_token_secret: get("REFRESH_SECRET"),
            ..Self::default()
        };

        if let Some(issuer) = get("ISSUER") {
            config.issuer = issuer;
        }
        if let Some(v) = get("ACCESS_TTL_SECS") {
            config.access_token_ttl_secs = parse_value("ACCESS_TTL_SECS", &v)?;
        }
        if let Some(v) = get("REFRESH_TTL_SECS") {
            config.refresh_token_ttl_secs = parse_value("REFRESH_TTL_SECS", &v)?;
        }
        if let Some(v) = get("CLOCK_SKEW_LEEWAY_SECS") {
            config.clock_skew_leeway_secs = parse_value("CLOCK_SKEW_LEEWAY_SECS", &v)?;
        }
        if let Some(v) = get("MAX_SESSIONS") {
            config.max_sessions = parse_value("MAX_SESSIONS", &v)?;
        }
        if let Some(v) = get("BCRYPT_COST") {
            config.bcrypt_cost = parse_value("BCRYPT_COST", &v)?;
        }
        if let Some(v) = get("REQUIRE_VERIFIED_EMAIL") {
            config.require_verified_email = parse_value("REQUIRE_VERIFIED_EMAIL", &v)?;
        }
        if let Some(v) = get("HISTORY_WRITE") {
            config.history_write = match v.as_str() {
                "compare_and_swap" => HistoryWriteMode::CompareAndSwap,
                "last_writer_wins" => HistoryWriteMode::LastWriterWins,
                other => {
                    return Err(invalid(
                        "HISTORY_WRITE",
                        format!("expected compare_and_swap or last_writer_wins, got '{other}'"),
                    ));
                }
            };
        }
        if let Some(v) = get("REVOKE_ON_PASSWORD_CHANGE") {
            config.revoke_sessions_on_password_change = parse_value("REVOKE_ON_PASSWORD_CHANGE", &v)?;
        }
        if let Some(v) = get("REVOKE_ON_ROLE_CHANGE") {
            config.revoke_sessions_on_role_change = parse_value("REVOKE_ON_ROLE_CHANGE", &v)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration; called again by every component constructor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let access = Self::check_secret(self.access_token_secret.as_deref(), SecretKind::Access)?;
        let refresh = Self::check_secret(self.refresh_token_secret.as_deref(), SecretKind::Refresh)?;
        if access == refresh {
            return Err(ConfigError::SecretsNotDistinct);
        }

        if self.issuer.trim().is_empty() {
            return Err(invalid("ISSUER", "must not be empty"));
        }
        check_ttl("ACCESS_TTL_SECS", self.access_token_ttl_secs)?;
        check_ttl("REFRESH_TTL_SECS", self.refresh_token_ttl_secs)?;
        if self.clock_skew_leeway_secs > MAX_CLOCK_SKEW_LEEWAY_SECS {
            return Err(invalid(
                "CLOCK_SKEW_LEEWAY_SECS",
                format!("must be at most {MAX_CLOCK_SKEW_LEEWAY_SECS}"),
            ));
        }
        if self.max_sessions == 0 {
            return Err(invalid("MAX_SESSIONS", "must be at least 1"));
        }
        if !(4..=31).contains(&self.bcrypt_cost) {
            return Err(invalid("BCRYPT_COST", "must be between 4 and 31"));
        }
        Ok(())
    }

    fn check_secret(secret: Option<&str>, kind: SecretKind) -> Result<&str, ConfigError> {
        let secret = secret.ok_or(ConfigError::MissingSecret(kind))?;
        if secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::SecretTooShort(kind));
        }
        Ok(secret)
    }

    pub(crate) fn secret(&self, kind: SecretKind) -> Result<&[u8], ConfigError> {
        let secret = match kind {
            SecretKind::Access => self.access_token_secret.as_deref(),
            SecretKind::Refresh => self.refresh_token_secret.as_deref(),
        };
        Self::check_secret(secret, kind).map(str::as_bytes)
    }

    pub fn access_token_ttl(&self) -> Duration {
        bounded_seconds(self.access_token_ttl_secs, MAX_TOKEN_TTL_SECS)
    }

    pub fn refresh_token_ttl(&self) -> Duration {
        bounded_seconds(self.refresh_token_ttl_secs, MAX_TOKEN_TTL_SECS)
    }

    pub fn clock_skew_leeway(&self) -> Duration {
        bounded_seconds(self.clock_skew_leeway_secs, MAX_CLOCK_SKEW_LEEWAY_SECS)
    }
}

fn check_ttl(key: &str, secs: u64) -> Result<(), ConfigError> {
    if secs == 0 {
        return Err(invalid(key, "must be positive"));
    }
    if secs > MAX_TOKEN_TTL_SECS {
        return Err(invalid(key, format!("must be at most {MAX_TOKEN_TTL_SECS}")));
    }
    Ok(())
}

/// Out-of-range values are clamped; `validate` rejects them before use.
fn bounded_seconds(secs: u64, max: u64) -> Duration {
    Duration::seconds(i64::try_from(secs.min(max)).unwrap_or(0))
}

fn invalid(key: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: format!("{ENV_PREFIX}{key}"),
        reason: reason.into(),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: core::str::FromStr,
    T::Err: core::fmt::Display,
{
    raw.parse().map_err(|e: T::Err| invalid(key, e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    const ACCESS: &str = "access-secret-access-secret-0123456789";
    const REFRESH: &str = "refresh-secret-refresh-secret-0123456789";

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_secret_fails_fast() {
        let err = AuthConfig::from_lookup(lookup(&[("HSE_AUTH_ACCESS_SECRET", ACCESS)])).unwrap_err();
        assert_eq!(err, ConfigError::MissingSecret(SecretKind::Refresh));
        assert!(err.to_string().contains("HSE_AUTH_REFRESH_SECRET"));

        let err = AuthConfig::default().validate().unwrap_err();
        assert_eq!(err, ConfigError::MissingSecret(SecretKind::Access));
    }

    #[test]
    fn short_or_shared_secrets_are_rejected() {
        let err = AuthConfig::new("short", REFRESH).validate().unwrap_err();
        assert_eq!(err, ConfigError::SecretTooShort(SecretKind::Access));

        let err = AuthConfig::new(ACCESS, ACCESS).validate().unwrap_err();
        assert_eq!(err, ConfigError::SecretsNotDistinct);
    }

    #[test]
    fn defaults_apply_when_only_secrets_are_set() {
        let config = AuthConfig::from_lookup(lookup(&[
            ("HSE_AUTH_ACCESS_SECRET", ACCESS),
            ("HSE_AUTH_REFRESH_SECRET", REFRESH),
        ]))
        .unwrap();

        assert_eq!(config.issuer, DEFAULT_ISSUER);
        assert_eq!(config.access_token_ttl(), Duration::hours(1));
        assert_eq!(config.refresh_token_ttl(), Duration::days(7));
        assert_eq!(config.max_sessions, 5);
        assert_eq!(config.history_write, HistoryWriteMode::CompareAndSwap);
        assert!(config.require_verified_email);
    }

    #[test]
    fn overrides_are_parsed() {
        let config = AuthConfig::from_lookup(lookup(&[
            ("HSE_AUTH_ACCESS_SECRET", ACCESS),
            ("HSE_AUTH_REFRESH_SECRET", REFRESH),
            ("HSE_AUTH_MAX_SESSIONS", "3"),
            ("HSE_AUTH_ACCESS_TTL_SECS", "900"),
            ("HSE_AUTH_HISTORY_WRITE", "last_writer_wins"),
            ("HSE_AUTH_REQUIRE_VERIFIED_EMAIL", "false"),
        ]))
        .unwrap();

        assert_eq!(config.max_sessions, 3);
        assert_eq!(config.access_token_ttl(), Duration::minutes(15));
        assert_eq!(config.history_write, HistoryWriteMode::LastWriterWins);
        assert!(!config.require_verified_email);
    }

    #[test]
    fn malformed_values_name_their_key() {
        let err = AuthConfig::from_lookup(lookup(&[
            ("HSE_AUTH_ACCESS_SECRET", ACCESS),
            ("HSE_AUTH_REFRESH_SECRET", REFRESH),
            ("HSE_AUTH_MAX_SESSIONS", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "HSE_AUTH_MAX_SESSIONS"));

        let err = AuthConfig::from_lookup(lookup(&[
            ("HSE_AUTH_ACCESS_SECRET", ACCESS),
            ("HSE_AUTH_REFRESH_SECRET", REFRESH),
            ("HSE_AUTH_BCRYPT_COST", "lots"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "HSE_AUTH_BCRYPT_COST"));
    }

    #[test]
    fn lifetimes_and_leeway_are_bounded() {
        let mut config = AuthConfig::new(ACCESS, REFRESH);
        config.refresh_token_ttl_secs = 10_000_000_000_000;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "HSE_AUTH_REFRESH_TTL_SECS"));
        assert_eq!(config.refresh_token_ttl(), Duration::days(366));

        let mut config = AuthConfig::new(ACCESS, REFRESH);
        config.access_token_ttl_secs = u64::MAX;
        assert!(config.validate().is_err());
        assert_eq!(config.access_token_ttl(), Duration::days(366));

        let err = AuthConfig::from_lookup(lookup(&[
            ("HSE_AUTH_ACCESS_SECRET", ACCESS),
            ("HSE_AUTH_REFRESH_SECRET", REFRESH),
            ("HSE_AUTH_CLOCK_SKEW_LEEWAY_SECS", "3600"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "HSE_AUTH_CLOCK_SKEW_LEEWAY_SECS"));

        let mut config = AuthConfig::new(ACCESS, REFRESH);
        config.refresh_token_ttl_secs = MAX_TOKEN_TTL_SECS;
        assert!(config.validate().is_ok());
        assert_eq!(AuthConfig::default().clock_skew_leeway(), Duration::seconds(60));
    }

    #[test]
    fn debug_redacts_secrets() {
        let rendered = format!("{:?}", AuthConfig::new(ACCESS, REFRESH));
        assert!(!rendered.contains(ACCESS));
        assert!(!rendered.contains(REFRESH));
    }
}
