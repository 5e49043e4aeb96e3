//! Error taxonomy of the auth core and its caller-facing form.

use serde::Serialize;
use thiserror::Error;

use crate::authorize::AuthzError;
use crate::credential::CredentialError;
use crate::store::StoreError;
use crate::token::TokenRejection;

/// Terminal outcome of an auth operation. Never retried inside this crate.
///
/// `Display` is safe to show to end users; internal detail (which check failed)
/// is only available through `Debug` and structured logs.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown identifier or wrong secret; never distinguished further.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("email address not verified")]
    EmailNotVerified,

    #[error("invalid token")]
    TokenInvalid(TokenRejection),

    /// A validly signed refresh token that the ledger no longer honors.
    #[error("invalid token")]
    TokenNotRecognized,

    #[error("unauthorized")]
    Unauthorized(AuthzError),

    /// A concurrent token-history write won the race.
    #[error("conflict")]
    Conflict,

    #[error("service unavailable")]
    Store(StoreError),

    #[error("service unavailable")]
    Credential(#[from] CredentialError),

    #[error("service unavailable")]
    Signing(String),
}

impl From<StoreError> for AuthError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict(_) => AuthError::Conflict,
            other => AuthError::Store(other),
        }
    }
}

impl From<TokenRejection> for AuthError {
    fn from(value: TokenRejection) -> Self {
        AuthError::TokenInvalid(value)
    }
}

impl From<AuthzError> for AuthError {
    fn from(value: AuthzError) -> Self {
        AuthError::Unauthorized(value)
    }
}

/// Error codes exposed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PublicAuthError {
    InvalidCredentials,
    EmailNotVerified,
    TokenInvalid,
    Unauthorized,
    Conflict,
    Unavailable,
}

impl PublicAuthError {
    pub fn code(&self) -> &'static str {
        match self {
            PublicAuthError::InvalidCredentials => "invalid_credentials",
            PublicAuthError::EmailNotVerified => "email_not_verified",
            PublicAuthError::TokenInvalid => "token_invalid",
            PublicAuthError::Unauthorized => "unauthorized",
            PublicAuthError::Conflict => "conflict",
            PublicAuthError::Unavailable => "unavailable",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            PublicAuthError::InvalidCredentials => "invalid email or password",
            PublicAuthError::EmailNotVerified => "please verify your email address",
            PublicAuthError::TokenInvalid => "invalid or expired token",
            PublicAuthError::Unauthorized => "insufficient permissions",
            PublicAuthError::Conflict => "request conflicted with a concurrent session update, please retry",
            PublicAuthError::Unavailable => "service temporarily unavailable",
        }
    }

    /// `{"error": code, "message": message}` body for the request layer.
    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error: self.code(),
            message: self.message(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: &'static str,
}

impl AuthError {
    /// Collapse to the caller-visible code. Every token failure, including a
    /// refresh token the ledger no longer honors, is `token_invalid`.
    pub fn public(&self) -> PublicAuthError {
        match self {
            AuthError::InvalidCredentials => PublicAuthError::InvalidCredentials,
            AuthError::EmailNotVerified => PublicAuthError::EmailNotVerified,
            AuthError::TokenInvalid(_) | AuthError::TokenNotRecognized => PublicAuthError::TokenInvalid,
            AuthError::Unauthorized(_) => PublicAuthError::Unauthorized,
            AuthError::Conflict => PublicAuthError::Conflict,
            AuthError::Store(_) | AuthError::Credential(_) | AuthError::Signing(_) => PublicAuthError::Unavailable,
        }
    }
}
