//! `hse-core` — shared primitives for the HSE platform.
//!
//! This crate contains **pure** building blocks (no infrastructure concerns):
//! identifiers, the time source seam and optimistic-concurrency expectations.

pub mod clock;
pub mod error;
pub mod id;
pub mod version;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{DomainError, DomainResult};
pub use id::{PrincipalId, TenantId};
pub use version::ExpectedVersion;
