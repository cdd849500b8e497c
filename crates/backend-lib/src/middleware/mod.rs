// crates/backend-lib/src/middleware/mod.rs

//! HTTP middleware.

pub mod bearer;
pub mod rate_limit;

pub use bearer::{require_bearer, AuthenticatedUser};
pub use rate_limit::{prune_rate_limits, rate_limit};
