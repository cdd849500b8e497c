// ==============
// crates/backend-lib/src/metrics.rs

//! Central place for metric keys
pub const USER_REGISTERED: &str = "auth.user.registered";
pub const LOGIN_SUCCEEDED: &str = "auth.login.succeeded";
pub const LOGIN_FAILED: &str = "auth.login.failed";
pub const TOKEN_ISSUED: &str = "auth.token.issued";
pub const TOKEN_REVOKED: &str = "auth.token.revoked";
pub const PASSWORD_RESET: &str = "auth.password.reset";
pub const NOTIFY_FAILED: &str = "auth.notify.failed";
pub const REQUEST_THROTTLED: &str = "http.request.throttled";
