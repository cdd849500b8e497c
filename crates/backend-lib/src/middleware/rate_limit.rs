use std::sync::Arc;
use std::time::{Duration, Instant};
use ::metrics::counter;
use axum::{
    middleware::Next,
    response::Response,
    http::Request,
    extract::State,
};
use crate::{AppState, error::AppError};
use crate::metrics::REQUEST_THROTTLED;

/// Fixed-window rate limiter keyed by the `x-real-ip` header
pub async fn rate_limit(
    State(state): State<Arc<AppState>>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, AppError> {
    // Get client IP
    let client_ip = request
        .headers()
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let max_requests = state.settings.rate_limit.max_requests;
    let window = Duration::from_secs(state.settings.rate_limit.window_secs);

    {
        let mut entry = state
            .rate_limits
            .entry(client_ip.clone())
            .or_insert_with(RateLimitEntry::new);

        if entry.window_start.elapsed() > window {
            entry.requests = 0;
            entry.window_start = Instant::now();
        }

        if entry.requests >= max_requests {
            counter!(REQUEST_THROTTLED).increment(1);
            tracing::debug!(client = %client_ip, "request throttled");
            return Err(AppError::RateLimitExceeded);
        }

        entry.requests += 1;
    }

    Ok(next.run(request).await)
}

/// Rate limit entry for a client
#[derive(Debug)]
pub struct RateLimitEntry {
    requests: u32,
    window_start: Instant,
}

impl RateLimitEntry {
    fn new() -> Self {
        Self {
            requests: 0,
            window_start: Instant::now(),
        }
    }
}

/// Drop windows that ended more than `window` ago
pub fn prune_rate_limits(state: &AppState) {
    let window = Duration::from_secs(state.settings.rate_limit.window_secs);
    state
        .rate_limits
        .retain(|_, entry| entry.window_start.elapsed() <= window);
}
