use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header::RETRY_AFTER, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::DefaultClock,
    middleware::NoOpMiddleware,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use tokio::sync::RwLock;
use tracing::warn;

use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::server::AppState;

type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

/// Tracked addresses before the table is reset
const CLEANUP_THRESHOLD: usize = 10_000;

/// Request budget per client address.
///
/// An address may spend `max_requests` at once. The budget refills evenly
/// so that a full budget is available again after `window`.
pub struct ApiRateLimiter {
    enabled: bool,
    quota: Quota,
    limiters: RwLock<HashMap<IpAddr, Arc<Limiter>>>,
}

impl ApiRateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        let max = NonZeroU32::new(max_requests).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::with_period(window / max.get())
            .unwrap_or_else(|| Quota::per_second(max))
            .allow_burst(max);
        Self {
            enabled: true,
            quota,
            limiters: RwLock::new(HashMap::new()),
        }
    }

    /// Limiter that lets every request through
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::new(1, Duration::from_secs(1))
        }
    }

    pub fn from_config(api: &ApiConfig) -> Self {
        if !api.rate_limit_enabled {
            return Self::disabled();
        }
        Self::new(api.rate_limit_max, Duration::from_secs(api.rate_limit_window_secs))
    }

    /// `false` once `peer` has spent its budget
    pub async fn check(&self, peer: IpAddr) -> bool {
        if !self.enabled {
            return true;
        }

        let limiter = {
            let limiters = self.limiters.read().await;
            limiters.get(&peer).cloned()
        };
        let limiter = match limiter {
            Some(limiter) => limiter,
            None => {
                let mut limiters = self.limiters.write().await;
                if limiters.len() > CLEANUP_THRESHOLD {
                    limiters.clear();
                }
                limiters
                    .entry(peer)
                    .or_insert_with(|| Arc::new(RateLimiter::direct(self.quota)))
                    .clone()
            }
        };

        limiter.check().is_ok()
    }

    /// Seconds until one more request is allowed, rounded up
    pub fn retry_after_secs(&self) -> u64 {
        let interval = self.quota.replenish_interval();
        let secs = interval.as_secs();
        if interval.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs.max(1)
        }
    }
}

impl std::fmt::Debug for ApiRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiRateLimiter")
            .field("enabled", &self.enabled)
            .field("quota", &self.quota)
            .finish()
    }
}

/// Rejects the request with 429 once the client address has used up its budget.
pub async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    if state.limiter.check(peer).await {
        return next.run(request).await;
    }

    warn!("Rate limit exceeded for {}", peer);
    let mut response = ApiError::too_many_requests("Too many requests, please try again later").into_response();
    if let Ok(value) = HeaderValue::from_str(&state.limiter.retry_after_secs().to_string()) {
        response.headers_mut().insert(RETRY_AFTER, value);
    }
    response
}
