// web-server/src/middleware/rate_limiter.rs
use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::{header, StatusCode},
    Error, HttpResponse, ResponseError,
};
use dashmap::DashMap;
use futures_util::future::{ready, LocalBoxFuture, Ready};
use siwe_common::config::RateLimitConfig;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

// Custom error for rate limiting
#[derive(Debug)]
struct RateLimitExceeded {
    retry_after: u64,
}

impl fmt::Display for RateLimitExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rate limit exceeded")
    }
}

impl ResponseError for RateLimitExceeded {
    fn status_code(&self) -> StatusCode {
        StatusCode::TOO_MANY_REQUESTS
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::TooManyRequests()
            .append_header((header::RETRY_AFTER, self.retry_after.to_string()))
            .body("Rate limit exceeded. Please try again later.")
    }
}

/// Sliding-window limiter keyed by client IP, applied to a set of path prefixes.
/// Clones share one store, so all workers see the same counts.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    paths: Vec<String>,
    max_requests: usize,
    window: Duration,
    store: Arc<DashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    pub fn new(paths: Vec<String>, max_requests: usize, window: Duration) -> Self {
        Self {
            paths,
            max_requests,
            window,
            store: Arc::new(DashMap::new()),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(
            config.paths.clone(),
            config.max_requests,
            Duration::from_secs(config.window_secs),
        )
    }

    fn applies_to(&self, path: &str) -> bool {
        self.paths.iter().any(|p| path.starts_with(p.as_str()))
    }

    fn is_rate_limited(&self, ip: &str) -> bool {
        let now = Instant::now();
        let mut hits = self.store.entry(ip.to_string()).or_default();

        hits.retain(|time| now.duration_since(*time) < self.window);

        if hits.len() >= self.max_requests {
            true
        } else {
            hits.push(now);
            false
        }
    }

    /// Drop clients with no hits left inside the window; returns how many were removed
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.store.len();
        self.store.retain(|_, hits| {
            hits.retain(|time| now.duration_since(*time) < self.window);
            !hits.is_empty()
        });
        before.saturating_sub(self.store.len())
    }

    /// Sweep the store once per window on the current actix runtime
    pub fn start_sweeper(&self) {
        let limiter = self.clone();
        actix_web::rt::spawn(async move {
            let mut interval = actix_web::rt::time::interval(limiter.window.max(Duration::from_secs(1)));
            loop {
                interval.tick().await;
                let removed = limiter.sweep();
                if removed > 0 {
                    tracing::debug!("Rate limiter dropped {} idle clients", removed);
                }
            }
        });
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimiter
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = RateLimiterMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimiterMiddleware {
            service,
            limiter: self.clone(),
        }))
    }
}

pub struct RateLimiterMiddleware<S> {
    service: S,
    limiter: RateLimiter,
}

impl<S, B> Service<ServiceRequest> for RateLimiterMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<ServiceResponse<B>, Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if self.limiter.applies_to(req.path()) {
            let ip = req
                .connection_info()
                .realip_remote_addr()
                .unwrap_or("unknown")
                .to_string();

            if self.limiter.is_rate_limited(&ip) {
                tracing::warn!("Rate limit exceeded for IP: {} on {}", ip, req.path());
                let retry_after = self.limiter.window.as_secs().max(1);
                return Box::pin(async move { Err(RateLimitExceeded { retry_after }.into()) });
            }
        }

        let fut = self.service.call(req);
        Box::pin(fut)
    }
}
