//! Sliding-window, in-memory rate limiter for the `/api` routes.
//! Per process only; put a shared limiter in front when running replicas.
use crate::error::AppError;
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

type HitLog = VecDeque<Instant>;

#[derive(Clone)]
pub struct RateLimiter {
    hits: Arc<RwLock<HashMap<String, HitLog>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window_secs: u64) -> Self {
        Self {
            hits: Arc::new(RwLock::new(HashMap::new())),
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }

    /// Hits are appended in order, so expired ones sit at the front.
    fn prune(&self, log: &mut HitLog, now: Instant) {
        while log
            .front()
            .is_some_and(|&hit| now.duration_since(hit) >= self.window)
        {
            log.pop_front();
        }
    }

    /// Records a hit for `client` and reports whether it is allowed.
    pub async fn check(&self, client: &str) -> bool {
        let now = Instant::now();
        let mut hits = self.hits.write().await;
        let log = hits.entry(client.to_string()).or_default();
        self.prune(log, now);

        let allowed = log.len() < self.max_requests;
        if allowed {
            log.push_back(now);
        }
        allowed
    }

    /// Forgets clients with no hits left in the window.
    pub async fn cleanup(&self) {
        let now = Instant::now();
        let mut hits = self.hits.write().await;
        let before = hits.len();
        hits.retain(|_, log| {
            self.prune(log, now);
            !log.is_empty()
        });
        tracing::debug!(
            "Rate limiter cleanup: dropped {} clients, {} still tracked",
            before - hits.len(),
            hits.len()
        );
    }
}

/// First `X-Forwarded-For` entry (the app usually runs behind a proxy),
/// else the peer address.
pub fn client_id(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = client_id(request.headers(), peer);

    if !limiter.check(&client).await {
        tracing::warn!("Rate limit exceeded for client: {}", client);
        return AppError::RateLimited.into_response();
    }

    next.run(request).await
}
