use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use redis::AsyncCommands;

use crate::{config::Config, error::AppError};

/// Fixed-window per-IP request counter kept in Redis.
#[derive(Clone)]
pub struct RateLimiter {
    redis: Arc<redis::Client>,
    config: Arc<Config>,
}

impl RateLimiter {
    pub fn new(redis: redis::Client, config: Config) -> Self {
        Self {
            redis: Arc::new(redis),
            config: Arc::new(config),
        }
    }

    /// Opens a limiter when `REDIS_URL` is configured.
    pub fn from_config(config: &Config) -> Option<Self> {
        let url = config.redis_url.as_deref()?;
        match redis::Client::open(url) {
            Ok(client) => Some(Self::new(client, config.clone())),
            Err(e) => {
                tracing::warn!("Rate limiting disabled, invalid REDIS_URL: {}", e);
                None
            }
        }
    }

    /// Returns the request count of the current window for `ip`.
    async fn hit(&self, ip: &str) -> redis::RedisResult<u32> {
        let key = format!("rate_limit:{}", ip);
        let mut conn = self.redis.get_multiplexed_async_connection().await?;

        let count: u32 = conn.incr(&key, 1).await?;
        if count == 1 {
            let _: () = conn
                .expire(&key, self.config.rate_limit_window().as_secs() as i64)
                .await?;
        }
        Ok(count)
    }

    pub async fn check_rate_limit(&self, req: Request<Body>, next: Next) -> Response {
        let remote_ip = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0.ip().to_string());
        let ip = client_ip(req.headers(), remote_ip.as_deref());

        match self.hit(&ip).await {
            Ok(count) if count > self.config.rate_limit_requests => {
                tracing::info!("Rate limit exceeded for {}", ip);
                AppError::RateLimited(format!(
                    "Trop de requêtes, réessayez dans {} secondes",
                    self.config.rate_limit_window().as_secs()
                ))
                .into_response()
            }
            Ok(_) => next.run(req).await,
            Err(e) => {
                // fail open
                tracing::warn!("Rate limiter unavailable: {}", e);
                next.run(req).await
            }
        }
    }
}

/// Client address from proxy headers, falling back to the socket peer.
pub(crate) fn client_ip(headers: &HeaderMap, remote_ip: Option<&str>) -> String {
    headers
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .filter(|s| !s.trim().is_empty())
        .or_else(|| {
            headers
                .get("x-forwarded-for")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.split(',').find(|ip| !ip.trim().is_empty()))
        })
        .or(remote_ip)
        .unwrap_or("unknown")
        .trim()
        .to_string()
}

pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    limiter.check_rate_limit(req, next).await
}
