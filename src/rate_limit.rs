//! Fixed-window request counting.
//!
//! [`FixedWindowLimiter`] keeps counters in process memory;
//! [`RedisWindowLimiter`] shares them between instances. Both answer the
//! same question: may `identifier` make another request in the current
//! window?

use actix_web::body::MessageBody;
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::http::Method;
use actix_web::middleware::Next;
use actix_web::{Error, web};
use parking_lot::Mutex;
use redis::{Client, RedisError, aio::ConnectionManager};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::parse_duration_secs;
use crate::clock::{self, SharedClock};
use crate::errors::AppError;

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    reset_at: u64,
}

pub struct FixedWindowLimiter {
    windows: Mutex<HashMap<String, Window>>,
    clock: SharedClock,
}

impl FixedWindowLimiter {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Count one request for `identifier`. A fresh window opens when none
    /// exists or the previous one has elapsed.
    pub fn allow(&self, identifier: &str, max: u32, window: Duration) -> bool {
        let now = self.clock.now_ms();
        let mut windows = self.windows.lock();

        if let Some(current) = windows.get_mut(identifier) {
            if now <= current.reset_at {
                if current.count >= max {
                    return false;
                }
                current.count += 1;
                return true;
            }
        }

        windows.insert(
            identifier.to_string(),
            Window {
                count: 1,
                reset_at: clock::deadline(now, window),
            },
        );
        true
    }

    /// Drop elapsed windows. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now_ms();
        let mut windows = self.windows.lock();
        let before = windows.len();
        windows.retain(|_, w| now <= w.reset_at);
        before - windows.len()
    }

    pub fn tracked(&self) -> usize {
        self.windows.lock().len()
    }
}

/// Redis-backed windows. The counter is created with its expiry and
/// incremented in one `MULTI` block, so a key never outlives its window.
#[derive(Clone)]
pub struct RedisWindowLimiter {
    connection: ConnectionManager,
}

impl RedisWindowLimiter {
    pub async fn new(redis_url: &str) -> Result<Self, RedisError> {
        let client = Client::open(redis_url)?;
        let connection = ConnectionManager::new(client).await?;
        Ok(Self { connection })
    }

    /// Fails open: a Redis error lets the request through.
    pub async fn allow(&self, identifier: &str, max: u32, window: Duration) -> bool {
        match self.try_allow(identifier, max, window).await {
            Ok(allowed) => allowed,
            Err(e) => {
                tracing::warn!("Rate limiter unavailable, allowing request: {e}");
                true
            }
        }
    }

    async fn try_allow(
        &self,
        identifier: &str,
        max: u32,
        window: Duration,
    ) -> redis::RedisResult<bool> {
        let key = format!("rate_limit:{identifier}");
        let mut conn = self.connection.clone();

        let (count,): (u64,) = window_pipeline(&key, window)
            .query_async(&mut conn)
            .await?;

        Ok(count <= u64::from(max))
    }
}

/// `MULTI; SET key 0 PX window NX; INCR key; EXEC`. The counter is born with
/// its expiry, and `INCR` keeps it.
pub fn window_pipeline(key: &str, window: Duration) -> redis::Pipeline {
    let mut pipe = redis::pipe();
    pipe.atomic()
        .cmd("SET")
        .arg(key)
        .arg(0)
        .arg("PX")
        .arg(clock::millis(window).max(1))
        .arg("NX")
        .ignore()
        .cmd("INCR")
        .arg(key);
    pipe
}

pub enum RateLimiter {
    Memory(FixedWindowLimiter),
    Redis(RedisWindowLimiter),
}

impl RateLimiter {
    pub async fn allow(&self, identifier: &str, max: u32, window: Duration) -> bool {
        match self {
            RateLimiter::Memory(limiter) => limiter.allow(identifier, max, window),
            RateLimiter::Redis(limiter) => limiter.allow(identifier, max, window).await,
        }
    }

    /// Redis expires its own keys, so only the memory backend sweeps.
    pub fn sweep(&self) -> usize {
        match self {
            RateLimiter::Memory(limiter) => limiter.sweep(),
            RateLimiter::Redis(_) => 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub read_max: u32,
    pub mutation_max: u32,
    pub window: Duration,
    pub sweep_interval: Duration,
    pub use_redis: bool,
    /// Read the client address from `Forwarded`/`X-Forwarded-For`. Only
    /// enable behind a proxy that overwrites those headers.
    pub trust_proxy: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            read_max: 100,
            mutation_max: 30,
            window: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(300),
            use_redis: false,
            trust_proxy: false,
        }
    }
}

impl RateLimitConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            read_max: parse_u32("RATE_LIMIT_READ_MAX", defaults.read_max),
            mutation_max: parse_u32("RATE_LIMIT_MUTATION_MAX", defaults.mutation_max),
            window: parse_duration_secs("RATE_LIMIT_WINDOW_SECS", 60),
            sweep_interval: parse_duration_secs("RATE_LIMIT_SWEEP_INTERVAL_SECS", 300),
            use_redis: std::env::var("RATE_LIMIT_BACKEND")
                .map(|v| v.eq_ignore_ascii_case("redis"))
                .unwrap_or(false),
            trust_proxy: std::env::var("RATE_LIMIT_TRUST_PROXY")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }

    /// Budget for a request method. Safe methods share the read budget.
    pub fn budget_for(&self, method: &Method) -> (&'static str, u32) {
        if method == Method::GET || method == Method::HEAD || method == Method::OPTIONS {
            ("read", self.read_max)
        } else {
            ("write", self.mutation_max)
        }
    }
}

fn parse_u32(env_var: &str, default: u32) -> u32 {
    std::env::var(env_var)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Who a request is counted against: the client address. Request headers
/// such as the bearer token are caller controlled and never used here.
pub fn identify(req: &ServiceRequest, trust_proxy: bool) -> String {
    let ip = if trust_proxy {
        req.connection_info().realip_remote_addr().map(host_only)
    } else {
        req.peer_addr().map(|addr| addr.ip().to_string())
    };

    format!("ip:{}", ip.as_deref().unwrap_or("unknown"))
}

fn host_only(addr: &str) -> String {
    addr.parse::<SocketAddr>()
        .map(|socket| socket.ip().to_string())
        .unwrap_or_else(|_| addr.to_string())
}

/// Actix middleware (`middleware::from_fn`) applying the configured budgets.
pub async fn enforce(
    req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    let limiter = req.app_data::<web::Data<Arc<RateLimiter>>>().cloned();
    let config = req.app_data::<web::Data<RateLimitConfig>>().cloned();

    if let (Some(limiter), Some(config)) = (limiter, config) {
        let (bucket, max) = config.budget_for(req.method());
        let identifier = format!("{bucket}:{}", identify(&req, config.trust_proxy));

        if !limiter.allow(&identifier, max, config.window).await {
            tracing::debug!("Rate limit hit for {identifier}");
            return Err(AppError::rate_limited().into());
        }
    }

    next.call(req).await
}

/// Periodically sweep the cache and the limiter until the runtime shuts down.
pub fn spawn_sweepers(
    cache: Arc<crate::cache::TaggedCache>,
    cache_every: Duration,
    limiter: Arc<RateLimiter>,
    limiter_every: Duration,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(cache_every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = cache.sweep();
            tracing::debug!("Cache sweep removed {removed} expired entries");
        }
    });

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(limiter_every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = limiter.sweep();
            tracing::debug!("Rate limiter sweep removed {removed} windows");
        }
    });
}
