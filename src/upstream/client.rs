use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use crate::error::{Result, SyncError};

pub const DEFAULT_BASE_URL: &str = "https://v3.football.api-sports.io";

type DirectLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Outbound GET against the provider, returning the raw JSON body.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, endpoint: &str, query: &[(&'static str, String)]) -> Result<Value>;
}

/// Limits applied to every outbound request.
#[derive(Debug, Clone, Copy)]
pub struct RequestLimits {
    /// Concurrency ceiling, not a scheduler.
    pub max_in_flight: usize,
    /// Minimum gap between two dispatches.
    pub min_spacing: Duration,
    pub timeout: Duration,
}

impl Default for RequestLimits {
    fn default() -> Self {
        Self {
            max_in_flight: 5,
            min_spacing: Duration::from_millis(200),
            timeout: Duration::from_secs(30),
        }
    }
}

/// API-Football over reqwest.
pub struct ApiFootballClient {
    base_url: String,
    host: String,
    api_key: String,
    http: reqwest::Client,
    in_flight: Semaphore,
    spacing: Option<DirectLimiter>,
}

impl ApiFootballClient {
    pub fn new(api_key: String, base_url: String, limits: RequestLimits) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(limits.timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(limits.max_in_flight.max(1))
            .build()?;

        let host = reqwest::Url::parse(&base_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .ok_or_else(|| SyncError::Config(format!("invalid API base url: {}", base_url)))?;

        // A zero spacing means "no spacing", not "never dispatch".
        let spacing = Quota::with_period(limits.min_spacing)
            .map(|q| RateLimiter::direct(q.allow_burst(NonZeroU32::MIN)));

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            host,
            api_key,
            http,
            in_flight: Semaphore::new(limits.max_in_flight.max(1)),
            spacing,
        })
    }
}

#[async_trait]
impl Transport for ApiFootballClient {
    async fn get(&self, endpoint: &str, query: &[(&'static str, String)]) -> Result<Value> {
        // The semaphore is never closed, so acquire cannot fail.
        let _permit = self.in_flight.acquire().await.ok();
        if let Some(limiter) = &self.spacing {
            limiter.until_ready().await;
        }

        let url = format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'));
        debug!("GET {} {:?}", url, query);

        let response = self
            .http
            .get(&url)
            .header("x-rapidapi-host", &self.host)
            .header("x-rapidapi-key", &self.api_key)
            .query(query)
            .send()
            .await?;

        if let Some(remaining) = response.headers().get("x-ratelimit-requests-remaining") {
            info!(
                "API requests remaining today: {}",
                remaining.to_str().unwrap_or("?")
            );
        }

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(SyncError::UpstreamStatus {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|source| SyncError::Decode {
            endpoint: endpoint.to_string(),
            source,
        })
    }
}
