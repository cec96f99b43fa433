//! Rate-limited API client.

use std::sync::Arc;
use std::time::Duration;

use hookline_core::{HttpError, HttpResult, Snowflake};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::backend::{BackendError, BackendRequest, HttpBackend};
use crate::ratelimit::{BucketTable, RateLimitInfo};
use crate::response::{HttpResponse, ResponseFormat};
use crate::route::{Method, Route};

/// Unversioned API root.
pub const DEFAULT_BASE_URL: &str = "https://discord.com/api";

/// API version used when none is configured.
pub const DEFAULT_API_VERSION: u8 = 10;

/// Attempts made for 5xx responses and connection failures.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// 400 error codes that mean the message was blocked by automod.
const AUTOMOD_CODES: [i64; 2] = [200_000, 200_001];

/// Settings of an [`HttpClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Bot token sent as `Authorization: Bot {token}`.
    pub token: String,
    /// Application id, needed for command registration.
    pub application_id: Option<Snowflake>,
    pub api_version: u8,
    /// Unversioned API root, without trailing slash.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Attempts made for retryable failures, including the first one.
    pub max_attempts: u32,
}

impl ClientConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            application_id: None,
            api_version: DEFAULT_API_VERSION,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn application_id(mut self, id: impl Into<Snowflake>) -> Self {
        self.application_id = Some(id.into());
        self
    }

    pub fn api_version(mut self, version: u8) -> Self {
        self.api_version = version;
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Versioned API root.
    pub fn api_url(&self) -> String {
        format!("{}/v{}", self.base_url, self.api_version)
    }
}

/// Per-call options.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// Sent as `X-Audit-Log-Reason`.
    pub reason: Option<String>,
    /// How to decode the body.
    pub format: ResponseFormat,
    /// Extra headers.
    pub headers: Vec<(String, String)>,
    /// Whether to send the bot token.
    pub authenticate: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            reason: None,
            format: ResponseFormat::Json,
            headers: Vec::new(),
            authenticate: true,
        }
    }
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn format(mut self, format: ResponseFormat) -> Self {
        self.format = format;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Omits the bot token (webhook calls authenticate with their own token).
    pub fn unauthenticated(mut self) -> Self {
        self.authenticate = false;
        self
    }
}

struct ClientInner {
    config: ClientConfig,
    api_url: String,
    user_agent: String,
    backend: Arc<dyn HttpBackend>,
    buckets: BucketTable,
}

/// Issues API calls while respecting per-route rate limits.
///
/// Cloning is cheap; clones share buckets and the connection pool.
#[derive(Clone)]
pub struct HttpClient {
    inner: Arc<ClientInner>,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("api_url", &self.inner.api_url)
            .field("application_id", &self.inner.config.application_id)
            .field("buckets", &self.inner.buckets.len())
            .finish()
    }
}

impl HttpClient {
    /// Creates a client backed by `reqwest`.
    #[cfg(feature = "http-client")]
    pub fn new(config: ClientConfig) -> HttpResult<Self> {
        let backend = crate::backend::ReqwestBackend::new(config.timeout)
            .map_err(|e| HttpError::Request(e.to_string()))?;
        Ok(Self::with_backend(config, Arc::new(backend)))
    }

    /// Creates a client on top of any backend.
    pub fn with_backend(config: ClientConfig, backend: Arc<dyn HttpBackend>) -> Self {
        let user_agent = format!(
            "DiscordBot ({}, {}) hookline/{}",
            env!("CARGO_PKG_REPOSITORY"),
            env!("CARGO_PKG_VERSION"),
            env!("CARGO_PKG_VERSION"),
        );
        Self {
            inner: Arc::new(ClientInner {
                api_url: config.api_url(),
                config,
                user_agent,
                backend,
                buckets: BucketTable::default(),
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn application_id(&self) -> Option<Snowflake> {
        self.inner.config.application_id
    }

    /// The rate-limit buckets of this client.
    pub fn buckets(&self) -> &BucketTable {
        &self.inner.buckets
    }

    /// Sends a request with default options.
    pub async fn request(&self, route: &Route, body: Option<Value>) -> HttpResult<HttpResponse> {
        self.send(route, body, RequestOptions::default()).await
    }

    /// Sends a request through the route's rate-limit bucket.
    ///
    /// * 2xx: the bucket is updated from the response headers.
    /// * 429 with a JSON `retry_after`: sleeps and retries without using up
    ///   an attempt. Any other 429 is returned as [`HttpError::Ratelimited`].
    /// * 500, 502, 503, 504 and connection resets: retried after
    ///   `1 + 2n` seconds until `max_attempts` attempts were made.
    /// * Other statuses map to the matching [`HttpError`] variant.
    pub async fn send(
        &self,
        route: &Route,
        body: Option<Value>,
        options: RequestOptions,
    ) -> HttpResult<HttpResponse> {
        let base = if route.is_webhook() {
            self.inner.config.base_url.as_str()
        } else {
            self.inner.api_url.as_str()
        };
        let request = BackendRequest {
            method: route.method(),
            url: format!("{base}{}", route.path()),
            headers: self.headers(&options),
            body,
        };
        let max_attempts = self.inner.config.max_attempts.max(1);

        let bucket = self.inner.buckets.get(&route.bucket_key());
        let permit = bucket.acquire().await;

        let mut attempts = 0;
        loop {
            let raw = match self.inner.backend.execute(request.clone()).await {
                Ok(raw) => raw,
                Err(BackendError::Connection(reason)) => {
                    attempts += 1;
                    if attempts >= max_attempts {
                        return Err(HttpError::Connection { reason, attempts });
                    }
                    let delay = backoff(attempts);
                    warn!(route = %route, attempts, delay_secs = delay.as_secs(), error = %reason, "Connection failed, retrying");
                    tokio::time::sleep(delay).await;
                    continue;
                }
                Err(BackendError::Other(reason)) => return Err(HttpError::Request(reason)),
            };

            let response = HttpResponse::decode(raw.status, raw.headers, raw.body, options.format);
            debug!(method = %route.method(), path = %route.path(), status = response.status, "HTTP request completed");

            match response.status {
                200..=299 => {
                    if let Some(info) = RateLimitInfo::from_headers(&response.headers) {
                        permit.update(&info);
                    }
                    return Ok(response);
                }
                429 => {
                    let Some(retry_after) = retry_after(&response) else {
                        return Err(HttpError::Ratelimited(response.error_response()));
                    };
                    warn!(route = %route, retry_after_secs = retry_after.as_secs_f64(), "Rate limit hit, waiting");
                    tokio::time::sleep(retry_after).await;
                }
                500 | 502 | 503 | 504 => {
                    attempts += 1;
                    if attempts >= max_attempts {
                        return Err(HttpError::ServerError {
                            response: response.error_response(),
                            attempts,
                        });
                    }
                    let delay = backoff(attempts);
                    warn!(route = %route, status = response.status, attempts, delay_secs = delay.as_secs(), "Server error, retrying");
                    tokio::time::sleep(delay).await;
                }
                400 => {
                    let error = response.error_response();
                    return Err(if AUTOMOD_CODES.contains(&error.code) {
                        HttpError::AutomodBlock(error)
                    } else {
                        HttpError::BadRequest(error)
                    });
                }
                403 => return Err(HttpError::Forbidden(response.error_response())),
                404 => return Err(HttpError::NotFound(response.error_response())),
                _ => return Err(HttpError::Api(response.error_response())),
            }
        }
    }

    fn headers(&self, options: &RequestOptions) -> Vec<(String, String)> {
        let mut headers = vec![("User-Agent".to_string(), self.inner.user_agent.clone())];
        if options.authenticate {
            headers.push((
                "Authorization".to_string(),
                format!("Bot {}", self.inner.config.token),
            ));
        }
        if let Some(reason) = &options.reason {
            headers.push(("X-Audit-Log-Reason".to_string(), encode_reason(reason)));
        }
        headers.extend(options.headers.iter().cloned());
        headers
    }

    /// Fetches the bot's own user object.
    pub async fn me(&self) -> HttpResult<Value> {
        let route = Route::new(Method::Get, "/users/@me");
        Ok(self.request(&route, None).await?.into_json())
    }

    /// Replaces the registered application commands, globally or for one
    /// guild, and returns what the API stored.
    pub async fn update_commands(
        &self,
        commands: &Value,
        guild_id: Option<Snowflake>,
    ) -> HttpResult<Value> {
        let route = self.commands_route(Method::Put, guild_id)?;
        let target = guild_id.map_or_else(|| "globally".to_string(), |id| format!("for guild {id}"));
        match self.request(&route, Some(commands.clone())).await {
            Ok(response) => {
                info!(target = %target, "Synced application commands");
                Ok(response.into_json())
            }
            Err(e) => {
                warn!(target = %target, error = %e, "Failed to sync application commands");
                Err(e)
            }
        }
    }

    /// Fetches the registered application commands.
    pub async fn fetch_commands(&self, guild_id: Option<Snowflake>) -> HttpResult<Value> {
        let route = self.commands_route(Method::Get, guild_id)?;
        Ok(self.request(&route, None).await?.into_json())
    }

    fn commands_route(&self, method: Method, guild_id: Option<Snowflake>) -> HttpResult<Route> {
        let application_id = self.application_id().ok_or_else(|| {
            HttpError::Request("application_id is required to sync commands".to_string())
        })?;
        Ok(match guild_id {
            Some(guild_id) => Route::new(
                method,
                "/applications/{application_id}/guilds/{guild_id}/commands",
            )
            .param("application_id", application_id)
            .param("guild_id", guild_id),
            None => Route::new(method, "/applications/{application_id}/commands")
                .param("application_id", application_id),
        })
    }
}

/// Delay before retry number `attempts` (1-based): 1, 3, 5, 7, ... seconds.
fn backoff(attempts: u32) -> Duration {
    Duration::from_secs(1 + 2 * u64::from(attempts.saturating_sub(1)))
}

fn retry_after(response: &HttpResponse) -> Option<Duration> {
    response
        .json()?
        .get("retry_after")?
        .as_f64()
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
}

/// Percent-encodes bytes that are not valid in a header value.
fn encode_reason(reason: &str) -> String {
    let mut out = String::with_capacity(reason.len());
    for byte in reason.bytes() {
        if byte.is_ascii_graphic() || byte == b' ' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}
