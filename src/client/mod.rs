//! Authenticated API client
//!
//! Wraps a [`Transport`] with credential handling:
//! - static-header method: `Authorization: ApiKey <org>:<key>`
//! - signing method: signed `GET /auth/token` exchange, then
//!   `Authorization: Bearer <token>` from the per-client [`TokenCache`]
//!
//! Every response is scanned for rate-limit headers and non-2xx statuses are
//! mapped to [`ApiError`]. Nothing is retried here.

mod error;
mod ratelimit;
pub mod transport;

use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use chrono::DateTime;
use regex_lite::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;

use vulnetix_protocol::ops::TokenResponse;
use vulnetix_protocol::{headers, paths, ErrorEnvelope, USER_AGENT};

use crate::auth::{AuthSecret, CachedToken, Clock, Credentials, RequestSigner, SystemClock, TokenCache};

pub use error::{ApiError, ApiResult};
pub use ratelimit::{format_duration, format_number, RateLimit};
pub use transport::{
    FilePart, HttpRequest, HttpResponse, Method, MultipartForm, ReqwestTransport, RequestBody,
    Transport, TransportError,
};

/// Timeout for token exchange, verification and database queries
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for one base URL and one set of credentials
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    base_url: String,
    token_url: String,
    credentials: Credentials,
    timeout: Duration,
    token_timeout: Duration,
    tokens: Arc<TokenCache>,
    clock: Arc<dyn Clock>,
    last_rate_limit: Mutex<Option<RateLimit>>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("token_url", &self.token_url)
            .field("credentials", &self.credentials)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a client; token exchange defaults to the database base URL
    pub fn new(transport: Arc<dyn Transport>, base_url: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            transport,
            base_url: trim_base(base_url.into()),
            token_url: trim_base(vulnetix_protocol::DEFAULT_VDB_BASE_URL.to_string()),
            credentials,
            timeout: DEFAULT_TIMEOUT,
            token_timeout: DEFAULT_TIMEOUT,
            tokens: Arc::new(TokenCache::new()),
            clock: Arc::new(SystemClock),
            last_rate_limit: Mutex::new(None),
        }
    }

    /// Base URL the token exchange is sent to
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = trim_base(url.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_token_timeout(mut self, timeout: Duration) -> Self {
        self.token_timeout = timeout;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Share a token cache with another client using the same credentials
    pub fn with_token_cache(mut self, tokens: Arc<TokenCache>) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn org_id(&self) -> &str {
        self.credentials.org_id()
    }

    pub fn token_cache(&self) -> Arc<TokenCache> {
        Arc::clone(&self.tokens)
    }

    /// Rate limit parsed from the most recent response
    pub fn last_rate_limit(&self) -> Option<RateLimit> {
        *self
            .last_rate_limit
            .lock()
            .unwrap_or_else(|p| p.into_inner())
    }

    /// Absolute URL for a path under the base URL
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Value for the `Authorization` header
    pub fn authorization(&self) -> ApiResult<String> {
        match self.credentials.secret() {
            AuthSecret::ApiKey(key) => Ok(format!("ApiKey {}:{}", self.credentials.org_id(), key)),
            AuthSecret::Signing(secret) => {
                let token = self.bearer_token(secret)?;
                Ok(format!("Bearer {}", token.token))
            }
        }
    }

    fn bearer_token(&self, secret: &str) -> ApiResult<CachedToken> {
        self.tokens
            .get_or_refresh(self.clock.now(), || self.exchange_token(secret))
    }

    fn exchange_token(&self, secret: &str) -> ApiResult<CachedToken> {
        let signer = RequestSigner::new(self.credentials.org_id(), secret);
        let signed = signer.sign(Method::Get.as_str(), paths::AUTH_TOKEN, b"", self.clock.now())?;

        tracing::debug!(url = %self.token_url, "exchanging signed request for bearer token");
        let request = HttpRequest::get(format!("{}{}", self.token_url, paths::AUTH_TOKEN))
            .header(headers::AUTHORIZATION, signed.authorization)
            .header(headers::AMZ_DATE, signed.amz_date)
            .header("User-Agent", USER_AGENT)
            .timeout(self.token_timeout);

        let response = self
            .transport
            .send(request)
            .map_err(|e| ApiError::TokenExchange {
                status: None,
                message: e.to_string(),
            })?;
        self.record_rate_limit(&response);

        if response.status != 200 {
            let message = ErrorEnvelope::parse(&response.body)
                .map(|env| env.to_string())
                .unwrap_or_else(|| response.text());
            tracing::warn!(status = response.status, "token exchange rejected");
            return Err(ApiError::TokenExchange {
                status: Some(response.status),
                message,
            });
        }

        let parsed: TokenResponse =
            serde_json::from_slice(&response.body).map_err(|e| ApiError::TokenExchange {
                status: Some(response.status),
                message: format!("invalid token response: {}", e),
            })?;
        let expires_at = DateTime::from_timestamp(parsed.exp, 0).ok_or_else(|| ApiError::TokenExchange {
            status: Some(response.status),
            message: format!("invalid token expiry {}", parsed.exp),
        })?;

        tracing::info!(%expires_at, "obtained bearer token");
        Ok(CachedToken::new(parsed.token, expires_at))
    }

    fn record_rate_limit(&self, response: &HttpResponse) {
        let rate_limit = RateLimit::from_response(response);
        if rate_limit.present {
            tracing::trace!(remaining = rate_limit.remaining, "rate limit headers");
        }
        *self
            .last_rate_limit
            .lock()
            .unwrap_or_else(|p| p.into_inner()) = Some(rate_limit);
    }

    /// Build an authenticated request for `path` without sending it
    pub fn prepare(&self, method: Method, path: &str, body: RequestBody) -> ApiResult<HttpRequest> {
        Ok(HttpRequest::new(method, self.url(path))
            .header(headers::AUTHORIZATION, self.authorization()?)
            .header("User-Agent", USER_AGENT)
            .body(body)
            .timeout(self.timeout))
    }

    /// Send a prepared request and return the body of a 2xx response
    pub fn execute(&self, request: HttpRequest) -> ApiResult<Vec<u8>> {
        let method = request.method;
        let url = request.url.clone();
        let response = self.transport.send(request)?;
        self.record_rate_limit(&response);
        tracing::debug!(%method, %url, status = response.status, "api response");
        check_status(response)
    }

    /// Send an authenticated request to `path`
    pub fn request(&self, method: Method, path: &str, body: RequestBody) -> ApiResult<Vec<u8>> {
        let request = self.prepare(method, path, body)?;
        self.execute(request)
    }

    pub fn request_json<T: DeserializeOwned>(&self, method: Method, path: &str, body: RequestBody) -> ApiResult<T> {
        let bytes = self.request(method, path, body)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn get_json<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        self.request_json(Method::Get, path, RequestBody::Empty)
    }

    pub fn post_json<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> ApiResult<T> {
        self.request_json(Method::Post, path, RequestBody::json(body)?)
    }
}

/// Character class allowed for ids interpolated into request paths
pub const PATH_ID_PATTERN: &str = "^[a-zA-Z0-9_-]+$";

static PATH_ID: OnceLock<Option<Regex>> = OnceLock::new();

/// Check an id before it is placed in a URL path
pub fn validate_path_id(value: &str) -> ApiResult<&str> {
    let valid = PATH_ID
        .get_or_init(|| Regex::new(PATH_ID_PATTERN).ok())
        .as_ref()
        .map(|re| re.is_match(value))
        .unwrap_or(false);
    if valid {
        Ok(value)
    } else {
        Err(ApiError::InvalidPath {
            value: value.to_string(),
            reason: "only letters, digits, '-' and '_' are allowed",
        })
    }
}

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

/// Map a non-2xx response to an error, embedding the error envelope if present
fn check_status(response: HttpResponse) -> ApiResult<Vec<u8>> {
    if response.is_success() {
        return Ok(response.body);
    }

    let envelope = ErrorEnvelope::parse(&response.body);
    let body = response.text();

    if response.status == 429 {
        let rate_limit = RateLimit::from_response(&response);
        let message = envelope
            .map(|env| env.to_string())
            .unwrap_or_else(|| "too many requests".to_string());
        return Err(ApiError::RateLimited {
            message,
            guidance: rate_limit.retry_guidance(),
            rate_limit,
        });
    }

    let (message, details) = match envelope {
        Some(env) => (env.error, env.details),
        None => (body.clone(), None),
    };
    Err(ApiError::Status {
        status: response.status,
        message,
        details,
        body,
    })
}
