//! Low-level access to the Xiami h5 API
//!
//! [`XiamiApi`] performs one signed call per action. It owns the session
//! (app key, request header, session token) and the HTTP transport. The
//! endpoint methods live in the submodules and return raw JSON trees.

pub mod auth;
pub mod catalog;
pub mod signing;
pub mod token;
pub mod transport;
pub mod user;

use crate::config::XiamiConfig;
use crate::error::{Result, XiamiError};
use serde_json::{Value, json};
use signing::{RequestHeader, get_timestamp_ms, sign_payload};
use std::sync::Mutex;
use std::time::Duration;
use token::{BOOTSTRAP_ACTION, BOOTSTRAP_SONG_ID, TOKEN_COOKIE, TokenManager, extract_token};
use tracing::{debug, warn};
use transport::{HttpTransport, Transport, TransportResponse};

/// Base URL of the h5 API
pub const API_BASE_URL: &str = "http://h5api.m.xiami.com";

/// App key, paired with [`DEFAULT_APP_ID`]
pub const DEFAULT_APP_KEY: &str = "23649156";

/// App id sent in the request header
pub const DEFAULT_APP_ID: u32 = 200;

/// Platform id sent in the request header
pub const DEFAULT_PLATFORM_ID: &str = "h5";

/// Per-call timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Status code reported in the `ret` field of every response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseCode {
    Success,
    /// App id and app key do not match
    ParamInvalid,
    /// Session token expired, refresh and retry
    TokenExpired,
    /// A logged-in user is required
    NeedLogin,
    /// Action retired by the server
    WjasDenied,
    Other(String),
}

impl ResponseCode {
    pub fn parse(code: &str) -> Self {
        match code {
            "SUCCESS" => Self::Success,
            "FAIL_SYS_PARAMINVALID_ERROR" => Self::ParamInvalid,
            // The server historically spells it EXOIRED
            "FAIL_SYS_TOKEN_EXPIRED" | "FAIL_SYS_TOKEN_EXOIRED" => Self::TokenExpired,
            "FAIL_BIZ_GLOBAL_NEED_LOGIN" => Self::NeedLogin,
            "FAIL_SYS_WJAS_DENIED" => Self::WjasDenied,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Success => "SUCCESS",
            Self::ParamInvalid => "FAIL_SYS_PARAMINVALID_ERROR",
            Self::TokenExpired => "FAIL_SYS_TOKEN_EXPIRED",
            Self::NeedLogin => "FAIL_BIZ_GLOBAL_NEED_LOGIN",
            Self::WjasDenied => "FAIL_SYS_WJAS_DENIED",
            Self::Other(code) => code,
        }
    }
}

/// Decoded response envelope
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub code: ResponseCode,
    pub message: String,
    /// Full JSON body
    pub body: Value,
}

impl ApiResponse {
    /// Parses a body and splits `ret[0]` (`"<CODE>::<message>"`) on the first `::`
    pub fn parse(body: &str) -> Result<Self> {
        let body: Value = serde_json::from_str(body)?;

        let ret = body
            .get("ret")
            .and_then(|r| r.get(0))
            .and_then(|r| r.as_str())
            .ok_or_else(|| XiamiError::MalformedResponse("missing `ret` status".to_string()))?;

        let (code, message) = ret.split_once("::").unwrap_or((ret, ""));
        let code = ResponseCode::parse(code);
        let message = message.to_string();

        Ok(Self {
            code,
            message,
            body,
        })
    }

    pub fn is_success(&self) -> bool {
        self.code == ResponseCode::Success
    }

    /// Returns `body.data.data`, the payload of every action
    pub fn data(&self) -> Result<&Value> {
        self.body
            .get("data")
            .and_then(|d| d.get("data"))
            .filter(|d| !d.is_null())
            .ok_or_else(|| XiamiError::missing(&["data", "data"]))
    }

    /// Returns `body.data.data.<field>`
    pub fn data_field(&self, field: &str) -> Result<&Value> {
        self.data()?
            .get(field)
            .ok_or_else(|| XiamiError::missing(&["data", "data", field]))
    }

    /// Consumes the response and returns `body.data.data`
    pub fn into_data(mut self) -> Result<Value> {
        self.body
            .get_mut("data")
            .and_then(|d| d.get_mut("data"))
            .map(Value::take)
            .filter(|d| !d.is_null())
            .ok_or_else(|| XiamiError::missing(&["data", "data"]))
    }
}

/// Per-call options of [`XiamiApi::request_with`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestOptions {
    /// Overrides the client timeout
    pub timeout: Option<Duration>,
    /// `false` marks a token bootstrap call
    pub need_token: bool,
    /// Allows one refresh-and-retry on token expiry
    pub retry_on_expired: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            need_token: true,
            retry_on_expired: true,
        }
    }
}

impl RequestOptions {
    /// Options of a bootstrap call: no token needed, the cookie is the result
    pub fn bootstrap() -> Self {
        Self {
            need_token: false,
            ..Self::default()
        }
    }
}

/// Result of [`XiamiApi::request_with`]
#[derive(Debug, Clone, PartialEq)]
pub enum RequestOutcome {
    /// Session token read from the cookie of a `need_token = false` call
    Token(String),
    Response(ApiResponse),
}

/// Xiami API client
///
/// All methods take `&self`: the session token and the request header sit
/// behind mutexes, so one value can be shared between threads.
pub struct XiamiApi {
    transport: Box<dyn Transport>,
    base_url: String,
    app_key: String,
    header: Mutex<RequestHeader>,
    tokens: TokenManager,
    timeout: Duration,
}

impl std::fmt::Debug for XiamiApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XiamiApi")
            .field("base_url", &self.base_url)
            .field("app_key", &self.app_key)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Default for XiamiApi {
    fn default() -> Self {
        Self::new()
    }
}

impl XiamiApi {
    /// Creates a client with the default app identity and an HTTP transport
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a client with the default app identity over `transport`
    pub fn with_transport(transport: impl Transport + 'static) -> Self {
        Self::builder().transport(transport).build()
    }

    pub fn builder() -> XiamiApiBuilder {
        XiamiApiBuilder::default()
    }

    /// Creates a client from a loaded configuration
    pub fn from_config(config: &XiamiConfig) -> Self {
        Self::builder().config(config).build()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn app_key(&self) -> &str {
        &self.app_key
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns a copy of the header sent with each request
    pub fn request_header(&self) -> RequestHeader {
        self.lock_header().clone()
    }

    /// Injects a user access token into subsequent request headers
    pub fn set_access_token(&self, access_token: impl Into<String>) {
        self.lock_header().access_token = Some(access_token.into());
    }

    pub fn access_token(&self) -> Option<String> {
        self.lock_header().access_token.clone()
    }

    /// Removes the user access token
    pub fn clear_access_token(&self) {
        self.lock_header().access_token = None;
    }

    /// Returns the cached session token
    pub fn session_token(&self) -> Option<String> {
        self.tokens.current()
    }

    /// URL of an action, `{base}/h5/{action}/1.0/`
    pub fn url_for(&self, action: &str) -> String {
        format!("{}/h5/{}/1.0/", self.base_url.trim_end_matches('/'), action)
    }

    /// Returns the cached session token, bootstrapping one if needed
    pub fn ensure_token(&self) -> Result<String> {
        self.tokens
            .ensure(|stale| self.bootstrap(stale, self.timeout))
    }

    /// Fetches a new session token, replacing the cached one
    pub fn refresh_token(&self) -> Result<String> {
        self.tokens
            .refresh(|stale| self.bootstrap(stale, self.timeout))
    }

    /// Performs a signed call with the default options
    ///
    /// Fatal server codes are raised as errors; unexpected codes are logged
    /// and returned, so callers must not assume a success-shaped body.
    pub fn request(&self, action: &str, payload: Value) -> Result<ApiResponse> {
        let timeout = self.timeout;
        self.call(action, &payload, timeout, true)
    }

    /// Performs a signed call
    ///
    /// With `need_token = false` the call is a token bootstrap: the body is
    /// not inspected and the token read from the `_m_h5_tk` cookie is
    /// returned. Otherwise a missing session token is bootstrapped first and
    /// the response code is classified:
    ///
    /// * `FAIL_SYS_PARAMINVALID_ERROR` → [`XiamiError::AppKeyMismatch`]
    /// * `FAIL_SYS_TOKEN_EXPIRED` → token refresh, then one retry when
    ///   `retry_on_expired` is set; a second expiry is returned as is
    /// * `FAIL_BIZ_GLOBAL_NEED_LOGIN` → [`XiamiError::LoginRequired`]
    /// * `FAIL_SYS_WJAS_DENIED` → [`XiamiError::EndpointRetired`]
    ///
    /// # Errors
    ///
    /// Transport errors are returned immediately and never retried.
    pub fn request_with(
        &self,
        action: &str,
        payload: Value,
        options: RequestOptions,
    ) -> Result<RequestOutcome> {
        let timeout = options.timeout.unwrap_or(self.timeout);

        if !options.need_token {
            let current = self.tokens.current();
            let response = self.send_signed(action, &payload, current.as_deref(), timeout)?;
            return extract_token(response.cookie(TOKEN_COOKIE)).map(RequestOutcome::Token);
        }

        self.call(action, &payload, timeout, options.retry_on_expired)
            .map(RequestOutcome::Response)
    }

    fn call(
        &self,
        action: &str,
        payload: &Value,
        timeout: Duration,
        retry_on_expired: bool,
    ) -> Result<ApiResponse> {
        let mut retry_allowed = retry_on_expired;

        loop {
            let token = match self.tokens.current() {
                Some(token) => token,
                None => self
                    .tokens
                    .ensure(|stale| self.bootstrap(stale, timeout))?,
            };

            let raw = self.send_signed(action, payload, Some(&token), timeout)?;
            let response = ApiResponse::parse(&raw.body)?;

            match response.code.clone() {
                ResponseCode::Success => return Ok(response),
                ResponseCode::ParamInvalid => return Err(XiamiError::AppKeyMismatch),
                ResponseCode::NeedLogin => return Err(XiamiError::LoginRequired),
                ResponseCode::WjasDenied => {
                    return Err(XiamiError::EndpointRetired(response.message));
                }
                ResponseCode::TokenExpired => {
                    self.tokens
                        .refresh(|stale| self.bootstrap(stale, timeout))?;
                    if !retry_allowed {
                        warn!("Session token still expired after retry for {}", action);
                        return Ok(response);
                    }
                    warn!("Session token expired, retrying {}", action);
                    retry_allowed = false;
                }
                ResponseCode::Other(code) => {
                    warn!(
                        "Xiami request failed:: req_action: {}, req_payload: {}, code: {}, response: {}",
                        action, payload, code, response.body
                    );
                    return Ok(response);
                }
            }
        }
    }

    /// Bootstrap call returning a fresh session token
    fn bootstrap(&self, stale: Option<&str>, timeout: Duration) -> Result<String> {
        let payload = json!({ "songId": BOOTSTRAP_SONG_ID });
        let response = self.send_signed(BOOTSTRAP_ACTION, &payload, stale, timeout)?;
        extract_token(response.cookie(TOKEN_COOKIE))
    }

    fn send_signed(
        &self,
        action: &str,
        payload: &Value,
        session_token: Option<&str>,
        timeout: Duration,
    ) -> Result<TransportResponse> {
        let header = self.request_header();
        let params = sign_payload(
            session_token,
            &header,
            payload,
            get_timestamp_ms(),
            &self.app_key,
        )?;

        let url = self.url_for(action);
        debug!("Calling {} (t={})", action, params.t);
        self.transport.get(&url, &params.to_query(), timeout)
    }

    fn lock_header(&self) -> std::sync::MutexGuard<'_, RequestHeader> {
        self.header.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Builder for [`XiamiApi`]
pub struct XiamiApiBuilder {
    base_url: String,
    app_key: String,
    app_id: u32,
    platform_id: String,
    timeout: Duration,
    access_token: Option<String>,
    user_agent: String,
    referer: String,
    transport: Option<Box<dyn Transport>>,
}

impl Default for XiamiApiBuilder {
    fn default() -> Self {
        Self {
            base_url: API_BASE_URL.to_string(),
            app_key: DEFAULT_APP_KEY.to_string(),
            app_id: DEFAULT_APP_ID,
            platform_id: DEFAULT_PLATFORM_ID.to_string(),
            timeout: DEFAULT_TIMEOUT,
            access_token: None,
            user_agent: transport::DEFAULT_USER_AGENT.to_string(),
            referer: transport::DEFAULT_REFERER.to_string(),
            transport: None,
        }
    }
}

impl XiamiApiBuilder {
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the app identity. App id and key only work as a pair.
    pub fn app(mut self, app_id: u32, app_key: impl Into<String>) -> Self {
        self.app_id = app_id;
        self.app_key = app_key.into();
        self
    }

    pub fn platform_id(mut self, platform_id: impl Into<String>) -> Self {
        self.platform_id = platform_id.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Restores a previously obtained access token
    pub fn access_token(mut self, access_token: impl Into<String>) -> Self {
        self.access_token = Some(access_token.into());
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = referer.into();
        self
    }

    /// Replaces the HTTP transport
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    /// Applies every setting of a configuration
    pub fn config(self, config: &XiamiConfig) -> Self {
        let api = &config.api;
        let builder = self
            .base_url(api.base_url.clone())
            .app(api.app_id, api.app_key.clone())
            .platform_id(api.platform_id.clone())
            .timeout(config.timeout())
            .user_agent(api.user_agent.clone())
            .referer(api.referer.clone());

        match &config.account.access_token {
            Some(token) => builder.access_token(token.clone()),
            None => builder,
        }
    }

    pub fn build(self) -> XiamiApi {
        let mut header = RequestHeader::new(self.app_id, self.platform_id);
        header.access_token = self.access_token;

        let transport = match self.transport {
            Some(transport) => transport,
            None => Box::new(HttpTransport::new(self.user_agent, self.referer)),
        };

        XiamiApi {
            transport,
            base_url: self.base_url,
            app_key: self.app_key,
            header: Mutex::new(header),
            tokens: TokenManager::new(),
            timeout: self.timeout,
        }
    }
}
