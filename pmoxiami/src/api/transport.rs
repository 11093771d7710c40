//! HTTP transport seam
//!
//! [`XiamiApi`](super::XiamiApi) only needs one blocking GET returning the
//! body and the cookies set by the server. [`HttpTransport`] implements it
//! with `ureq`; tests plug in scripted transports.

use crate::error::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use ureq::Agent;

/// Default User-Agent, a desktop browser (the h5 API rejects unknown clients)
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_14_6) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/77.0.3865.120 Safari/537.36";

/// Default Referer header
pub const DEFAULT_REFERER: &str = "http://h.xiami.com";

/// Raw answer of one HTTP call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
    /// `(name, value)` pairs from the `Set-Cookie` headers
    pub cookies: Vec<(String, String)>,
}

impl TransportResponse {
    /// Returns the value of the last cookie named `name`
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Blocking HTTP GET used by the API client
pub trait Transport: Send + Sync {
    /// Performs `GET url?query`, failing on network errors and timeouts
    fn get(
        &self,
        url: &str,
        query: &[(&'static str, String)],
        timeout: Duration,
    ) -> Result<TransportResponse>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn get(
        &self,
        url: &str,
        query: &[(&'static str, String)],
        timeout: Duration,
    ) -> Result<TransportResponse> {
        (**self).get(url, query, timeout)
    }
}

/// Parses `name=value; Path=/; ...` into `(name, value)`
pub fn parse_set_cookie(header: &str) -> Option<(String, String)> {
    let pair = header.split(';').next()?;
    let (name, value) = pair.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), value.trim().to_string()))
}

/// `ureq`-backed transport with browser-like headers
#[derive(Debug, Clone)]
pub struct HttpTransport {
    agent: Agent,
    user_agent: String,
    referer: String,
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(DEFAULT_USER_AGENT, DEFAULT_REFERER)
    }
}

impl HttpTransport {
    pub fn new(user_agent: impl Into<String>, referer: impl Into<String>) -> Self {
        let agent: Agent = Agent::config_builder().build().into();
        Self {
            agent,
            user_agent: user_agent.into(),
            referer: referer.into(),
        }
    }
}

impl Transport for HttpTransport {
    fn get(
        &self,
        url: &str,
        query: &[(&'static str, String)],
        timeout: Duration,
    ) -> Result<TransportResponse> {
        debug!("GET {} with {} params", url, query.len());

        let mut request = self
            .agent
            .get(url)
            .header("Accept", "*/*")
            .header("Accept-Language", "zh-CN,zh;q=0.8,gl;q=0.6,zh-TW;q=0.4")
            .header("User-Agent", self.user_agent.as_str())
            .header("Referer", self.referer.as_str());

        for (key, value) in query {
            request = request.query(*key, value);
        }

        let mut response = request
            .config()
            .timeout_global(Some(timeout))
            .build()
            .call()?;

        let status = response.status().as_u16();
        let cookies = response
            .headers()
            .get_all("set-cookie")
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(parse_set_cookie)
            .collect();
        let body = response.body_mut().read_to_string()?;

        debug!("Response status: {}", status);

        Ok(TransportResponse {
            status,
            body,
            cookies,
        })
    }
}
