//! Outbound HTTPS transport for status updates

use base64::{Engine as _, engine::general_purpose::STANDARD};
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::TransportError;

pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// `Basic base64(username:password)`
pub fn basic_auth_header(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:{}", username, password)))
}

/// Host-wide proxy configuration
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ProxySettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Hosts that bypass the proxy
    #[serde(default)]
    pub no_proxy: Vec<String>,
}

impl ProxySettings {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            username: None,
            password: None,
            no_proxy: Vec::new(),
        }
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Proxy credentials, only when a non-blank username is configured.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match self.username.as_deref() {
            Some(username) if !username.trim().is_empty() => {
                Some((username, self.password.as_deref().unwrap_or("")))
            }
            _ => None,
        }
    }

    pub fn url(&self) -> String {
        if self.host.contains("://") {
            format!("{}:{}", self.host.trim_end_matches('/'), self.port)
        } else {
            format!("http://{}:{}", self.host, self.port)
        }
    }

    fn to_proxy(&self) -> Result<reqwest::Proxy, TransportError> {
        let mut proxy = reqwest::Proxy::all(self.url())
            .map_err(|e| TransportError::InvalidProxy(format!("{}: {}", self.url(), e)))?;
        if let Some((username, password)) = self.credentials() {
            info!("Using proxy authentication (user={})", username);
            proxy = proxy.basic_auth(username, password);
        }
        if !self.no_proxy.is_empty() {
            proxy = proxy.no_proxy(reqwest::NoProxy::from_string(&self.no_proxy.join(",")));
        }
        Ok(proxy)
    }
}

/// A JSON POST ready to be sent
#[derive(Debug, Clone)]
pub struct StatusRequest {
    pub url: String,
    pub authorization: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// Sends one request and returns whatever the server answered.
pub trait StatusTransport {
    fn post_json(&self, request: &StatusRequest) -> Result<TransportResponse, TransportError>;
}

impl<T: StatusTransport + ?Sized> StatusTransport for &T {
    fn post_json(&self, request: &StatusRequest) -> Result<TransportResponse, TransportError> {
        (**self).post_json(request)
    }
}

/// Blocking reqwest client with an optional proxy and a bounded timeout
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(proxy: Option<&ProxySettings>, timeout: Duration) -> Result<Self, TransportError> {
        let mut builder = Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")));
        if let Some(settings) = proxy {
            builder = builder.proxy(settings.to_proxy()?);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }
}

impl StatusTransport for HttpTransport {
    fn post_json(&self, request: &StatusRequest) -> Result<TransportResponse, TransportError> {
        let response = self
            .client
            .post(&request.url)
            .header(AUTHORIZATION, &request.authorization)
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .body(request.body.clone())
            .send()?;
        let status = response.status().as_u16();
        let body = body_or_placeholder(response.text());
        Ok(TransportResponse { status, body })
    }
}

/// An unreadable body must not hide the status code it came with.
fn body_or_placeholder<E: fmt::Display>(body: Result<String, E>) -> String {
    body.unwrap_or_else(|e| {
        warn!("Failed to read response body: {}", e);
        format!("<unreadable response body: {}>", e)
    })
}
