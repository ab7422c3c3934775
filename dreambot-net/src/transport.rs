//! HTTP transport used by the request executor.
//!
//! The [`Transport`] trait is the seam between the executor and the network:
//! one call, one GET. [`ReqwestTransport`] is the production implementation
//! over a shared `reqwest` client.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::FetchError;

/// Default request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// User agent string for DreamBot.
pub const USER_AGENT: &str = concat!("DreamBot/", env!("CARGO_PKG_VERSION"));

/// Request headers, name to value.
pub type Headers = BTreeMap<String, String>;

// ============================================================================
// Transport Trait
// ============================================================================

/// One outbound GET.
#[derive(Debug, Clone, Copy)]
pub struct TransportRequest<'a> {
    /// Target URL.
    pub url: &'a str,
    /// Extra request headers.
    pub headers: &'a Headers,
    /// Certificate verification override; `None` uses the client default.
    pub tls_verify: Option<bool>,
}

/// Performs a single HTTP GET.
///
/// Implementations make exactly one attempt. A non-2xx status must map to
/// [`FetchError::Status`]; failures before a complete response is read map
/// to [`FetchError::Transport`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetches the body of `request.url`.
    async fn get(&self, request: TransportRequest<'_>) -> Result<Vec<u8>, FetchError>;
}

// ============================================================================
// Reqwest Transport
// ============================================================================

/// Transport over a shared `reqwest` client.
///
/// Connection pooling and timeouts are handled by the client. A second
/// client without certificate verification serves `tls_verify = Some(false)`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    verified: Client,
    unverified: Client,
}

impl ReqwestTransport {
    /// Creates a transport with the default timeout and user agent.
    pub fn new() -> Result<Self, FetchError> {
        Self::with_options(Duration::from_secs(DEFAULT_TIMEOUT_SECS), USER_AGENT)
    }

    /// Creates a transport with a custom timeout and user agent.
    pub fn with_options(timeout: Duration, user_agent: &str) -> Result<Self, FetchError> {
        let verified = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(FetchError::ClientBuild)?;

        let unverified = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(FetchError::ClientBuild)?;

        Ok(Self {
            verified,
            unverified,
        })
    }

    fn client_for(&self, tls_verify: Option<bool>) -> &Client {
        match tls_verify {
            Some(false) => &self.unverified,
            _ => &self.verified,
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, request: TransportRequest<'_>) -> Result<Vec<u8>, FetchError> {
        let mut builder = self.client_for(request.tls_verify).get(request.url);
        for (name, value) in request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| FetchError::transport(request.url, e))?;

        let status = response.status();

        if !status.is_success() {
            return Err(FetchError::Status {
                url: request.url.to_string(),
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::transport(request.url, e))?;

        Ok(body.to_vec())
    }
}

// ============================================================================
// Tests
// ============================================================================
