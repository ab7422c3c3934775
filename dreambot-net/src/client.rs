//! Network client: backoff-aware request execution.
//!
//! Every outbound fetch goes through [`NetworkClient`], which consults the
//! per-endpoint backoff registry, performs at most one GET, classifies the
//! outcome and updates the matched rule. There is no retry inside a call;
//! callers that poll simply call again later, and the backoff window decides
//! whether that later call reaches the network.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};

use crate::backoff::{BackoffRule, BackoffState, describe_secs};
use crate::error::{BoxError, FetchError, Severity};
use crate::registry::BackoffRegistry;
use crate::scope::{DebugScopes, NETWORK_SCOPE};
use crate::transport::{
    DEFAULT_TIMEOUT_SECS, Headers, ReqwestTransport, Transport, TransportRequest, USER_AGENT,
};

/// Default backoff ceiling: four hours.
pub const DEFAULT_MAX_BACKOFF_SECS: u64 = 60 * 60 * 4;

// ============================================================================
// Settings & Options
// ============================================================================

/// Construction settings for a [`NetworkClient`].
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Ceiling for rules created on demand.
    pub default_max_backoff_secs: u64,
    /// Per-request timeout enforced by the transport.
    pub timeout: Duration,
    /// User agent sent with every request.
    pub user_agent: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            default_max_backoff_secs: DEFAULT_MAX_BACKOFF_SECS,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: USER_AGENT.to_string(),
        }
    }
}

/// Per-call behavior flags.
///
/// The defaults degrade gracefully: errors are logged and surface as
/// `Ok(None)`.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Extra request headers.
    pub headers: Headers,
    /// Return the classified error instead of `Ok(None)`.
    pub forward_exceptions: bool,
    /// Certificate verification override.
    pub tls_verify: Option<bool>,
    /// Skip the backoff check and leave backoff state untouched.
    pub bypass_backoff: bool,
    /// Return [`FetchError::EmptyResponse`] instead of `Ok(None)`.
    pub raise_for_empty_response: bool,
}

impl FetchOptions {
    /// Creates default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a request header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Replaces all request headers.
    pub fn headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    /// Sets whether errors are returned to the caller.
    pub fn forward_exceptions(mut self, enabled: bool) -> Self {
        self.forward_exceptions = enabled;
        self
    }

    /// Overrides certificate verification.
    pub fn tls_verify(mut self, verify: bool) -> Self {
        self.tls_verify = Some(verify);
        self
    }

    /// Sets whether the backoff registry is bypassed.
    pub fn bypass_backoff(mut self, enabled: bool) -> Self {
        self.bypass_backoff = enabled;
        self
    }

    /// Sets whether an empty result is an error.
    pub fn raise_for_empty_response(mut self, enabled: bool) -> Self {
        self.raise_for_empty_response = enabled;
        self
    }
}

// ============================================================================
// Outcome
// ============================================================================

/// Result of one attempt, before result selection.
#[derive(Debug)]
enum Outcome<T> {
    /// The request completed; the decoder may still have produced nothing.
    Decoded(Option<T>),
    /// An active backoff window pre-empted the request.
    Suppressed(FetchError),
    /// The request or decode failed.
    Failed(FetchError),
}

impl<T> Outcome<T> {
    fn label(&self) -> &'static str {
        match self {
            Self::Decoded(Some(_)) => "value",
            Self::Decoded(None) => "empty",
            Self::Suppressed(_) => "suppressed",
            Self::Failed(_) => "failed",
        }
    }
}

// ============================================================================
// Network Client
// ============================================================================

/// Shared outbound HTTP client with per-endpoint exponential backoff.
///
/// Each client owns its own registry; two clients never share backoff state.
pub struct NetworkClient {
    transport: Arc<dyn Transport>,
    registry: BackoffRegistry,
    scopes: DebugScopes,
}

impl NetworkClient {
    /// Creates a client with default settings.
    pub fn new() -> Result<Self, FetchError> {
        Self::with_settings(&ClientSettings::default())
    }

    /// Creates a client over a `reqwest` transport.
    pub fn with_settings(settings: &ClientSettings) -> Result<Self, FetchError> {
        let transport = ReqwestTransport::with_options(settings.timeout, &settings.user_agent)?;
        Ok(Self::with_transport(
            Arc::new(transport),
            settings.default_max_backoff_secs,
        ))
    }

    /// Creates a client over a custom transport.
    pub fn with_transport(transport: Arc<dyn Transport>, default_max_backoff_secs: u64) -> Self {
        Self {
            transport,
            registry: BackoffRegistry::new(default_max_backoff_secs),
            scopes: DebugScopes::new(),
        }
    }

    /// Shares an existing set of debug scopes with this client.
    pub fn with_scopes(mut self, scopes: DebugScopes) -> Self {
        self.registry.set_scopes(scopes.clone());
        self.scopes = scopes;
        self
    }

    /// The client's backoff registry.
    pub fn registry(&self) -> &BackoffRegistry {
        &self.registry
    }

    /// The debug scopes consulted before per-call tracing.
    pub fn scopes(&self) -> &DebugScopes {
        &self.scopes
    }

    /// Fetches `url` as raw bytes.
    pub async fn fetch_bytes(
        &self,
        url: &str,
        options: &FetchOptions,
    ) -> Result<Option<Vec<u8>>, FetchError> {
        self.execute(url, options, "bytes", |body| Ok((!body.is_empty()).then_some(body)))
            .await
    }

    /// Fetches `url` as UTF-8 text.
    ///
    /// The body is decoded as strict UTF-8; any other encoding fails as
    /// [`FetchError::Unclassified`] and counts against the endpoint.
    pub async fn fetch_text(
        &self,
        url: &str,
        options: &FetchOptions,
    ) -> Result<Option<String>, FetchError> {
        self.execute(url, options, "text", decode_text).await
    }

    /// Fetches `url` and deserializes the JSON body.
    ///
    /// An empty body or a JSON `null` counts as an empty result. The body
    /// must be UTF-8 JSON; other encodings and malformed documents fail as
    /// [`FetchError::Unclassified`].
    pub async fn fetch_json<T: DeserializeOwned>(
        &self,
        url: &str,
        options: &FetchOptions,
    ) -> Result<Option<T>, FetchError> {
        self.execute(url, options, "json", decode_json::<T>).await
    }

    async fn execute<T, D>(
        &self,
        url: &str,
        options: &FetchOptions,
        kind: &'static str,
        decode: D,
    ) -> Result<Option<T>, FetchError>
    where
        D: FnOnce(Vec<u8>) -> Result<Option<T>, BoxError>,
    {
        let call_id = new_call_id();
        let trace = self.scopes.is_enabled(NETWORK_SCOPE);

        if trace {
            debug!(
                call_id = %call_id,
                url,
                kind,
                headers = ?options.headers.keys().collect::<Vec<_>>(),
                forward_exceptions = options.forward_exceptions,
                tls_verify = ?options.tls_verify,
                bypass_backoff = options.bypass_backoff,
                raise_for_empty_response = options.raise_for_empty_response,
                "Fetch requested"
            );
        }

        let rule = (!options.bypass_backoff).then(|| self.registry.rule_for(url));

        if trace {
            match &rule {
                Some(rule) => {
                    let state = rule.state();
                    debug!(
                        call_id = %call_id,
                        pattern = %rule.pattern(),
                        failure_count = state.failure_count(),
                        active = state.is_active(),
                        remaining = %state.describe_remaining(),
                        "Matched backoff rule"
                    );
                }
                None => debug!(call_id = %call_id, "Backoff bypassed"),
            }
        }

        let outcome = self.attempt(url, options, rule.as_deref(), decode).await;

        // Classification.
        if let Outcome::Suppressed(err) | Outcome::Failed(err) = &outcome {
            log_failure(&call_id, err);
        }

        // Bookkeeping. Only reached once the transport call has resolved.
        if let Some(rule) = &rule {
            match &outcome {
                Outcome::Failed(err) if err.counts_as_failure() => rule.record_failure(),
                Outcome::Decoded(_) => rule.reset(),
                _ => {}
            }
        }

        if trace {
            let state = rule.as_ref().map(|rule| rule.state());
            let window = state.as_ref().map(BackoffState::describe_total);
            debug!(
                call_id = %call_id,
                outcome = outcome.label(),
                failure_count = state.as_ref().map(|s| s.failure_count()),
                remaining_secs = state.as_ref().map(|s| s.remaining_backoff_secs()),
                window = window.as_deref(),
                "Fetch finished"
            );
        }

        // Result selection.
        match outcome {
            Outcome::Decoded(Some(value)) => Ok(Some(value)),
            Outcome::Suppressed(err) | Outcome::Failed(err) if options.forward_exceptions => {
                Err(err)
            }
            _ if options.raise_for_empty_response => Err(FetchError::EmptyResponse {
                url: url.to_string(),
            }),
            _ => Ok(None),
        }
    }

    async fn attempt<T, D>(
        &self,
        url: &str,
        options: &FetchOptions,
        rule: Option<&BackoffRule>,
        decode: D,
    ) -> Outcome<T>
    where
        D: FnOnce(Vec<u8>) -> Result<Option<T>, BoxError>,
    {
        if let Some(rule) = rule {
            let state = rule.state();
            let remaining_secs = state.remaining_backoff_secs();
            if remaining_secs > 0 {
                return Outcome::Suppressed(FetchError::BackoffSuppressed {
                    url: url.to_string(),
                    pattern: rule.pattern().to_string(),
                    failure_count: state.failure_count(),
                    remaining_secs,
                    remaining: describe_secs(remaining_secs),
                });
            }
        }

        let request = TransportRequest {
            url,
            headers: &options.headers,
            tls_verify: options.tls_verify,
        };

        match self.transport.get(request).await {
            Ok(body) => match decode(body) {
                Ok(value) => Outcome::Decoded(value),
                Err(source) => Outcome::Failed(FetchError::unclassified(url, source)),
            },
            Err(err) => Outcome::Failed(err),
        }
    }
}

impl fmt::Debug for NetworkClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkClient")
            .field("registry", &self.registry)
            .field("scopes", &self.scopes)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Short random id correlating the log lines of one call.
fn new_call_id() -> String {
    format!("{:08x}", rand::random::<u32>())
}

fn log_failure(call_id: &str, err: &FetchError) {
    match err.severity() {
        Severity::Warning => warn!(call_id, error = %err, "Network request failed"),
        Severity::Error => error!(call_id, error = %err, "Unclassified network error"),
    }
}

fn decode_text(body: Vec<u8>) -> Result<Option<String>, BoxError> {
    if body.is_empty() {
        return Ok(None);
    }
    Ok(Some(String::from_utf8(body)?))
}

fn decode_json<T: DeserializeOwned>(body: Vec<u8>) -> Result<Option<T>, BoxError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    Ok(serde_json::from_slice::<Option<T>>(&body)?)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_id_format() {
        let id = new_call_id();
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_decode_text() {
        assert_eq!(decode_text(Vec::new()).unwrap(), None);
        assert_eq!(decode_text(b"hi".to_vec()).unwrap(), Some("hi".to_string()));
        assert!(decode_text(vec![0xff, 0xfe]).is_err());
    }

    #[test]
    fn test_decode_json_empty_and_null() {
        assert!(decode_json::<serde_json::Value>(Vec::new()).unwrap().is_none());
        assert!(decode_json::<serde_json::Value>(b"  \n".to_vec()).unwrap().is_none());
        assert!(decode_json::<serde_json::Value>(b"null".to_vec()).unwrap().is_none());
    }

    #[test]
    fn test_decode_json_value_and_error() {
        let value: Option<Vec<u32>> = decode_json(b"[1, 2, 3]".to_vec()).unwrap();
        assert_eq!(value, Some(vec![1, 2, 3]));
        assert!(decode_json::<serde_json::Value>(b"{not json".to_vec()).is_err());
    }

    #[test]
    fn test_options_builder() {
        let options = FetchOptions::new()
            .header("User-Agent", "test")
            .forward_exceptions(true)
            .tls_verify(false)
            .bypass_backoff(true)
            .raise_for_empty_response(true);

        assert_eq!(options.headers.get("User-Agent").map(String::as_str), Some("test"));
        assert!(options.forward_exceptions);
        assert_eq!(options.tls_verify, Some(false));
        assert!(options.bypass_backoff);
        assert!(options.raise_for_empty_response);
    }

    #[test]
    fn test_default_options_degrade_gracefully() {
        let options = FetchOptions::default();
        assert!(!options.forward_exceptions);
        assert!(!options.bypass_backoff);
        assert!(!options.raise_for_empty_response);
        assert!(options.tls_verify.is_none());
    }

    #[test]
    fn test_default_settings() {
        let settings = ClientSettings::default();
        assert_eq!(settings.default_max_backoff_secs, 14_400);
        assert_eq!(settings.timeout, Duration::from_secs(30));
    }
}
