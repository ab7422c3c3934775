//! Fetch error types.

use thiserror::Error;

/// Boxed error used for failures whose concrete type is not part of the API.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

// ============================================================================
// Main Fetch Error
// ============================================================================

/// Error type for fetch operations.
///
/// Only returned to callers that opted in via `forward_exceptions` or
/// `raise_for_empty_response`; everything else degrades to `Ok(None)`.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The server answered with a non-2xx status.
    #[error("HTTP {status} {reason} from \"{url}\"")]
    Status {
        /// Requested URL.
        url: String,
        /// Status code returned by the server.
        status: u16,
        /// Canonical reason phrase, empty if unknown.
        reason: String,
    },

    /// No response was obtained (connection, DNS, TLS or body read failure).
    #[error("transport error for \"{url}\": {source}")]
    Transport {
        /// Requested URL.
        url: String,
        /// Underlying transport failure.
        #[source]
        source: BoxError,
    },

    /// The call was pre-empted by an active backoff window.
    #[error(
        "\"{url}\" (matching pattern `{pattern}`) was requested while on cooldown. \
         Backoff count: {failure_count}. Remaining backoff: {remaining}"
    )]
    BackoffSuppressed {
        /// Requested URL.
        url: String,
        /// Source text of the rule that suppressed the call.
        pattern: String,
        /// Consecutive failures recorded for the rule.
        failure_count: u32,
        /// Seconds left in the window.
        remaining_secs: u64,
        /// Human-readable form of `remaining_secs`.
        remaining: String,
    },

    /// The request succeeded but produced no payload.
    #[error("empty response from \"{url}\"")]
    EmptyResponse {
        /// Requested URL.
        url: String,
    },

    /// Any other failure, typically while decoding the body.
    #[error("unclassified error for \"{url}\": {source}")]
    Unclassified {
        /// Requested URL.
        url: String,
        /// Underlying failure.
        #[source]
        source: BoxError,
    },

    /// A backoff rule pattern failed to compile.
    #[error("invalid backoff pattern `{pattern}`: {source}")]
    InvalidPattern {
        /// Offending pattern source.
        pattern: String,
        /// Regex compilation error.
        #[source]
        source: regex::Error,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
}

/// Log severity a failure is reported at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Anticipated failure: upstream misbehaving or cooldown active.
    Warning,
    /// Unanticipated failure.
    Error,
}

impl FetchError {
    /// Creates a transport error from any error type.
    pub fn transport(url: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Transport {
            url: url.into(),
            source: source.into(),
        }
    }

    /// Creates an unclassified error from any error type.
    pub fn unclassified(url: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Unclassified {
            url: url.into(),
            source: source.into(),
        }
    }

    /// Severity the executor logs this error at.
    pub fn severity(&self) -> Severity {
        match self {
            Self::Status { .. } | Self::Transport { .. } | Self::BackoffSuppressed { .. } => {
                Severity::Warning
            }
            _ => Severity::Error,
        }
    }

    /// Returns true if this error should extend the endpoint's backoff.
    ///
    /// Suppression is not a new failure, and empty responses are raised
    /// after bookkeeping has already run.
    pub fn counts_as_failure(&self) -> bool {
        matches!(
            self,
            Self::Status { .. } | Self::Transport { .. } | Self::Unclassified { .. }
        )
    }

    /// Returns true if the call never reached the network.
    pub fn is_suppressed(&self) -> bool {
        matches!(self, Self::BackoffSuppressed { .. })
    }

    /// Returns the HTTP status for status errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
