//! JSON output formatting.

use anyhow::Result;
use chrono::{DateTime, Local};
use dreambot_net::{BackoffSnapshot, FetchError};
use serde::{Serialize, Serializer};

use crate::commands::Payload;
use crate::commands::watch::PollResult;

// ============================================================================
// Output Types
// ============================================================================

/// JSON output for one fetched URL.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchOutput<'a> {
    pub url: &'a str,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One rule's backoff state.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackoffOutput<'a> {
    pub pattern: &'a str,
    pub failure_count: u32,
    pub total_backoff_secs: u64,
    pub remaining_backoff_secs: u64,
}

/// One watch tick.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickOutput<'a> {
    #[serde(serialize_with = "serialize_datetime")]
    pub at: DateTime<Local>,
    pub results: Vec<FetchOutput<'a>>,
    pub backoff: Vec<BackoffOutput<'a>>,
}

fn serialize_datetime<S>(dt: &DateTime<Local>, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    s.serialize_str(&dt.to_rfc3339())
}

// ============================================================================
// JSON Formatter
// ============================================================================

/// JSON formatter.
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    /// Creates a new JSON formatter.
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    /// Formats any serializable data.
    pub fn format<T: Serialize>(&self, data: &T) -> Result<String> {
        let json = if self.pretty {
            serde_json::to_string_pretty(data)?
        } else {
            serde_json::to_string(data)?
        };
        Ok(json)
    }

    /// Formats a one-shot fetch result.
    pub fn format_payload(&self, url: &str, payload: &Payload) -> Result<String> {
        self.format(&payload_output(url, payload))
    }

    /// Formats one watch tick.
    pub fn format_tick(
        &self,
        now: DateTime<Local>,
        results: &[PollResult],
        backoff: &[BackoffSnapshot],
    ) -> Result<String> {
        let output = TickOutput {
            at: now,
            results: results.iter().map(poll_output).collect(),
            backoff: backoff.iter().map(backoff_output).collect(),
        };
        self.format(&output)
    }
}

fn payload_output<'a>(url: &'a str, payload: &Payload) -> FetchOutput<'a> {
    let (kind, body) = match payload {
        Payload::Bytes(bytes) => ("bytes", serde_json::json!(bytes.len())),
        Payload::Text(text) => ("text", serde_json::Value::String(text.clone())),
        Payload::Json(value) => ("json", value.clone()),
    };

    FetchOutput {
        url,
        status: "ok",
        kind: Some(kind),
        body: Some(body),
        error: None,
    }
}

fn poll_output(poll: &PollResult) -> FetchOutput<'_> {
    match &poll.result {
        Ok(Some(payload)) => payload_output(&poll.url, payload),
        Ok(None) => FetchOutput {
            url: &poll.url,
            status: "empty",
            kind: None,
            body: None,
            error: None,
        },
        Err(e) => FetchOutput {
            url: &poll.url,
            status: error_status(e),
            kind: None,
            body: None,
            error: Some(e.to_string()),
        },
    }
}

fn error_status(error: &FetchError) -> &'static str {
    match error {
        FetchError::BackoffSuppressed { .. } => "suppressed",
        FetchError::Status { .. } => "http_error",
        FetchError::Transport { .. } => "transport_error",
        FetchError::EmptyResponse { .. } => "empty",
        _ => "error",
    }
}

fn backoff_output(snapshot: &BackoffSnapshot) -> BackoffOutput<'_> {
    BackoffOutput {
        pattern: &snapshot.pattern,
        failure_count: snapshot.failure_count,
        total_backoff_secs: snapshot.total_backoff_secs,
        remaining_backoff_secs: snapshot.remaining_backoff_secs,
    }
}
