//! Text output formatting with colors.

use chrono::{DateTime, Local};
use dreambot_net::{BackoffSnapshot, FetchError, Severity, describe_secs};

use crate::commands::Payload;
use crate::commands::watch::PollResult;

// ============================================================================
// ANSI Colors
// ============================================================================

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";

/// Longest body excerpt shown per URL in watch output.
const EXCERPT_CHARS: usize = 60;

/// Text formatter with optional colors.
pub struct TextFormatter {
    use_colors: bool,
}

impl TextFormatter {
    /// Creates a new text formatter.
    pub fn new(use_colors: bool) -> Self {
        Self { use_colors }
    }

    /// Formats a decoded payload for a one-shot fetch.
    pub fn format_payload(&self, payload: &Payload) -> String {
        match payload {
            Payload::Bytes(bytes) => self.dim(&format!("<{} bytes>", bytes.len())),
            Payload::Text(text) => text.clone(),
            Payload::Json(value) => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }
        }
    }

    /// Formats one watch tick: a line per URL, then every backoff rule.
    pub fn format_tick(
        &self,
        now: DateTime<Local>,
        results: &[PollResult],
        backoff: &[BackoffSnapshot],
    ) -> String {
        let mut lines = Vec::new();

        lines.push(self.bold(&format!("Tick at {}", now.format("%H:%M:%S"))));
        lines.push("─".repeat(50));

        for poll in results {
            lines.push(self.format_poll(poll));
        }

        let active: Vec<_> = backoff.iter().filter(|s| s.failure_count > 0).collect();
        if !active.is_empty() {
            lines.push(String::new());
            lines.push(self.dim("Backoff:"));
            for snapshot in active {
                lines.push(self.format_backoff(snapshot));
            }
        }

        lines.join("\n")
    }

    fn format_poll(&self, poll: &PollResult) -> String {
        let status = match &poll.result {
            Ok(Some(payload)) => format!("{} {}", self.green("ok"), self.excerpt(payload)),
            Ok(None) => self.dim("no response"),
            Err(e) => self.format_error(e),
        };
        format!("{:<40} {}", poll.url, status)
    }

    /// Formats a classified fetch error, colored by severity.
    pub fn format_error(&self, error: &FetchError) -> String {
        if let FetchError::BackoffSuppressed {
            failure_count,
            remaining,
            ..
        } = error
        {
            return self.yellow(&format!(
                "suppressed ({failure_count} failures, {remaining} left)"
            ));
        }

        match error.severity() {
            Severity::Warning => self.yellow(&error.to_string()),
            Severity::Error => self.red(&error.to_string()),
        }
    }

    /// Formats one rule's backoff line.
    pub fn format_backoff(&self, snapshot: &BackoffSnapshot) -> String {
        let remaining = if snapshot.remaining_backoff_secs == 0 {
            self.green("window elapsed")
        } else {
            self.yellow(&format!(
                "{} left",
                describe_secs(snapshot.remaining_backoff_secs)
            ))
        };

        format!(
            "  {}  failures: {}  window: {}  {}",
            snapshot.pattern,
            snapshot.failure_count,
            describe_secs(snapshot.total_backoff_secs),
            remaining
        )
    }

    fn excerpt(&self, payload: &Payload) -> String {
        let full = match payload {
            Payload::Bytes(bytes) => return self.dim(&format!("<{} bytes>", bytes.len())),
            Payload::Text(text) => text.clone(),
            Payload::Json(value) => value.to_string(),
        };

        let single_line = full.split_whitespace().collect::<Vec<_>>().join(" ");
        if single_line.chars().count() > EXCERPT_CHARS {
            let cut: String = single_line.chars().take(EXCERPT_CHARS).collect();
            self.dim(&format!("{cut}…"))
        } else {
            self.dim(&single_line)
        }
    }

    // ========================================================================
    // Color/style helpers
    // ========================================================================

    fn paint(&self, code: &str, text: &str) -> String {
        if self.use_colors {
            format!("{code}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    fn bold(&self, text: &str) -> String {
        self.paint(BOLD, text)
    }

    fn dim(&self, text: &str) -> String {
        self.paint(DIM, text)
    }

    fn green(&self, text: &str) -> String {
        self.paint(GREEN, text)
    }

    fn yellow(&self, text: &str) -> String {
        self.paint(YELLOW, text)
    }

    fn red(&self, text: &str) -> String {
        self.paint(RED, text)
    }
}
