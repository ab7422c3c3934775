//! Per-endpoint exponential backoff.
//!
//! A [`BackoffState`] counts consecutive failures and tracks the start of the
//! current cooldown window. A [`BackoffRule`] binds a URL pattern to one
//! state so that every URL matching the pattern shares the same cooldown.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use regex::Regex;
use tokio::time::Instant;

use crate::error::FetchError;

/// Exponent applied before any failure has been recorded.
const BASE_EXPONENT: u32 = 5;

// ============================================================================
// Backoff State
// ============================================================================

/// Failure counter and cooldown clock for one endpoint group.
#[derive(Debug, Clone)]
pub struct BackoffState {
    failure_count: u32,
    window_start: Option<Instant>,
    max_backoff_secs: u64,
}

impl BackoffState {
    /// Creates an idle state with the given ceiling in seconds.
    pub fn new(max_backoff_secs: u64) -> Self {
        Self {
            failure_count: 0,
            window_start: None,
            max_backoff_secs,
        }
    }

    /// Records a failure, restarting the window from now.
    pub fn record_failure(&mut self) {
        self.window_start = Some(Instant::now());
        self.failure_count = self.failure_count.saturating_add(1);
    }

    /// Clears the window and the failure count.
    pub fn reset(&mut self) {
        self.window_start = None;
        self.failure_count = 0;
    }

    /// Consecutive failures since the last reset.
    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    /// The configured ceiling in seconds.
    pub fn max_backoff_secs(&self) -> u64 {
        self.max_backoff_secs
    }

    /// Length of the window for the current failure count.
    ///
    /// `min(2^(5 + count / 2), max)`, saturating at the ceiling.
    pub fn total_backoff_secs(&self) -> u64 {
        let exponent = BASE_EXPONENT + self.failure_count / 2;
        1u64.checked_shl(exponent)
            .unwrap_or(u64::MAX)
            .min(self.max_backoff_secs)
    }

    /// Returns true while a window is open.
    pub fn is_active(&self) -> bool {
        self.remaining_backoff_secs() > 0
    }

    /// Whole seconds left in the window; zero when idle or elapsed.
    pub fn remaining_backoff_secs(&self) -> u64 {
        let Some(start) = self.window_start else {
            return 0;
        };

        Duration::from_secs(self.total_backoff_secs())
            .saturating_sub(start.elapsed())
            .as_secs()
    }

    /// Human-readable window length, e.g. `"2 minutes, 8 seconds"`.
    pub fn describe_total(&self) -> String {
        describe_secs(self.total_backoff_secs())
    }

    /// Human-readable time left in the window, `"none"` when idle.
    pub fn describe_remaining(&self) -> String {
        describe_secs(self.remaining_backoff_secs())
    }
}

/// Renders a number of seconds as `"1 hour, 4 minutes, 2 seconds"`.
///
/// Zero components are skipped; zero overall renders as `"none"`.
pub fn describe_secs(secs: u64) -> String {
    let parts = [
        (secs / 3600, "hour"),
        (secs % 3600 / 60, "minute"),
        (secs % 60, "second"),
    ];

    let rendered: Vec<String> = parts
        .iter()
        .filter(|(value, _)| *value > 0)
        .map(|(value, unit)| {
            if *value == 1 {
                format!("{value} {unit}")
            } else {
                format!("{value} {unit}s")
            }
        })
        .collect();

    if rendered.is_empty() {
        "none".to_string()
    } else {
        rendered.join(", ")
    }
}

// ============================================================================
// Backoff Rule
// ============================================================================

/// A URL pattern bound to one shared [`BackoffState`].
#[derive(Debug)]
pub struct BackoffRule {
    matcher: Matcher,
    state: Mutex<BackoffState>,
}

#[derive(Debug)]
enum Matcher {
    /// Exact URL, created on demand for URLs no registered pattern covers.
    Literal(String),
    /// Regular expression searched for anywhere in the URL.
    Pattern(Regex),
}

impl BackoffRule {
    /// Creates a rule from a regular expression.
    pub fn new(pattern: &str, max_backoff_secs: u64) -> Result<Self, FetchError> {
        let compiled = Regex::new(pattern).map_err(|source| FetchError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;

        Ok(Self {
            matcher: Matcher::Pattern(compiled),
            state: Mutex::new(BackoffState::new(max_backoff_secs)),
        })
    }

    /// Creates a rule matching exactly one URL.
    ///
    /// No regex is compiled, so URLs of any length are accepted.
    pub fn from_url(url: &str, max_backoff_secs: u64) -> Self {
        Self {
            matcher: Matcher::Literal(url.to_string()),
            state: Mutex::new(BackoffState::new(max_backoff_secs)),
        }
    }

    /// Source text of the pattern; identifies the rule in the registry.
    ///
    /// For a literal rule this is the URL itself.
    pub fn pattern(&self) -> &str {
        match &self.matcher {
            Matcher::Literal(url) => url,
            Matcher::Pattern(regex) => regex.as_str(),
        }
    }

    /// Returns true if this rule was created for a single URL.
    pub fn is_literal(&self) -> bool {
        matches!(self.matcher, Matcher::Literal(_))
    }

    /// Returns true if `url` belongs to this rule.
    ///
    /// A literal rule requires the exact URL; a pattern may occur anywhere.
    pub fn matches(&self, url: &str) -> bool {
        match &self.matcher {
            Matcher::Literal(literal) => literal == url,
            Matcher::Pattern(regex) => regex.is_match(url),
        }
    }

    /// Copy of the current state.
    pub fn state(&self) -> BackoffState {
        self.lock().clone()
    }

    /// Records a failure against the shared state.
    pub fn record_failure(&self) {
        self.lock().record_failure();
    }

    /// Resets the shared state.
    pub fn reset(&self) {
        self.lock().reset();
    }

    // The guarded section never panics, so a poisoned lock still holds a
    // consistent state.
    fn lock(&self) -> MutexGuard<'_, BackoffState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PartialEq for BackoffRule {
    fn eq(&self, other: &Self) -> bool {
        self.is_literal() == other.is_literal() && self.pattern() == other.pattern()
    }
}

impl Eq for BackoffRule {}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with_failures(max: u64, failures: u32) -> BackoffState {
        let mut state = BackoffState::new(max);
        for _ in 0..failures {
            state.record_failure();
        }
        state
    }

    #[test]
    fn test_total_backoff_formula() {
        let expected = [(0, 32), (1, 32), (2, 64), (3, 64), (4, 128), (5, 128), (6, 240)];
        for (failures, secs) in expected {
            assert_eq!(
                state_with_failures(240, failures).total_backoff_secs(),
                secs,
                "failures = {failures}"
            );
        }
    }

    #[test]
    fn test_total_backoff_saturates_at_ceiling() {
        let mut state = BackoffState::new(u64::MAX);
        state.failure_count = u32::MAX;
        assert_eq!(state.total_backoff_secs(), u64::MAX);

        let mut capped = BackoffState::new(14_400);
        capped.failure_count = 500;
        assert_eq!(capped.total_backoff_secs(), 14_400);
    }

    #[test]
    fn test_total_backoff_non_decreasing() {
        let mut state = BackoffState::new(3600);
        let mut previous = state.total_backoff_secs();
        for _ in 0..40 {
            state.record_failure();
            let current = state.total_backoff_secs();
            assert!(current >= previous);
            assert!(current <= 3600);
            previous = current;
        }
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut state = state_with_failures(240, 5);
        state.reset();
        state.reset();
        assert_eq!(state.failure_count(), 0);
        assert_eq!(state.remaining_backoff_secs(), 0);
        assert_eq!(state.total_backoff_secs(), 32);
    }

    #[test]
    fn test_idle_state_has_no_window() {
        let state = BackoffState::new(240);
        assert_eq!(state.remaining_backoff_secs(), 0);
        assert_eq!(state.describe_remaining(), "none");
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_elapses() {
        let mut state = BackoffState::new(240);
        state.record_failure();
        assert_eq!(state.remaining_backoff_secs(), 32);

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(state.remaining_backoff_secs(), 22);

        tokio::time::advance(Duration::from_secs(22)).await;
        assert_eq!(state.remaining_backoff_secs(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_restarts_window_with_new_count() {
        let mut state = BackoffState::new(240);
        state.record_failure();
        tokio::time::advance(Duration::from_secs(30)).await;

        state.record_failure();
        assert_eq!(state.failure_count(), 2);
        assert_eq!(state.remaining_backoff_secs(), 64);
    }

    #[test]
    fn test_describe_secs() {
        assert_eq!(describe_secs(0), "none");
        assert_eq!(describe_secs(1), "1 second");
        assert_eq!(describe_secs(128), "2 minutes, 8 seconds");
        assert_eq!(describe_secs(3600), "1 hour");
        assert_eq!(describe_secs(14_400 + 61), "4 hours, 1 minute, 1 second");
    }

    #[test]
    fn test_rule_matches_substring() {
        let rule = BackoffRule::new(r"api\.example/items/", 240).unwrap();
        assert!(rule.matches("https://api.example/items/42"));
        assert!(rule.matches("https://api.example/items/43?full=1"));
        assert!(!rule.matches("https://api.example/users/1"));
    }

    #[test]
    fn test_literal_rule_matches_only_its_url() {
        let rule = BackoffRule::from_url("https://a.example/q?x=1", 240);
        assert!(rule.is_literal());
        assert!(rule.matches("https://a.example/q?x=1"));
        assert!(!rule.matches("https://aXexample/q?x=1"));
        assert!(!rule.matches("https://a.example/q?x=1&y=2"));
        assert!(!rule.matches("https://mirror/https://a.example/q?x=1"));
        assert_eq!(rule.pattern(), "https://a.example/q?x=1");
    }

    #[test]
    fn test_literal_rule_accepts_very_long_url() {
        let url = format!("https://api.example/?q={}", "a".repeat(2_000_000));
        let rule = BackoffRule::from_url(&url, 240);
        assert!(rule.matches(&url));
        assert_eq!(rule.pattern().len(), url.len());
    }

    #[test]
    fn test_literal_and_pattern_with_same_source_differ() {
        let literal = BackoffRule::from_url("example", 240);
        let pattern = BackoffRule::new("example", 240).unwrap();
        assert_ne!(literal, pattern);
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let err = BackoffRule::new("(unclosed", 240).unwrap_err();
        assert!(matches!(err, FetchError::InvalidPattern { .. }));
    }

    #[test]
    fn test_rule_identity_is_pattern_source() {
        let a = BackoffRule::new("example", 10).unwrap();
        let b = BackoffRule::new("example", 999).unwrap();
        let c = BackoffRule::new("other", 10).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_rule_state_is_shared() {
        let rule = BackoffRule::new("example", 240).unwrap();
        rule.record_failure();
        rule.record_failure();
        assert_eq!(rule.state().failure_count(), 2);
        rule.reset();
        assert_eq!(rule.state().failure_count(), 0);
    }
}
