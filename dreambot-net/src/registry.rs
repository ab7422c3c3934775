//! Registry of backoff rules owned by one network client.

use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::backoff::BackoffRule;
use crate::error::FetchError;
use crate::scope::{DebugScopes, NETWORK_SCOPE};

/// Point-in-time view of one rule, for status output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffSnapshot {
    /// Source text of the rule's pattern.
    pub pattern: String,
    /// Consecutive failures recorded.
    pub failure_count: u32,
    /// Window length for the current count.
    pub total_backoff_secs: u64,
    /// Seconds left in the window.
    pub remaining_backoff_secs: u64,
}

/// Finds or creates the backoff rule responsible for a URL.
///
/// Rules are kept in registration order. When several patterns match a URL
/// the longest pattern source wins, and ties go to the rule registered
/// first, so the same URL always resolves to the same rule. A URL no rule
/// covers gets a literal rule of its own.
#[derive(Debug)]
pub struct BackoffRegistry {
    rules: RwLock<Vec<Arc<BackoffRule>>>,
    default_max_backoff_secs: u64,
    scopes: DebugScopes,
}

impl BackoffRegistry {
    /// Creates an empty registry.
    pub fn new(default_max_backoff_secs: u64) -> Self {
        Self::with_scopes(default_max_backoff_secs, DebugScopes::new())
    }

    /// Creates an empty registry that logs rule changes under the
    /// `network` scope of `scopes`.
    pub fn with_scopes(default_max_backoff_secs: u64, scopes: DebugScopes) -> Self {
        Self {
            rules: RwLock::new(Vec::new()),
            default_max_backoff_secs,
            scopes,
        }
    }

    pub(crate) fn set_scopes(&mut self, scopes: DebugScopes) {
        self.scopes = scopes;
    }

    /// Ceiling applied to rules created on demand.
    pub fn default_max_backoff_secs(&self) -> u64 {
        self.default_max_backoff_secs
    }

    /// Returns the rule owning `url`, creating a literal-URL rule if none
    /// matches.
    pub fn rule_for(&self, url: &str) -> Arc<BackoffRule> {
        if let Some(rule) = self.find(url) {
            return rule;
        }

        let mut rules = self.rules.write().unwrap_or_else(PoisonError::into_inner);

        // Another caller may have created it between the read and write locks.
        if let Some(rule) = best_match(&rules, url) {
            return rule;
        }

        let rule = Arc::new(BackoffRule::from_url(url, self.default_max_backoff_secs));
        if self.scopes.is_enabled(NETWORK_SCOPE) {
            debug!(pattern = %rule.pattern(), "Created backoff rule");
        }
        rules.push(Arc::clone(&rule));
        rule
    }

    /// Returns the rule owning `url` without creating one.
    pub fn find(&self, url: &str) -> Option<Arc<BackoffRule>> {
        let rules = self.rules.read().unwrap_or_else(PoisonError::into_inner);
        best_match(&rules, url)
    }

    /// Registers a pattern with the default ceiling.
    pub fn register(&self, pattern: &str) -> Result<Arc<BackoffRule>, FetchError> {
        self.register_with_max(pattern, self.default_max_backoff_secs)
    }

    /// Registers a pattern so every matching URL shares one backoff state.
    ///
    /// Registering a source that already exists returns the existing rule
    /// unchanged.
    pub fn register_with_max(
        &self,
        pattern: &str,
        max_backoff_secs: u64,
    ) -> Result<Arc<BackoffRule>, FetchError> {
        let candidate = BackoffRule::new(pattern, max_backoff_secs)?;

        let mut rules = self.rules.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = rules.iter().find(|rule| ***rule == candidate) {
            return Ok(Arc::clone(existing));
        }

        let rule = Arc::new(candidate);
        if self.scopes.is_enabled(NETWORK_SCOPE) {
            debug!(pattern = %rule.pattern(), max_backoff_secs, "Registered backoff rule");
        }
        rules.push(Arc::clone(&rule));
        Ok(rule)
    }

    /// Snapshot of every rule in registration order.
    pub fn snapshot(&self) -> Vec<BackoffSnapshot> {
        let rules = self.rules.read().unwrap_or_else(PoisonError::into_inner);
        rules
            .iter()
            .map(|rule| {
                let state = rule.state();
                BackoffSnapshot {
                    pattern: rule.pattern().to_string(),
                    failure_count: state.failure_count(),
                    total_backoff_secs: state.total_backoff_secs(),
                    remaining_backoff_secs: state.remaining_backoff_secs(),
                }
            })
            .collect()
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true if no rule has been created yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn best_match(rules: &[Arc<BackoffRule>], url: &str) -> Option<Arc<BackoffRule>> {
    rules
        .iter()
        .filter(|rule| rule.matches(url))
        .enumerate()
        // max_by_key keeps the last maximum; Reverse(index) makes it the first.
        .max_by_key(|(index, rule)| (rule.pattern().len(), std::cmp::Reverse(*index)))
        .map(|(_, rule)| Arc::clone(rule))
}
