//! Runtime-toggleable debug scopes.
//!
//! Verbose tracing from a component is only emitted while that component's
//! scope is enabled, independently of the global log level. Handles are
//! cheap to clone and share one set.

use std::collections::BTreeSet;
use std::sync::{Arc, PoisonError, RwLock};

/// Scope gating the network layer's per-call debug lines.
pub const NETWORK_SCOPE: &str = "network";

/// Shared set of enabled debug scope names.
#[derive(Debug, Clone, Default)]
pub struct DebugScopes {
    enabled: Arc<RwLock<BTreeSet<String>>>,
}

impl DebugScopes {
    /// Creates a handle with no scopes enabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a handle with the given scopes enabled.
    pub fn with_enabled<I, S>(scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let handle = Self::new();
        for scope in scopes {
            handle.enable(scope);
        }
        handle
    }

    /// Enables a scope. Returns false if it was already enabled.
    pub fn enable(&self, scope: impl Into<String>) -> bool {
        self.enabled
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(scope.into())
    }

    /// Disables a scope. Returns false if it was not enabled.
    pub fn disable(&self, scope: &str) -> bool {
        self.enabled
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(scope)
    }

    /// Flips a scope and returns its new state.
    pub fn toggle(&self, scope: &str) -> bool {
        let mut enabled = self.enabled.write().unwrap_or_else(PoisonError::into_inner);
        if enabled.remove(scope) {
            false
        } else {
            enabled.insert(scope.to_string());
            true
        }
    }

    /// Returns true if debug output for `scope` should be emitted.
    pub fn is_enabled(&self, scope: &str) -> bool {
        self.enabled
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(scope)
    }

    /// Enabled scopes, sorted.
    pub fn enabled(&self) -> Vec<String> {
        self.enabled
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}
