// ============================================================================
// Exemption Registry
// ============================================================================
//
// Paths that bypass the gate entirely (server-to-server callbacks, health
// checks). Entries are literal strings: either a concrete request path
// ("/health") or a route template as registered with the router
// ("/api/payments/:provider/ipn"). Matching is exact; there are no wildcards.
//
// Populated once at startup, then sealed and shared read-only.
//
// ============================================================================

use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct ExemptionRegistry {
    paths: HashSet<String>,
    sealed: bool,
}

impl ExemptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a configured path list
    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut registry = Self::new();
        for path in paths {
            registry.register(path.as_ref());
        }
        registry
    }

    /// Add a path or route template. Registering twice has no extra effect.
    ///
    /// Registration after `seal()` is a configuration error: it is logged and
    /// ignored. Returns whether the set changed.
    pub fn register(&mut self, path: &str) -> bool {
        let path = path.trim();
        if path.is_empty() {
            return false;
        }
        if self.sealed {
            tracing::error!(
                path = %path,
                "Exemption registered after the gate started serving; ignoring"
            );
            return false;
        }
        self.paths.insert(path.to_string())
    }

    pub fn is_exempt(&self, request_path: &str) -> bool {
        self.paths.contains(request_path)
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Freeze the registry for shared read-only use by the gate
    pub fn seal(mut self) -> Arc<Self> {
        self.sealed = true;
        Arc::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_is_idempotent() {
        let mut registry = ExemptionRegistry::new();
        assert!(registry.register("/api/payments/ipn"));
        assert!(!registry.register("/api/payments/ipn"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_exact_match_only() {
        let registry = ExemptionRegistry::from_paths(["/health", "/api/payments/:provider/ipn"]);

        assert!(registry.is_exempt("/health"));
        assert!(registry.is_exempt("/api/payments/:provider/ipn"));
        assert!(!registry.is_exempt("/health/"));
        assert!(!registry.is_exempt("/healthz"));
        assert!(!registry.is_exempt("/api/payments/paypal/ipn"));
        assert!(!registry.is_exempt("/"));
    }

    #[test]
    fn test_blank_entries_ignored() {
        let registry = ExemptionRegistry::from_paths(["", "  ", " /health "]);
        assert_eq!(registry.len(), 1);
        assert!(registry.is_exempt("/health"));
    }

    #[test]
    fn test_late_registration_ignored() {
        let sealed = ExemptionRegistry::from_paths(["/health"]).seal();
        assert!(sealed.is_sealed());

        let mut copy = (*sealed).clone();
        assert!(!copy.register("/late"));
        assert!(!copy.is_exempt("/late"));
    }
}
