// ============================================================================
// Bypass Policy
// ============================================================================
//
// Lets automated tests and local development skip token minting by sending a
// fixed sentinel credential. A sentinel is accepted only when the runtime
// posture is "development"; neither condition alone is enough.
//
// Posture is the OR of:
// - DEVELOPMENT_MODE=true
// - ENVIRONMENT=development
// - APP_DEBUG=true (framework debug flag)
// - ?runtime_env=development on the request, ONLY when the override is
//   enabled in config AND this is a debug build. Anyone who can craft a URL
//   controls this parameter, so it is off by default.
//
// Signals are read fresh on every call; nothing is cached.
//
// ============================================================================

use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::config::{env_flag, BypassConfig};

/// Sentinel credentials accepted in development posture
pub const DEFAULT_BYPASS_TOKENS: [&str; 2] = ["dev-csrf-bypass", "development-token"];

/// Query parameter carrying the diagnostic posture override
pub const POSTURE_OVERRIDE_PARAM: &str = "runtime_env";

const DEVELOPMENT: &str = "development";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimePosture {
    Development,
    Production,
}

/// Process-level posture indicators
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostureSignals {
    pub development_mode: bool,
    pub environment_is_development: bool,
    pub framework_debug: bool,
}

impl PostureSignals {
    pub fn any(&self) -> bool {
        self.development_mode || self.environment_is_development || self.framework_debug
    }
}

/// Where posture signals come from
pub trait PostureSource: Send + Sync {
    fn signals(&self) -> PostureSignals;
}

/// Fixed signals, for tests and embedders that manage posture themselves
impl PostureSource for PostureSignals {
    fn signals(&self) -> PostureSignals {
        *self
    }
}

/// Reads the process environment on every call
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvPosture;

impl PostureSource for EnvPosture {
    fn signals(&self) -> PostureSignals {
        PostureSignals {
            development_mode: env_flag("DEVELOPMENT_MODE"),
            environment_is_development: std::env::var("ENVIRONMENT")
                .map(|v| v.trim().eq_ignore_ascii_case(DEVELOPMENT))
                .unwrap_or(false),
            framework_debug: env_flag("APP_DEBUG"),
        }
    }
}

#[derive(Clone)]
pub struct BypassPolicy {
    sentinels: Vec<String>,
    source: Arc<dyn PostureSource>,
    allow_query_override: bool,
}

impl BypassPolicy {
    pub fn new(
        sentinels: Vec<String>,
        source: Arc<dyn PostureSource>,
        allow_query_override: bool,
    ) -> Self {
        let sentinels = sentinels
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        Self {
            sentinels,
            source,
            allow_query_override,
        }
    }

    /// Policy over the live process environment
    pub fn from_config(config: &BypassConfig) -> Self {
        Self::new(
            config.tokens.clone(),
            Arc::new(EnvPosture),
            config.allow_query_override,
        )
    }

    /// Current posture; `query_override` is the raw `runtime_env` value, if any
    pub fn posture(&self, query_override: Option<&str>) -> RuntimePosture {
        if self.source.signals().any() {
            return RuntimePosture::Development;
        }

        let requested = query_override
            .map(|v| v.trim().eq_ignore_ascii_case(DEVELOPMENT))
            .unwrap_or(false);
        if requested {
            if self.query_override_enabled() {
                tracing::warn!(
                    param = POSTURE_OVERRIDE_PARAM,
                    "Development posture forced by request query override"
                );
                return RuntimePosture::Development;
            }
            tracing::debug!(
                param = POSTURE_OVERRIDE_PARAM,
                "Ignoring posture override (disabled)"
            );
        }

        RuntimePosture::Production
    }

    pub fn is_posture_development(&self, query_override: Option<&str>) -> bool {
        self.posture(query_override) == RuntimePosture::Development
    }

    /// True iff `credential` is a sentinel AND posture is development
    pub fn may_bypass(&self, credential: &str, query_override: Option<&str>) -> bool {
        if !self.is_sentinel(credential) {
            return false;
        }
        self.is_posture_development(query_override)
    }

    /// Whether `credential` is one of the configured sentinels
    pub fn is_sentinel(&self, credential: &str) -> bool {
        if credential.is_empty() {
            return false;
        }
        self.sentinels
            .iter()
            .any(|s| bool::from(s.as_bytes().ct_eq(credential.as_bytes())))
    }

    fn query_override_enabled(&self) -> bool {
        self.allow_query_override && cfg!(debug_assertions)
    }
}

impl std::fmt::Debug for BypassPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BypassPolicy")
            .field("sentinel_count", &self.sentinels.len())
            .field("allow_query_override", &self.allow_query_override)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_sentinels() -> Vec<String> {
        DEFAULT_BYPASS_TOKENS.iter().map(|s| s.to_string()).collect()
    }

    fn policy(signals: PostureSignals, allow_query_override: bool) -> BypassPolicy {
        BypassPolicy::new(default_sentinels(), Arc::new(signals), allow_query_override)
    }

    fn dev_mode() -> PostureSignals {
        PostureSignals {
            development_mode: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_each_signal_yields_development() {
        let signals = [
            dev_mode(),
            PostureSignals {
                environment_is_development: true,
                ..Default::default()
            },
            PostureSignals {
                framework_debug: true,
                ..Default::default()
            },
        ];
        for s in signals {
            assert_eq!(policy(s, false).posture(None), RuntimePosture::Development);
        }
        assert_eq!(
            policy(PostureSignals::default(), false).posture(None),
            RuntimePosture::Production
        );
    }

    #[test]
    fn test_sentinel_requires_development() {
        let prod = policy(PostureSignals::default(), false);
        let dev = policy(dev_mode(), false);

        for sentinel in DEFAULT_BYPASS_TOKENS {
            assert!(!prod.may_bypass(sentinel, None));
            assert!(dev.may_bypass(sentinel, None));
        }
    }

    #[test]
    fn test_non_sentinel_never_bypasses() {
        let dev = policy(dev_mode(), false);
        assert!(!dev.may_bypass("", None));
        assert!(!dev.may_bypass("dev-csrf-bypass ", None));
        assert!(!dev.may_bypass("DEV-CSRF-BYPASS", None));
        assert!(!dev.may_bypass("some-real-looking-token", None));
    }

    #[test]
    fn test_query_override_disabled_by_default() {
        let prod = policy(PostureSignals::default(), false);
        assert!(!prod.is_posture_development(Some("development")));
        assert!(!prod.may_bypass("dev-csrf-bypass", Some("development")));
    }

    #[test]
    fn test_query_override_when_enabled() {
        let prod = policy(PostureSignals::default(), true);
        // Debug builds honor the override; release builds never do.
        assert_eq!(
            prod.is_posture_development(Some("Development")),
            cfg!(debug_assertions)
        );
        assert!(!prod.is_posture_development(Some("production")));
        assert!(!prod.is_posture_development(None));
    }

    #[test]
    fn test_empty_sentinel_set_disables_bypass() {
        let dev = BypassPolicy::new(vec![" ".to_string()], Arc::new(dev_mode()), false);
        assert!(!dev.may_bypass(" ", None));
        assert!(!dev.may_bypass("", None));
    }
}
