use anyhow::Result;

mod security;

pub use security::{BypassConfig, ConfigError, CookieConfig, CsrfConfig, SigningSecret};

// ============================================================================
// Configuration Constants
// ============================================================================

const DEFAULT_PORT: u16 = 8080;

pub const SECONDS_PER_HOUR: u64 = 3600;
pub const SECONDS_PER_DAY: u64 = 86400;

/// Body bytes buffered while looking for a token
pub const MAX_REQUEST_BODY_SIZE: usize = 2 * 1024 * 1024; // 2 MB

// ============================================================================
// Configuration Structures
// ============================================================================

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub csrf: CsrfConfig,
}

impl Config {
    /// Load configuration from the process environment
    ///
    /// Fails when CSRF_SECRET is missing or too short: the gate must never
    /// serve traffic with protection silently disabled.
    pub fn from_env() -> Result<Self> {
        let port = match std::env::var("PORT") {
            Ok(p) => p
                .parse()
                .map_err(|_| ConfigError::InvalidValue {
                    name: "PORT",
                    value: p.clone(),
                })?,
            Err(_) => DEFAULT_PORT,
        };

        Ok(Self {
            port,
            csrf: CsrfConfig::from_env()?,
        })
    }

    /// Configuration with defaults around an explicit secret
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            port: DEFAULT_PORT,
            csrf: CsrfConfig::new(SigningSecret::new(secret)),
        }
    }
}

// ============================================================================
// Environment helpers
// ============================================================================

pub(crate) fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

pub(crate) fn env_flag(name: &str) -> bool {
    std::env::var(name).map(|v| parse_flag(&v)).unwrap_or(false)
}

/// Comma-separated list; `None` when the variable is unset
pub(crate) fn env_list(name: &str) -> Option<Vec<String>> {
    std::env::var(name).ok().map(|s| {
        s.split(',')
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag() {
        for v in ["true", "TRUE", "1", "yes", " on "] {
            assert!(parse_flag(v), "{}", v);
        }
        for v in ["false", "0", "", "development", "tru"] {
            assert!(!parse_flag(v), "{}", v);
        }
    }
}
