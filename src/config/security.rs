// ============================================================================
// CSRF Configuration
// ============================================================================

use thiserror::Error;

use super::{env_flag, env_list, SECONDS_PER_HOUR};
use crate::csrf::{SameSite, DEFAULT_BYPASS_TOKENS};

const MIN_SECRET_LEN: usize = 32;

/// Fatal startup errors; the process must not serve traffic after one
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "CSRF_SECRET is required. Generate with: openssl rand -hex 32"
    )]
    MissingSecret,

    #[error("CSRF_SECRET must be at least 32 characters long (got {0})")]
    SecretTooShort(usize),

    #[error("CSRF secret rejected: {0}")]
    InvalidSecret(String),

    #[error("Invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },
}

/// HMAC signing secret; never printed
#[derive(Clone)]
pub struct SigningSecret(String);

impl SigningSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SigningSecret(**redacted**)")
    }
}

/// Development bypass settings
#[derive(Clone, Debug)]
pub struct BypassConfig {
    /// Sentinel credentials (empty = bypass disabled)
    pub tokens: Vec<String>,
    /// Honor `?runtime_env=development` (debug builds only)
    pub allow_query_override: bool,
}

impl Default for BypassConfig {
    fn default() -> Self {
        Self {
            tokens: DEFAULT_BYPASS_TOKENS.iter().map(|s| s.to_string()).collect(),
            allow_query_override: false,
        }
    }
}

/// Tightening knobs for the token cookie
#[derive(Clone, Debug)]
pub struct CookieConfig {
    pub same_site: SameSite,
    pub max_age_secs: Option<u64>,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            same_site: SameSite::FLOOR,
            max_age_secs: None,
        }
    }
}

/// CSRF (Cross-Site Request Forgery) protection configuration
#[derive(Clone, Debug)]
pub struct CsrfConfig {
    /// Secret key for token signing (HMAC-SHA256), at least 32 characters
    pub secret: SigningSecret,
    /// Token freshness window in seconds (default: 3600 = 1 hour)
    pub token_ttl_secs: u64,
    /// Cookie name for the token (default: "csrf_token")
    pub cookie_name: String,
    /// Header name for the token (default: "X-CSRF-Token")
    pub header_name: String,
    /// JSON / form field name for the token (default: "csrf_token")
    pub field_name: String,
    /// Literal paths or route templates that skip the gate
    pub exempt_paths: Vec<String>,
    pub bypass: BypassConfig,
    pub cookies: CookieConfig,
}

impl CsrfConfig {
    /// Defaults around an explicit secret
    pub fn new(secret: SigningSecret) -> Self {
        Self {
            secret,
            token_ttl_secs: SECONDS_PER_HOUR,
            cookie_name: "csrf_token".to_string(),
            header_name: "X-CSRF-Token".to_string(),
            field_name: "csrf_token".to_string(),
            exempt_paths: vec!["/health".to_string()],
            bypass: BypassConfig::default(),
            cookies: CookieConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.secret.expose().trim().is_empty() {
            return Err(ConfigError::MissingSecret);
        }
        if self.secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::SecretTooShort(self.secret.len()));
        }
        if self.token_ttl_secs == 0 {
            return Err(ConfigError::InvalidValue {
                name: "CSRF_TOKEN_TTL_SECS",
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    pub(crate) fn from_env() -> Result<Self, ConfigError> {
        let secret = match std::env::var("CSRF_SECRET") {
            Ok(s) if !s.trim().is_empty() => SigningSecret::new(s),
            _ => return Err(ConfigError::MissingSecret),
        };

        let mut config = Self::new(secret);

        if let Ok(ttl) = std::env::var("CSRF_TOKEN_TTL_SECS") {
            config.token_ttl_secs = ttl.trim().parse().map_err(|_| ConfigError::InvalidValue {
                name: "CSRF_TOKEN_TTL_SECS",
                value: ttl.clone(),
            })?;
        }
        if let Ok(name) = std::env::var("CSRF_COOKIE_NAME") {
            config.cookie_name = name;
        }
        if let Ok(name) = std::env::var("CSRF_HEADER_NAME") {
            config.header_name = name;
        }
        if let Ok(name) = std::env::var("CSRF_FIELD_NAME") {
            config.field_name = name;
        }
        if let Some(paths) = env_list("CSRF_EXEMPT_PATHS") {
            config.exempt_paths = paths;
        }
        if let Some(tokens) = env_list("CSRF_BYPASS_TOKENS") {
            config.bypass.tokens = tokens;
        }
        config.bypass.allow_query_override = env_flag("CSRF_ALLOW_POSTURE_OVERRIDE");

        if let Ok(value) = std::env::var("CSRF_COOKIE_SAMESITE") {
            let same_site = SameSite::parse(&value).ok_or_else(|| ConfigError::InvalidValue {
                name: "CSRF_COOKIE_SAMESITE",
                value: value.clone(),
            })?;
            if same_site < SameSite::FLOOR {
                tracing::warn!(
                    requested = same_site.as_str(),
                    applied = SameSite::FLOOR.as_str(),
                    "CSRF_COOKIE_SAMESITE cannot be looser than the floor; ignoring"
                );
            }
            config.cookies.same_site = same_site.max(SameSite::FLOOR);
        }
        if let Ok(value) = std::env::var("CSRF_COOKIE_MAX_AGE_SECS") {
            config.cookies.max_age_secs =
                Some(value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    name: "CSRF_COOKIE_MAX_AGE_SECS",
                    value: value.clone(),
                })?);
        }

        config.validate()?;
        Ok(config)
    }
}
