// ============================================================================
// Cookie Directives
// ============================================================================
//
// Attribute set for every cookie the gate writes. Floors that callers and
// configuration may tighten but never loosen:
// - Secure
// - HttpOnly
// - SameSite=Lax (Strict allowed, None never)
//
// Session cookies default to a 30-day Max-Age; token cookies default to the
// token freshness window. An explicit Max-Age only applies when narrower.
//
// ============================================================================

use std::time::Duration;

use crate::config::{CookieConfig, SECONDS_PER_DAY};

/// Upper bound for session-duration cookies
pub const SESSION_COOKIE_MAX_AGE: Duration = Duration::from_secs(30 * SECONDS_PER_DAY);

/// Ordered from loosest to strictest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SameSite {
    None,
    Lax,
    Strict,
}

impl SameSite {
    pub const FLOOR: SameSite = SameSite::Lax;

    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::None => "None",
            SameSite::Lax => "Lax",
            SameSite::Strict => "Strict",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" => Some(SameSite::None),
            "lax" => Some(SameSite::Lax),
            "strict" => Some(SameSite::Strict),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookieKind {
    /// The anti-forgery token cookie
    CsrfToken,
    /// Cookies that live as long as a login session
    Session,
}

/// What a caller asks for; anything looser than the floor is ignored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookieContext {
    pub kind: CookieKind,
    pub secure: Option<bool>,
    pub http_only: Option<bool>,
    pub same_site: Option<SameSite>,
    pub max_age: Option<Duration>,
}

impl CookieContext {
    pub fn token() -> Self {
        Self::of(CookieKind::CsrfToken)
    }

    pub fn session() -> Self {
        Self::of(CookieKind::Session)
    }

    fn of(kind: CookieKind) -> Self {
        Self {
            kind,
            secure: None,
            http_only: None,
            same_site: None,
            max_age: None,
        }
    }

    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = Some(secure);
        self
    }

    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = Some(http_only);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookieAttributes {
    pub secure: bool,
    pub http_only: bool,
    pub same_site: SameSite,
    pub max_age: Duration,
}

impl CookieAttributes {
    /// Render a `Set-Cookie` header value
    pub fn header_value(&self, name: &str, value: &str) -> String {
        let mut cookie = format!(
            "{}={}; SameSite={}",
            name,
            value,
            self.same_site.as_str()
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        if self.http_only {
            cookie.push_str("; HttpOnly");
        }
        cookie.push_str(&format!("; Path=/; Max-Age={}", self.max_age.as_secs()));
        cookie
    }
}

#[derive(Debug, Clone)]
pub struct CookieDirectives {
    same_site: SameSite,
    token_max_age: Duration,
}

impl CookieDirectives {
    pub fn new(config: &CookieConfig, token_ttl_secs: u64) -> Self {
        let ttl = Duration::from_secs(token_ttl_secs);
        let token_max_age = config
            .max_age_secs
            .map(Duration::from_secs)
            .map_or(ttl, |configured| configured.min(ttl));

        Self {
            same_site: config.same_site.max(SameSite::FLOOR),
            token_max_age,
        }
    }

    pub fn attributes_for(&self, context: CookieContext) -> CookieAttributes {
        if context.secure == Some(false) || context.http_only == Some(false) {
            tracing::debug!(kind = ?context.kind, "Ignoring request to drop Secure/HttpOnly");
        }

        let same_site = context
            .same_site
            .map_or(self.same_site, |requested| requested.max(self.same_site));

        let ceiling = match context.kind {
            CookieKind::CsrfToken => self.token_max_age,
            CookieKind::Session => SESSION_COOKIE_MAX_AGE,
        };
        let max_age = context
            .max_age
            .map_or(ceiling, |requested| requested.min(ceiling));

        CookieAttributes {
            secure: true,
            http_only: true,
            same_site,
            max_age,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directives() -> CookieDirectives {
        CookieDirectives::new(&CookieConfig::default(), 3600)
    }

    #[test]
    fn test_token_defaults() {
        let attrs = directives().attributes_for(CookieContext::token());
        assert_eq!(
            attrs,
            CookieAttributes {
                secure: true,
                http_only: true,
                same_site: SameSite::Lax,
                max_age: Duration::from_secs(3600),
            }
        );
    }

    #[test]
    fn test_session_defaults_to_thirty_days() {
        let attrs = directives().attributes_for(CookieContext::session());
        assert_eq!(attrs.max_age, Duration::from_secs(30 * 86400));
    }

    #[test]
    fn test_cannot_loosen() {
        let attrs = directives().attributes_for(
            CookieContext::session()
                .with_secure(false)
                .with_http_only(false)
                .with_same_site(SameSite::None)
                .with_max_age(Duration::from_secs(90 * 86400)),
        );
        assert!(attrs.secure);
        assert!(attrs.http_only);
        assert_eq!(attrs.same_site, SameSite::Lax);
        assert_eq!(attrs.max_age, SESSION_COOKIE_MAX_AGE);
    }

    #[test]
    fn test_can_tighten() {
        let attrs = directives().attributes_for(
            CookieContext::session()
                .with_same_site(SameSite::Strict)
                .with_max_age(Duration::from_secs(600)),
        );
        assert_eq!(attrs.same_site, SameSite::Strict);
        assert_eq!(attrs.max_age, Duration::from_secs(600));
    }

    #[test]
    fn test_config_floor_applies() {
        let loose = CookieConfig {
            same_site: SameSite::None,
            max_age_secs: Some(7200),
        };
        let attrs = CookieDirectives::new(&loose, 3600).attributes_for(CookieContext::token());
        assert_eq!(attrs.same_site, SameSite::Lax);
        // Token cookie never outlives the token
        assert_eq!(attrs.max_age, Duration::from_secs(3600));

        let strict = CookieConfig {
            same_site: SameSite::Strict,
            max_age_secs: Some(600),
        };
        let attrs = CookieDirectives::new(&strict, 3600)
            .attributes_for(CookieContext::token().with_same_site(SameSite::Lax));
        assert_eq!(attrs.same_site, SameSite::Strict);
        assert_eq!(attrs.max_age, Duration::from_secs(600));
    }

    #[test]
    fn test_header_value() {
        let attrs = directives().attributes_for(CookieContext::token());
        assert_eq!(
            attrs.header_value("csrf_token", "abc"),
            "csrf_token=abc; SameSite=Lax; Secure; HttpOnly; Path=/; Max-Age=3600"
        );
    }

    #[test]
    fn test_parse_same_site() {
        assert_eq!(SameSite::parse("STRICT"), Some(SameSite::Strict));
        assert_eq!(SameSite::parse(" lax "), Some(SameSite::Lax));
        assert_eq!(SameSite::parse("none"), Some(SameSite::None));
        assert_eq!(SameSite::parse("relaxed"), None);
    }
}
