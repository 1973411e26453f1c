use std::sync::Arc;

use crate::config::{Config, ConfigError};
use crate::csrf::{CookieDirectives, ProtectionGate, TokenLocations};

/// Application context shared by handlers and middleware
///
/// Everything here is built before the listener binds and is read-only
/// afterwards.
#[derive(Clone, Debug)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub gate: Arc<ProtectionGate>,
    pub cookies: CookieDirectives,
    pub locations: TokenLocations,
}

impl AppContext {
    /// Build the gate from configuration; fails fast on a bad secret
    pub fn new(config: Arc<Config>) -> Result<Self, ConfigError> {
        let gate = ProtectionGate::from_config(&config.csrf)?;
        Ok(Self::with_gate(config, gate))
    }

    /// Use a pre-built gate (custom posture source, extra exemptions)
    pub fn with_gate(config: Arc<Config>, gate: ProtectionGate) -> Self {
        let cookies = CookieDirectives::new(&config.csrf.cookies, gate.codec().ttl_secs());
        let locations = TokenLocations {
            field_name: config.csrf.field_name.clone(),
            header_name: config.csrf.header_name.clone(),
        };
        Self {
            config,
            gate: Arc::new(gate),
            cookies,
            locations,
        }
    }
}
