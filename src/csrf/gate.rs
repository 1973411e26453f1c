// ============================================================================
// Protection Gate
// ============================================================================
//
// Per-request decision, in strict order:
// 1. Exempt path or route template -> Allow(exempt)
// 2. Safe method (GET/HEAD/OPTIONS/TRACE) -> Allow(safe-method)
// 3. Sentinel credential in development posture -> Allow(bypass)
// 4. Token verification -> Allow(valid-token) or Deny(reason)
//
// The gate is pure: it reads the sealed registry and the signing key, and
// returns a decision. Enforcement belongs to the caller.
//
// ============================================================================

use axum::http::Method;
use std::sync::Arc;

use super::bypass::BypassPolicy;
use super::exemptions::ExemptionRegistry;
use super::token::{InvalidReason, TokenCodec};
use crate::config::{ConfigError, CsrfConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowReason {
    Exempt,
    SafeMethod,
    Bypass,
    ValidToken,
}

impl AllowReason {
    pub fn code(&self) -> &'static str {
        match self {
            AllowReason::Exempt => "exempt",
            AllowReason::SafeMethod => "safe-method",
            AllowReason::Bypass => "bypass",
            AllowReason::ValidToken => "valid-token",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Allow(AllowReason),
    Deny(InvalidReason),
}

impl GateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GateDecision::Allow(_))
    }
}

/// What the gate needs to know about an inbound request
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    pub path: String,
    /// Matched route template, when the router resolved one
    pub route: Option<String>,
    /// Token or sentinel found per extraction precedence
    pub credential: Option<String>,
    /// Raw value of the posture override query parameter
    pub posture_override: Option<String>,
}

impl RequestDescriptor {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            route: None,
            credential: None,
            posture_override: None,
        }
    }

    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        self.route = Some(route.into());
        self
    }

    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }

    pub fn with_posture_override(mut self, value: impl Into<String>) -> Self {
        self.posture_override = Some(value.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct ProtectionGate {
    exemptions: Arc<ExemptionRegistry>,
    bypass: BypassPolicy,
    codec: TokenCodec,
}

impl ProtectionGate {
    pub fn new(
        exemptions: Arc<ExemptionRegistry>,
        bypass: BypassPolicy,
        codec: TokenCodec,
    ) -> Self {
        Self {
            exemptions,
            bypass,
            codec,
        }
    }

    pub fn from_config(config: &CsrfConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let exemptions = ExemptionRegistry::from_paths(&config.exempt_paths).seal();
        let bypass = BypassPolicy::from_config(&config.bypass);
        let codec = TokenCodec::from_config(config)?;
        Ok(Self::new(exemptions, bypass, codec))
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn exemptions(&self) -> &ExemptionRegistry {
        &self.exemptions
    }

    /// Decision reachable without looking at the credential (steps 1-2)
    ///
    /// Lets callers skip buffering the body when it cannot matter.
    pub fn precheck(&self, request: &RequestDescriptor) -> Option<GateDecision> {
        let route_exempt = request
            .route
            .as_deref()
            .map(|r| self.exemptions.is_exempt(r))
            .unwrap_or(false);
        if route_exempt || self.exemptions.is_exempt(&request.path) {
            return Some(GateDecision::Allow(AllowReason::Exempt));
        }

        if is_safe_method(&request.method) {
            return Some(GateDecision::Allow(AllowReason::SafeMethod));
        }

        None
    }

    pub fn evaluate(&self, request: &RequestDescriptor) -> GateDecision {
        if let Some(decision) = self.precheck(request) {
            return decision;
        }

        let credential = request.credential.as_deref().unwrap_or("");
        let posture_override = request.posture_override.as_deref();

        if self.bypass.is_sentinel(credential) {
            if self.bypass.may_bypass(credential, posture_override) {
                return GateDecision::Allow(AllowReason::Bypass);
            }
            // A sentinel is never a token; outside development it is simply wrong.
            return GateDecision::Deny(InvalidReason::SignatureMismatch);
        }

        match self.codec.verify(credential) {
            Ok(_) => GateDecision::Allow(AllowReason::ValidToken),
            Err(reason) => GateDecision::Deny(reason),
        }
    }
}

pub fn is_safe_method(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE
    )
}
