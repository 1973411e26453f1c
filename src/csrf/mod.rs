// ============================================================================
// CSRF Protection Gate
// ============================================================================
//
// - token.rs: TokenCodec (mint / verify signed, time-bounded tokens)
// - exemptions.rs: ExemptionRegistry (paths that skip the gate)
// - bypass.rs: BypassPolicy + RuntimePosture (development sentinel credentials)
// - extract.rs: credential extraction precedence (JSON body, urlencoded or multipart form, header)
// - gate.rs: ProtectionGate (the per-request decision)
// - cookies.rs: CookieDirectives (attributes for cookies the gate sets)
//
// ============================================================================

pub mod bypass;
pub mod cookies;
pub mod exemptions;
pub mod extract;
pub mod gate;
pub mod token;

pub use bypass::{
    BypassPolicy, EnvPosture, PostureSignals, PostureSource, RuntimePosture,
    DEFAULT_BYPASS_TOKENS, POSTURE_OVERRIDE_PARAM,
};
pub use cookies::{CookieAttributes, CookieContext, CookieDirectives, CookieKind, SameSite};
pub use exemptions::ExemptionRegistry;
pub use extract::{extract_credential, Credential, CredentialSource, TokenLocations};
pub use gate::{AllowReason, GateDecision, ProtectionGate, RequestDescriptor};
pub use token::{InvalidReason, Token, TokenCodec, ValidToken};
