// ============================================================================
// Token Codec
// ============================================================================
//
// Mints and verifies anti-forgery tokens.
//
// Token Format: <issued_at>.<payload>.<signature>
// - issued_at: Unix timestamp (seconds) used for the freshness window
// - payload: base64url(no padding) of a random nonce or a session identifier
// - signature: hex(HMAC-SHA256("<issued_at>.<payload>", secret))
//
// ============================================================================

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::config::{ConfigError, CsrfConfig, SigningSecret};

type HmacSha256 = Hmac<Sha256>;

/// Random nonce size for unbound tokens
const NONCE_LEN: usize = 32;

/// Tokens stamped further than this into the future are rejected as stale
const MAX_CLOCK_SKEW_SECS: u64 = 60;

/// Why a candidate token was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidReason {
    #[error("CSRF token missing")]
    Missing,
    #[error("CSRF token malformed")]
    Malformed,
    #[error("CSRF token expired")]
    Expired,
    #[error("CSRF token signature mismatch")]
    SignatureMismatch,
}

impl InvalidReason {
    /// Stable code used in logs
    pub fn code(&self) -> &'static str {
        match self {
            InvalidReason::Missing => "missing-token",
            InvalidReason::Malformed => "malformed-token",
            InvalidReason::Expired => "expired-token",
            InvalidReason::SignatureMismatch => "signature-mismatch",
        }
    }
}

/// A freshly minted token
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    value: String,
    issued_at: u64,
}

impl Token {
    /// Wire form, as sent to clients and stored in the cookie
    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn issued_at(&self) -> u64 {
        self.issued_at
    }

    pub fn into_string(self) -> String {
        self.value
    }
}

// Token values are credentials; keep them out of Debug output.
impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("issued_at", &self.issued_at)
            .finish_non_exhaustive()
    }
}

/// Result of a successful verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidToken {
    pub issued_at: u64,
    /// Encoded payload (nonce or session identifier)
    pub payload: String,
}

/// Signs and checks tokens against the process-wide secret
#[derive(Clone)]
pub struct TokenCodec {
    mac: HmacSha256,
    ttl_secs: u64,
}

impl TokenCodec {
    pub fn new(secret: &SigningSecret, ttl_secs: u64) -> Result<Self, ConfigError> {
        let mac = HmacSha256::new_from_slice(secret.expose().as_bytes())
            .map_err(|_| ConfigError::InvalidSecret("HMAC key rejected".to_string()))?;
        Ok(Self { mac, ttl_secs })
    }

    pub fn from_config(config: &CsrfConfig) -> Result<Self, ConfigError> {
        Self::new(&config.secret, config.token_ttl_secs)
    }

    /// Freshness window in seconds
    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    /// Mint a token carrying a random nonce
    pub fn issue(&self) -> Token {
        self.issue_at(unix_now())
    }

    pub fn issue_at(&self, now: u64) -> Token {
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);
        self.mint(URL_SAFE_NO_PAD.encode(nonce), now)
    }

    /// Mint a token bound to a session identifier instead of a random nonce
    pub fn issue_for(&self, subject: &str) -> Token {
        self.mint(URL_SAFE_NO_PAD.encode(subject.as_bytes()), unix_now())
    }

    pub fn verify(&self, candidate: &str) -> Result<ValidToken, InvalidReason> {
        self.verify_at(candidate, unix_now())
    }

    /// Verify against an explicit clock reading
    ///
    /// Checks, in order:
    /// 1. Candidate is non-empty
    /// 2. Candidate has the three-part structure with a numeric timestamp
    /// 3. Timestamp is within the freshness window
    /// 4. Signature matches (constant-time)
    pub fn verify_at(&self, candidate: &str, now: u64) -> Result<ValidToken, InvalidReason> {
        let candidate = candidate.trim();
        if candidate.is_empty() {
            return Err(InvalidReason::Missing);
        }

        // Everything after the second dot is signature, dots included
        let mut parts = candidate.splitn(3, '.');
        let (Some(timestamp), Some(payload), Some(signature)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(InvalidReason::Malformed);
        };

        if !timestamp.bytes().all(|b| b.is_ascii_digit()) {
            return Err(InvalidReason::Malformed);
        }
        let issued_at: u64 = timestamp.parse().map_err(|_| InvalidReason::Malformed)?;

        if payload.is_empty() || signature.is_empty() || URL_SAFE_NO_PAD.decode(payload).is_err()
        {
            return Err(InvalidReason::Malformed);
        }

        if issued_at > now.saturating_add(MAX_CLOCK_SKEW_SECS)
            || now.saturating_sub(issued_at) > self.ttl_secs
        {
            return Err(InvalidReason::Expired);
        }

        let expected = self.sign(issued_at, payload);
        if !bool::from(signature.as_bytes().ct_eq(expected.as_bytes())) {
            return Err(InvalidReason::SignatureMismatch);
        }

        Ok(ValidToken {
            issued_at,
            payload: payload.to_string(),
        })
    }

    fn mint(&self, payload: String, issued_at: u64) -> Token {
        let signature = self.sign(issued_at, &payload);
        Token {
            value: format!("{}.{}.{}", issued_at, payload, signature),
            issued_at,
        }
    }

    fn sign(&self, issued_at: u64, payload: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(format!("{}.{}", issued_at, payload).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
