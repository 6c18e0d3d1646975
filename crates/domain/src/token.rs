//! Signed subject tokens.
//!
//! Wire format: `base64url(JSON({sub, role, exp})) + "." + hex(HMAC-SHA256(base64url_part, secret))`.
//! Verification is constant-time; this module never logs a raw token
//! or secret.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::model::{AuthenticatedSubject, UserRole};
use crate::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: Uuid,
    role: UserRole,
    exp: i64,
}

fn sign(base64_part: &str, secret: &str) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| Error::Internal(format!("hmac key: {e}")))?;
    mac.update(base64_part.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Issue a token for `subject`, valid for `ttl_secs` seconds from now.
///
/// Production deployments sign tokens with an external issuer; this
/// helper exists for the `dev`-mode CLI path and for tests.
pub fn issue(subject: &AuthenticatedSubject, ttl_secs: i64, secret: &str) -> Result<String> {
    let claims = Claims {
        sub: subject.user_id,
        role: subject.role,
        exp: (chrono::Utc::now().timestamp()) + ttl_secs,
    };
    let json = serde_json::to_vec(&claims)?;
    let encoded = URL_SAFE_NO_PAD.encode(json);
    let signature = sign(&encoded, secret)?;
    Ok(format!("{encoded}.{signature}"))
}

/// Decode and verify a token, returning the subject it carries.
///
/// Every failure is reported as [`Error::Unauthorized`] whose message
/// names the specific cause (`missing_token`, `invalid_token`,
/// `invalid_signature`, `token_expired`, `invalid_subject`) so callers
/// and tests can distinguish them without widening the error kind.
pub fn decode(token: &str, secret: &str) -> Result<AuthenticatedSubject> {
    if token.is_empty() {
        return Err(Error::Unauthorized("missing_token".into()));
    }
    let (encoded, signature) = token
        .split_once('.')
        .ok_or_else(|| Error::Unauthorized("invalid_token".into()))?;

    let expected = sign(encoded, secret)?;
    let matches: bool = expected.as_bytes().ct_eq(signature.as_bytes()).into();
    if !matches {
        return Err(Error::Unauthorized("invalid_signature".into()));
    }

    let raw = URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|_| Error::Unauthorized("invalid_token".into()))?;
    let claims: Claims =
        serde_json::from_slice(&raw).map_err(|_| Error::Unauthorized("invalid_token".into()))?;

    if claims.exp < chrono::Utc::now().timestamp() {
        return Err(Error::Unauthorized("token_expired".into()));
    }

    Ok(AuthenticatedSubject {
        user_id: claims.sub,
        role: claims.role,
    })
}

/// Constant-time comparison of a presented service key against the
/// configured one. Used by the internal event-tail route.
pub fn service_key_matches(presented: &str, configured: &str) -> bool {
    if configured.is_empty() {
        return false;
    }
    presented.as_bytes().ct_eq(configured.as_bytes()).into()
}
