//! Token decoding and the axum extractors built on top of it.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use dr_domain::model::{AuthenticatedSubject, UserRole};
use dr_domain::{token, Error};

use crate::error_response::ApiError;
use crate::state::AppState;

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Decodes the bearer token into a subject. Used by every protected
/// HTTP route except the internal event-tail route, which has its
/// own dual auth ([`InternalCaller`]).
#[axum::async_trait]
impl FromRequestParts<AppState> for AuthenticatedSubject {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).unwrap_or_default();
        token::decode(token, &state.config.auth.hmac_secret).map_err(ApiError::from)
    }
}

/// Authorization for the internal event-tail route: a moderator or
/// parent bearer token, or a matching `X-Service-Key` header.
pub struct InternalCaller;

#[axum::async_trait]
impl FromRequestParts<AppState> for InternalCaller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(key) = parts
            .headers
            .get("x-service-key")
            .and_then(|v| v.to_str().ok())
        {
            if token::service_key_matches(key, &state.config.auth.service_key) {
                return Ok(InternalCaller);
            }
        }

        let token = bearer_token(parts).unwrap_or_default();
        let subject = token::decode(token, &state.config.auth.hmac_secret)?;
        match subject.role {
            UserRole::Moderator | UserRole::Parent => Ok(InternalCaller),
            UserRole::Player => Err(ApiError::from(Error::Forbidden(
                "internal route requires moderator, parent, or service key".into(),
            ))),
        }
    }
}

/// Enforce that a `player` subject can only act as themselves. Other
/// roles (`moderator`, `parent`) may act on behalf of any user.
pub fn require_self_if_player(
    subject: &AuthenticatedSubject,
    claimed_user_id: uuid::Uuid,
) -> Result<(), Error> {
    if subject.role == UserRole::Player && subject.user_id != claimed_user_id {
        return Err(Error::Forbidden(
            "players may only act as themselves".into(),
        ));
    }
    Ok(())
}

/// Used by the WebSocket route, which authenticates via a `token`
/// query parameter instead of an `Authorization` header (browsers
/// cannot set custom headers on a WS upgrade request).
pub fn decode_ws_token(token: &str, state: &AppState) -> Result<AuthenticatedSubject, Error> {
    dr_domain::token::decode(token, &state.config.auth.hmac_secret)
}

pub const WS_POLICY_VIOLATION: u16 = 1008;
