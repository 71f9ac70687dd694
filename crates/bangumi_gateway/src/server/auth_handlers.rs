//! Bangumi login, session inspection and logout endpoints

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, HeaderMap},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{error::ApiError, AppState};
use crate::auth::SessionRecord;
use crate::error::GatewayError;
use crate::types::BangumiUser;

#[derive(Debug, Serialize)]
pub struct AuthorizeResponse {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct CallbackRequest {
    pub code: String,
    pub state: String,
}

#[derive(Debug, Serialize)]
pub struct CallbackResponse {
    pub token: String,
    pub user: BangumiUser,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: BangumiUser,
}

/// Session token from an `Authorization: Bearer <token>` header, if present
#[derive(Debug, Clone)]
pub struct BearerToken(pub Option<String>);

impl BearerToken {
    fn from_headers(headers: &HeaderMap) -> Self {
        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::to_string);
        Self(token)
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for BearerToken {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}

/// A verified, unexpired session; rejects with 401 otherwise
#[derive(Debug, Clone)]
pub struct AuthenticatedSession(pub SessionRecord);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthenticatedSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let BearerToken(token) = BearerToken::from_headers(&parts.headers);
        let token = token.ok_or(GatewayError::Unauthorized("Unauthorized"))?;

        state
            .oauth
            .sessions()
            .verify(&token)
            .map(AuthenticatedSession)
            .ok_or_else(|| GatewayError::Unauthorized("Invalid token").into())
    }
}

/// Issue a state and return the Bangumi consent URL
pub async fn authorize(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<AuthorizeResponse>, ApiError> {
    let base_url = state.public_base_url(&headers)?;
    let url = state.oauth.begin_authorize(&base_url)?;

    Ok(Json(AuthorizeResponse { url: url.to_string() }))
}

/// Complete the login started by `authorize`
///
/// The body is parsed as JSON whatever `Content-Type` the client sends.
pub async fn callback(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<CallbackResponse>, ApiError> {
    let req: CallbackRequest = serde_json::from_slice(&body).map_err(|e| {
        warn!("[WARN] Malformed callback body: {}", e);
        ApiError::authentication_failed(e)
    })?;

    let login = state
        .oauth
        .complete_callback(&req.code, &req.state)
        .await
        .map_err(|e| {
            warn!("[WARN] Auth callback failed: {}", e);
            ApiError::authentication_failed(e)
        })?;

    info!("[OK] User {} ({}) signed in", login.user.username, login.user.id);

    Ok(Json(CallbackResponse {
        token: login.session_token,
        user: login.user,
    }))
}

pub async fn callback_method_not_allowed() -> ApiError {
    ApiError::method_not_allowed()
}

/// Return the user bound to the bearer session
pub async fn me(AuthenticatedSession(session): AuthenticatedSession) -> Json<MeResponse> {
    Json(MeResponse { user: session.user })
}

/// Revoke the bearer session if one is presented
pub async fn logout(
    State(state): State<Arc<AppState>>,
    BearerToken(token): BearerToken,
) -> Json<serde_json::Value> {
    if let Some(token) = token {
        state.oauth.sessions().revoke(&token);
    }

    Json(serde_json::json!({ "success": true }))
}

pub async fn auth_not_found() -> ApiError {
    GatewayError::NotFound("Auth endpoint not found").into()
}
