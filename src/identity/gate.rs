//! The check every protected operation runs before doing any work:
//! bearer token present, session valid, and (for team-scoped writes) team admin.

use std::sync::Arc;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use tracing::debug;

use crate::error::{AppError, AppResult, MSG_NOT_TEAM_ADMIN};

use super::authorizer::TeamAuthorizer;
use super::principal::Principal;
use super::session::SessionManager;

const BEARER_PREFIX: &str = "Bearer ";

/// Remove a leading `Bearer ` (exact, case-sensitive); other values pass through.
pub fn strip_bearer(raw: &str) -> &str {
    raw.strip_prefix(BEARER_PREFIX).unwrap_or(raw)
}

/// Steps 1-3: header present, prefix stripped, session valid.
pub fn authenticate(sessions: &SessionManager, headers: &HeaderMap) -> AppResult<Principal> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Err(AppError::MissingAuthorization);
    };
    if value.is_empty() {
        return Err(AppError::MissingAuthorization);
    }
    let raw = value.to_str().map_err(|_| AppError::Unauthenticated)?;
    let username = sessions.validate(raw)?;
    Ok(Principal::new(username))
}

/// Step 4, for writes scoped to a team.
pub fn require_team_admin(authz: &TeamAuthorizer, principal: &Principal, team_id: &str) -> AppResult<()> {
    if authz.is_team_admin(&principal.username, team_id) {
        Ok(())
    } else {
        debug!(target: "agendum::identity", user = %principal.username, team = team_id, "not a team admin");
        Err(AppError::forbidden(MSG_NOT_TEAM_ADMIN))
    }
}

impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
    Arc<SessionManager>: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let sessions = Arc::<SessionManager>::from_ref(state);
        authenticate(&sessions, &parts.headers)
    }
}
