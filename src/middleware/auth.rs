use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::session::SESSION_USER_KEY,
    services::auth_service::find_user,
    state::AppState,
};

/// The user bound to the request's session.
///
/// Rejects with 401 when the session carries no user and with 404 when the
/// user it points at has been deleted.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
}

pub async fn session_user_id(session: &Session) -> Result<Option<Uuid>, AppError> {
    Ok(session.get::<Uuid>(SESSION_USER_KEY).await?)
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("Session not found".into()))?;

        let user_id = session_user_id(&session)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Session not found".into()))?;

        let user = find_user(&state.orm, user_id).await?;

        Ok(AuthUser { user_id: user.id })
    }
}
