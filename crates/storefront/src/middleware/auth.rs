//! Session-user helpers for route handlers.

use tower_sessions::Session;

use copper_kettle_core::UserId;

use crate::error::AppError;
use crate::models::session_keys;
use crate::models::user::User;
use crate::services::auth::{AuthError, AuthService};
use crate::state::AppState;

/// The logged-in user's id, if any.
pub async fn current_user_id(session: &Session) -> Option<UserId> {
    session
        .get::<i32>(session_keys::USER_ID)
        .await
        .ok()
        .flatten()
        .map(UserId::new)
}

/// Load the logged-in user, if any.
///
/// A session pointing at a deleted user is treated as logged out.
///
/// # Errors
///
/// Returns `AppError::Database` on repository failure.
pub async fn current_user(state: &AppState, session: &Session) -> Result<Option<User>, AppError> {
    let Some(user_id) = current_user_id(session).await else {
        return Ok(None);
    };

    let auth = AuthService::new(state.pool(), &state.config().default_country_code);
    match auth.get_user(user_id).await {
        Ok(user) => Ok(Some(user)),
        Err(AuthError::UserNotFound) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Load the logged-in user or fail with `Unauthorized`.
///
/// # Errors
///
/// Returns `AppError::Unauthorized` when no valid login session exists.
pub async fn require_user(state: &AppState, session: &Session) -> Result<User, AppError> {
    current_user(state, session)
        .await?
        .ok_or_else(|| AppError::Unauthorized("login required".to_owned()))
}
