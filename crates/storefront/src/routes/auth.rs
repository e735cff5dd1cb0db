//! Authentication route handlers: password login and the OTP flow.
//!
//! The OTP flow carries `otp_id`/`otp_phone` in the session between the
//! request and verify steps; a verify without that session state forces a
//! restart of the flow.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_sessions::Session;
use tracing::instrument;

use copper_kettle_core::{OtpId, PhoneNumber};

use crate::error::{AppError, Result};
use crate::models::session_keys;
use crate::services::{AuthService, OtpService};
use crate::state::AppState;

/// Registration request body.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub phone_number: String,
}

/// Password login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// OTP request body.
#[derive(Debug, Deserialize)]
pub struct OtpRequestBody {
    pub phone_number: String,
}

/// OTP verification body.
#[derive(Debug, Deserialize)]
pub struct OtpVerifyBody {
    pub code: String,
}

/// Logged-in user response.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i32,
    pub username: String,
}

async fn log_in(session: &Session, user_id: i32) -> Result<()> {
    // Rotate the session id on privilege change
    session
        .cycle_id()
        .await
        .map_err(|e| AppError::Internal(format!("session error: {e}")))?;
    session
        .insert(session_keys::USER_ID, user_id)
        .await
        .map_err(|e| AppError::Internal(format!("session error: {e}")))?;
    Ok(())
}

/// Create an account with username, email, password and phone number.
#[instrument(skip(state, request))]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<UserResponse>> {
    let auth = AuthService::new(state.pool(), &state.config().default_country_code);

    let user = auth
        .register(
            request.username.trim(),
            request.email.trim(),
            &request.password,
            request.phone_number.trim(),
        )
        .await?;

    Ok(Json(UserResponse {
        id: user.id.as_i32(),
        username: user.username,
    }))
}

/// Password login.
#[instrument(skip(state, session, request))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<LoginRequest>,
) -> Result<Json<UserResponse>> {
    let auth = AuthService::new(state.pool(), &state.config().default_country_code);

    let user = auth
        .login(request.username.trim(), &request.password)
        .await?;

    log_in(&session, user.id.as_i32()).await?;

    Ok(Json(UserResponse {
        id: user.id.as_i32(),
        username: user.username,
    }))
}

/// Logout: drop the whole session.
#[instrument(skip(session))]
pub async fn logout(session: Session) -> Result<Json<Value>> {
    session
        .flush()
        .await
        .map_err(|e| AppError::Internal(format!("session error: {e}")))?;

    Ok(Json(json!({ "message": "Logged out successfully" })))
}

/// Issue a login OTP for a registered phone number.
#[instrument(skip(state, session, request))]
pub async fn otp_request(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<OtpRequestBody>,
) -> Result<Json<Value>> {
    let otp = OtpService::new(
        state.pool(),
        state.notifier(),
        &state.config().default_country_code,
    );

    let issued = otp.request_login(request.phone_number.trim()).await?;

    let store = async {
        session
            .insert(session_keys::OTP_ID, issued.id.as_i32())
            .await?;
        session
            .insert(session_keys::OTP_PHONE, issued.phone_number.as_str())
            .await
    };
    store
        .await
        .map_err(|e| AppError::Internal(format!("session error: {e}")))?;

    Ok(Json(json!({
        "message": format!("OTP sent to {}", issued.phone_number),
    })))
}

/// Verify the pending OTP and log the user in.
#[instrument(skip(state, session, request))]
pub async fn otp_verify(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<OtpVerifyBody>,
) -> Result<Json<Value>> {
    let otp_id = session
        .get::<i32>(session_keys::OTP_ID)
        .await
        .ok()
        .flatten()
        .map(OtpId::new)
        .ok_or_else(|| {
            AppError::BadRequest("no pending OTP; request a new one".to_owned())
        })?;

    let otp = OtpService::new(
        state.pool(),
        state.notifier(),
        &state.config().default_country_code,
    );

    let verified = otp.verify(otp_id, &request.code).await?;

    let Some(user_id) = verified.user_id else {
        return Err(AppError::Unauthorized(
            "phone number is no longer registered".to_owned(),
        ));
    };

    log_in(&session, user_id.as_i32()).await?;
    let _ = session.remove::<i32>(session_keys::OTP_ID).await;
    let _ = session.remove::<String>(session_keys::OTP_PHONE).await;

    Ok(Json(json!({ "message": "Logged in successfully with OTP" })))
}

/// Reissue and resend the pending OTP.
#[instrument(skip(state, session))]
pub async fn otp_resend(State(state): State<AppState>, session: Session) -> Result<Json<Value>> {
    let phone = session
        .get::<String>(session_keys::OTP_PHONE)
        .await
        .ok()
        .flatten()
        .map(PhoneNumber::from_canonical)
        .ok_or_else(|| {
            AppError::BadRequest("no pending OTP; request a new one".to_owned())
        })?;

    let otp = OtpService::new(
        state.pool(),
        state.notifier(),
        &state.config().default_country_code,
    );

    let issued = otp
        .issue(&phone, copper_kettle_core::OtpPurpose::Login)
        .await?;

    session
        .insert(session_keys::OTP_ID, issued.id.as_i32())
        .await
        .map_err(|e| AppError::Internal(format!("session error: {e}")))?;

    Ok(Json(json!({
        "message": format!("OTP resent to {phone}"),
    })))
}
