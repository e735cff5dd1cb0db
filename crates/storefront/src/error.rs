//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server errors to Sentry
//! before responding to the client. All route handlers return
//! `Result<T, AppError>`; responses are JSON bodies of the form
//! `{"error": "..."}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::payments::PaymentError;
use crate::services::auth::AuthError;
use crate::services::cart::CartError;
use crate::services::checkout::CheckoutError;
use crate::services::otp::OtpError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Cart operation failed.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Checkout operation failed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// OTP operation failed.
    #[error("OTP error: {0}")]
    Otp(#[from] OtpError),

    /// Payment gateway or webhook failure.
    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials | AuthError::UserNotFound => {
                    StatusCode::UNAUTHORIZED
                }
                AuthError::UsernameTaken | AuthError::PhoneTaken => StatusCode::CONFLICT,
                AuthError::WeakPassword(_)
                | AuthError::InvalidEmail(_)
                | AuthError::InvalidPhone(_) => StatusCode::BAD_REQUEST,
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Cart(err) => match err {
                CartError::ProductNotFound => StatusCode::NOT_FOUND,
                CartError::OutOfStock { .. } => StatusCode::CONFLICT,
                CartError::NotAuthenticated => StatusCode::UNAUTHORIZED,
                CartError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Checkout(err) => match err {
                CheckoutError::OrderNotFound => StatusCode::NOT_FOUND,
                CheckoutError::EmptyCart
                | CheckoutError::MissingShipping
                | CheckoutError::MissingGuestInfo
                | CheckoutError::InvalidAmount(_)
                | CheckoutError::InvalidEmail(_) => StatusCode::BAD_REQUEST,
                CheckoutError::PriceMismatch { .. } | CheckoutError::InsufficientStock { .. } => {
                    StatusCode::CONFLICT
                }
                CheckoutError::Gateway(_) => StatusCode::BAD_GATEWAY,
                CheckoutError::Cart(cart) => Self::cart_status(cart),
                CheckoutError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Otp(err) => match err {
                OtpError::InvalidPhone(_) | OtpError::InvalidCode { .. } => {
                    StatusCode::BAD_REQUEST
                }
                OtpError::PhoneNotRegistered | OtpError::NotFound => StatusCode::NOT_FOUND,
                OtpError::TooManyAttempts => StatusCode::TOO_MANY_REQUESTS,
                OtpError::Expired => StatusCode::GONE,
                OtpError::AlreadyUsed => StatusCode::CONFLICT,
                OtpError::DeliveryFailed(_) => StatusCode::BAD_GATEWAY,
                OtpError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Payment(err) => match err {
                PaymentError::InvalidSignature => StatusCode::UNAUTHORIZED,
                PaymentError::MalformedWebhook(_) => StatusCode::BAD_REQUEST,
                PaymentError::Http(_) | PaymentError::Gateway { .. } => StatusCode::BAD_GATEWAY,
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    const fn cart_status(err: &CartError) -> StatusCode {
        match err {
            CartError::ProductNotFound => StatusCode::NOT_FOUND,
            CartError::OutOfStock { .. } => StatusCode::CONFLICT,
            CartError::NotAuthenticated => StatusCode::UNAUTHORIZED,
            CartError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message; internal details are never leaked.
    fn message(&self) -> String {
        match self {
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::Auth(err) => match err {
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    "Authentication error".to_string()
                }
                other => other.to_string(),
            },
            Self::Cart(err) => match err {
                CartError::Repository(_) => "Internal server error".to_string(),
                other => other.to_string(),
            },
            Self::Checkout(err) => match err {
                CheckoutError::Repository(_) => "Internal server error".to_string(),
                CheckoutError::Gateway(_) => "Payment gateway error".to_string(),
                other => other.to_string(),
            },
            Self::Otp(err) => match err {
                OtpError::Repository(_) => "Internal server error".to_string(),
                other => other.to_string(),
            },
            Self::Payment(err) => match err {
                PaymentError::Http(_) | PaymentError::Gateway { .. } => {
                    "External service error".to_string()
                }
                other => other.to_string(),
            },
            _ => self.to_string(),
        }
    }

    fn is_server_error(&self) -> bool {
        self.status().is_server_error()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = self.status();
        let body = Json(json!({ "error": self.message() }));

        (status, body).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy_status_codes() {
        assert_eq!(
            AppError::NotFound("product 1".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Unauthorized("login required".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::BadRequest("bad".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::RateLimited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            AppError::Internal("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_conflict_family() {
        let price = AppError::Checkout(CheckoutError::PriceMismatch {
            charged: rust_decimal::Decimal::from(15000),
            computed: rust_decimal::Decimal::from(14999),
        });
        assert_eq!(price.status(), StatusCode::CONFLICT);

        let stock = AppError::Cart(CartError::OutOfStock { available: 2 });
        assert_eq!(stock.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_otp_statuses() {
        assert_eq!(
            AppError::Otp(OtpError::TooManyAttempts).status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(AppError::Otp(OtpError::Expired).status(), StatusCode::GONE);
        assert_eq!(
            AppError::Otp(OtpError::InvalidCode { remaining: 4 }).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Otp(OtpError::AlreadyUsed).status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_internal_details_not_leaked() {
        let err = AppError::Database(crate::db::RepositoryError::DataCorruption(
            "secret table detail".into(),
        ));
        assert_eq!(err.message(), "Internal server error");
    }

    #[test]
    fn test_invalid_code_message_carries_remaining() {
        let err = AppError::Otp(OtpError::InvalidCode { remaining: 4 });
        assert!(err.message().contains("4 attempts remaining"));
    }
}
