//! Business-logic services.
//!
//! Services orchestrate repositories and external collaborators; route
//! handlers stay thin. Each service carries its own error enum, which the
//! top-level `AppError` maps onto HTTP responses.

pub mod auth;
pub mod cart;
pub mod checkout;
pub mod otp;

pub use auth::AuthService;
pub use cart::CartService;
pub use checkout::CheckoutService;
pub use otp::OtpService;
