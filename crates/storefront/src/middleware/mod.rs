//! HTTP middleware: sessions, rate limiting, and the session-user helper.

pub mod auth;
pub mod rate_limit;
pub mod session;

pub use auth::{current_user, current_user_id, require_user};
pub use rate_limit::{api_rate_limiter, auth_rate_limiter};
pub use session::create_session_layer;
