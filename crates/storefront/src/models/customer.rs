//! Customer domain types.

use serde::Serialize;

use copper_kettle_core::{CustomerId, Email, UserId};

/// A storefront customer.
///
/// Customers are created lazily: on the first authenticated interaction for
/// logged-in users, or at checkout for guests. A customer may outlive its
/// linked user account (the link is nullable).
#[derive(Debug, Clone, Serialize)]
pub struct Customer {
    /// Unique customer ID.
    pub id: CustomerId,
    /// Linked user account, if any (guests have none).
    pub user_id: Option<UserId>,
    /// Display name.
    pub name: Option<String>,
    /// Contact email used for order confirmations.
    pub email: Option<Email>,
}
