//! Status enums for orders, OTP codes, and stock policy.

use serde::{Deserialize, Serialize};

/// Order lifecycle status.
///
/// `Pending` is the state of an incomplete (cart) order. Payment confirmation
/// moves an order to `Processing`; the remaining transitions are admin-driven
/// and not enforced as a strict sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// All statuses an admin may set on a completed order.
    pub const ADMIN_SETTABLE: [Self; 4] = [
        Self::Processing,
        Self::Shipped,
        Self::Delivered,
        Self::Cancelled,
    ];
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Shipped => write!(f, "shipped"),
            Self::Delivered => write!(f, "delivered"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("invalid order status: {s}")),
        }
    }
}

/// Purpose of an issued OTP code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OtpPurpose {
    /// Login via phone number.
    #[default]
    Login,
    /// Phone number ownership verification.
    Verification,
}

impl std::fmt::Display for OtpPurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Login => write!(f, "login"),
            Self::Verification => write!(f, "verification"),
        }
    }
}

impl std::str::FromStr for OtpPurpose {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "login" => Ok(Self::Login),
            "verification" => Ok(Self::Verification),
            _ => Err(format!("invalid otp purpose: {s}")),
        }
    }
}

/// Policy for stock decrements at order finalization.
///
/// Cart mutation always rejects adds beyond current stock; this policy only
/// governs the decrement applied when a paid order is finalized, where the
/// stock may have been sold out from under the buyer between checkout and
/// payment confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StockPolicy {
    /// Decrement unconditionally; a negative result is logged as an anomaly
    /// and treated as a backorder.
    #[default]
    AllowBackorder,
    /// Fail the finalization if any line would drive stock below zero.
    Strict,
}

impl std::fmt::Display for StockPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AllowBackorder => write!(f, "allow_backorder"),
            Self::Strict => write!(f, "strict"),
        }
    }
}

impl std::str::FromStr for StockPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "allow_backorder" => Ok(Self::AllowBackorder),
            "strict" => Ok(Self::Strict),
            _ => Err(format!("invalid stock policy: {s}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_roundtrip() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ] {
            let parsed: OrderStatus = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_order_status_invalid() {
        assert!("returned".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_admin_settable_excludes_pending() {
        assert!(!OrderStatus::ADMIN_SETTABLE.contains(&OrderStatus::Pending));
    }

    #[test]
    fn test_otp_purpose_roundtrip() {
        for purpose in [OtpPurpose::Login, OtpPurpose::Verification] {
            let parsed: OtpPurpose = purpose.to_string().parse().unwrap();
            assert_eq!(parsed, purpose);
        }
    }

    #[test]
    fn test_stock_policy_parse() {
        assert_eq!(
            "allow_backorder".parse::<StockPolicy>().unwrap(),
            StockPolicy::AllowBackorder
        );
        assert_eq!("strict".parse::<StockPolicy>().unwrap(), StockPolicy::Strict);
        assert!("lenient".parse::<StockPolicy>().is_err());
    }
}
