//! Cart view types and the signed anonymous-cart cookie.

use std::collections::BTreeMap;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use copper_kettle_core::ProductId;

use crate::models::product::Product;

type HmacSha256 = Hmac<Sha256>;

/// Cookie name for the anonymous cart.
pub const CART_COOKIE_NAME: &str = "ck_cart";

/// Cart mutation actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CartAction {
    Add,
    Remove,
}

/// Result of a cart mutation.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CartMutation {
    /// Quantity of the line after the mutation (0 when removed).
    pub quantity: i32,
    /// True when the line item was deleted by this mutation.
    pub removed: bool,
}

/// One cart line as presented to the client.
#[derive(Debug, Clone, Serialize)]
pub struct CartLineView {
    pub product: Product,
    pub quantity: i32,
    /// Quantity x unit price (smallest currency unit).
    pub line_total: i64,
}

/// A consistent view of the current cart, for either identity kind.
#[derive(Debug, Clone, Serialize, Default)]
pub struct CartView {
    pub items: Vec<CartLineView>,
    /// Sum of line totals (smallest currency unit).
    pub cart_total: i64,
    /// Sum of line quantities.
    pub cart_item_count: i64,
    /// True when any line references a non-digital product.
    pub requires_shipping: bool,
}

impl CartView {
    /// Build a view from resolved lines, deriving the aggregates.
    #[must_use]
    pub fn from_lines(items: Vec<CartLineView>) -> Self {
        let cart_total = items.iter().map(|l| l.line_total).sum();
        let cart_item_count = items.iter().map(|l| i64::from(l.quantity)).sum();
        let requires_shipping = items.iter().any(|l| !l.product.digital);
        Self {
            items,
            cart_total,
            cart_item_count,
            requires_shipping,
        }
    }
}

/// Errors decoding a [`CartCookie`].
#[derive(Debug, thiserror::Error)]
pub enum CartCookieError {
    /// The cookie value is structurally malformed.
    #[error("malformed cart cookie")]
    Malformed,
    /// The signature does not match the payload.
    #[error("cart cookie signature mismatch")]
    BadSignature,
    /// The payload carries a schema version this build does not understand.
    #[error("unsupported cart cookie version {0}")]
    UnsupportedVersion(u8),
}

/// The anonymous visitor's cart: a versioned product-id -> quantity map,
/// serialized to JSON and HMAC-signed with the session secret so the client
/// can hold it without being able to forge it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CartCookie {
    /// Schema version; bump on layout changes.
    pub version: u8,
    /// Product id -> quantity.
    pub items: BTreeMap<i32, u32>,
}

impl CartCookie {
    /// Current schema version.
    pub const VERSION: u8 = 1;

    /// An empty cart at the current version.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            version: Self::VERSION,
            items: BTreeMap::new(),
        }
    }

    /// True when the cart holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Quantity of a product in the cart.
    #[must_use]
    pub fn quantity(&self, product_id: ProductId) -> u32 {
        self.items.get(&product_id.as_i32()).copied().unwrap_or(0)
    }

    /// Apply a mutation, returning the resulting line state.
    pub fn apply(&mut self, product_id: ProductId, action: CartAction) -> CartMutation {
        let key = product_id.as_i32();
        let current = self.items.get(&key).copied().unwrap_or(0);
        match action {
            CartAction::Add => {
                let quantity = current + 1;
                self.items.insert(key, quantity);
                CartMutation {
                    quantity: i32::try_from(quantity).unwrap_or(i32::MAX),
                    removed: false,
                }
            }
            CartAction::Remove => {
                let quantity = current.saturating_sub(1);
                if quantity == 0 {
                    self.items.remove(&key);
                    CartMutation {
                        quantity: 0,
                        removed: true,
                    }
                } else {
                    self.items.insert(key, quantity);
                    CartMutation {
                        quantity: i32::try_from(quantity).unwrap_or(i32::MAX),
                        removed: false,
                    }
                }
            }
        }
    }

    /// Encode and sign for transport: `base64(json) "." hex(hmac)`.
    #[must_use]
    pub fn encode(&self, secret: &[u8]) -> String {
        // Serializing a map with integer keys and primitive values cannot fail
        let json = serde_json::to_vec(self).unwrap_or_default();
        let payload = URL_SAFE_NO_PAD.encode(&json);
        let sig = hex::encode(sign(secret, payload.as_bytes()));
        format!("{payload}.{sig}")
    }

    /// Decode and authenticate a cookie value.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed values, signature mismatches, or
    /// unknown schema versions. Callers treat all of these as an empty cart.
    pub fn decode(value: &str, secret: &[u8]) -> Result<Self, CartCookieError> {
        let (payload, sig_hex) = value.split_once('.').ok_or(CartCookieError::Malformed)?;

        let sig = hex::decode(sig_hex).map_err(|_| CartCookieError::Malformed)?;
        let mut mac =
            HmacSha256::new_from_slice(secret).map_err(|_| CartCookieError::BadSignature)?;
        mac.update(payload.as_bytes());
        mac.verify_slice(&sig)
            .map_err(|_| CartCookieError::BadSignature)?;

        let json = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| CartCookieError::Malformed)?;
        let cart: Self = serde_json::from_slice(&json).map_err(|_| CartCookieError::Malformed)?;

        if cart.version != Self::VERSION {
            return Err(CartCookieError::UnsupportedVersion(cart.version));
        }

        Ok(cart)
    }
}

fn sign(secret: &[u8], payload: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts keys of any length");
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret-key-0123456789abcdef";

    #[test]
    fn test_encode_decode_roundtrip() {
        let mut cart = CartCookie::empty();
        cart.apply(ProductId::new(3), CartAction::Add);
        cart.apply(ProductId::new(3), CartAction::Add);
        cart.apply(ProductId::new(7), CartAction::Add);

        let encoded = cart.encode(SECRET);
        let decoded = CartCookie::decode(&encoded, SECRET).unwrap();
        assert_eq!(decoded, cart);
        assert_eq!(decoded.quantity(ProductId::new(3)), 2);
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let mut cart = CartCookie::empty();
        cart.apply(ProductId::new(1), CartAction::Add);
        let encoded = cart.encode(SECRET);

        let (payload, sig) = encoded.split_once('.').unwrap();
        // Forge a different payload against the original signature
        let mut forged_cart = CartCookie::empty();
        forged_cart.items.insert(1, 999);
        let forged_json = serde_json::to_vec(&forged_cart).unwrap();
        let forged_payload = URL_SAFE_NO_PAD.encode(&forged_json);
        assert_ne!(payload, forged_payload);

        let forged = format!("{forged_payload}.{sig}");
        assert!(matches!(
            CartCookie::decode(&forged, SECRET),
            Err(CartCookieError::BadSignature)
        ));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let cart = CartCookie::empty();
        let encoded = cart.encode(SECRET);
        assert!(matches!(
            CartCookie::decode(&encoded, b"other-secret"),
            Err(CartCookieError::BadSignature)
        ));
    }

    #[test]
    fn test_unknown_version_rejected() {
        let mut cart = CartCookie::empty();
        cart.version = 9;
        let encoded = cart.encode(SECRET);
        assert!(matches!(
            CartCookie::decode(&encoded, SECRET),
            Err(CartCookieError::UnsupportedVersion(9))
        ));
    }

    #[test]
    fn test_malformed_value_rejected() {
        assert!(matches!(
            CartCookie::decode("not-a-cookie", SECRET),
            Err(CartCookieError::Malformed)
        ));
        assert!(matches!(
            CartCookie::decode("", SECRET),
            Err(CartCookieError::Malformed)
        ));
    }

    #[test]
    fn test_remove_deletes_line_at_zero() {
        let mut cart = CartCookie::empty();
        cart.apply(ProductId::new(5), CartAction::Add);
        let result = cart.apply(ProductId::new(5), CartAction::Remove);
        assert!(result.removed);
        assert_eq!(result.quantity, 0);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_remove_missing_line_is_noop() {
        let mut cart = CartCookie::empty();
        let result = cart.apply(ProductId::new(5), CartAction::Remove);
        assert!(result.removed);
        assert!(cart.is_empty());
    }
}
