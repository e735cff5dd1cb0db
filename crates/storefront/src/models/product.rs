//! Product domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use copper_kettle_core::ProductId;

/// A catalog product.
///
/// Prices are integers in the smallest currency unit. Stock is checked at
/// cart mutation and decremented only at order finalization.
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    /// Unique product ID.
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Unit price (smallest currency unit).
    pub price: i64,
    /// Digital products need no shipping address.
    pub digital: bool,
    /// Long-form description.
    pub description: Option<String>,
    /// Units currently in stock. May go negative under the backorder policy.
    pub stock: i32,
    /// Category label used for filtering and related products.
    pub category: Option<String>,
    /// Detail-page view counter.
    pub views: i32,
    /// When the product was created.
    pub created_at: DateTime<Utc>,
    /// When the product was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Whether at least one unit can currently be sold.
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock > 0
    }
}

/// Sort orders accepted by the catalog listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CatalogSort {
    /// Newest first (default).
    #[default]
    Newest,
    /// Cheapest first.
    PriceLow,
    /// Most expensive first.
    PriceHigh,
    /// Most viewed first.
    Popular,
}

impl CatalogSort {
    /// Parse a query-string value, falling back to the default for unknown
    /// values rather than erroring (matches the listing's lenient behavior).
    #[must_use]
    pub fn from_param(s: &str) -> Self {
        match s {
            "price_low" => Self::PriceLow,
            "price_high" => Self::PriceHigh,
            "popular" => Self::Popular,
            _ => Self::Newest,
        }
    }
}

/// Strip a raw search query down to something safe to embed in an ILIKE
/// pattern: word characters, spaces and hyphens only, capped at 100 chars.
#[must_use]
pub fn sanitize_search_query(query: &str) -> String {
    query
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == ' ' || *c == '-')
        .take(100)
        .collect::<String>()
        .trim()
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_from_param() {
        assert_eq!(CatalogSort::from_param("price_low"), CatalogSort::PriceLow);
        assert_eq!(CatalogSort::from_param("price_high"), CatalogSort::PriceHigh);
        assert_eq!(CatalogSort::from_param("popular"), CatalogSort::Popular);
        assert_eq!(CatalogSort::from_param("anything"), CatalogSort::Newest);
        assert_eq!(CatalogSort::from_param(""), CatalogSort::Newest);
    }

    #[test]
    fn test_sanitize_strips_specials() {
        assert_eq!(sanitize_search_query("kettle'; DROP--"), "kettle DROP--");
        assert_eq!(sanitize_search_query("  copper kettle  "), "copper kettle");
    }

    #[test]
    fn test_sanitize_caps_length() {
        let long = "a".repeat(500);
        assert_eq!(sanitize_search_query(&long).len(), 100);
    }
}
