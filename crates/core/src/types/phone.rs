//! Phone number type with canonical international formatting.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when normalizing a [`PhoneNumber`].
#[derive(thiserror::Error, Debug, Clone)]
pub enum PhoneNumberError {
    /// The input string is empty.
    #[error("phone number cannot be empty")]
    Empty,
    /// The input contains characters other than digits, spaces, hyphens and
    /// a leading plus sign.
    #[error("phone number contains invalid characters")]
    InvalidCharacters,
    /// The digit count is outside the accepted range.
    #[error("phone number must have between {min} and {max} digits")]
    InvalidLength {
        /// Minimum digit count.
        min: usize,
        /// Maximum digit count.
        max: usize,
    },
}

/// A phone number in canonical international format (`+<digits>`).
///
/// Raw user input is normalized before storage or lookup so the same number
/// always maps to the same row:
///
/// - spaces and hyphens are stripped;
/// - a leading `+` is kept as-is;
/// - a number already prefixed with the default country code gets a `+`;
/// - a bare 10-digit subscriber number gets the default country code;
/// - anything longer is truncated to its last 10 digits and prefixed.
///
/// ## Examples
///
/// ```
/// use copper_kettle_core::PhoneNumber;
///
/// let a = PhoneNumber::normalize("98765 43210", "91").unwrap();
/// let b = PhoneNumber::normalize("919876543210", "91").unwrap();
/// let c = PhoneNumber::normalize("+919876543210", "91").unwrap();
/// assert_eq!(a, b);
/// assert_eq!(b, c);
/// assert_eq!(a.as_str(), "+919876543210");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Minimum digits in a normalized number.
    pub const MIN_DIGITS: usize = 9;
    /// Maximum digits in a normalized number (E.164 limit).
    pub const MAX_DIGITS: usize = 15;

    /// Normalize raw user input into canonical international format.
    ///
    /// `default_country_code` is the bare dialing code (e.g. `"91"`) applied
    /// to 10-digit subscriber numbers.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, contains invalid characters,
    /// or normalizes to an out-of-range digit count.
    pub fn normalize(raw: &str, default_country_code: &str) -> Result<Self, PhoneNumberError> {
        let compact: String = raw.chars().filter(|c| *c != ' ' && *c != '-').collect();

        if compact.is_empty() {
            return Err(PhoneNumberError::Empty);
        }

        let (has_plus, digits) = match compact.strip_prefix('+') {
            Some(rest) => (true, rest),
            None => (false, compact.as_str()),
        };

        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(PhoneNumberError::InvalidCharacters);
        }

        let normalized = if has_plus {
            format!("+{digits}")
        } else if digits.starts_with(default_country_code) && digits.len() > 10 {
            format!("+{digits}")
        } else if digits.len() == 10 {
            format!("+{default_country_code}{digits}")
        } else {
            // Over-long bare input: keep the trailing subscriber digits
            let tail: String = digits
                .chars()
                .rev()
                .take(10)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            format!("+{default_country_code}{tail}")
        };

        let digit_count = normalized.len() - 1;
        if !(Self::MIN_DIGITS..=Self::MAX_DIGITS).contains(&digit_count) {
            return Err(PhoneNumberError::InvalidLength {
                min: Self::MIN_DIGITS,
                max: Self::MAX_DIGITS,
            });
        }

        Ok(Self(normalized))
    }

    /// Wrap an already-canonical value (e.g. read back from the database).
    #[must_use]
    pub const fn from_canonical(s: String) -> Self {
        Self(s)
    }

    /// Returns the phone number as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `PhoneNumber` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for PhoneNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// SQLx support (with postgres feature)
#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for PhoneNumber {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for PhoneNumber {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        // Database values are stored normalized
        Ok(Self(s))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for PhoneNumber {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_ten_digits_gets_default_country_code() {
        let phone = PhoneNumber::normalize("9876543210", "91").unwrap();
        assert_eq!(phone.as_str(), "+919876543210");
    }

    #[test]
    fn test_spaces_and_hyphens_stripped() {
        let phone = PhoneNumber::normalize("98765-432 10", "91").unwrap();
        assert_eq!(phone.as_str(), "+919876543210");
    }

    #[test]
    fn test_existing_plus_prefix_kept() {
        let phone = PhoneNumber::normalize("+14155552671", "91").unwrap();
        assert_eq!(phone.as_str(), "+14155552671");
    }

    #[test]
    fn test_bare_country_code_prefix_gets_plus() {
        let phone = PhoneNumber::normalize("919876543210", "91").unwrap();
        assert_eq!(phone.as_str(), "+919876543210");
    }

    #[test]
    fn test_overlong_input_keeps_trailing_digits() {
        let phone = PhoneNumber::normalize("009876543210", "91").unwrap();
        assert_eq!(phone.as_str(), "+919876543210");
    }

    #[test]
    fn test_empty_rejected() {
        assert!(matches!(
            PhoneNumber::normalize("", "91"),
            Err(PhoneNumberError::Empty)
        ));
        assert!(matches!(
            PhoneNumber::normalize(" - ", "91"),
            Err(PhoneNumberError::Empty)
        ));
    }

    #[test]
    fn test_letters_rejected() {
        assert!(matches!(
            PhoneNumber::normalize("98765abcde", "91"),
            Err(PhoneNumberError::InvalidCharacters)
        ));
    }

    #[test]
    fn test_too_short_rejected() {
        assert!(matches!(
            PhoneNumber::normalize("+12345", "91"),
            Err(PhoneNumberError::InvalidLength { .. })
        ));
    }

    #[test]
    fn test_same_number_same_canonical_form() {
        let variants = ["9876543210", "98765 43210", "919876543210", "+919876543210"];
        let canonical: Vec<_> = variants
            .iter()
            .map(|v| PhoneNumber::normalize(v, "91").unwrap())
            .collect();
        assert!(canonical.iter().all(|p| p == &canonical[0]));
    }
}
