//! Delivery address type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`DeliveryAddress`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// The input is empty or only whitespace.
    #[error("delivery address cannot be empty")]
    Empty,
    /// The input is too long.
    #[error("delivery address must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
}

/// A free-form delivery address (hostel room, flat, department building).
///
/// ## Constraints
///
/// - Surrounding whitespace is trimmed
/// - Must not be empty after trimming
/// - At most 500 characters
///
/// ## Examples
///
/// ```
/// use campus_market_core::DeliveryAddress;
///
/// assert!(DeliveryAddress::parse("Room 114, Hostel B").is_ok());
/// assert!(DeliveryAddress::parse("   ").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct DeliveryAddress(String);

impl DeliveryAddress {
    /// Maximum length of a delivery address, in characters.
    pub const MAX_LENGTH: usize = 500;

    /// Parse a `DeliveryAddress` from user input.
    ///
    /// # Errors
    ///
    /// Returns an error if the trimmed input is empty or longer than
    /// [`Self::MAX_LENGTH`] characters.
    pub fn parse(s: &str) -> Result<Self, AddressError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(AddressError::Empty);
        }

        if trimmed.chars().count() > Self::MAX_LENGTH {
            return Err(AddressError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `DeliveryAddress` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for DeliveryAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DeliveryAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trims_whitespace() {
        let addr = DeliveryAddress::parse("  Room 12, Block C \n").unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(addr.as_str(), "Room 12, Block C");
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert_eq!(DeliveryAddress::parse(""), Err(AddressError::Empty));
        assert_eq!(DeliveryAddress::parse(" \t "), Err(AddressError::Empty));
    }

    #[test]
    fn test_parse_rejects_too_long() {
        let long = "a".repeat(DeliveryAddress::MAX_LENGTH + 1);
        assert_eq!(
            DeliveryAddress::parse(&long),
            Err(AddressError::TooLong {
                max: DeliveryAddress::MAX_LENGTH
            })
        );
    }

    #[test]
    fn test_max_length_counts_characters_not_bytes() {
        let addr = "é".repeat(DeliveryAddress::MAX_LENGTH);
        assert!(DeliveryAddress::parse(&addr).is_ok());
    }
}
