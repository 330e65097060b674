//! Listing and price types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ValidationError;

/// Prices are exact decimals so the strict-greater admission test never
/// suffers float rounding.
pub type Price = Decimal;

/// Parse an operator-entered amount
pub fn parse_price(input: &str) -> Result<Price, ValidationError> {
    let trimmed = input.trim();
    Decimal::from_str(trimmed).map_err(|_| ValidationError::NotANumber {
        input: trimmed.to_string(),
    })
}

/// Parse an operator-entered duration in seconds
pub fn parse_duration(input: &str) -> Result<u64, ValidationError> {
    let trimmed = input.trim();
    let secs: u64 = trimmed.parse().map_err(|_| ValidationError::NotANumber {
        input: trimmed.to_string(),
    })?;
    validate_duration(secs)
}

/// Reject a zero-length auction
pub fn validate_duration(secs: u64) -> Result<u64, ValidationError> {
    if secs == 0 {
        return Err(ValidationError::NonPositiveDuration);
    }
    Ok(secs)
}

/// Reject an empty or separator-bearing item name
pub fn validate_item(item: &str) -> Result<String, ValidationError> {
    let item = item.trim();
    if item.is_empty() {
        return Err(ValidationError::EmptyItem);
    }
    if item.contains(';') {
        return Err(ValidationError::InvalidItem {
            item: item.to_string(),
        });
    }
    Ok(item.to_string())
}

/// Reject a zero or negative reserve price
pub fn validate_reserve(price: Price) -> Result<Price, ValidationError> {
    if price <= Decimal::ZERO {
        return Err(ValidationError::NonPositivePrice {
            price: price.to_string(),
        });
    }
    Ok(price)
}

/// An item offered for sale with its reserve price
///
/// Created by the Seller when publishing an offer; immutable once an auction
/// starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    item: String,
    reserve_price: Price,
}

impl Listing {
    /// Create a validated listing
    pub fn new(item: &str, reserve_price: Price) -> Result<Self, ValidationError> {
        Ok(Self {
            item: validate_item(item)?,
            reserve_price: validate_reserve(reserve_price)?,
        })
    }

    pub fn item(&self) -> &str {
        &self.item
    }

    pub fn reserve_price(&self) -> Price {
        self.reserve_price
    }
}

impl fmt::Display for Listing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (reserve {})", self.item, self.reserve_price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_listing_trims_item() {
        let listing = Listing::new("  Painting ", dec!(100)).unwrap();
        assert_eq!(listing.item(), "Painting");
        assert_eq!(listing.reserve_price(), dec!(100));
    }

    #[test]
    fn test_listing_validation() {
        assert_eq!(
            Listing::new("   ", dec!(100)),
            Err(ValidationError::EmptyItem)
        );
        assert!(matches!(
            Listing::new("Vase", dec!(0)),
            Err(ValidationError::NonPositivePrice { .. })
        ));
        assert!(matches!(
            Listing::new("Vase", dec!(-5)),
            Err(ValidationError::NonPositivePrice { .. })
        ));
        assert!(matches!(
            Listing::new("a;b", dec!(5)),
            Err(ValidationError::InvalidItem { .. })
        ));
    }

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price(" 150.50 ").unwrap(), dec!(150.50));
        assert!(matches!(
            parse_price("abc"),
            Err(ValidationError::NotANumber { .. })
        ));
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("60").unwrap(), 60);
        assert_eq!(parse_duration("0"), Err(ValidationError::NonPositiveDuration));
        assert!(parse_duration("-3").is_err());
    }
}
