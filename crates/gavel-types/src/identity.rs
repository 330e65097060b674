//! Identity types for Gavel
//!
//! Participants and capabilities are strongly typed name tokens. Names travel
//! inside semicolon-delimited message content, so the separator characters
//! are rejected at parse time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

use crate::ValidationError;

/// Characters that may not appear in a name token
const RESERVED_CHARS: &[char] = &[';', ','];

fn check_name(kind: &'static str, s: &str) -> Result<(), ValidationError> {
    if s.is_empty() {
        return Err(ValidationError::EmptyName { kind });
    }
    if s.chars().any(|c| c.is_whitespace() || RESERVED_CHARS.contains(&c)) {
        return Err(ValidationError::InvalidName {
            kind,
            name: s.to_string(),
        });
    }
    Ok(())
}

/// Macro to generate name-token types with common implementations
macro_rules! define_name_type {
    ($name:ident, $kind:literal, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Parse and validate a name token
            pub fn parse(s: &str) -> Result<Self, ValidationError> {
                check_name($kind, s)?;
                Ok(Self(s.to_string()))
            }

            /// Borrow the name
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                check_name($kind, &s)?;
                Ok(Self(s))
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_name_type!(
    ParticipantId,
    "participant",
    "Opaque, comparable token identifying a Seller, Auctioneer or Buyer"
);
define_name_type!(
    Capability,
    "capability",
    "Service type a participant advertises in the directory"
);

impl ParticipantId {
    /// Generate a fresh id of the form `<prefix>-<ulid>`
    ///
    /// Ulids are never reused, so generated ids stay distinct for the
    /// lifetime of an auction.
    pub fn generate(prefix: &str) -> Result<Self, ValidationError> {
        Self::parse(&format!("{}-{}", prefix, Ulid::new().to_string().to_lowercase()))
    }

    /// Well-known id of the auctioneer
    pub fn auctioneer() -> Self {
        Self("auctioneer".to_string())
    }

    /// Well-known id of the seller
    pub fn seller() -> Self {
        Self("seller".to_string())
    }
}

impl Capability {
    /// The capability every bidder registers under
    pub fn buyer() -> Self {
        Self(crate::BUYER_CAPABILITY.to_string())
    }
}
