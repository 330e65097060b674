//! Error types for Gavel
//!
//! Validation errors are reported to the operator of the originating role and
//! never transmitted. Codec errors are produced when an inbound envelope is
//! decoded; the receiving role logs and drops the envelope.

use thiserror::Error;

use crate::Performative;

/// Malformed or out-of-range operator input
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Item name is empty after trimming
    #[error("Item name cannot be empty")]
    EmptyItem,

    /// Item name contains the field separator
    #[error("Item name '{item}' must not contain ';'")]
    InvalidItem { item: String },

    /// Reserve price is zero or negative
    #[error("Reserve price must be positive, got {price}")]
    NonPositivePrice { price: String },

    /// Auction duration is zero
    #[error("Auction duration must be positive")]
    NonPositiveDuration,

    /// A number could not be parsed
    #[error("Please enter a valid number, got '{input}'")]
    NotANumber { input: String },

    /// A name token is empty
    #[error("{kind} name cannot be empty")]
    EmptyName { kind: &'static str },

    /// A name token contains reserved characters
    #[error("{kind} name '{name}' contains whitespace or a reserved separator")]
    InvalidName { kind: &'static str, name: String },
}

/// Failure to decode envelope content into a [`crate::Message`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Content is empty
    #[error("Empty content for {performative}")]
    Empty { performative: Performative },

    /// Tag is not defined for the performative
    #[error("Unknown tag '{tag}' for {performative}")]
    UnknownTag {
        performative: Performative,
        tag: String,
    },

    /// Field count does not match the tag
    #[error("{tag}: expected {expected} fields, got {actual}")]
    FieldCount {
        tag: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A numeric field did not parse
    #[error("{tag}: invalid number '{value}'")]
    InvalidNumber { tag: &'static str, value: String },

    /// A field failed validation
    #[error("{tag}: {source}")]
    InvalidField {
        tag: &'static str,
        #[source]
        source: ValidationError,
    },
}
