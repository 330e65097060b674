//! Gavel Types - Canonical types for the ascending-price auction protocol
//!
//! This crate has zero dependencies on other gavel crates. It defines:
//!
//! - Identity types (`ParticipantId`, `Capability`)
//! - Listings and decimal prices
//! - Envelopes, performatives, and the closed set of decoded messages
//! - Presentation events
//! - Validation and codec errors
//!
//! # Protocol Flow
//!
//! ```text
//! Seller --PUBLISH/START--> Auctioneer --CFP/MAX_BID--> Buyers
//! Buyers --BID--> Auctioneer --RELAY--> Seller --ACCEPT/LOST--> Buyers
//! ```

pub mod identity;
pub mod listing;
pub mod message;
pub mod event;
pub mod error;

pub use identity::*;
pub use listing::*;
pub use message::*;
pub use event::*;
pub use error::*;

/// Capability buyers register under in the directory
pub const BUYER_CAPABILITY: &str = "buyer";

/// Seconds added by one time-extension request
pub const TIME_EXTENSION_SECS: u64 = 30;

/// Default auction length when the operator does not choose one
pub const DEFAULT_DURATION_SECS: u64 = 60;
