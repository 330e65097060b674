//! Gavel Agents - the three auction roles and their runtime
//!
//! - **Seller**: publishes a listing, runs the countdown, decides the winner
//! - **Auctioneer**: sole admission point for bids, broadcasts the maximum
//! - **Buyer**: bids, manually or through a [`BidStrategy`]
//!
//! # Key Principle
//!
//! **Every role is a single writer.** Role state is owned by one actor task
//! and changed only by the message or command it is currently processing.
//! Role handlers never return errors for inbound traffic: a message that does
//! not fit is logged and dropped.

pub mod auctioneer;
pub mod buyer;
pub mod events;
pub mod house;
pub mod runtime;
pub mod seller;
pub mod strategy;

pub use auctioneer::{Admission, Auctioneer, AuctioneerPhase, AuctioneerStatus, Session};
pub use buyer::{Buyer, BuyerError, BuyerOutcome, BuyerPhase, BuyerStatus, Reaction};
pub use events::{next_outcome, EventSink, DEFAULT_EVENT_CAPACITY};
pub use house::{AuctionHouse, HouseConfig};
pub use runtime::{
    spawn_auctioneer, spawn_buyer, spawn_seller, AuctioneerHandle, BuyerHandle, BuyerOptions,
    RuntimeError, SellerHandle,
};
pub use seller::{
    AuctionOutcome, Finalization, Seller, SellerConfig, SellerError, SellerPhase, SellerStatus,
};
pub use strategy::{BidContext, BidStrategy, IncrementalStrategy, ManualStrategy, StrategyKind};
