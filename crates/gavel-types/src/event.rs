//! Presentation events
//!
//! Every state transition and every admitted or rejected bid is published for
//! display (console, JSON stream, dashboard). The core never blocks on them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ParticipantId, Price};

/// Events emitted by the three roles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AuctionEvent {
    /// A role moved between phases
    PhaseChanged {
        participant: ParticipantId,
        from: String,
        to: String,
        timestamp: DateTime<Utc>,
    },

    /// Seller published a listing
    ListingPublished {
        item: String,
        reserve_price: Price,
        timestamp: DateTime<Utc>,
    },

    /// Auctioneer opened bidding
    AuctionOpened {
        item: String,
        reserve_price: Price,
        roster_size: usize,
        timestamp: DateTime<Utc>,
    },

    /// Auctioneer could not open bidding
    StartAborted {
        item: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// Bid became the new maximum
    BidAdmitted {
        bidder: ParticipantId,
        amount: Price,
        timestamp: DateTime<Utc>,
    },

    /// Bid did not beat the maximum
    BidRejected {
        bidder: ParticipantId,
        amount: Price,
        current_max: Price,
        timestamp: DateTime<Utc>,
    },

    /// A buyer learned a new maximum
    MaxBidUpdated {
        participant: ParticipantId,
        amount: Price,
        timestamp: DateTime<Utc>,
    },

    /// Seller countdown advanced
    CountdownTick {
        remaining_secs: u64,
        timestamp: DateTime<Utc>,
    },

    /// Remaining time was extended
    TimeExtended {
        remaining_secs: u64,
        timestamp: DateTime<Utc>,
    },

    /// Winner declared
    AuctionSold {
        item: String,
        winner: ParticipantId,
        amount: Price,
        timestamp: DateTime<Utc>,
    },

    /// No bid met the reserve
    AuctionUnsold {
        item: String,
        timestamp: DateTime<Utc>,
    },

    /// A buyer won
    BuyerWon {
        participant: ParticipantId,
        item: String,
        amount: Price,
        timestamp: DateTime<Utc>,
    },

    /// A buyer lost or the auction closed under it
    BuyerLost {
        participant: ParticipantId,
        item: String,
        timestamp: DateTime<Utc>,
    },

    /// An inbound envelope was discarded
    MessageDropped {
        participant: ParticipantId,
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

impl AuctionEvent {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::PhaseChanged { timestamp, .. }
            | Self::ListingPublished { timestamp, .. }
            | Self::AuctionOpened { timestamp, .. }
            | Self::StartAborted { timestamp, .. }
            | Self::BidAdmitted { timestamp, .. }
            | Self::BidRejected { timestamp, .. }
            | Self::MaxBidUpdated { timestamp, .. }
            | Self::CountdownTick { timestamp, .. }
            | Self::TimeExtended { timestamp, .. }
            | Self::AuctionSold { timestamp, .. }
            | Self::AuctionUnsold { timestamp, .. }
            | Self::BuyerWon { timestamp, .. }
            | Self::BuyerLost { timestamp, .. }
            | Self::MessageDropped { timestamp, .. } => *timestamp,
        }
    }

    /// Outcome events end a session
    pub fn is_outcome(&self) -> bool {
        matches!(self, Self::AuctionSold { .. } | Self::AuctionUnsold { .. })
    }
}
