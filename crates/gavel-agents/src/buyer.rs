//! Buyer Agent - bids in auctions it is invited to
//!
//! The buyer tracks the maximum the auctioneer has broadcast and never
//! trusts its own unconfirmed bid as the new ceiling. A submitted bid only
//! becomes the tracked max once the auctioneer broadcasts it back.

use std::fmt;

use chrono::Utc;
use gavel_directory::{Directory, DirectoryError};
use gavel_types::{
    parse_price, AuctionEvent, Capability, Envelope, Message, ParticipantId, Price,
    ValidationError,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::events::EventSink;
use crate::strategy::BidContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuyerPhase {
    Unregistered,
    Idle,
    Bidding,
}

impl fmt::Display for BuyerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuyerError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Not bidding (buyer is {phase})")]
    NotBidding { phase: BuyerPhase },

    #[error("Bid {amount} does not beat the current maximum {current_max}")]
    BidTooLow { amount: Price, current_max: Price },

    #[error("Directory error: {0}")]
    Directory(#[from] DirectoryError),

    #[error("Buyer actor has stopped")]
    ActorStopped,
}

pub type Result<T> = std::result::Result<T, BuyerError>;

/// How the buyer's last auction ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum BuyerOutcome {
    Won { item: String, amount: Price },
    Lost { item: String },
    NoSale { item: String },
    Closed { item: String },
}

impl BuyerOutcome {
    pub fn item(&self) -> &str {
        match self {
            Self::Won { item, .. }
            | Self::Lost { item }
            | Self::NoSale { item }
            | Self::Closed { item } => item,
        }
    }
}

impl fmt::Display for BuyerOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Won { item, amount } => write!(f, "won {item} for {amount}"),
            Self::Lost { item } => write!(f, "lost {item}"),
            Self::NoSale { item } => write!(f, "{item} was not sold"),
            Self::Closed { item } => write!(f, "{item} closed"),
        }
    }
}

/// What an inbound message did to the buyer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reaction {
    Ignored,
    Invited,
    MaxUpdated,
    TooLow,
    TimeExtended,
    Finished(BuyerOutcome),
}

impl Reaction {
    /// The buyer may want to place a bid now
    pub fn is_bid_opportunity(&self) -> bool {
        matches!(self, Self::Invited | Self::MaxUpdated | Self::TooLow)
    }
}

#[derive(Debug, Clone)]
struct AuctionContext {
    item: String,
    reserve_price: Price,
    tracked_max: Price,
    auctioneer: ParticipantId,
    last_submitted: Option<Price>,
    remaining_secs: Option<u64>,
}

/// Snapshot for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyerStatus {
    pub id: ParticipantId,
    pub phase: BuyerPhase,
    pub item: Option<String>,
    pub tracked_max: Option<Price>,
    pub last_submitted: Option<Price>,
    pub remaining_secs: Option<u64>,
    pub last_outcome: Option<BuyerOutcome>,
}

/// The Buyer Agent
pub struct Buyer {
    id: ParticipantId,
    seller: ParticipantId,
    events: EventSink,
    phase: BuyerPhase,
    context: Option<AuctionContext>,
    last_outcome: Option<BuyerOutcome>,
}

impl Buyer {
    pub fn new(id: ParticipantId, seller: ParticipantId, events: EventSink) -> Self {
        Self {
            id,
            seller,
            events,
            phase: BuyerPhase::Unregistered,
            context: None,
            last_outcome: None,
        }
    }

    pub fn id(&self) -> &ParticipantId {
        &self.id
    }

    pub fn phase(&self) -> BuyerPhase {
        self.phase
    }

    pub fn tracked_max(&self) -> Option<Price> {
        self.context.as_ref().map(|c| c.tracked_max)
    }

    pub fn last_outcome(&self) -> Option<&BuyerOutcome> {
        self.last_outcome.as_ref()
    }

    pub fn status(&self) -> BuyerStatus {
        let ctx = self.context.as_ref();
        BuyerStatus {
            id: self.id.clone(),
            phase: self.phase,
            item: ctx.map(|c| c.item.clone()),
            tracked_max: ctx.map(|c| c.tracked_max),
            last_submitted: ctx.and_then(|c| c.last_submitted),
            remaining_secs: ctx.and_then(|c| c.remaining_secs),
            last_outcome: self.last_outcome.clone(),
        }
    }

    /// Advertise the buyer capability; later calls are no-ops
    pub async fn register(&mut self, directory: &dyn Directory) -> Result<bool> {
        if self.phase != BuyerPhase::Unregistered {
            return Ok(false);
        }
        let added = directory.register(&self.id, &Capability::buyer()).await?;
        tracing::info!(participant = %self.id, "Registered as buyer");
        self.transition(BuyerPhase::Idle);
        Ok(added)
    }

    /// Withdraw from the directory
    pub async fn deregister(&mut self, directory: &dyn Directory) -> Result<()> {
        if self.phase == BuyerPhase::Unregistered {
            return Ok(());
        }
        directory.deregister(&self.id).await?;
        tracing::info!(participant = %self.id, "Deregistered");
        self.context = None;
        self.transition(BuyerPhase::Unregistered);
        Ok(())
    }

    /// Build a bid for the auctioneer
    ///
    /// The tracked max is left alone; it moves only on the auctioneer's
    /// broadcast.
    pub fn submit_bid(&mut self, amount: Price) -> Result<Envelope> {
        let phase = self.phase;
        let ctx = self
            .context
            .as_mut()
            .filter(|_| phase == BuyerPhase::Bidding)
            .ok_or(BuyerError::NotBidding { phase })?;
        if amount <= ctx.tracked_max {
            return Err(BuyerError::BidTooLow {
                amount,
                current_max: ctx.tracked_max,
            });
        }

        tracing::info!(participant = %self.id, item = %ctx.item, %amount, "Submitting bid");
        ctx.last_submitted = Some(amount);
        Ok(Envelope::to_one(
            &self.id,
            &ctx.auctioneer,
            &Message::Bid { amount },
        ))
    }

    /// Parse operator input, then [`Buyer::submit_bid`]
    pub fn submit_bid_str(&mut self, input: &str) -> Result<Envelope> {
        let amount = parse_price(input)?;
        self.submit_bid(amount)
    }

    /// Ask the seller for more time; local state is untouched
    pub fn request_more_time(&self) -> Result<Envelope> {
        if self.phase != BuyerPhase::Bidding {
            return Err(BuyerError::NotBidding { phase: self.phase });
        }
        tracing::info!(participant = %self.id, "Requesting more time");
        Ok(Envelope::to_one(&self.id, &self.seller, &Message::MoreTime))
    }

    /// Context for a strategy, if a bid makes sense now
    ///
    /// `None` when not bidding or while an own bid is still unconfirmed.
    pub fn bid_context(&self) -> Option<BidContext<'_>> {
        if self.phase != BuyerPhase::Bidding {
            return None;
        }
        let ctx = self.context.as_ref()?;
        if ctx.last_submitted.is_some_and(|s| s > ctx.tracked_max) {
            return None;
        }
        Some(BidContext {
            item: &ctx.item,
            reserve_price: ctx.reserve_price,
            current_max: ctx.tracked_max,
            leading: ctx.last_submitted == Some(ctx.tracked_max),
        })
    }

    /// Decode and apply one inbound envelope
    pub fn handle(&mut self, envelope: Envelope) -> Reaction {
        let message = match envelope.decode() {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(
                    participant = %self.id,
                    sender = %envelope.sender,
                    error = %e,
                    "Dropping malformed message"
                );
                self.events.dropped(&self.id, e.to_string());
                return Reaction::Ignored;
            }
        };

        match message {
            Message::CallForProposals {
                item,
                reserve_price,
            } => self.on_call_for_proposals(item, reserve_price, envelope.sender),
            Message::MaxBid { amount } => self.on_max_bid(amount),
            Message::BidTooLow { current_max } => self.on_bid_too_low(current_max),
            Message::TimeExtended { remaining_secs } => self.on_time_extended(remaining_secs),
            Message::Accept { item, amount } => self.settle(BuyerOutcome::Won { item, amount }),
            Message::Lost { item } => self.settle(BuyerOutcome::Lost { item }),
            Message::NoSale { item } => self.finish_if_current(BuyerOutcome::NoSale { item }),
            Message::Closed { item } => self.finish_if_current(BuyerOutcome::Closed { item }),
            other => {
                tracing::warn!(
                    participant = %self.id,
                    sender = %envelope.sender,
                    performative = %envelope.performative,
                    "Buyer does not accept this message"
                );
                self.events
                    .dropped(&self.id, format!("unexpected {:?}", other.performative()));
                Reaction::Ignored
            }
        }
    }

    fn on_call_for_proposals(
        &mut self,
        item: String,
        reserve_price: Price,
        auctioneer: ParticipantId,
    ) -> Reaction {
        if self.phase != BuyerPhase::Idle {
            tracing::debug!(participant = %self.id, %item, phase = %self.phase, "Ignoring CFP");
            self.events.dropped(&self.id, "call for proposals while not idle");
            return Reaction::Ignored;
        }
        tracing::info!(participant = %self.id, %item, %reserve_price, "Invited to bid");
        self.context = Some(AuctionContext {
            item,
            reserve_price,
            tracked_max: reserve_price,
            auctioneer,
            last_submitted: None,
            remaining_secs: None,
        });
        self.transition(BuyerPhase::Bidding);
        Reaction::Invited
    }

    fn on_max_bid(&mut self, amount: Price) -> Reaction {
        if self.phase != BuyerPhase::Bidding {
            return self.ignore("max bid while not bidding");
        }
        if let Some(ctx) = self.context.as_mut() {
            ctx.tracked_max = amount;
        }
        tracing::debug!(participant = %self.id, %amount, "Max bid updated");
        self.events.emit(AuctionEvent::MaxBidUpdated {
            participant: self.id.clone(),
            amount,
            timestamp: Utc::now(),
        });
        Reaction::MaxUpdated
    }

    fn on_bid_too_low(&mut self, current_max: Price) -> Reaction {
        if self.phase != BuyerPhase::Bidding {
            return self.ignore("rejection while not bidding");
        }
        if let Some(ctx) = self.context.as_mut() {
            ctx.last_submitted = None;
            ctx.tracked_max = ctx.tracked_max.max(current_max);
        }
        tracing::info!(participant = %self.id, %current_max, "Bid rejected as too low");
        Reaction::TooLow
    }

    fn on_time_extended(&mut self, remaining_secs: u64) -> Reaction {
        if self.phase != BuyerPhase::Bidding {
            return self.ignore("time update while not bidding");
        }
        if let Some(ctx) = self.context.as_mut() {
            ctx.remaining_secs = Some(remaining_secs);
        }
        tracing::info!(participant = %self.id, remaining_secs, "Auction extended");
        Reaction::TimeExtended
    }

    /// ACCEPT and LOST may race with CLOSED, so they are honoured with or
    /// without a context, but never against a different item's context
    fn settle(&mut self, outcome: BuyerOutcome) -> Reaction {
        let current = self.context.as_ref().map(|ctx| ctx.item.clone());
        match current {
            Some(current) if current != outcome.item() => {
                tracing::debug!(
                    participant = %self.id,
                    item = outcome.item(),
                    %current,
                    "Outcome for an earlier auction"
                );
                self.record(outcome);
                Reaction::Ignored
            }
            Some(_) => self.finish(outcome),
            None => {
                self.record(outcome.clone());
                Reaction::Finished(outcome)
            }
        }
    }

    /// Clear the auction context and return to Idle
    fn finish(&mut self, outcome: BuyerOutcome) -> Reaction {
        self.context = None;
        self.record(outcome.clone());
        if self.phase == BuyerPhase::Bidding {
            self.transition(BuyerPhase::Idle);
        }
        Reaction::Finished(outcome)
    }

    fn record(&mut self, outcome: BuyerOutcome) {
        tracing::info!(participant = %self.id, %outcome, "Auction over");
        let event = match &outcome {
            BuyerOutcome::Won { item, amount } => Some(AuctionEvent::BuyerWon {
                participant: self.id.clone(),
                item: item.clone(),
                amount: *amount,
                timestamp: Utc::now(),
            }),
            BuyerOutcome::Lost { item } => Some(AuctionEvent::BuyerLost {
                participant: self.id.clone(),
                item: item.clone(),
                timestamp: Utc::now(),
            }),
            BuyerOutcome::NoSale { .. } | BuyerOutcome::Closed { .. } => None,
        };
        if let Some(event) = event {
            self.events.emit(event);
        }
        self.last_outcome = Some(outcome);
    }

    /// NO_SALE and CLOSED only end the auction they name
    fn finish_if_current(&mut self, outcome: BuyerOutcome) -> Reaction {
        let item = outcome.item();
        let current = self
            .context
            .as_ref()
            .is_some_and(|c| self.phase == BuyerPhase::Bidding && c.item == item);
        if !current {
            tracing::debug!(participant = %self.id, %item, "Notice for another auction");
            return Reaction::Ignored;
        }
        self.finish(outcome)
    }

    fn ignore(&self, reason: &str) -> Reaction {
        tracing::debug!(participant = %self.id, phase = %self.phase, reason, "Ignoring message");
        self.events.dropped(&self.id, reason);
        Reaction::Ignored
    }

    fn transition(&mut self, to: BuyerPhase) {
        if self.phase != to {
            self.events.phase_changed(&self.id, self.phase, to);
            self.phase = to;
        }
    }
}
