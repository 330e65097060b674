//! Seller Agent - owns the listing, the countdown and the final decision
//!
//! The seller:
//! 1. Publishes a listing and starts the auction through the auctioneer
//! 2. Keeps its own view of bids, fed only by auctioneer relays
//! 3. Counts down once per tick and honors time-extension requests
//! 4. Finalizes on expiry or manual stop, whichever comes first
//!
//! Finalization is guarded by the phase: only an Open auction can be
//! finalized, so a stop racing with expiry produces one outcome.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::time::Duration;

use chrono::Utc;
use gavel_types::{
    validate_duration, AuctionEvent, Envelope, Listing, Message, ParticipantId, Price,
    ValidationError, TIME_EXTENSION_SECS,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::events::EventSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SellerPhase {
    Idle,
    AwaitingStart,
    Open,
    Closed,
}

impl fmt::Display for SellerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SellerError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Cannot {operation} while {phase}")]
    InvalidPhase {
        operation: &'static str,
        phase: SellerPhase,
    },

    #[error("Seller actor has stopped")]
    ActorStopped,
}

pub type Result<T> = std::result::Result<T, SellerError>;

/// Seller timing configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SellerConfig {
    /// Seconds added per time-extension request
    pub extension_secs: u64,
    /// Interval between countdown ticks; each tick is one second of auction time
    pub tick: Duration,
}

impl Default for SellerConfig {
    fn default() -> Self {
        Self {
            extension_secs: TIME_EXTENSION_SECS,
            tick: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum AuctionOutcome {
    Sold {
        item: String,
        winner: ParticipantId,
        amount: Price,
    },
    Unsold {
        item: String,
    },
}

impl AuctionOutcome {
    pub fn item(&self) -> &str {
        match self {
            Self::Sold { item, .. } | Self::Unsold { item } => item,
        }
    }

    pub fn is_sold(&self) -> bool {
        matches!(self, Self::Sold { .. })
    }
}

impl fmt::Display for AuctionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sold {
                item,
                winner,
                amount,
            } => write!(f, "{item} sold to {winner} for {amount}"),
            Self::Unsold { item } => write!(f, "{item} unsold"),
        }
    }
}

/// Outcome of one finalization plus the messages announcing it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finalization {
    pub outcome: AuctionOutcome,
    pub outbox: Vec<Envelope>,
}

#[derive(Debug, Clone, Copy)]
struct ObservedBid {
    amount: Price,
    seq: u64,
}

/// Snapshot for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellerStatus {
    pub phase: SellerPhase,
    pub listing: Option<Listing>,
    pub remaining_secs: u64,
    /// Observed bids, highest first
    pub bids: Vec<(ParticipantId, Price)>,
}

/// The Seller Agent
pub struct Seller {
    id: ParticipantId,
    auctioneer: ParticipantId,
    config: SellerConfig,
    events: EventSink,
    phase: SellerPhase,
    listing: Option<Listing>,
    remaining_secs: u64,
    observed: HashMap<ParticipantId, ObservedBid>,
    next_seq: u64,
}

impl Seller {
    pub fn new(
        id: ParticipantId,
        auctioneer: ParticipantId,
        config: SellerConfig,
        events: EventSink,
    ) -> Self {
        Self {
            id,
            auctioneer,
            config,
            events,
            phase: SellerPhase::Idle,
            listing: None,
            remaining_secs: 0,
            observed: HashMap::new(),
            next_seq: 0,
        }
    }

    pub fn id(&self) -> &ParticipantId {
        &self.id
    }

    pub fn phase(&self) -> SellerPhase {
        self.phase
    }

    pub fn listing(&self) -> Option<&Listing> {
        self.listing.as_ref()
    }

    pub fn remaining_secs(&self) -> u64 {
        self.remaining_secs
    }

    pub fn config(&self) -> &SellerConfig {
        &self.config
    }

    /// Bid observed for a bidder in the current session
    pub fn observed_bid(&self, bidder: &ParticipantId) -> Option<Price> {
        self.observed.get(bidder).map(|b| b.amount)
    }

    pub fn status(&self) -> SellerStatus {
        let mut bids: Vec<_> = self
            .observed
            .iter()
            .map(|(bidder, bid)| (bidder.clone(), *bid))
            .collect();
        bids.sort_by(|a, b| b.1.amount.cmp(&a.1.amount).then(a.1.seq.cmp(&b.1.seq)));
        SellerStatus {
            phase: self.phase,
            listing: self.listing.clone(),
            remaining_secs: self.remaining_secs,
            bids: bids.into_iter().map(|(bidder, bid)| (bidder, bid.amount)).collect(),
        }
    }

    /// Validate and announce a listing
    ///
    /// Publishing again before START replaces the pending listing.
    pub fn publish(&mut self, item: &str, reserve_price: Price) -> Result<Envelope> {
        if !matches!(self.phase, SellerPhase::Idle | SellerPhase::AwaitingStart) {
            return Err(SellerError::InvalidPhase {
                operation: "publish",
                phase: self.phase,
            });
        }
        let listing = Listing::new(item, reserve_price)?;

        tracing::info!(item = %listing.item(), %reserve_price, "Publishing offer");
        let envelope = Envelope::to_one(
            &self.id,
            &self.auctioneer,
            &Message::Publish {
                item: listing.item().to_string(),
                reserve_price,
            },
        );
        self.events.emit(AuctionEvent::ListingPublished {
            item: listing.item().to_string(),
            reserve_price,
            timestamp: Utc::now(),
        });
        self.listing = Some(listing);
        self.transition(SellerPhase::AwaitingStart);
        Ok(envelope)
    }

    /// Open the published listing for `duration_secs`
    pub fn start(&mut self, duration_secs: u64) -> Result<Envelope> {
        let listing = match (&self.phase, &self.listing) {
            (SellerPhase::AwaitingStart, Some(listing)) => listing.clone(),
            _ => {
                return Err(SellerError::InvalidPhase {
                    operation: "start",
                    phase: self.phase,
                })
            }
        };
        let duration_secs = validate_duration(duration_secs)?;

        tracing::info!(item = %listing.item(), duration_secs, "Starting auction");
        self.remaining_secs = duration_secs;
        self.observed.clear();
        self.next_seq = 0;
        self.transition(SellerPhase::Open);

        Ok(Envelope::to_one(
            &self.id,
            &self.auctioneer,
            &Message::Start {
                item: listing.item().to_string(),
                reserve_price: listing.reserve_price(),
                duration_secs,
            },
        ))
    }

    /// One second of auction time elapsed
    pub fn tick(&mut self) -> Option<Finalization> {
        if self.phase != SellerPhase::Open {
            return None;
        }
        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        tracing::debug!(remaining_secs = self.remaining_secs, "Countdown");
        self.events.emit(AuctionEvent::CountdownTick {
            remaining_secs: self.remaining_secs,
            timestamp: Utc::now(),
        });
        if self.remaining_secs == 0 {
            tracing::info!("Time expired");
            return self.finalize();
        }
        None
    }

    /// Operator stop; a no-op unless the auction is Open
    pub fn stop(&mut self) -> Option<Finalization> {
        tracing::info!(phase = %self.phase, "Stop requested");
        self.finalize()
    }

    /// Decide the winner, announce it, and reset for the next listing
    pub fn finalize(&mut self) -> Option<Finalization> {
        if self.phase != SellerPhase::Open {
            tracing::debug!(phase = %self.phase, "Nothing to finalize");
            return None;
        }
        let listing = self.listing.clone()?;
        self.transition(SellerPhase::Closed);

        let item = listing.item().to_string();
        let winner = self
            .observed
            .iter()
            .max_by(|a, b| a.1.amount.cmp(&b.1.amount).then(b.1.seq.cmp(&a.1.seq)))
            .filter(|(_, bid)| bid.amount >= listing.reserve_price())
            .map(|(bidder, bid)| (bidder.clone(), bid.amount));

        let mut outbox = Vec::new();
        let outcome = match winner {
            Some((winner, amount)) => {
                tracing::info!(%item, %winner, %amount, "Auction sold");
                outbox.push(Envelope::to_one(
                    &self.id,
                    &winner,
                    &Message::Accept {
                        item: item.clone(),
                        amount,
                    },
                ));
                let losers = self.observed.keys().filter(|bidder| **bidder != winner);
                outbox.extend(Envelope::to_many(
                    &self.id,
                    losers,
                    &Message::Lost { item: item.clone() },
                ));
                self.events.emit(AuctionEvent::AuctionSold {
                    item: item.clone(),
                    winner: winner.clone(),
                    amount,
                    timestamp: Utc::now(),
                });
                AuctionOutcome::Sold {
                    item: item.clone(),
                    winner,
                    amount,
                }
            }
            None => {
                tracing::info!(%item, bidders = self.observed.len(), "Auction unsold");
                outbox.extend(Envelope::to_many(
                    &self.id,
                    self.observed.keys(),
                    &Message::NoSale { item: item.clone() },
                ));
                self.events.emit(AuctionEvent::AuctionUnsold {
                    item: item.clone(),
                    timestamp: Utc::now(),
                });
                AuctionOutcome::Unsold { item: item.clone() }
            }
        };
        outbox.push(Envelope::to_one(
            &self.id,
            &self.auctioneer,
            &Message::Closed { item },
        ));

        self.listing = None;
        self.remaining_secs = 0;
        self.observed.clear();
        self.transition(SellerPhase::Idle);

        Some(Finalization { outcome, outbox })
    }

    /// Decode and dispatch one inbound envelope
    pub fn handle(&mut self, envelope: Envelope) -> Vec<Envelope> {
        let message = match envelope.decode() {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(sender = %envelope.sender, error = %e, "Dropping malformed message");
                self.events.dropped(&self.id, e.to_string());
                return Vec::new();
            }
        };

        match message {
            Message::Relay { bidder, amount } => {
                self.on_relay(&envelope.sender, bidder, amount);
                Vec::new()
            }
            Message::MoreTime => self.on_time_extension_request(&envelope.sender),
            other => {
                tracing::warn!(
                    sender = %envelope.sender,
                    performative = %envelope.performative,
                    "Seller does not accept this message"
                );
                self.events
                    .dropped(&self.id, format!("unexpected {:?}", other.performative()));
                Vec::new()
            }
        }
    }

    /// Record an admitted bid relayed by the auctioneer
    pub fn on_relay(&mut self, sender: &ParticipantId, bidder: ParticipantId, amount: Price) {
        if *sender != self.auctioneer {
            tracing::warn!(%sender, %bidder, "Ignoring relay not sent by the auctioneer");
            self.events.dropped(&self.id, "relay from non-auctioneer");
            return;
        }
        if self.phase != SellerPhase::Open {
            tracing::info!(%bidder, %amount, phase = %self.phase, "Late relay discarded");
            self.events.dropped(&self.id, "relay after close");
            return;
        }
        if self.observed_bid(&bidder).is_some_and(|known| amount <= known) {
            tracing::debug!(%bidder, %amount, "Relay does not raise bidder's bid");
            return;
        }

        tracing::info!(%bidder, %amount, "Bid received");
        let seq = self.next_seq;
        self.next_seq += 1;
        self.observed.insert(bidder, ObservedBid { amount, seq });
        self.events.emit(AuctionEvent::MaxBidUpdated {
            participant: self.id.clone(),
            amount,
            timestamp: Utc::now(),
        });
    }

    /// Extend the countdown and tell every known bidder
    pub fn on_time_extension_request(&mut self, requester: &ParticipantId) -> Vec<Envelope> {
        if self.phase != SellerPhase::Open {
            tracing::debug!(%requester, phase = %self.phase, "No open auction to extend");
            self.events.dropped(&self.id, "time extension while not open");
            return Vec::new();
        }
        self.remaining_secs = self.remaining_secs.saturating_add(self.config.extension_secs);
        tracing::info!(%requester, remaining_secs = self.remaining_secs, "Time extended");
        self.events.emit(AuctionEvent::TimeExtended {
            remaining_secs: self.remaining_secs,
            timestamp: Utc::now(),
        });

        let recipients: BTreeSet<&ParticipantId> = self
            .observed
            .keys()
            .chain(std::iter::once(requester))
            .collect();
        Envelope::to_many(
            &self.id,
            recipients,
            &Message::TimeExtended {
                remaining_secs: self.remaining_secs,
            },
        )
        .into_iter()
        .collect()
    }

    fn transition(&mut self, to: SellerPhase) {
        if self.phase != to {
            self.events.phase_changed(&self.id, self.phase, to);
            self.phase = to;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gavel_types::Performative;
    use rust_decimal_macros::dec;

    fn id(s: &str) -> ParticipantId {
        ParticipantId::parse(s).unwrap()
    }

    fn seller() -> Seller {
        Seller::new(
            ParticipantId::seller(),
            ParticipantId::auctioneer(),
            SellerConfig::default(),
            EventSink::default(),
        )
    }

    fn open(reserve: Price, secs: u64) -> Seller {
        let mut s = seller();
        s.publish("Painting", reserve).unwrap();
        s.start(secs).unwrap();
        s
    }

    fn relay(s: &mut Seller, bidder: &str, amount: Price) {
        s.on_relay(&ParticipantId::auctioneer(), id(bidder), amount);
    }

    #[test]
    fn test_publish_validates() {
        let mut s = seller();
        assert!(matches!(
            s.publish("", dec!(100)),
            Err(SellerError::Validation(ValidationError::EmptyItem))
        ));
        assert!(s.publish("Vase", dec!(0)).is_err());
        assert_eq!(s.phase(), SellerPhase::Idle);

        let env = s.publish("Vase", dec!(20)).unwrap();
        assert_eq!(env.content, "PUBLISH;Vase;20");
        assert_eq!(env.recipients, vec![ParticipantId::auctioneer()]);
        assert_eq!(s.phase(), SellerPhase::AwaitingStart);
    }

    #[test]
    fn test_start_requires_publish_and_positive_duration() {
        let mut s = seller();
        assert!(matches!(
            s.start(60),
            Err(SellerError::InvalidPhase {
                operation: "start",
                ..
            })
        ));

        s.publish("Vase", dec!(20)).unwrap();
        assert!(matches!(
            s.start(0),
            Err(SellerError::Validation(ValidationError::NonPositiveDuration))
        ));
        assert_eq!(s.phase(), SellerPhase::AwaitingStart);

        let env = s.start(60).unwrap();
        assert_eq!(env.content, "START;Vase;20;60");
        assert_eq!(s.phase(), SellerPhase::Open);
        assert_eq!(s.remaining_secs(), 60);
    }

    #[test]
    fn test_publish_rejected_while_open() {
        let mut s = open(dec!(100), 10);
        assert!(matches!(
            s.publish("Other", dec!(1)),
            Err(SellerError::InvalidPhase { .. })
        ));
    }

    #[test]
    fn test_expiry_sells_to_highest() {
        let mut s = open(dec!(100), 2);
        relay(&mut s, "buyer-a", dec!(150));
        relay(&mut s, "buyer-b", dec!(160));

        assert!(s.tick().is_none());
        let fin = s.tick().unwrap();

        assert_eq!(
            fin.outcome,
            AuctionOutcome::Sold {
                item: "Painting".to_string(),
                winner: id("buyer-b"),
                amount: dec!(160)
            }
        );
        assert_eq!(fin.outbox.len(), 3);
        assert_eq!(fin.outbox[0].performative, Performative::AcceptProposal);
        assert_eq!(fin.outbox[0].recipients, vec![id("buyer-b")]);
        assert_eq!(fin.outbox[0].content, "Painting;160");
        assert_eq!(fin.outbox[1].recipients, vec![id("buyer-a")]);
        assert_eq!(fin.outbox[1].content, "LOST;Painting");
        assert_eq!(fin.outbox[2].recipients, vec![ParticipantId::auctioneer()]);
        assert_eq!(fin.outbox[2].content, "CLOSED;Painting");

        assert_eq!(s.phase(), SellerPhase::Idle);
        assert!(s.listing().is_none());
    }

    #[test]
    fn test_no_bids_is_unsold() {
        let mut s = open(dec!(100), 1);
        let fin = s.tick().unwrap();
        assert_eq!(
            fin.outcome,
            AuctionOutcome::Unsold {
                item: "Painting".to_string()
            }
        );
        // only the close notice to the auctioneer
        assert_eq!(fin.outbox.len(), 1);
        assert_eq!(fin.outbox[0].content, "CLOSED;Painting");
    }

    #[test]
    fn test_below_reserve_sends_no_accept_or_reject() {
        let mut s = open(dec!(100), 5);
        relay(&mut s, "buyer-a", dec!(90));

        let fin = s.stop().unwrap();

        assert!(!fin.outcome.is_sold());
        assert!(fin.outbox.iter().all(|e| !matches!(
            e.performative,
            Performative::AcceptProposal | Performative::RejectProposal
        )));
        assert_eq!(fin.outbox[0].content, "NO_SALE;Painting");
    }

    #[test]
    fn test_bid_equal_to_reserve_sells() {
        let mut s = open(dec!(100), 5);
        relay(&mut s, "buyer-a", dec!(100));
        assert!(s.stop().unwrap().outcome.is_sold());
    }

    #[test]
    fn test_stop_then_expiry_finalizes_once() {
        let mut s = open(dec!(100), 1);
        relay(&mut s, "buyer-a", dec!(150));

        assert!(s.stop().is_some());
        assert!(s.tick().is_none());
        assert!(s.stop().is_none());
        assert!(s.finalize().is_none());
    }

    #[test]
    fn test_tie_goes_to_earliest_observed() {
        let mut s = open(dec!(10), 5);
        relay(&mut s, "buyer-b", dec!(20));
        relay(&mut s, "buyer-a", dec!(20));
        match s.stop().unwrap().outcome {
            AuctionOutcome::Sold { winner, .. } => assert_eq!(winner, id("buyer-b")),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_relay_rules() {
        let mut s = open(dec!(100), 5);

        // only the auctioneer may relay
        s.on_relay(&id("buyer-a"), id("buyer-a"), dec!(500));
        assert_eq!(s.observed_bid(&id("buyer-a")), None);

        relay(&mut s, "buyer-a", dec!(150));
        relay(&mut s, "buyer-a", dec!(140));
        assert_eq!(s.observed_bid(&id("buyer-a")), Some(dec!(150)));

        s.stop();
        relay(&mut s, "buyer-a", dec!(999));
        assert_eq!(s.observed_bid(&id("buyer-a")), None);
    }

    #[test]
    fn test_time_extension_adds_exactly_thirty() {
        let mut s = open(dec!(100), 10);
        relay(&mut s, "buyer-a", dec!(150));
        s.tick();
        assert_eq!(s.remaining_secs(), 9);

        let out = s.on_time_extension_request(&id("buyer-b"));

        assert_eq!(s.remaining_secs(), 39);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].content, "TIME_EXTENDED;39");
        assert_eq!(out[0].recipients, vec![id("buyer-a"), id("buyer-b")]);
    }

    #[test]
    fn test_time_extension_saturates_on_long_auction() {
        let mut s = open(dec!(100), u64::MAX - 10);
        let out = s.on_time_extension_request(&id("buyer-a"));

        assert_eq!(s.remaining_secs(), u64::MAX);
        assert_eq!(s.phase(), SellerPhase::Open);
        assert_eq!(out[0].content, format!("TIME_EXTENDED;{}", u64::MAX));

        assert!(s.tick().is_none());
        assert_eq!(s.remaining_secs(), u64::MAX - 1);
    }

    #[test]
    fn test_time_extension_ignored_unless_open() {
        let mut s = seller();
        assert!(s.on_time_extension_request(&id("buyer-a")).is_empty());
        assert_eq!(s.remaining_secs(), 0);
    }

    #[test]
    fn test_status_lists_bids_highest_first() {
        let mut s = open(dec!(100), 5);
        relay(&mut s, "buyer-a", dec!(150));
        relay(&mut s, "buyer-b", dec!(160));
        let status = s.status();
        assert_eq!(status.phase, SellerPhase::Open);
        assert_eq!(
            status.bids,
            vec![(id("buyer-b"), dec!(160)), (id("buyer-a"), dec!(150))]
        );
    }

    #[test]
    fn test_handle_drops_unexpected_messages() {
        let mut s = open(dec!(100), 5);
        let env = Envelope::to_one(
            &id("buyer-a"),
            &ParticipantId::seller(),
            &Message::Bid { amount: dec!(500) },
        );
        assert!(s.handle(env).is_empty());
        assert!(s.status().bids.is_empty());
    }

    #[test]
    fn test_outcome_json() {
        let outcome = AuctionOutcome::Sold {
            item: "Vase".to_string(),
            winner: id("buyer-a"),
            amount: dec!(30),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["result"], "sold");
        assert_eq!(json["winner"], "buyer-a");
    }

    #[test]
    fn test_reset_allows_next_listing() {
        let mut s = open(dec!(100), 1);
        s.tick();
        assert_eq!(s.phase(), SellerPhase::Idle);
        s.publish("Vase", dec!(5)).unwrap();
        s.start(3).unwrap();
        assert_eq!(s.remaining_secs(), 3);
    }
}
