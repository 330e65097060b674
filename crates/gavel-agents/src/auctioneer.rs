//! Auctioneer Agent - tracks the maximum bid, admits or rejects bids
//!
//! The auctioneer mediates every bid:
//! 1. Records the listing a seller publishes
//! 2. On START, resolves the buyer roster and issues a call-for-proposals
//! 3. Admits a bid iff it is strictly greater than the current maximum
//! 4. Relays admitted bids to the seller and broadcasts the new maximum
//!
//! All state is owned by one `Auctioneer` value and mutated only from its
//! message loop, so two bids are never evaluated against the same maximum.
//! When bids from different buyers race, the one processed first wins the
//! comparison; which one that is depends on delivery order and is not
//! deterministic across runs.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use gavel_directory::Directory;
use gavel_types::{
    AuctionEvent, Capability, Envelope, Listing, Message, ParticipantId, Price,
};
use serde::{Deserialize, Serialize};

use crate::events::EventSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuctioneerPhase {
    Idle,
    Open,
}

impl fmt::Display for AuctioneerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Result of applying the admission rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Admitted { previous_max: Price },
    Rejected { current_max: Price },
}

/// One open auction as seen by the auctioneer
#[derive(Debug, Clone)]
pub struct Session {
    listing: Listing,
    seller: ParticipantId,
    current_max: Price,
    bids: HashMap<ParticipantId, Price>,
    highest_bidder: Option<ParticipantId>,
    roster: BTreeSet<ParticipantId>,
}

impl Session {
    pub fn new(listing: Listing, seller: ParticipantId, roster: BTreeSet<ParticipantId>) -> Self {
        Self {
            current_max: listing.reserve_price(),
            listing,
            seller,
            bids: HashMap::new(),
            highest_bidder: None,
            roster,
        }
    }

    /// Strict-increase admission; ties go to the earlier bidder
    pub fn evaluate(&mut self, bidder: &ParticipantId, amount: Price) -> Admission {
        if amount <= self.current_max {
            return Admission::Rejected {
                current_max: self.current_max,
            };
        }
        let previous_max = self.current_max;
        self.current_max = amount;
        self.bids.insert(bidder.clone(), amount);
        self.highest_bidder = Some(bidder.clone());
        Admission::Admitted { previous_max }
    }

    pub fn listing(&self) -> &Listing {
        &self.listing
    }

    pub fn current_max(&self) -> Price {
        self.current_max
    }

    pub fn highest_bidder(&self) -> Option<&ParticipantId> {
        self.highest_bidder.as_ref()
    }

    pub fn bid_of(&self, bidder: &ParticipantId) -> Option<Price> {
        self.bids.get(bidder).copied()
    }

    pub fn roster(&self) -> &BTreeSet<ParticipantId> {
        &self.roster
    }
}

/// Snapshot for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctioneerStatus {
    pub phase: AuctioneerPhase,
    pub item: Option<String>,
    pub current_max: Option<Price>,
    pub highest_bidder: Option<ParticipantId>,
    pub roster_size: usize,
    pub bid_count: usize,
}

/// The Auctioneer Agent
pub struct Auctioneer {
    id: ParticipantId,
    directory: Arc<dyn Directory>,
    events: EventSink,
    pending: Option<(Listing, ParticipantId)>,
    session: Option<Session>,
}

impl Auctioneer {
    pub fn new(id: ParticipantId, directory: Arc<dyn Directory>, events: EventSink) -> Self {
        Self {
            id,
            directory,
            events,
            pending: None,
            session: None,
        }
    }

    pub fn id(&self) -> &ParticipantId {
        &self.id
    }

    pub fn phase(&self) -> AuctioneerPhase {
        if self.session.is_some() {
            AuctioneerPhase::Open
        } else {
            AuctioneerPhase::Idle
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn pending_listing(&self) -> Option<&Listing> {
        self.pending.as_ref().map(|(listing, _)| listing)
    }

    pub fn status(&self) -> AuctioneerStatus {
        AuctioneerStatus {
            phase: self.phase(),
            item: self.session.as_ref().map(|s| s.listing.item().to_string()),
            current_max: self.session.as_ref().map(|s| s.current_max),
            highest_bidder: self.session.as_ref().and_then(|s| s.highest_bidder.clone()),
            roster_size: self.session.as_ref().map_or(0, |s| s.roster.len()),
            bid_count: self.session.as_ref().map_or(0, |s| s.bids.len()),
        }
    }

    /// Decode and dispatch one inbound envelope
    pub async fn handle(&mut self, envelope: Envelope) -> Vec<Envelope> {
        let message = match envelope.decode() {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(sender = %envelope.sender, error = %e, "Dropping malformed message");
                self.events.dropped(&self.id, e.to_string());
                return Vec::new();
            }
        };

        match message {
            Message::Publish {
                item,
                reserve_price,
            } => {
                self.on_publish(&item, reserve_price, envelope.sender);
                Vec::new()
            }
            Message::Start {
                item,
                reserve_price,
                ..
            } => self.on_start(&item, reserve_price, envelope.sender).await,
            Message::Bid { amount } => self.on_bid(&envelope.sender, amount),
            Message::Closed { item } => self.on_closed(&item, &envelope.sender),
            other => {
                tracing::warn!(
                    sender = %envelope.sender,
                    performative = %envelope.performative,
                    "Auctioneer does not accept this message"
                );
                self.events
                    .dropped(&self.id, format!("unexpected {:?}", other.performative()));
                Vec::new()
            }
        }
    }

    /// Record a pending listing; bidding stays closed
    pub fn on_publish(&mut self, item: &str, reserve_price: Price, seller: ParticipantId) {
        match Listing::new(item, reserve_price) {
            Ok(listing) => {
                tracing::info!(%item, %reserve_price, %seller, "New offer published");
                self.pending = Some((listing, seller));
            }
            Err(e) => {
                tracing::warn!(%seller, error = %e, "Ignoring invalid publication");
                self.events.dropped(&self.id, e.to_string());
            }
        }
    }

    /// Open a session if buyers can be found
    pub async fn on_start(
        &mut self,
        item: &str,
        reserve_price: Price,
        seller: ParticipantId,
    ) -> Vec<Envelope> {
        if let Some(session) = &self.session {
            tracing::warn!(
                open_item = %session.listing.item(),
                requested_item = %item,
                "Auction already open, ignoring START"
            );
            self.events.dropped(&self.id, "auction already open");
            return Vec::new();
        }

        match &self.pending {
            Some((_, publisher)) if *publisher != seller => {
                tracing::warn!(
                    %seller,
                    %publisher,
                    %item,
                    "START from a participant other than the publisher"
                );
                self.events.dropped(
                    &self.id,
                    format!("start from {seller}, listing published by {publisher}"),
                );
                return Vec::new();
            }
            Some((pending, _))
                if pending.item() != item || pending.reserve_price() != reserve_price =>
            {
                tracing::warn!(
                    %seller,
                    published = %pending,
                    %item,
                    %reserve_price,
                    "START differs from the published listing"
                );
            }
            Some(_) => {}
            None => tracing::warn!(%seller, %item, "START without a published listing"),
        }

        let listing = match Listing::new(item, reserve_price) {
            Ok(listing) => listing,
            Err(e) => {
                tracing::warn!(%seller, error = %e, "Ignoring START with invalid listing");
                self.events.dropped(&self.id, e.to_string());
                return Vec::new();
            }
        };

        let roster = match self.directory.find_by_capability(&Capability::buyer()).await {
            Ok(roster) => roster,
            Err(e) => {
                tracing::warn!(%item, error = %e, "Buyer lookup failed, auction not started");
                self.abort_start(item, e.to_string());
                return Vec::new();
            }
        };
        if roster.is_empty() {
            tracing::info!(%item, "No buyers found, auction not started");
            self.abort_start(item, "no buyers found");
            return Vec::new();
        }

        tracing::info!(%item, %reserve_price, buyers = roster.len(), "Starting auction");
        let session = Session::new(listing, seller, roster);
        let mut outbox = Vec::with_capacity(2);
        let cfp = Message::CallForProposals {
            item: item.to_string(),
            reserve_price,
        };
        outbox.extend(Envelope::to_many(&self.id, &session.roster, &cfp));
        outbox.extend(max_bid_broadcast(&self.id, &session));

        self.events.emit(AuctionEvent::AuctionOpened {
            item: item.to_string(),
            reserve_price,
            roster_size: session.roster.len(),
            timestamp: Utc::now(),
        });
        self.events
            .phase_changed(&self.id, AuctioneerPhase::Idle, AuctioneerPhase::Open);
        self.pending = None;
        self.session = Some(session);
        outbox
    }

    /// Apply the admission rule to one bid
    pub fn on_bid(&mut self, bidder: &ParticipantId, amount: Price) -> Vec<Envelope> {
        let Some(session) = self.session.as_mut() else {
            tracing::debug!(%bidder, %amount, "No open auction, dropping bid");
            self.events.dropped(&self.id, "bid while no auction is open");
            return Vec::new();
        };

        match session.evaluate(bidder, amount) {
            Admission::Admitted { previous_max } => {
                // late joiners start receiving broadcasts once they are admitted
                session.roster.insert(bidder.clone());
                tracing::info!(%bidder, %amount, %previous_max, "New highest bid");
                self.events.emit(AuctionEvent::BidAdmitted {
                    bidder: bidder.clone(),
                    amount,
                    timestamp: Utc::now(),
                });

                let relay = Message::Relay {
                    bidder: bidder.clone(),
                    amount,
                };
                let mut outbox = vec![Envelope::to_one(&self.id, &session.seller, &relay)];
                outbox.extend(max_bid_broadcast(&self.id, session));
                outbox
            }
            Admission::Rejected { current_max } => {
                tracing::info!(%bidder, %amount, %current_max, "Rejected bid below maximum");
                self.events.emit(AuctionEvent::BidRejected {
                    bidder: bidder.clone(),
                    amount,
                    current_max,
                    timestamp: Utc::now(),
                });
                vec![Envelope::to_one(
                    &self.id,
                    bidder,
                    &Message::BidTooLow { current_max },
                )]
            }
        }
    }

    /// Seller finalized; discard the session and release the roster
    pub fn on_closed(&mut self, item: &str, sender: &ParticipantId) -> Vec<Envelope> {
        let matches = self
            .session
            .as_ref()
            .is_some_and(|s| &s.seller == sender && s.listing.item() == item);
        if !matches {
            tracing::debug!(%item, %sender, "CLOSED does not match the open auction");
            self.events.dropped(&self.id, "close for unknown auction");
            return Vec::new();
        }

        let Some(session) = self.session.take() else {
            return Vec::new();
        };
        tracing::info!(
            %item,
            final_max = %session.current_max,
            winner = ?session.highest_bidder,
            "Auction closed by seller"
        );
        self.events
            .phase_changed(&self.id, AuctioneerPhase::Open, AuctioneerPhase::Idle);
        Envelope::to_many(
            &self.id,
            &session.roster,
            &Message::Closed {
                item: item.to_string(),
            },
        )
        .into_iter()
        .collect()
    }

    fn abort_start(&self, item: &str, reason: impl Into<String>) {
        self.events.emit(AuctionEvent::StartAborted {
            item: item.to_string(),
            reason: reason.into(),
            timestamp: Utc::now(),
        });
    }
}

fn max_bid_broadcast(sender: &ParticipantId, session: &Session) -> Option<Envelope> {
    tracing::debug!(current_max = %session.current_max, "Broadcasting current maximum bid");
    Envelope::to_many(
        sender,
        &session.roster,
        &Message::MaxBid {
            amount: session.current_max,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use gavel_directory::InMemoryDirectory;
    use gavel_types::Performative;
    use rust_decimal_macros::dec;

    fn id(s: &str) -> ParticipantId {
        ParticipantId::parse(s).unwrap()
    }

    async fn directory_with(buyers: &[&str]) -> Arc<InMemoryDirectory> {
        let dir = Arc::new(InMemoryDirectory::new());
        for b in buyers {
            dir.register(&id(b), &Capability::buyer()).await.unwrap();
        }
        dir
    }

    async fn open_auction(buyers: &[&str], reserve: Price) -> Auctioneer {
        let dir = directory_with(buyers).await;
        let mut auctioneer = Auctioneer::new(ParticipantId::auctioneer(), dir, EventSink::default());
        let out = auctioneer
            .on_start("Painting", reserve, ParticipantId::seller())
            .await;
        assert_eq!(out.len(), 2);
        auctioneer
    }

    #[tokio::test]
    async fn test_start_sends_cfp_then_max_bid() {
        let dir = directory_with(&["buyer-a", "buyer-b"]).await;
        let mut auctioneer = Auctioneer::new(ParticipantId::auctioneer(), dir, EventSink::default());

        let out = auctioneer
            .on_start("Painting", dec!(100), ParticipantId::seller())
            .await;

        assert_eq!(auctioneer.phase(), AuctioneerPhase::Open);
        assert_eq!(out[0].performative, Performative::Cfp);
        assert_eq!(out[0].content, "Painting;100");
        assert_eq!(out[0].recipients, vec![id("buyer-a"), id("buyer-b")]);
        assert_eq!(out[1].decode().unwrap(), Message::MaxBid { amount: dec!(100) });
        assert_eq!(auctioneer.session().unwrap().current_max(), dec!(100));
    }

    #[tokio::test]
    async fn test_empty_roster_stays_idle() {
        let dir = directory_with(&[]).await;
        let mut auctioneer = Auctioneer::new(ParticipantId::auctioneer(), dir, EventSink::default());

        let out = auctioneer
            .on_start("Painting", dec!(100), ParticipantId::seller())
            .await;

        assert!(out.is_empty());
        assert_eq!(auctioneer.phase(), AuctioneerPhase::Idle);
    }

    #[tokio::test]
    async fn test_directory_failure_aborts_start() {
        let dir = directory_with(&["buyer-a"]).await;
        dir.set_available(false);
        let events = EventSink::default();
        let mut rx = events.subscribe();
        let mut auctioneer = Auctioneer::new(ParticipantId::auctioneer(), dir, events);

        let out = auctioneer
            .on_start("Painting", dec!(100), ParticipantId::seller())
            .await;

        assert!(out.is_empty());
        assert_eq!(auctioneer.phase(), AuctioneerPhase::Idle);
        assert!(matches!(rx.try_recv().unwrap(), AuctionEvent::StartAborted { .. }));
    }

    #[tokio::test]
    async fn test_second_start_is_ignored() {
        let mut auctioneer = open_auction(&["buyer-a"], dec!(100)).await;
        auctioneer.on_bid(&id("buyer-a"), dec!(120));

        let out = auctioneer
            .on_start("Other", dec!(5), ParticipantId::seller())
            .await;

        assert!(out.is_empty());
        let session = auctioneer.session().unwrap();
        assert_eq!(session.listing().item(), "Painting");
        assert_eq!(session.current_max(), dec!(120));
    }

    #[tokio::test]
    async fn test_bid_dropped_when_idle() {
        let dir = directory_with(&["buyer-a"]).await;
        let mut auctioneer = Auctioneer::new(ParticipantId::auctioneer(), dir, EventSink::default());
        assert!(auctioneer.on_bid(&id("buyer-a"), dec!(500)).is_empty());
    }

    #[tokio::test]
    async fn test_admitted_bid_relays_and_broadcasts() {
        let mut auctioneer = open_auction(&["buyer-a", "buyer-b"], dec!(100)).await;

        let out = auctioneer.on_bid(&id("buyer-a"), dec!(150));

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].recipients, vec![ParticipantId::seller()]);
        assert_eq!(
            out[0].decode().unwrap(),
            Message::Relay {
                bidder: id("buyer-a"),
                amount: dec!(150)
            }
        );
        assert_eq!(out[1].recipients, vec![id("buyer-a"), id("buyer-b")]);
        assert_eq!(out[1].decode().unwrap(), Message::MaxBid { amount: dec!(150) });

        let session = auctioneer.session().unwrap();
        assert_eq!(session.highest_bidder(), Some(&id("buyer-a")));
        assert_eq!(session.bid_of(&id("buyer-a")), Some(dec!(150)));
    }

    #[tokio::test]
    async fn test_tie_is_rejected_point_to_point() {
        let mut auctioneer = open_auction(&["buyer-a", "buyer-b"], dec!(100)).await;
        auctioneer.on_bid(&id("buyer-a"), dec!(150));

        let out = auctioneer.on_bid(&id("buyer-b"), dec!(150));

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].recipients, vec![id("buyer-b")]);
        assert_eq!(
            out[0].decode().unwrap(),
            Message::BidTooLow {
                current_max: dec!(150)
            }
        );
        let session = auctioneer.session().unwrap();
        assert_eq!(session.highest_bidder(), Some(&id("buyer-a")));
        assert_eq!(session.bid_of(&id("buyer-b")), None);
    }

    #[tokio::test]
    async fn test_bid_equal_to_reserve_rejected() {
        let mut auctioneer = open_auction(&["buyer-a"], dec!(100)).await;
        let out = auctioneer.on_bid(&id("buyer-a"), dec!(100));
        assert_eq!(out[0].performative, Performative::RejectProposal);
        assert_eq!(auctioneer.session().unwrap().highest_bidder(), None);
    }

    #[tokio::test]
    async fn test_second_racing_bid_sees_updated_max() {
        // both bids were sent while the max was 100; the first processed wins
        let mut auctioneer = open_auction(&["buyer-a", "buyer-b"], dec!(100)).await;

        auctioneer.on_bid(&id("buyer-b"), dec!(130));
        let out = auctioneer.on_bid(&id("buyer-a"), dec!(120));

        assert_eq!(
            out[0].decode().unwrap(),
            Message::BidTooLow {
                current_max: dec!(130)
            }
        );
    }

    #[tokio::test]
    async fn test_max_is_monotonic() {
        let mut auctioneer = open_auction(&["buyer-a", "buyer-b"], dec!(10)).await;
        let bids = [
            ("buyer-a", dec!(11)),
            ("buyer-b", dec!(9)),
            ("buyer-b", dec!(15)),
            ("buyer-a", dec!(15)),
            ("buyer-a", dec!(14.99)),
            ("buyer-a", dec!(20)),
        ];
        let mut last = dec!(10);
        for (bidder, amount) in bids {
            auctioneer.on_bid(&id(bidder), amount);
            let max = auctioneer.session().unwrap().current_max();
            assert!(max >= last);
            last = max;
        }
        assert_eq!(last, dec!(20));
        let session = auctioneer.session().unwrap();
        assert_eq!(session.highest_bidder(), Some(&id("buyer-a")));
        assert_eq!(session.bid_of(&id("buyer-a")), Some(session.current_max()));
    }

    #[tokio::test]
    async fn test_late_bidder_joins_roster() {
        let mut auctioneer = open_auction(&["buyer-a"], dec!(100)).await;
        let out = auctioneer.on_bid(&id("latecomer"), dec!(101));
        assert!(out[1].is_addressed_to(&id("latecomer")));
        assert!(auctioneer.session().unwrap().roster().contains(&id("latecomer")));
    }

    #[tokio::test]
    async fn test_closed_releases_roster() {
        let mut auctioneer = open_auction(&["buyer-a", "buyer-b"], dec!(100)).await;

        // a stranger cannot close the auction
        assert!(auctioneer.on_closed("Painting", &id("buyer-a")).is_empty());
        assert_eq!(auctioneer.phase(), AuctioneerPhase::Open);

        let out = auctioneer.on_closed("Painting", &ParticipantId::seller());
        assert_eq!(auctioneer.phase(), AuctioneerPhase::Idle);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].content, "CLOSED;Painting");
        assert_eq!(out[0].recipients.len(), 2);
    }

    #[tokio::test]
    async fn test_malformed_bid_is_dropped() {
        let mut auctioneer = open_auction(&["buyer-a"], dec!(100)).await;
        let env = Envelope::raw(
            Performative::Propose,
            &id("buyer-a"),
            &ParticipantId::auctioneer(),
            "BID;a lot",
        );
        assert!(auctioneer.handle(env).await.is_empty());
        assert_eq!(auctioneer.session().unwrap().current_max(), dec!(100));
    }

    #[tokio::test]
    async fn test_publish_records_pending_listing() {
        let dir = directory_with(&[]).await;
        let mut auctioneer = Auctioneer::new(ParticipantId::auctioneer(), dir, EventSink::default());
        let env = Envelope::to_one(
            &ParticipantId::seller(),
            &ParticipantId::auctioneer(),
            &Message::Publish {
                item: "Vase".to_string(),
                reserve_price: dec!(20),
            },
        );
        assert!(auctioneer.handle(env).await.is_empty());
        assert_eq!(auctioneer.pending_listing().unwrap().item(), "Vase");
        assert_eq!(auctioneer.phase(), AuctioneerPhase::Idle);
    }

    #[tokio::test]
    async fn test_start_from_other_than_publisher_is_dropped() {
        let dir = directory_with(&["buyer-a"]).await;
        let mut auctioneer = Auctioneer::new(ParticipantId::auctioneer(), dir, EventSink::default());
        auctioneer.on_publish("Vase", dec!(20), ParticipantId::seller());

        let out = auctioneer
            .on_start("Vase", dec!(20), id("impostor"))
            .await;
        assert!(out.is_empty());
        assert_eq!(auctioneer.phase(), AuctioneerPhase::Idle);
        assert_eq!(auctioneer.pending_listing().unwrap().item(), "Vase");

        let out = auctioneer
            .on_start("Vase", dec!(20), ParticipantId::seller())
            .await;
        assert_eq!(out.len(), 2);
        assert_eq!(auctioneer.phase(), AuctioneerPhase::Open);
        assert!(auctioneer.pending_listing().is_none());
    }
}
