//! Actor runtime - one tokio task per role
//!
//! Each actor owns its role state machine and processes one input at a time,
//! either an envelope from its mailbox or an operator command from its
//! handle. The seller's countdown runs as a separate interval task that
//! feeds ticks back into the seller actor.

use std::sync::Arc;
use std::time::Duration;

use gavel_bus::{Bus, BusError, Mailbox};
use gavel_directory::Directory;
use gavel_types::{Envelope, ParticipantId, Price, ValidationError};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::auctioneer::{Auctioneer, AuctioneerStatus};
use crate::buyer::{self, Buyer, BuyerError, BuyerStatus, Reaction};
use crate::seller::{self, AuctionOutcome, Finalization, Seller, SellerError, SellerStatus};
use crate::strategy::BidStrategy;

const COMMAND_BUFFER: usize = 64;
const TICK_BUFFER: usize = 8;

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    #[error("Seller error: {0}")]
    Seller(#[from] SellerError),

    #[error("Buyer error: {0}")]
    Buyer(#[from] BuyerError),

    #[error("Actor has stopped: {0}")]
    ActorStopped(ParticipantId),
}

/// Send a command carrying a reply channel and wait for the answer
async fn request<C, T>(
    commands: &mpsc::Sender<C>,
    make: impl FnOnce(oneshot::Sender<T>) -> C,
) -> Option<T> {
    let (reply, rx) = oneshot::channel();
    commands.send(make(reply)).await.ok()?;
    rx.await.ok()
}

fn dispatch(bus: &Bus, outbox: Vec<Envelope>) {
    for envelope in outbox {
        if let Err(e) = bus.send(envelope) {
            tracing::warn!(error = %e, "Failed to send envelope");
        }
    }
}

// ============================================================================
// Auctioneer
// ============================================================================

enum AuctioneerCommand {
    Status(oneshot::Sender<AuctioneerStatus>),
    Shutdown(oneshot::Sender<()>),
}

#[derive(Clone)]
pub struct AuctioneerHandle {
    id: ParticipantId,
    commands: mpsc::Sender<AuctioneerCommand>,
}

impl AuctioneerHandle {
    pub fn id(&self) -> &ParticipantId {
        &self.id
    }

    pub async fn status(&self) -> Result<AuctioneerStatus, RuntimeError> {
        request(&self.commands, AuctioneerCommand::Status)
            .await
            .ok_or_else(|| RuntimeError::ActorStopped(self.id.clone()))
    }

    pub async fn shutdown(&self) {
        let _ = request(&self.commands, AuctioneerCommand::Shutdown).await;
    }
}

/// Open a mailbox for the auctioneer and run it
pub fn spawn_auctioneer(
    mut auctioneer: Auctioneer,
    bus: &Bus,
) -> Result<(AuctioneerHandle, JoinHandle<()>), RuntimeError> {
    let id = auctioneer.id().clone();
    let mut mailbox = bus.register(id.clone())?;
    let (commands, mut rx) = mpsc::channel(COMMAND_BUFFER);
    let bus = bus.clone();

    let task = tokio::spawn(async move {
        tracing::info!(participant = %auctioneer.id(), "Auctioneer running");
        loop {
            tokio::select! {
                envelope = mailbox.recv() => match envelope {
                    Some(envelope) => {
                        let outbox = auctioneer.handle(envelope).await;
                        dispatch(&bus, outbox);
                    }
                    None => break,
                },
                command = rx.recv() => match command {
                    Some(AuctioneerCommand::Status(reply)) => {
                        let _ = reply.send(auctioneer.status());
                    }
                    Some(AuctioneerCommand::Shutdown(reply)) => {
                        let _ = reply.send(());
                        break;
                    }
                    None => break,
                },
            }
        }
        bus.deregister(auctioneer.id());
        tracing::info!(participant = %auctioneer.id(), "Auctioneer stopped");
    });

    Ok((AuctioneerHandle { id, commands }, task))
}

// ============================================================================
// Seller
// ============================================================================

enum SellerCommand {
    Publish {
        item: String,
        reserve_price: Price,
        reply: oneshot::Sender<seller::Result<()>>,
    },
    Start {
        duration_secs: u64,
        reply: oneshot::Sender<seller::Result<()>>,
    },
    Stop(oneshot::Sender<Option<AuctionOutcome>>),
    Status(oneshot::Sender<SellerStatus>),
    Shutdown(oneshot::Sender<()>),
}

#[derive(Clone)]
pub struct SellerHandle {
    id: ParticipantId,
    commands: mpsc::Sender<SellerCommand>,
}

impl SellerHandle {
    pub fn id(&self) -> &ParticipantId {
        &self.id
    }

    pub async fn publish(&self, item: impl Into<String>, reserve_price: Price) -> seller::Result<()> {
        let item = item.into();
        request(&self.commands, |reply| SellerCommand::Publish {
            item,
            reserve_price,
            reply,
        })
        .await
        .ok_or(SellerError::ActorStopped)?
    }

    pub async fn start(&self, duration_secs: u64) -> seller::Result<()> {
        request(&self.commands, |reply| SellerCommand::Start {
            duration_secs,
            reply,
        })
        .await
        .ok_or(SellerError::ActorStopped)?
    }

    /// Stop the open auction; `None` if nothing was open
    pub async fn stop(&self) -> seller::Result<Option<AuctionOutcome>> {
        request(&self.commands, SellerCommand::Stop)
            .await
            .ok_or(SellerError::ActorStopped)
    }

    pub async fn status(&self) -> seller::Result<SellerStatus> {
        request(&self.commands, SellerCommand::Status)
            .await
            .ok_or(SellerError::ActorStopped)
    }

    pub async fn shutdown(&self) {
        let _ = request(&self.commands, SellerCommand::Shutdown).await;
    }
}

/// Periodic tick source for one auction session; aborted on drop
struct Countdown {
    task: JoinHandle<()>,
}

impl Countdown {
    fn start(period: Duration, session: u64, ticks: mpsc::Sender<u64>) -> Self {
        let task = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if ticks.send(session).await.is_err() {
                    break;
                }
            }
        });
        Self { task }
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct SellerActor {
    seller: Seller,
    bus: Bus,
    countdown: Option<Countdown>,
    /// Ticks from an earlier session may still be queued; they carry its number
    session: u64,
    ticks: mpsc::Sender<u64>,
}

impl SellerActor {
    fn on_command(&mut self, command: SellerCommand) -> bool {
        match command {
            SellerCommand::Publish {
                item,
                reserve_price,
                reply,
            } => {
                let result = self
                    .seller
                    .publish(&item, reserve_price)
                    .map(|envelope| dispatch(&self.bus, vec![envelope]));
                let _ = reply.send(result);
            }
            SellerCommand::Start {
                duration_secs,
                reply,
            } => {
                let result = self.seller.start(duration_secs).map(|envelope| {
                    dispatch(&self.bus, vec![envelope]);
                    self.session += 1;
                    self.countdown = Some(Countdown::start(
                        self.seller.config().tick,
                        self.session,
                        self.ticks.clone(),
                    ));
                });
                let _ = reply.send(result);
            }
            SellerCommand::Stop(reply) => {
                let finalization = self.seller.stop();
                let _ = reply.send(self.complete(finalization));
            }
            SellerCommand::Status(reply) => {
                let _ = reply.send(self.seller.status());
            }
            SellerCommand::Shutdown(reply) => {
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    fn on_tick(&mut self, session: u64) {
        if session != self.session {
            tracing::debug!(session, current = self.session, "Stale tick");
            return;
        }
        let finalization = self.seller.tick();
        self.complete(finalization);
    }

    fn complete(&mut self, finalization: Option<Finalization>) -> Option<AuctionOutcome> {
        let Finalization { outcome, outbox } = finalization?;
        self.countdown = None;
        dispatch(&self.bus, outbox);
        Some(outcome)
    }
}

/// Open a mailbox for the seller and run it
pub fn spawn_seller(seller: Seller, bus: &Bus) -> Result<(SellerHandle, JoinHandle<()>), RuntimeError> {
    let id = seller.id().clone();
    let mut mailbox: Mailbox = bus.register(id.clone())?;
    let (commands, mut rx) = mpsc::channel(COMMAND_BUFFER);
    let (ticks, mut tick_rx) = mpsc::channel(TICK_BUFFER);
    let mut actor = SellerActor {
        seller,
        bus: bus.clone(),
        countdown: None,
        session: 0,
        ticks,
    };

    let task = tokio::spawn(async move {
        tracing::info!(participant = %actor.seller.id(), "Seller running");
        loop {
            tokio::select! {
                envelope = mailbox.recv() => match envelope {
                    Some(envelope) => {
                        let outbox = actor.seller.handle(envelope);
                        dispatch(&actor.bus, outbox);
                    }
                    None => break,
                },
                command = rx.recv() => match command {
                    Some(command) => {
                        if !actor.on_command(command) {
                            break;
                        }
                    }
                    None => break,
                },
                Some(session) = tick_rx.recv() => actor.on_tick(session),
            }
        }
        actor.countdown = None;
        actor.bus.deregister(actor.seller.id());
        tracing::info!(participant = %actor.seller.id(), "Seller stopped");
    });

    Ok((SellerHandle { id, commands }, task))
}

// ============================================================================
// Buyer
// ============================================================================

enum BuyerCommand {
    Bid {
        amount: Price,
        reply: oneshot::Sender<buyer::Result<()>>,
    },
    BidInput {
        input: String,
        reply: oneshot::Sender<buyer::Result<()>>,
    },
    MoreTime(oneshot::Sender<buyer::Result<()>>),
    Status(oneshot::Sender<BuyerStatus>),
    Shutdown(oneshot::Sender<buyer::Result<()>>),
}

#[derive(Clone)]
pub struct BuyerHandle {
    id: ParticipantId,
    commands: mpsc::Sender<BuyerCommand>,
}

impl BuyerHandle {
    pub fn id(&self) -> &ParticipantId {
        &self.id
    }

    pub async fn bid(&self, amount: Price) -> buyer::Result<()> {
        request(&self.commands, |reply| BuyerCommand::Bid { amount, reply })
            .await
            .ok_or(BuyerError::ActorStopped)?
    }

    /// Bid from operator input, validated locally before anything is sent
    pub async fn bid_input(&self, input: impl Into<String>) -> buyer::Result<()> {
        let input = input.into();
        request(&self.commands, |reply| BuyerCommand::BidInput { input, reply })
            .await
            .ok_or(BuyerError::ActorStopped)?
    }

    pub async fn more_time(&self) -> buyer::Result<()> {
        request(&self.commands, BuyerCommand::MoreTime)
            .await
            .ok_or(BuyerError::ActorStopped)?
    }

    pub async fn status(&self) -> buyer::Result<BuyerStatus> {
        request(&self.commands, BuyerCommand::Status)
            .await
            .ok_or(BuyerError::ActorStopped)
    }

    /// Deregister from the directory and stop the actor
    pub async fn shutdown(&self) -> buyer::Result<()> {
        request(&self.commands, BuyerCommand::Shutdown)
            .await
            .ok_or(BuyerError::ActorStopped)?
    }
}

/// Tuning for automated buyers
#[derive(Debug, Clone, Copy, Default)]
pub struct BuyerOptions {
    /// Pause before a strategy bid is sent
    pub bid_delay: Duration,
}

struct BuyerActor {
    buyer: Buyer,
    strategy: Box<dyn BidStrategy>,
    options: BuyerOptions,
    bus: Bus,
}

impl BuyerActor {
    async fn react(&mut self, reaction: Reaction) {
        if let Reaction::Finished(outcome) = &reaction {
            tracing::debug!(participant = %self.buyer.id(), %outcome, "Buyer ready for next auction");
            return;
        }
        if reaction == Reaction::Invited {
            self.strategy.reset();
        }
        if !reaction.is_bid_opportunity() {
            return;
        }

        let Some(ctx) = self.buyer.bid_context() else {
            return;
        };
        let amount = self.strategy.next_bid(&ctx);
        let more_time = reaction != Reaction::Invited && self.strategy.wants_more_time(&ctx);

        if more_time {
            if let Ok(envelope) = self.buyer.request_more_time() {
                dispatch(&self.bus, vec![envelope]);
            }
        }
        if let Some(amount) = amount {
            if !self.options.bid_delay.is_zero() {
                tokio::time::sleep(self.options.bid_delay).await;
            }
            match self.buyer.submit_bid(amount) {
                Ok(envelope) => dispatch(&self.bus, vec![envelope]),
                Err(e) => tracing::debug!(participant = %self.buyer.id(), error = %e, "Strategy bid not sent"),
            }
        }
    }

    fn on_command(&mut self, command: BuyerCommand) {
        match command {
            BuyerCommand::Bid { amount, reply } => {
                let result = self.buyer.submit_bid(amount);
                let _ = reply.send(self.send(result));
            }
            BuyerCommand::BidInput { input, reply } => {
                let result = self.buyer.submit_bid_str(&input);
                let _ = reply.send(self.send(result));
            }
            BuyerCommand::MoreTime(reply) => {
                let result = self.buyer.request_more_time();
                let _ = reply.send(self.send(result));
            }
            BuyerCommand::Status(reply) => {
                let _ = reply.send(self.buyer.status());
            }
            // handled by the loop, which needs the directory
            BuyerCommand::Shutdown(_) => {}
        }
    }

    fn send(&self, envelope: buyer::Result<Envelope>) -> buyer::Result<()> {
        envelope.map(|envelope| dispatch(&self.bus, vec![envelope]))
    }
}

/// Register a buyer with the directory, open its mailbox and run it
pub async fn spawn_buyer(
    mut buyer: Buyer,
    strategy: Box<dyn BidStrategy>,
    options: BuyerOptions,
    bus: &Bus,
    directory: Arc<dyn Directory>,
) -> Result<(BuyerHandle, JoinHandle<()>), RuntimeError> {
    let id = buyer.id().clone();
    let mut mailbox = bus.register(id.clone())?;
    if let Err(e) = buyer.register(directory.as_ref()).await {
        bus.deregister(&id);
        return Err(e.into());
    }
    let (commands, mut rx) = mpsc::channel(COMMAND_BUFFER);
    let mut actor = BuyerActor {
        buyer,
        strategy,
        options,
        bus: bus.clone(),
    };

    let task = tokio::spawn(async move {
        tracing::info!(
            participant = %actor.buyer.id(),
            strategy = ?actor.strategy.kind(),
            "Buyer running"
        );
        loop {
            tokio::select! {
                envelope = mailbox.recv() => match envelope {
                    Some(envelope) => {
                        let reaction = actor.buyer.handle(envelope);
                        actor.react(reaction).await;
                    }
                    None => break,
                },
                command = rx.recv() => match command {
                    Some(BuyerCommand::Shutdown(reply)) => {
                        let result = actor.buyer.deregister(directory.as_ref()).await;
                        actor.bus.deregister(actor.buyer.id());
                        let _ = reply.send(result);
                        break;
                    }
                    Some(command) => actor.on_command(command),
                    None => {
                        if let Err(e) = actor.buyer.deregister(directory.as_ref()).await {
                            tracing::warn!(participant = %actor.buyer.id(), error = %e, "Deregistration failed");
                        }
                        break;
                    }
                },
            }
        }
        actor.bus.deregister(actor.buyer.id());
        tracing::info!(participant = %actor.buyer.id(), "Buyer stopped");
    });

    Ok((BuyerHandle { id, commands }, task))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventSink;
    use crate::seller::SellerConfig;
    use crate::strategy::ManualStrategy;
    use gavel_directory::InMemoryDirectory;
    use rust_decimal_macros::dec;

    #[tokio::test(start_paused = true)]
    async fn test_seller_countdown_expires() {
        let bus = Bus::new();
        let _auctioneer = bus.register(ParticipantId::auctioneer()).unwrap();
        let seller = Seller::new(
            ParticipantId::seller(),
            ParticipantId::auctioneer(),
            SellerConfig::default(),
            EventSink::default(),
        );
        let (handle, _task) = spawn_seller(seller, &bus).unwrap();

        handle.publish("Vase", dec!(10)).await.unwrap();
        handle.start(3).await.unwrap();
        assert_eq!(handle.status().await.unwrap().remaining_secs, 3);

        tokio::time::sleep(Duration::from_millis(3500)).await;
        let status = handle.status().await.unwrap();
        assert_eq!(status.phase, seller::SellerPhase::Idle);
        assert_eq!(handle.stop().await.unwrap(), None);

        handle.shutdown().await;
        assert!(matches!(handle.status().await, Err(SellerError::ActorStopped)));
    }

    #[tokio::test]
    async fn test_buyer_shutdown_deregisters() {
        let bus = Bus::new();
        let dir = Arc::new(InMemoryDirectory::new());
        let buyer = Buyer::new(
            ParticipantId::parse("buyer-1").unwrap(),
            ParticipantId::seller(),
            EventSink::default(),
        );
        let (handle, task) = spawn_buyer(
            buyer,
            Box::new(ManualStrategy),
            BuyerOptions::default(),
            &bus,
            dir.clone(),
        )
        .await
        .unwrap();
        assert_eq!(dir.len(), 1);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
        assert!(dir.is_empty());
        assert!(!bus.is_registered(handle.id()));
    }

    #[tokio::test]
    async fn test_buyer_registration_failure_closes_mailbox() {
        let bus = Bus::new();
        let dir = Arc::new(InMemoryDirectory::new());
        dir.set_available(false);
        let id = ParticipantId::parse("buyer-1").unwrap();
        let buyer = Buyer::new(id.clone(), ParticipantId::seller(), EventSink::default());

        let result = spawn_buyer(
            buyer,
            Box::new(ManualStrategy),
            BuyerOptions::default(),
            &bus,
            dir,
        )
        .await;

        assert!(matches!(result, Err(RuntimeError::Buyer(BuyerError::Directory(_)))));
        assert!(!bus.is_registered(&id));
    }
}
