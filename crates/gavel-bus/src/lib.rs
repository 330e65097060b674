//! In-proc messaging substrate for Gavel participants
//!
//! Every participant owns one [`Mailbox`]. [`Bus::send`] copies an envelope
//! into the mailbox of each recipient. Order is preserved per
//! sender-to-receiver pair; nothing is promised across senders.

use std::sync::Arc;

use dashmap::DashMap;
use gavel_types::{Envelope, ParticipantId};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};

/// Capacity of the traffic tap; slow observers lag instead of blocking senders
const TAP_CAPACITY: usize = 4096;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    #[error("Participant already has a mailbox: {0}")]
    AlreadyRegistered(ParticipantId),

    #[error("Envelope from {0} has no recipients")]
    NoRecipients(ParticipantId),
}

/// Outcome of one send
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    pub unreachable: Vec<ParticipantId>,
}

impl Delivery {
    pub fn is_complete(&self) -> bool {
        self.unreachable.is_empty()
    }
}

/// Receiving end owned by one participant
pub struct Mailbox {
    id: ParticipantId,
    receiver: mpsc::UnboundedReceiver<Envelope>,
}

impl Mailbox {
    pub fn id(&self) -> &ParticipantId {
        &self.id
    }

    /// Wait for the next envelope; `None` once the route is deregistered
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.receiver.recv().await
    }

    /// Next envelope if one is already queued
    pub fn try_recv(&mut self) -> Option<Envelope> {
        self.receiver.try_recv().ok()
    }
}

/// Cloneable handle onto the shared routing table
#[derive(Clone)]
pub struct Bus {
    routes: Arc<DashMap<ParticipantId, mpsc::UnboundedSender<Envelope>>>,
    tap: broadcast::Sender<Envelope>,
}

impl Default for Bus {
    fn default() -> Self {
        let (tap, _) = broadcast::channel(TAP_CAPACITY);
        Self {
            routes: Arc::new(DashMap::new()),
            tap,
        }
    }
}

impl Bus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a mailbox for a participant
    pub fn register(&self, id: ParticipantId) -> Result<Mailbox, BusError> {
        let (sender, receiver) = mpsc::unbounded_channel();
        match self.routes.entry(id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(BusError::AlreadyRegistered(id)),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(sender);
                tracing::debug!(participant = %id, "Mailbox opened");
                Ok(Mailbox { id, receiver })
            }
        }
    }

    /// Close a participant's route; its pending `recv` returns `None`
    pub fn deregister(&self, id: &ParticipantId) -> bool {
        self.routes.remove(id).is_some()
    }

    pub fn is_registered(&self, id: &ParticipantId) -> bool {
        self.routes.contains_key(id)
    }

    /// Observe every envelope that passes through the bus
    pub fn tap(&self) -> broadcast::Receiver<Envelope> {
        self.tap.subscribe()
    }

    /// Deliver an envelope to each of its recipients
    ///
    /// Unknown or closed recipients are reported in [`Delivery::unreachable`]
    /// and logged; they never fail the whole send.
    pub fn send(&self, envelope: Envelope) -> Result<Delivery, BusError> {
        if envelope.recipients.is_empty() {
            return Err(BusError::NoRecipients(envelope.sender));
        }

        let mut delivery = Delivery::default();
        for recipient in &envelope.recipients {
            let sent = self
                .routes
                .get(recipient)
                .map(|route| route.send(envelope.clone()).is_ok())
                .unwrap_or(false);
            if sent {
                delivery.delivered += 1;
            } else {
                delivery.unreachable.push(recipient.clone());
            }
        }

        if !delivery.is_complete() {
            tracing::warn!(
                sender = %envelope.sender,
                performative = %envelope.performative,
                unreachable = ?delivery.unreachable,
                "Some recipients are unreachable"
            );
        }
        tracing::debug!(%envelope, "Sent");

        let _ = self.tap.send(envelope);
        Ok(delivery)
    }
}
