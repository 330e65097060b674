//! Gavel Directory - participant discovery
//!
//! Maps participants to the capabilities they advertise. Buyers register
//! under [`Capability::buyer`]; the Auctioneer resolves its roster with
//! [`Directory::find_by_capability`] once per auction start.

use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use gavel_types::{Capability, ParticipantId};
use thiserror::Error;

/// Errors from directory operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("Directory service unreachable")]
    Unavailable,

    #[error("Participant not registered: {participant}")]
    NotRegistered { participant: ParticipantId },
}

pub type Result<T> = std::result::Result<T, DirectoryError>;

/// Directory service trait
#[async_trait]
pub trait Directory: Send + Sync {
    /// Advertise a capability; returns `false` if it was already advertised
    async fn register(&self, participant: &ParticipantId, capability: &Capability) -> Result<bool>;

    /// Remove every capability of a participant
    async fn deregister(&self, participant: &ParticipantId) -> Result<()>;

    /// All participants advertising a capability
    async fn find_by_capability(&self, capability: &Capability) -> Result<BTreeSet<ParticipantId>>;
}

/// In-memory directory
///
/// `set_available(false)` simulates an unreachable service: every call fails
/// with [`DirectoryError::Unavailable`] until it is brought back.
pub struct InMemoryDirectory {
    entries: DashMap<ParticipantId, HashSet<Capability>>,
    available: AtomicBool,
}

impl Default for InMemoryDirectory {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
            available: AtomicBool::new(true),
        }
    }
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn ensure_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DirectoryError::Unavailable)
        }
    }
}

#[async_trait]
impl Directory for InMemoryDirectory {
    async fn register(&self, participant: &ParticipantId, capability: &Capability) -> Result<bool> {
        self.ensure_available()?;
        let added = self
            .entries
            .entry(participant.clone())
            .or_default()
            .insert(capability.clone());
        if added {
            tracing::debug!(%participant, %capability, "Registered capability");
        }
        Ok(added)
    }

    async fn deregister(&self, participant: &ParticipantId) -> Result<()> {
        self.ensure_available()?;
        self.entries
            .remove(participant)
            .map(|_| tracing::debug!(%participant, "Deregistered"))
            .ok_or_else(|| DirectoryError::NotRegistered {
                participant: participant.clone(),
            })
    }

    async fn find_by_capability(&self, capability: &Capability) -> Result<BTreeSet<ParticipantId>> {
        self.ensure_available()?;
        Ok(self
            .entries
            .iter()
            .filter(|entry| entry.value().contains(capability))
            .map(|entry| entry.key().clone())
            .collect())
    }
}
