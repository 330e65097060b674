//! Auction house - wires the bus, directory and actors together

use std::sync::Arc;

use gavel_bus::Bus;
use gavel_directory::{Directory, InMemoryDirectory};
use gavel_types::{AuctionEvent, ParticipantId};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::auctioneer::Auctioneer;
use crate::buyer::Buyer;
use crate::events::{EventSink, DEFAULT_EVENT_CAPACITY};
use crate::runtime::{
    spawn_auctioneer, spawn_buyer, spawn_seller, AuctioneerHandle, BuyerHandle, BuyerOptions,
    RuntimeError, SellerHandle,
};
use crate::seller::{Seller, SellerConfig};
use crate::strategy::BidStrategy;

/// Auction house configuration
#[derive(Debug, Clone, Copy)]
pub struct HouseConfig {
    pub seller: SellerConfig,
    pub buyer: BuyerOptions,
    pub event_capacity: usize,
}

impl Default for HouseConfig {
    fn default() -> Self {
        Self {
            seller: SellerConfig::default(),
            buyer: BuyerOptions::default(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

/// One seller, one auctioneer and any number of buyers on a shared bus
pub struct AuctionHouse {
    config: HouseConfig,
    bus: Bus,
    directory: Arc<InMemoryDirectory>,
    events: EventSink,
    auctioneer: AuctioneerHandle,
    seller: SellerHandle,
    buyers: Vec<BuyerHandle>,
    tasks: Vec<JoinHandle<()>>,
}

impl AuctionHouse {
    /// Start the auctioneer and seller; buyers are added with [`Self::add_buyer`]
    pub fn new(config: HouseConfig) -> Result<Self, RuntimeError> {
        let bus = Bus::new();
        let directory = Arc::new(InMemoryDirectory::new());
        let events = EventSink::new(config.event_capacity);

        let auctioneer = Auctioneer::new(
            ParticipantId::auctioneer(),
            directory.clone(),
            events.clone(),
        );
        let (auctioneer, auctioneer_task) = spawn_auctioneer(auctioneer, &bus)?;

        let seller = Seller::new(
            ParticipantId::seller(),
            ParticipantId::auctioneer(),
            config.seller,
            events.clone(),
        );
        let (seller, seller_task) = spawn_seller(seller, &bus)?;

        tracing::info!("Auction house open");
        Ok(Self {
            config,
            bus,
            directory,
            events,
            auctioneer,
            seller,
            buyers: Vec::new(),
            tasks: vec![auctioneer_task, seller_task],
        })
    }

    /// Register and run a buyer
    pub async fn add_buyer(
        &mut self,
        name: &str,
        strategy: Box<dyn BidStrategy>,
    ) -> Result<BuyerHandle, RuntimeError> {
        let id = ParticipantId::parse(name)?;
        let buyer = Buyer::new(id, self.seller.id().clone(), self.events.clone());
        let directory: Arc<dyn Directory> = self.directory.clone();
        let (handle, task) =
            spawn_buyer(buyer, strategy, self.config.buyer, &self.bus, directory).await?;
        self.buyers.push(handle.clone());
        self.tasks.push(task);
        Ok(handle)
    }

    pub fn config(&self) -> &HouseConfig {
        &self.config
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn directory(&self) -> &Arc<InMemoryDirectory> {
        &self.directory
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuctionEvent> {
        self.events.subscribe()
    }

    pub fn auctioneer(&self) -> &AuctioneerHandle {
        &self.auctioneer
    }

    pub fn seller(&self) -> &SellerHandle {
        &self.seller
    }

    pub fn buyers(&self) -> &[BuyerHandle] {
        &self.buyers
    }

    pub fn buyer(&self, id: &str) -> Option<&BuyerHandle> {
        self.buyers.iter().find(|b| b.id().as_str() == id)
    }

    /// Stop every actor and wait for its task
    pub async fn shutdown(self) {
        for buyer in &self.buyers {
            if let Err(e) = buyer.shutdown().await {
                tracing::warn!(participant = %buyer.id(), error = %e, "Buyer shutdown failed");
            }
        }
        self.seller.shutdown().await;
        self.auctioneer.shutdown().await;
        for task in self.tasks {
            let _ = task.await;
        }
        tracing::info!("Auction house closed");
    }
}
