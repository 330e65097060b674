//! Bid strategies - how an automated buyer decides what to offer
//!
//! A strategy is consulted by the buyer actor after every CFP, max-bid
//! update and TOO_LOW rejection. Returning `None` means "stay out".

use gavel_types::Price;
use serde::{Deserialize, Serialize};

/// What a buyer knows when it is asked for a bid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BidContext<'a> {
    pub item: &'a str,
    pub reserve_price: Price,
    /// Highest admitted bid the buyer has been told about
    pub current_max: Price,
    /// The buyer's own bid is the current maximum
    pub leading: bool,
}

/// Strategy mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Bids only when the operator says so
    #[default]
    Manual,
    /// Outbids the current maximum by a fixed step up to a budget
    Incremental,
}

pub trait BidStrategy: Send {
    fn kind(&self) -> StrategyKind;

    /// Called on every CFP, before the first `next_bid` of an auction
    fn reset(&mut self) {}

    /// Amount to bid next, if any
    fn next_bid(&mut self, ctx: &BidContext<'_>) -> Option<Price>;

    /// Ask the seller for more time after this context
    fn wants_more_time(&mut self, _ctx: &BidContext<'_>) -> bool {
        false
    }
}

/// Never bids on its own
#[derive(Debug, Clone, Copy, Default)]
pub struct ManualStrategy;

impl BidStrategy for ManualStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Manual
    }

    fn next_bid(&mut self, _ctx: &BidContext<'_>) -> Option<Price> {
        None
    }
}

/// Raises the current maximum by `increment` while it stays within `budget`
#[derive(Debug, Clone)]
pub struct IncrementalStrategy {
    budget: Price,
    increment: Price,
    extension_requested: bool,
}

impl IncrementalStrategy {
    pub fn new(budget: Price, increment: Price) -> Self {
        Self {
            budget,
            increment,
            extension_requested: false,
        }
    }

    pub fn budget(&self) -> Price {
        self.budget
    }

    pub fn increment(&self) -> Price {
        self.increment
    }
}

impl BidStrategy for IncrementalStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Incremental
    }

    fn reset(&mut self) {
        self.extension_requested = false;
    }

    fn next_bid(&mut self, ctx: &BidContext<'_>) -> Option<Price> {
        if ctx.leading {
            return None;
        }
        let amount = ctx.current_max + self.increment;
        if amount > self.budget {
            tracing::debug!(item = ctx.item, %amount, budget = %self.budget, "Over budget, staying out");
            return None;
        }
        Some(amount)
    }

    /// One extension per auction, asked for while still able to outbid
    fn wants_more_time(&mut self, ctx: &BidContext<'_>) -> bool {
        if self.extension_requested || ctx.leading {
            return false;
        }
        if ctx.current_max + self.increment <= self.budget {
            self.extension_requested = true;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ctx(current_max: Price, leading: bool) -> BidContext<'static> {
        BidContext {
            item: "Painting",
            reserve_price: dec!(100),
            current_max,
            leading,
        }
    }

    #[test]
    fn test_manual_never_bids() {
        let mut strategy = ManualStrategy;
        assert_eq!(strategy.next_bid(&ctx(dec!(100), false)), None);
        assert!(!strategy.wants_more_time(&ctx(dec!(100), false)));
    }

    #[test]
    fn test_incremental_outbids_within_budget() {
        let mut strategy = IncrementalStrategy::new(dec!(160), dec!(25));
        assert_eq!((strategy.budget(), strategy.increment()), (dec!(160), dec!(25)));
        assert_eq!(strategy.next_bid(&ctx(dec!(100), false)), Some(dec!(125)));
        assert_eq!(strategy.next_bid(&ctx(dec!(135), false)), Some(dec!(160)));
        assert_eq!(strategy.next_bid(&ctx(dec!(140), false)), None);
    }

    #[test]
    fn test_incremental_holds_while_leading() {
        let mut strategy = IncrementalStrategy::new(dec!(1000), dec!(1));
        assert_eq!(strategy.next_bid(&ctx(dec!(100), true)), None);
    }

    #[test]
    fn test_more_time_requested_once() {
        let mut strategy = IncrementalStrategy::new(dec!(200), dec!(10));
        assert!(strategy.wants_more_time(&ctx(dec!(150), false)));
        assert!(!strategy.wants_more_time(&ctx(dec!(150), false)));
        strategy.reset();
        assert!(strategy.wants_more_time(&ctx(dec!(150), false)));
    }
}
