//! Simulate command - automated buyers with random budgets

use std::time::Duration;

use gavel_agents::{next_outcome, AuctionHouse, IncrementalStrategy};
use gavel_types::Price;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::commands::spawn_printer;
use crate::config::GavelConfig;
use crate::display;

/// Draw a budget in `[min, max]` with cent precision
fn random_budget(rng: &mut impl Rng, min: Price, max: Price) -> Price {
    let lo = (min * Decimal::ONE_HUNDRED).trunc().to_i64().unwrap_or(0);
    let hi = (max * Decimal::ONE_HUNDRED).trunc().to_i64().unwrap_or(lo);
    if lo >= hi {
        return min;
    }
    Decimal::new(rng.gen_range(lo..=hi), 2)
}

pub async fn run(config: &GavelConfig, duration_secs: u64, json: bool) -> anyhow::Result<()> {
    let sim = &config.simulation;
    let mut rng = match sim.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut house = AuctionHouse::new(config.house_config())?;
    let mut outcomes = house.subscribe();
    let printer = spawn_printer(house.subscribe(), json);

    if !json {
        display::section("Buyers");
    }
    for i in 1..=sim.buyers {
        let name = format!("buyer-{i}");
        let strategy = IncrementalStrategy::new(
            random_budget(&mut rng, sim.budget_min, sim.budget_max),
            sim.increment,
        );
        let (budget, increment) = (strategy.budget(), strategy.increment());
        house.add_buyer(&name, Box::new(strategy)).await?;
        if json {
            tracing::info!(buyer = %name, %budget, %increment, "Buyer joined");
        } else {
            display::kv(&name, &format!("budget {budget}, steps of {increment}"));
        }
    }

    if !json {
        display::section(&format!("Auction: {} for {}s", sim.item, duration_secs));
    }
    house.seller().publish(sim.item.clone(), sim.reserve_price).await?;
    house.seller().start(duration_secs).await?;

    let finished = next_outcome(&mut outcomes).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    if !json {
        display::section("Buyers after close");
        for buyer in house.buyers() {
            display::buyer_status(&buyer.status().await?);
        }
    }

    house.shutdown().await;
    printer.abort();

    if finished.is_none() {
        anyhow::bail!("event stream closed before the auction finished");
    }
    Ok(())
}
