//! Demo command - the scripted three-bid auction

use std::time::Duration;

use colored::*;
use gavel_agents::{next_outcome, AuctionHouse, BuyerError, ManualStrategy};
use gavel_types::Price;

use crate::commands::spawn_printer;
use crate::config::GavelConfig;
use crate::display;

/// Time for CFP and MAX_BID to reach the buyers before the next scripted step
const STEP_PAUSE: Duration = Duration::from_millis(200);

/// Reserve 100; alice bids 150, bob tries 120 and then bids 160
pub async fn run(config: &GavelConfig, duration_secs: u64) -> anyhow::Result<()> {
    println!("{}", "Scripted auction: one Painting, two buyers".bright_white().bold());
    println!();
    println!("  • {} reserve of 100", "Seller".bright_green());
    println!("  • {} bids 150", "alice".bright_green());
    println!("  • {} tries 120, is refused locally, then bids 160", "bob".bright_green());

    let mut house = AuctionHouse::new(config.house_config())?;
    let mut outcomes = house.subscribe();
    let printer = spawn_printer(house.subscribe(), false);

    display::section("Setup");
    let alice = house.add_buyer("alice", Box::new(ManualStrategy)).await?;
    let bob = house.add_buyer("bob", Box::new(ManualStrategy)).await?;
    display::success("alice and bob registered as buyers");

    house.seller().publish("Painting", Price::from(100)).await?;
    house.seller().start(duration_secs).await?;
    display::success(&format!("Auction started for {duration_secs}s"));
    tokio::time::sleep(STEP_PAUSE).await;

    display::section("Bidding");
    alice.bid(Price::from(150)).await?;
    tokio::time::sleep(STEP_PAUSE).await;

    match bob.bid(Price::from(120)).await {
        Err(BuyerError::BidTooLow {
            amount,
            current_max,
        }) => display::warning(&format!(
            "bob's bid of {amount} refused: current maximum is {current_max}"
        )),
        Err(e) => return Err(e.into()),
        Ok(()) => display::warning("bob's bid of 120 went out"),
    }

    bob.bid(Price::from(160)).await?;
    display::info("Waiting for the countdown to expire");

    let finished = next_outcome(&mut outcomes).await;
    tokio::time::sleep(STEP_PAUSE).await;

    display::section("Result");
    for buyer in house.buyers() {
        display::buyer_status(&buyer.status().await?);
    }

    house.shutdown().await;
    printer.abort();

    if finished.is_none() {
        anyhow::bail!("event stream closed before the auction finished");
    }
    Ok(())
}
