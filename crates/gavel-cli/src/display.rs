//! Display utilities for the CLI

use colored::*;
use gavel_agents::{AuctionOutcome, BuyerStatus, SellerStatus};
use gavel_types::AuctionEvent;

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", "━".repeat(60).bright_black());
    println!(" {}", title.bright_white().bold());
    println!("{}", "━".repeat(60).bright_black());
}

/// Print a success message
pub fn success(message: &str) {
    println!("  {} {}", "✓".bright_green(), message);
}

/// Print an error message
pub fn error(message: &str) {
    println!("  {} {}", "✗".bright_red(), message.bright_red());
}

/// Print an info message
pub fn info(message: &str) {
    println!("  {} {}", "→".bright_blue(), message);
}

/// Print a warning message
pub fn warning(message: &str) {
    println!("  {} {}", "⚠".yellow(), message.yellow());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("      {}: {}", key, value.bright_cyan());
}

/// Print a labeled value
pub fn labeled(label: &str, value: &str) {
    println!("  {}: {}", label.bright_white(), value.bright_cyan());
}

/// Countdown ticks are shown every ten seconds and for the final five
fn tick_is_notable(remaining_secs: u64) -> bool {
    remaining_secs <= 5 || remaining_secs % 10 == 0
}

/// Render one presentation event, or `None` when it is too chatty to show
pub fn render_event(event: &AuctionEvent) -> Option<String> {
    let time = event.timestamp().format("%H:%M:%S").to_string().bright_black();
    let line = match event {
        AuctionEvent::PhaseChanged {
            participant,
            from,
            to,
            ..
        } => format!("{} {} → {}", participant.as_str().dimmed(), from.dimmed(), to),
        AuctionEvent::ListingPublished {
            item,
            reserve_price,
            ..
        } => format!("{} {} (reserve {})", "listed".bright_white(), item.bright_cyan(), reserve_price),
        AuctionEvent::AuctionOpened {
            item,
            reserve_price,
            roster_size,
            ..
        } => format!(
            "{} {} from {} for {} buyer(s)",
            "open".bright_green().bold(),
            item.bright_cyan(),
            reserve_price,
            roster_size
        ),
        AuctionEvent::StartAborted { item, reason, .. } => {
            format!("{} {}: {}", "aborted".bright_red(), item, reason)
        }
        AuctionEvent::BidAdmitted { bidder, amount, .. } => format!(
            "{} {} bids {}",
            "bid".bright_green(),
            bidder.as_str().bright_white(),
            amount.to_string().bright_cyan()
        ),
        AuctionEvent::BidRejected {
            bidder,
            amount,
            current_max,
            ..
        } => format!(
            "{} {} bid {} (max {})",
            "too low".yellow(),
            bidder.as_str(),
            amount,
            current_max
        ),
        AuctionEvent::MaxBidUpdated { .. } => return None,
        AuctionEvent::CountdownTick { remaining_secs, .. } => {
            if !tick_is_notable(*remaining_secs) {
                return None;
            }
            format!("{} {}s left", "⏱".bright_blue(), remaining_secs)
        }
        AuctionEvent::TimeExtended { remaining_secs, .. } => format!(
            "{} now {}s left",
            "extended".bright_magenta(),
            remaining_secs
        ),
        AuctionEvent::AuctionSold {
            item,
            winner,
            amount,
            ..
        } => format!(
            "{} {} to {} for {}",
            "SOLD".bright_green().bold(),
            item.bright_cyan(),
            winner.as_str().bright_white().bold(),
            amount.to_string().bright_cyan().bold()
        ),
        AuctionEvent::AuctionUnsold { item, .. } => {
            format!("{} {}", "UNSOLD".yellow().bold(), item)
        }
        AuctionEvent::BuyerWon {
            participant,
            item,
            amount,
            ..
        } => format!("{} won {} for {}", participant.as_str().bright_white(), item, amount),
        AuctionEvent::BuyerLost {
            participant, item, ..
        } => format!("{} did not get {}", participant.as_str().dimmed(), item),
        AuctionEvent::MessageDropped {
            participant,
            reason,
            ..
        } => format!("{} {} dropped: {}", "⚠".yellow(), participant.as_str(), reason),
    };
    Some(format!("  {} {}", time, line))
}

/// Print the final outcome of a session
pub fn outcome(outcome: &AuctionOutcome) {
    match outcome {
        AuctionOutcome::Sold {
            item,
            winner,
            amount,
        } => {
            success(&format!("{} sold", item));
            kv("Winner", winner.as_str());
            kv("Price", &amount.to_string());
        }
        AuctionOutcome::Unsold { item } => warning(&format!("{} was not sold", item)),
    }
}

/// Print the seller's view
pub fn seller_status(status: &SellerStatus) {
    labeled("Seller", &status.phase.to_string());
    if let Some(listing) = &status.listing {
        kv("Item", listing.item());
        kv("Reserve", &listing.reserve_price().to_string());
    }
    kv("Remaining", &format!("{}s", status.remaining_secs));
    for (bidder, amount) in &status.bids {
        kv(bidder.as_str(), &amount.to_string());
    }
}

/// Print one buyer's view
pub fn buyer_status(status: &BuyerStatus) {
    labeled(status.id.as_str(), &status.phase.to_string());
    if let Some(item) = &status.item {
        kv("Item", item);
    }
    if let Some(max) = status.tracked_max {
        kv("Current max", &max.to_string());
    }
    if let Some(bid) = status.last_submitted {
        kv("Last bid", &bid.to_string());
    }
    if let Some(outcome) = &status.last_outcome {
        kv("Last outcome", &outcome.to_string());
    }
}
