//! Console command - line-oriented control of the seller and manual buyers

use anyhow::anyhow;
use colored::*;
use gavel_agents::{AuctionHouse, ManualStrategy};
use gavel_types::{parse_duration, parse_price};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::commands::spawn_printer;
use crate::config::GavelConfig;
use crate::display;

#[derive(Debug, Clone, PartialEq, Eq)]
enum ConsoleCommand {
    Publish { item: String, price: String },
    Start { duration: Option<String> },
    Stop,
    Bid { buyer: String, amount: String },
    MoreTime { buyer: String },
    Status,
    Help,
    Quit,
}

/// Parse one console line; `Ok(None)` for a blank line
fn parse_command(line: &str) -> Result<Option<ConsoleCommand>, String> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let Some((&verb, args)) = words.split_first() else {
        return Ok(None);
    };

    let command = match (verb, args) {
        // Item names may contain spaces; the price is always last
        ("publish", [item @ .., price]) if !item.is_empty() => ConsoleCommand::Publish {
            item: item.join(" "),
            price: price.to_string(),
        },
        ("publish", _) => return Err("usage: publish <item> <reserve price>".to_string()),
        ("start", []) => ConsoleCommand::Start { duration: None },
        ("start", [secs]) => ConsoleCommand::Start {
            duration: Some(secs.to_string()),
        },
        ("start", _) => return Err("usage: start [seconds]".to_string()),
        ("stop", []) => ConsoleCommand::Stop,
        ("bid", [buyer, amount]) => ConsoleCommand::Bid {
            buyer: buyer.to_string(),
            amount: amount.to_string(),
        },
        ("bid", _) => return Err("usage: bid <buyer> <amount>".to_string()),
        ("more-time", [buyer]) => ConsoleCommand::MoreTime {
            buyer: buyer.to_string(),
        },
        ("more-time", _) => return Err("usage: more-time <buyer>".to_string()),
        ("status", []) => ConsoleCommand::Status,
        ("help", _) => ConsoleCommand::Help,
        ("quit" | "exit", _) => ConsoleCommand::Quit,
        _ => return Err(format!("unknown command '{}', try 'help'", line.trim())),
    };
    Ok(Some(command))
}

fn print_help() {
    display::section("Commands");
    display::kv("publish <item> <price>", "publish a listing with a reserve price");
    display::kv("start [seconds]", "open bidding");
    display::kv("stop", "finalize the open auction now");
    display::kv("bid <buyer> <amount>", "submit a bid for a buyer");
    display::kv("more-time <buyer>", "ask the seller for a time extension");
    display::kv("status", "show every role");
    display::kv("quit", "leave the console");
}

pub async fn run(config: &GavelConfig, buyers: &[String]) -> anyhow::Result<()> {
    let mut house = AuctionHouse::new(config.house_config())?;
    let printer = spawn_printer(house.subscribe(), false);

    for name in buyers {
        house.add_buyer(name.trim(), Box::new(ManualStrategy)).await?;
        display::success(&format!("{} registered", name.trim()));
    }
    print_help();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(message) => {
                display::error(&message);
                continue;
            }
        };
        if command == ConsoleCommand::Quit {
            break;
        }
        // Operator mistakes are reported and the console keeps going
        if let Err(e) = execute(&house, config, command).await {
            display::error(&e.to_string());
        }
    }

    house.shutdown().await;
    printer.abort();
    println!("{}", "Console closed".bright_black());
    Ok(())
}

async fn execute(
    house: &AuctionHouse,
    config: &GavelConfig,
    command: ConsoleCommand,
) -> anyhow::Result<()> {
    match command {
        ConsoleCommand::Publish { item, price } => {
            let price = parse_price(&price)?;
            house.seller().publish(item, price).await?;
        }
        ConsoleCommand::Start { duration } => {
            let secs = match duration {
                Some(input) => parse_duration(&input)?,
                None => config.auction.default_duration_secs,
            };
            house.seller().start(secs).await?;
        }
        ConsoleCommand::Stop => match house.seller().stop().await? {
            Some(outcome) => display::outcome(&outcome),
            None => display::warning("No auction is open"),
        },
        ConsoleCommand::Bid { buyer, amount } => {
            let handle = house
                .buyer(&buyer)
                .ok_or_else(|| anyhow!("unknown buyer '{buyer}'"))?;
            handle.bid_input(amount).await?;
        }
        ConsoleCommand::MoreTime { buyer } => {
            let handle = house
                .buyer(&buyer)
                .ok_or_else(|| anyhow!("unknown buyer '{buyer}'"))?;
            handle.more_time().await?;
        }
        ConsoleCommand::Status => {
            display::section("Status");
            let auctioneer = house.auctioneer().status().await?;
            display::labeled("Auctioneer", &auctioneer.phase.to_string());
            if let Some(max) = auctioneer.current_max {
                display::kv("Current max", &max.to_string());
            }
            if let Some(leader) = &auctioneer.highest_bidder {
                display::kv("Leader", leader.as_str());
            }
            display::kv("Roster", &auctioneer.roster_size.to_string());
            display::seller_status(&house.seller().status().await?);
            for buyer in house.buyers() {
                display::buyer_status(&buyer.status().await?);
            }
        }
        ConsoleCommand::Help => print_help(),
        ConsoleCommand::Quit => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_keeps_spaces_in_item() {
        assert_eq!(
            parse_command("publish Oil Painting 100").unwrap(),
            Some(ConsoleCommand::Publish {
                item: "Oil Painting".to_string(),
                price: "100".to_string(),
            })
        );
    }

    #[test]
    fn test_publish_without_item_is_usage_error() {
        assert!(parse_command("publish 100").is_err());
    }

    #[test]
    fn test_start_duration_optional() {
        assert_eq!(
            parse_command("start").unwrap(),
            Some(ConsoleCommand::Start { duration: None })
        );
        assert_eq!(
            parse_command("  start 45 ").unwrap(),
            Some(ConsoleCommand::Start {
                duration: Some("45".to_string())
            })
        );
    }

    #[test]
    fn test_bid_passes_raw_amount() {
        assert_eq!(
            parse_command("bid alice abc").unwrap(),
            Some(ConsoleCommand::Bid {
                buyer: "alice".to_string(),
                amount: "abc".to_string(),
            })
        );
    }

    #[test]
    fn test_blank_and_unknown_lines() {
        assert_eq!(parse_command("   ").unwrap(), None);
        assert!(parse_command("sell everything").is_err());
        assert_eq!(parse_command("exit").unwrap(), Some(ConsoleCommand::Quit));
    }
}
