//! Gavel CLI - run and observe English auctions
//!
//! # Quick Start
//!
//! ```bash
//! # Scripted three-bid auction
//! gavel demo
//!
//! # Automated bidding war between five budget-limited buyers
//! gavel simulate --buyers 5 --seed 42
//!
//! # Operate the seller and buyers by hand
//! gavel console --buyers alice,bob
//! ```

use clap::{Parser, Subcommand};
use colored::*;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod config;
mod display;

use commands::{console, demo, simulate};
use config::GavelConfig;

/// Gavel - ascending-price auctions between a seller, an auctioneer and buyers
#[derive(Parser)]
#[command(name = "gavel")]
#[command(author = "Gavel Contributors")]
#[command(version)]
#[command(about = "English auctions between message-passing agents", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file (TOML, JSON or YAML)
    #[arg(short, long, global = true, env = "GAVEL_CONFIG")]
    config: Option<String>,

    /// Override the log level
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Override the log format (pretty, compact, json)
    #[arg(long, global = true)]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scripted auction: reserve 100, bids of 150, 120 and 160
    Demo {
        /// Auction length in seconds
        #[arg(short, long, default_value_t = 5)]
        duration: u64,
    },

    /// Automated bidding war between budget-limited buyers
    Simulate {
        /// Number of buyers
        #[arg(short, long)]
        buyers: Option<usize>,

        /// RNG seed for reproducible budgets
        #[arg(long)]
        seed: Option<u64>,

        /// Auction length in seconds
        #[arg(short, long)]
        duration: Option<u64>,

        /// Stream events as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Interactive console driving the seller and manual buyers
    Console {
        /// Comma-separated buyer names
        #[arg(short, long, value_delimiter = ',', default_value = "alice,bob")]
        buyers: Vec<String>,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut config = GavelConfig::load(cli.config.as_deref())?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }
    config.validate()?;

    init_logging(&config.logging)?;

    match cli.command {
        Commands::Demo { duration } => {
            print_banner();
            demo::run(&config, duration).await?;
        }
        Commands::Simulate {
            buyers,
            seed,
            duration,
            json,
        } => {
            if let Some(buyers) = buyers {
                config.simulation.buyers = buyers;
            }
            if seed.is_some() {
                config.simulation.seed = seed;
            }
            if !json {
                print_banner();
            }
            let duration = duration.unwrap_or(config.auction.default_duration_secs);
            simulate::run(&config, duration, json).await?;
        }
        Commands::Console { buyers } => {
            print_banner();
            console::run(&config, &buyers).await?;
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

/// Initialize logging; output goes to stderr so it never mixes with event output
fn init_logging(config: &config::LoggingConfig) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    match config.format.as_str() {
        "json" => {
            subscriber
                .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
                .try_init()?;
        }
        "compact" => {
            subscriber
                .with(fmt::layer().compact().with_target(true).with_writer(std::io::stderr))
                .try_init()?;
        }
        _ => {
            subscriber
                .with(fmt::layer().pretty().with_target(true).with_writer(std::io::stderr))
                .try_init()?;
        }
    }

    Ok(())
}

fn print_banner() {
    println!();
    println!("{}", "╔══════════════════════════════════════════════════════════════════╗".bright_cyan());
    println!("{}", "║                                                                  ║".bright_cyan());
    println!(
        "{}{}{}",
        "║  ".bright_cyan(),
        "Gavel".bright_white().bold(),
        " - English auctions between message-passing agents          ║".bright_cyan()
    );
    println!("{}", "║  Seller · Auctioneer · Buyers                                    ║".bright_cyan());
    println!("{}", "║                                                                  ║".bright_cyan());
    println!("{}", "╚══════════════════════════════════════════════════════════════════╝".bright_cyan());
    println!();
}
