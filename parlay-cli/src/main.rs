//! # Parlay CLI
//!
//! Command-line front end for the parlay prediction-market engine.
//! Presentation glue only: every command maps onto an engine operation
//! and renders the structured result.

use anyhow::Result;
use chrono::{Duration as ChronoDuration, Utc};
use clap::{Parser, Subcommand};
use colored::*;
use parlay_core::{
    format_points, format_timestamp, CreateMarket, EngineConfig, HttpLedger, LedgerClient,
    LedgerSettings, LiquidityPool, LogNotifier, Market, MarketFilter, MarketState, MemoryLedger,
    PredictionEngine, PricingModel, StatusFilter, UserId,
};
use std::sync::Arc;

/// Ledger account the demo engine escrows stakes into.
const HOUSE_ACCOUNT: UserId = 0;

#[derive(Parser)]
#[command(name = "parlay")]
#[command(about = "Prediction markets settling against a points ledger")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scripted market from creation to settlement
    Demo,
    /// Interactive session: create markets, stake, resolve
    Play {
        /// Opening balance for demo accounts (memory ledger only)
        #[arg(long, default_value = "1000")]
        opening_balance: u64,
    },
    /// Quote a constant-product AMM trade without an engine
    AmmQuote {
        /// Initial liquidity per option
        #[arg(short, long, default_value = "100")]
        liquidity: u64,
        /// Points to stake
        amount: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parlay_core=info".into()),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Demo => demo().await,
        Commands::Play { opening_balance } => play(opening_balance).await,
        Commands::AmmQuote { liquidity, amount } => {
            let pool = LiquidityPool::new(liquidity);
            match pool.quote(0, amount) {
                Some(shares) => {
                    println!(
                        "{}: {} points buy {:.2} shares at {:.2} points/share",
                        "AMM Quote".green().bold(),
                        format_points(amount).cyan(),
                        shares,
                        amount as f64 / shares
                    );
                }
                None => println!("{}: liquidity exhausted", "AMM Quote".red().bold()),
            }
            Ok(())
        }
    }
}

/// The worked example: two stakers, one resolution.
async fn demo() -> Result<()> {
    let (alice, bob, carol) = (1, 2, 3);
    let ledger = Arc::new(
        MemoryLedger::new()
            .with_balance(bob, 1_000)
            .with_balance(carol, 1_000),
    );
    let engine = PredictionEngine::new(
        ledger.clone(),
        Arc::new(LogNotifier),
        EngineConfig::new(HOUSE_ACCOUNT),
    );

    println!("{}", "Creating demo market...".green().bold());
    let market = engine
        .create_market(CreateMarket {
            question: "Will it rain tomorrow?".to_string(),
            options: vec!["Yes".to_string(), "No".to_string()],
            creator: alice,
            category: Some("weather".to_string()),
            close_at: Utc::now() + ChronoDuration::seconds(2),
            pricing_model: PricingModel::PariMutuel,
        })
        .await?;
    print_market(&market);

    let receipt = engine.stake(bob, &market.id, "Yes", 100).await?;
    println!(
        "Bob stakes {} on 'Yes' ({} shares)",
        format_points(receipt.amount).cyan(),
        receipt.shares
    );
    let receipt = engine.stake(carol, &market.id, "No", 300).await?;
    println!(
        "Carol stakes {} on 'No' (odds now {:.2}x)",
        format_points(receipt.amount).cyan(),
        receipt.odds_after
    );

    println!("Waiting for the market to close...");
    tokio::time::sleep(std::time::Duration::from_secs(3)).await;

    let report = engine.resolve(alice, &market.id, "Yes").await?;
    println!();
    println!("{}", "Market resolved: 'Yes' won".green().bold());
    println!(
        "Distributed {} points to {} winner(s)",
        format_points(report.total_distributed).yellow(),
        report.payouts.len()
    );
    println!(
        "Bob's balance: {}",
        format_points(ledger.get_balance(bob).await?).cyan()
    );
    println!(
        "Carol's balance: {}",
        format_points(ledger.get_balance(carol).await?).cyan()
    );
    Ok(())
}

/// Interactive drill-down: pick an action, a market, an option, an
/// amount.
async fn play(opening_balance: u64) -> Result<()> {
    let ledger: Arc<dyn LedgerClient> = match LedgerSettings::from_env() {
        Ok(settings) => {
            println!(
                "{} {}",
                "Using remote ledger at".bright_blue(),
                settings.base_url.cyan()
            );
            Arc::new(HttpLedger::new(
                &settings.base_url,
                &settings.api_key,
                &settings.realm_id,
            ))
        }
        Err(_) => {
            println!(
                "{}",
                "No ledger configured; using in-memory demo balances for users 1-4".bright_blue()
            );
            let mut ledger = MemoryLedger::new();
            for user in 1..=4 {
                ledger = ledger.with_balance(user, opening_balance);
            }
            Arc::new(ledger)
        }
    };
    let engine = PredictionEngine::new(
        ledger.clone(),
        Arc::new(LogNotifier),
        EngineConfig::new(HOUSE_ACCOUNT),
    );

    loop {
        let action = inquire::Select::new(
            "What would you like to do?",
            vec![
                "Create market",
                "Place stake",
                "List markets",
                "Bet history",
                "Resolve market",
                "Quit",
            ],
        )
        .prompt()?;

        let result = match action {
            "Create market" => create_market(&engine).await,
            "Place stake" => place_stake(&engine, ledger.as_ref()).await,
            "List markets" => list_markets(&engine).await,
            "Bet history" => bet_history(&engine).await,
            "Resolve market" => resolve_market(&engine).await,
            _ => return Ok(()),
        };
        if let Err(e) = result {
            println!("{} {}", "Error:".red().bold(), e);
        }
    }
}

async fn create_market(engine: &PredictionEngine) -> Result<()> {
    let creator: UserId = inquire::Text::new("Your user id:").prompt()?.parse()?;
    let question = inquire::Text::new("Question:").prompt()?;
    let options: Vec<String> = inquire::Text::new("Options (comma-separated):")
        .prompt()?
        .split(',')
        .map(|o| o.trim().to_string())
        .collect();
    let minutes: i64 = inquire::Text::new("Duration (minutes):").prompt()?.parse()?;
    let category = inquire::Text::new("Category (blank for none):").prompt()?;
    let pricing_model = match inquire::Select::new(
        "Pricing model:",
        vec!["Pari-mutuel", "Constant-product AMM"],
    )
    .prompt()?
    {
        "Pari-mutuel" => PricingModel::PariMutuel,
        _ => PricingModel::ConstantProductAmm,
    };

    let market = engine
        .create_market(CreateMarket {
            question,
            options,
            creator,
            category: (!category.trim().is_empty()).then(|| category.trim().to_string()),
            close_at: Utc::now() + ChronoDuration::minutes(minutes),
            pricing_model,
        })
        .await?;

    println!("{}", "Market created!".green().bold());
    print_market(&market);
    Ok(())
}

async fn place_stake(engine: &PredictionEngine, ledger: &dyn LedgerClient) -> Result<()> {
    let open = engine
        .list(&MarketFilter {
            status: Some(StatusFilter::Open),
            ..Default::default()
        })
        .await;
    if open.is_empty() {
        println!("No open markets at the moment.");
        return Ok(());
    }

    let market = select_market("Select a market to stake on:", &open)?;
    let participant: UserId = inquire::Text::new("Your user id:").prompt()?.parse()?;
    let balance = ledger.get_balance(participant).await?;
    println!("Your balance: {} points", format_points(balance).cyan());

    let labels: Vec<String> = market
        .all_odds()
        .into_iter()
        .map(|(option, odds)| format!("{option} ({odds:.2}x)"))
        .collect();
    let picked = inquire::Select::new("Select an option:", labels.clone()).prompt()?;
    let index = labels.iter().position(|l| l == &picked).unwrap();
    let option = market.options[index].clone();

    let amount: u64 = inquire::Text::new("Amount to stake:").prompt()?.parse()?;
    let receipt = engine.stake(participant, &market.id, &option, amount).await?;
    println!(
        "{} {} points on '{}' ({:.2} shares, odds {:.2}x)",
        "Staked".green().bold(),
        format_points(receipt.amount).cyan(),
        option,
        receipt.shares,
        receipt.odds_after
    );
    Ok(())
}

async fn list_markets(engine: &PredictionEngine) -> Result<()> {
    let markets = engine.list(&MarketFilter::default()).await;
    if markets.is_empty() {
        println!("No markets yet.");
        return Ok(());
    }
    let now = Utc::now();
    for market in markets {
        let state = match market.state {
            MarketState::Open if now < market.close_at => "OPEN".green(),
            MarketState::Open | MarketState::AwaitingResolution => "PENDING".yellow(),
            MarketState::Resolved => "RESOLVED".blue(),
            MarketState::Refunded => "REFUNDED".magenta(),
        };
        let odds = market
            .all_odds()
            .into_iter()
            .map(|(option, odds)| format!("{option}: {odds:.2}x"))
            .collect::<Vec<_>>()
            .join(" | ");
        println!(
            "[{}] {} {} | pool {} | {} | closes {}",
            state,
            market.id.bright_black(),
            market.question.bold(),
            format_points(market.total_staked).cyan(),
            odds,
            format_timestamp(market.close_at)
        );
    }
    Ok(())
}

async fn bet_history(engine: &PredictionEngine) -> Result<()> {
    let markets = engine.list(&MarketFilter::default()).await;
    if markets.is_empty() {
        println!("No markets yet.");
        return Ok(());
    }
    let market = select_market("Select a market:", &markets)?;
    let history = engine.bet_history(&market.id).await?;
    if history.is_empty() {
        println!("No stakes on this market yet.");
        return Ok(());
    }
    for (user, option, amount) in history {
        println!(
            "User {}: {} points on '{}'",
            user,
            format_points(amount).cyan(),
            option
        );
    }
    Ok(())
}

async fn resolve_market(engine: &PredictionEngine) -> Result<()> {
    let caller: UserId = inquire::Text::new("Your user id:").prompt()?.parse()?;
    let pending = engine
        .list(&MarketFilter {
            status: Some(StatusFilter::AwaitingResolution),
            creator: Some(caller),
            ..Default::default()
        })
        .await;
    if pending.is_empty() {
        println!("You have no markets awaiting resolution.");
        return Ok(());
    }

    let market = select_market("Select a market to resolve:", &pending)?;
    let winner = inquire::Select::new("Winning option:", market.options.clone()).prompt()?;
    let report = engine.resolve(caller, &market.id, &winner).await?;
    println!(
        "{} '{}' won; {} points distributed to {} winner(s)",
        "Resolved:".green().bold(),
        winner,
        format_points(report.total_distributed).yellow(),
        report.payouts.len()
    );
    Ok(())
}

fn select_market<'a>(prompt: &str, markets: &'a [Market]) -> Result<&'a Market> {
    let labels: Vec<String> = markets
        .iter()
        .map(|m| format!("{} | {} (closes {})", m.id, m.question, format_timestamp(m.close_at)))
        .collect();
    let picked = inquire::Select::new(prompt, labels.clone()).prompt()?;
    let index = labels.iter().position(|l| l == &picked).unwrap();
    Ok(&markets[index])
}

fn print_market(market: &Market) {
    println!("{}", "═".repeat(50).bright_black());
    println!("{}: {}", "Market ID".yellow().bold(), market.id);
    println!("{}: {}", "Question".yellow().bold(), market.question);
    println!("{}: {}", "Options".yellow().bold(), market.options.join(", "));
    println!(
        "{}: {}",
        "Category".yellow().bold(),
        market.category.as_deref().unwrap_or("None")
    );
    println!(
        "{}: {:?}",
        "Pricing".yellow().bold(),
        market.pricing_model
    );
    println!(
        "{}: {}",
        "Closes".yellow().bold(),
        format_timestamp(market.close_at)
    );
    println!("{}", "═".repeat(50).bright_black());
}
