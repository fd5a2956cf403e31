//! # Parlay Core
//!
//! In-memory prediction-market engine settling against a remote points
//! ledger.
//!
//! Users open wagering markets on the outcome of a question, stake
//! points on options while the market is open, and the creator names
//! the winner once reality has spoken. Winners split the entire pool
//! pari-mutuel, in proportion to their stake on the winning option.
//! If the creator never resolves, every stake is automatically
//! refunded after a grace period.
//!
//! ## Features
//!
//! - **Market Creation**: open markets with two or more options, a
//!   category tag and a closing time
//! - **Two Pricing Models**: pari-mutuel pool odds, or a two-option
//!   constant-product AMM for live price quoting
//! - **Escrowed Stakes**: points move to a house account via the
//!   external ledger the moment a stake is accepted
//! - **Timer-Driven Lifecycle**: one task per market closes betting on
//!   schedule and auto-refunds unresolved markets
//! - **Pari-Mutuel Settlement**: proportional payout distribution,
//!   whatever model quoted the prices
//!
//! ## Example
//!
//! ```no_run
//! use parlay_core::{CreateMarket, EngineConfig, LogNotifier, MemoryLedger, PredictionEngine, PricingModel};
//! use std::sync::Arc;
//!
//! # async fn demo() -> parlay_core::Result<()> {
//! let ledger = Arc::new(MemoryLedger::new().with_balance(7, 1_000));
//! let engine = PredictionEngine::new(ledger, Arc::new(LogNotifier), EngineConfig::new(0));
//!
//! let market = engine
//!     .create_market(CreateMarket {
//!         question: "Will it rain tomorrow?".to_string(),
//!         options: vec!["Yes".to_string(), "No".to_string()],
//!         creator: 7,
//!         category: Some("weather".to_string()),
//!         close_at: chrono::Utc::now() + chrono::Duration::hours(1),
//!         pricing_model: PricingModel::PariMutuel,
//!     })
//!     .await?;
//!
//! let receipt = engine.stake(7, &market.id, "Yes", 100).await?;
//! println!("bought {} shares", receipt.shares);
//! # Ok(())
//! # }
//! ```

pub mod amm;
pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
mod lifecycle;
pub mod market;
pub mod notify;
pub mod registry;
pub mod settlement;
pub mod utils;

#[cfg(test)]
pub mod test_utils;

pub use amm::LiquidityPool;
pub use config::{EngineConfig, LedgerSettings, DEFAULT_INITIAL_LIQUIDITY, GRACE_PERIOD};
pub use engine::{CreateMarket, PredictionEngine, StakeReceipt};
pub use error::{MarketError, Result};
pub use ledger::{HttpLedger, LedgerClient, LedgerError, MemoryLedger};
pub use market::{Market, MarketState, PricingModel, Quote, UserId};
pub use notify::{LogNotifier, Notifier};
pub use registry::{MarketFilter, MarketRegistry, StatusFilter};
pub use settlement::{RefundReport, SettlementEngine, SettlementReport};
pub use utils::*;
