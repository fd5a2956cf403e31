//! Error types for parlay-core

use crate::ledger::LedgerError;
use thiserror::Error;

/// Result type alias for market operations
pub type Result<T> = std::result::Result<T, MarketError>;

/// Error types for market operations
#[derive(Error, Debug)]
pub enum MarketError {
    /// The named option does not exist on the market
    #[error("Invalid option: {0}")]
    InvalidOption(String),

    /// Stake amounts must be strictly positive
    #[error("Invalid amount: {0}")]
    InvalidAmount(i64),

    /// The pricing model does not support this number of options
    #[error("Invalid option count: {model} requires {expected} options, got {actual}")]
    InvalidOptionCount {
        model: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Market close time must lie in the future
    #[error("Invalid close time: {0}")]
    InvalidCloseTime(String),

    /// Market validation errors at creation
    #[error("Invalid market: {0}")]
    InvalidMarket(String),

    /// The market is no longer accepting stakes
    #[error("Market {0} is closed")]
    MarketClosed(String),

    /// The market is still open and cannot be resolved yet
    #[error("Market {0} has not closed yet")]
    MarketNotClosed(String),

    /// Only the market creator may resolve it
    #[error("User {user} is not the creator of market {market_id}")]
    NotCreator { market_id: String, user: u64 },

    /// The market already reached a terminal state via resolution
    #[error("Market {0} has already been resolved")]
    AlreadyResolved(String),

    /// The market already reached a terminal state via auto-refund
    #[error("Market {0} has already been refunded")]
    AlreadyRefunded(String),

    /// No market with this id in the registry
    #[error("Market {0} not found")]
    MarketNotFound(String),

    /// The stake would drain one side of the liquidity pool
    #[error("Liquidity exhausted on option '{0}'")]
    LiquidityExhausted(String),

    /// The participant's ledger balance cannot cover the stake
    #[error("Insufficient balance: have {balance}, need {needed}")]
    InsufficientBalance { balance: u64, needed: u64 },

    /// Ledger errors
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Serde JSON errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error for other cases
    #[error("Market error: {0}")]
    Other(String),
}

impl From<&str> for MarketError {
    fn from(msg: &str) -> Self {
        Self::Other(msg.to_string())
    }
}

impl From<String> for MarketError {
    fn from(msg: String) -> Self {
        Self::Other(msg)
    }
}
