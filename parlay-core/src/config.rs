//! Engine and ledger configuration.

use crate::error::{MarketError, Result};
use crate::market::UserId;
use std::time::Duration;

/// Window after a market closes during which the creator may resolve
/// it before stakes auto-refund.
pub const GRACE_PERIOD: Duration = Duration::from_secs(48 * 3600);

/// Starting virtual liquidity per option for AMM markets.
pub const DEFAULT_INITIAL_LIQUIDITY: u64 = 100;

/// Tunables for a [`crate::engine::PredictionEngine`].
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Ledger account that escrows stakes between placement and
    /// settlement.
    pub house_account: UserId,
    /// Grace period between close and auto-refund.
    pub grace_period: Duration,
    /// Initial liquidity per option for constant-product markets.
    pub initial_liquidity: u64,
}

impl EngineConfig {
    pub fn new(house_account: UserId) -> Self {
        Self {
            house_account,
            grace_period: GRACE_PERIOD,
            initial_liquidity: DEFAULT_INITIAL_LIQUIDITY,
        }
    }

    /// Override the grace period (tests and demos use short windows).
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn with_initial_liquidity(mut self, initial_liquidity: u64) -> Self {
        self.initial_liquidity = initial_liquidity;
        self
    }
}

/// Connection settings for the remote points ledger.
#[derive(Clone, Debug)]
pub struct LedgerSettings {
    pub base_url: String,
    pub api_key: String,
    pub realm_id: String,
}

impl LedgerSettings {
    /// Read `API_BASE_URL`, `API_KEY` and `REALM_ID` from the
    /// environment.
    pub fn from_env() -> Result<Self> {
        let var = |name: &str| {
            std::env::var(name)
                .map_err(|_| MarketError::Other(format!("missing environment variable {name}")))
        };
        Ok(Self {
            base_url: var("API_BASE_URL")?,
            api_key: var("API_KEY")?,
            realm_id: var("REALM_ID")?,
        })
    }
}
