//! # Prediction Market Implementation
//!
//! This module implements the market aggregate: a wagering question
//! with a fixed option set, per-participant stake bookkeeping, a
//! pricing model for live quotes, and the monotone lifecycle state
//! machine (`Open -> AwaitingResolution -> Resolved | Refunded`).
//!
//! Participants stake points on one option while the market is open.
//! Quotes are priced either pari-mutuel (shares are raw points) or via
//! a constant-product liquidity pool; settlement is always pari-mutuel
//! regardless of the quoted price (see [`crate::settlement`]).

use crate::amm::LiquidityPool;
use crate::error::{MarketError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Identity of a participant in the external points ledger.
pub type UserId = u64;

/// Lifecycle states of a market.
///
/// Transitions are monotone: a market never returns to `Open`, and
/// each terminal state is reached at most once.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarketState {
    /// Accepting stakes until `close_at`.
    Open,
    /// Betting closed; waiting for the creator to name a winner.
    AwaitingResolution,
    /// Creator named a winner and payouts were issued.
    Resolved,
    /// Grace period elapsed unresolved; stakes were returned.
    Refunded,
}

impl MarketState {
    /// Whether the state admits no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved | Self::Refunded)
    }
}

/// How stakes are priced at quote time.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PricingModel {
    /// Shares are raw points; odds are the pool ratio.
    PariMutuel,
    /// Constant-product pool quoting; two options only.
    ConstantProductAmm,
}

/// Price information for a candidate stake, computed without mutating
/// the market.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Quote {
    /// Option the stake would back.
    pub option: String,
    /// Points the participant would commit.
    pub stake: u64,
    /// Shares the stake would buy under the market's pricing model.
    pub shares: f64,
    /// Effective points per share for this stake.
    pub price_per_share: f64,
    /// Current pari-mutuel odds on the option (`+inf` when nothing is
    /// staked on it). Settlement always pays pari-mutuel, so this is
    /// the honest payout multiplier whichever model quoted the price.
    pub odds: f64,
}

/// A single wagering market.
///
/// The pool maps each option (by position) to the cumulative stake per
/// participant. `total_staked` is kept equal to the sum of all entries
/// at all times.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Market {
    /// Unique market identifier (8-character hex), assigned at creation.
    pub id: String,

    /// Market question/description.
    pub question: String,

    /// Ordered option set, fixed at creation. Size >= 2, entries
    /// distinct and non-empty.
    pub options: Vec<String>,

    /// Identity of the user who opened the market; only this identity
    /// may resolve it.
    pub creator_id: UserId,

    /// Optional free-text tag for listing filters.
    pub category: Option<String>,

    /// When the market was created.
    pub created_at: DateTime<Utc>,

    /// When betting closes. Always after `created_at`.
    pub close_at: DateTime<Utc>,

    /// How quotes are priced. Fixed at creation.
    pub pricing_model: PricingModel,

    /// Per-option cumulative stake per participant, indexed in option
    /// order.
    pub stakes: Vec<HashMap<UserId, u64>>,

    /// Virtual liquidity pool; present only for AMM markets.
    pub amm: Option<LiquidityPool>,

    /// Running sum of all stakes across all options.
    pub total_staked: u64,

    /// Lifecycle state.
    pub state: MarketState,

    /// Winning option, set exactly once on resolution.
    pub result: Option<String>,
}

impl Market {
    /// Create a new open market with an empty pool.
    ///
    /// # Errors
    /// * `InvalidMarket` if fewer than two options, or if options are
    ///   empty or duplicated
    /// * `InvalidCloseTime` if `close_at` is not after `created_at`
    /// * `InvalidOptionCount` if the AMM model is chosen with anything
    ///   but exactly two options
    pub fn new(
        question: String,
        options: Vec<String>,
        creator_id: UserId,
        category: Option<String>,
        created_at: DateTime<Utc>,
        close_at: DateTime<Utc>,
        pricing_model: PricingModel,
        initial_liquidity: u64,
    ) -> Result<Self> {
        if options.len() < 2 {
            return Err(MarketError::InvalidMarket(
                "a market needs at least two options".to_string(),
            ));
        }
        for (i, option) in options.iter().enumerate() {
            if option.trim().is_empty() {
                return Err(MarketError::InvalidMarket(format!(
                    "option {} is empty",
                    i + 1
                )));
            }
            if options[..i].contains(option) {
                return Err(MarketError::InvalidMarket(format!(
                    "duplicate option '{option}'"
                )));
            }
        }
        if close_at <= created_at {
            return Err(MarketError::InvalidCloseTime(format!(
                "close time {close_at} is not after creation time {created_at}"
            )));
        }

        let amm = match pricing_model {
            PricingModel::PariMutuel => None,
            PricingModel::ConstantProductAmm => {
                // The constant-product formula looks up "the opposite
                // option", which is only defined for exactly two.
                if options.len() != 2 {
                    return Err(MarketError::InvalidOptionCount {
                        model: "constant-product AMM",
                        expected: 2,
                        actual: options.len(),
                    });
                }
                Some(LiquidityPool::new(initial_liquidity))
            }
        };

        let stakes = vec![HashMap::new(); options.len()];
        Ok(Self {
            id: crate::utils::generate_market_id(),
            question,
            options,
            creator_id,
            category,
            created_at,
            close_at,
            pricing_model,
            stakes,
            amm,
            total_staked: 0,
            state: MarketState::Open,
            result: None,
        })
    }

    /// Position of an option in the ordered option set.
    pub fn option_index(&self, option: &str) -> Result<usize> {
        self.options
            .iter()
            .position(|o| o == option)
            .ok_or_else(|| MarketError::InvalidOption(option.to_string()))
    }

    /// Whether the market accepts stakes at `now`.
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.state == MarketState::Open && now < self.close_at
    }

    /// Total points staked on one option across all participants.
    pub fn staked_on(&self, option_index: usize) -> u64 {
        self.stakes[option_index].values().sum()
    }

    /// Cumulative stake one participant holds on one option.
    pub fn participant_stake(&self, option_index: usize, participant: UserId) -> u64 {
        self.stakes[option_index]
            .get(&participant)
            .copied()
            .unwrap_or(0)
    }

    /// Current pari-mutuel odds on an option: total pool over the
    /// option's pool, `+inf` when the option has no stake yet.
    pub fn odds(&self, option_index: usize) -> f64 {
        let on_option = self.staked_on(option_index);
        if on_option == 0 {
            f64::INFINITY
        } else {
            self.total_staked as f64 / on_option as f64
        }
    }

    /// Odds for every option, in option order.
    pub fn all_odds(&self) -> Vec<(String, f64)> {
        self.options
            .iter()
            .enumerate()
            .map(|(i, option)| (option.clone(), self.odds(i)))
            .collect()
    }

    /// Price a candidate stake without mutating the market.
    ///
    /// # Errors
    /// * `InvalidOption` if the option is not part of the market
    /// * `InvalidAmount` if `amount` is zero
    /// * `LiquidityExhausted` if the AMM cannot fill the stake
    pub fn quote(&self, option: &str, amount: u64) -> Result<Quote> {
        let index = self.option_index(option)?;
        if amount == 0 {
            return Err(MarketError::InvalidAmount(0));
        }

        let shares = match &self.amm {
            None => amount as f64,
            Some(pool) => pool
                .quote(index, amount)
                .ok_or_else(|| MarketError::LiquidityExhausted(option.to_string()))?,
        };

        Ok(Quote {
            option: option.to_string(),
            stake: amount,
            shares,
            price_per_share: amount as f64 / shares,
            odds: self.odds(index),
        })
    }

    /// Commit a stake to the local pool bookkeeping.
    ///
    /// This is the local half of the stake transaction; the engine
    /// escrows the points via the ledger before calling it. Cumulative:
    /// a repeat stake by the same participant on the same option adds
    /// to their existing position.
    pub fn apply_stake(&mut self, participant: UserId, option_index: usize, amount: u64) -> Result<f64> {
        if self.state != MarketState::Open {
            return Err(MarketError::MarketClosed(self.id.clone()));
        }
        if amount == 0 {
            return Err(MarketError::InvalidAmount(0));
        }

        let shares = match &mut self.amm {
            None => amount as f64,
            Some(pool) => pool.apply(option_index, amount).ok_or_else(|| {
                MarketError::LiquidityExhausted(self.options[option_index].clone())
            })?,
        };

        *self.stakes[option_index].entry(participant).or_insert(0) += amount;
        self.total_staked += amount;
        Ok(shares)
    }

    /// Flip `Open -> AwaitingResolution` when the close timer fires.
    ///
    /// Returns `false` without touching the market if the state has
    /// already moved on; the lifecycle task is the only caller.
    pub fn begin_awaiting_resolution(&mut self) -> bool {
        if self.state == MarketState::Open {
            self.state = MarketState::AwaitingResolution;
            true
        } else {
            false
        }
    }

    /// Flip `AwaitingResolution -> Resolved`, recording the winner.
    ///
    /// This is the compare-and-set gate between manual resolution and
    /// the auto-refund timer: exactly one of them wins.
    pub fn complete_resolution(&mut self, winning_index: usize) -> Result<()> {
        self.require_awaiting()?;
        self.result = Some(self.options[winning_index].clone());
        self.state = MarketState::Resolved;
        Ok(())
    }

    /// Flip `AwaitingResolution -> Refunded`.
    pub fn complete_refund(&mut self) -> Result<()> {
        self.require_awaiting()?;
        self.state = MarketState::Refunded;
        Ok(())
    }

    fn require_awaiting(&self) -> Result<()> {
        match self.state {
            MarketState::AwaitingResolution => Ok(()),
            MarketState::Open => Err(MarketError::MarketNotClosed(self.id.clone())),
            MarketState::Resolved => Err(MarketError::AlreadyResolved(self.id.clone())),
            MarketState::Refunded => Err(MarketError::AlreadyRefunded(self.id.clone())),
        }
    }

    /// Every (participant, option, amount) position on the market.
    pub fn bet_history(&self) -> Vec<(UserId, String, u64)> {
        let mut history = Vec::new();
        for (index, option) in self.options.iter().enumerate() {
            for (participant, amount) in &self.stakes[index] {
                history.push((*participant, option.clone(), *amount));
            }
        }
        history
    }

    /// Human-readable status summary.
    pub fn status(&self, now: DateTime<Utc>) -> String {
        match self.state {
            MarketState::Open if now < self.close_at => "Open - accepting stakes".to_string(),
            MarketState::Open | MarketState::AwaitingResolution => {
                "Closed - awaiting resolution".to_string()
            }
            MarketState::Resolved => match &self.result {
                Some(winner) => format!("Resolved - '{winner}' won"),
                None => "Resolved".to_string(),
            },
            MarketState::Refunded => "Refunded - no resolution within grace period".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{amm_market, pari_market};
    use chrono::Duration;

    #[test]
    fn test_new_market_starts_open_and_empty() {
        let market = pari_market(&["Yes", "No"]);
        assert_eq!(market.state, MarketState::Open);
        assert_eq!(market.total_staked, 0);
        assert!(market.result.is_none());
        assert_eq!(market.id.len(), 8);
    }

    #[test]
    fn test_rejects_fewer_than_two_options() {
        let now = Utc::now();
        let result = Market::new(
            "Will it rain?".to_string(),
            vec!["Yes".to_string()],
            1,
            None,
            now,
            now + Duration::minutes(10),
            PricingModel::PariMutuel,
            100,
        );
        assert!(matches!(result, Err(MarketError::InvalidMarket(_))));
    }

    #[test]
    fn test_rejects_duplicate_and_empty_options() {
        let now = Utc::now();
        let dup = Market::new(
            "q".to_string(),
            vec!["Yes".to_string(), "Yes".to_string()],
            1,
            None,
            now,
            now + Duration::minutes(10),
            PricingModel::PariMutuel,
            100,
        );
        assert!(matches!(dup, Err(MarketError::InvalidMarket(_))));

        let empty = Market::new(
            "q".to_string(),
            vec!["Yes".to_string(), "  ".to_string()],
            1,
            None,
            now,
            now + Duration::minutes(10),
            PricingModel::PariMutuel,
            100,
        );
        assert!(matches!(empty, Err(MarketError::InvalidMarket(_))));
    }

    #[test]
    fn test_rejects_close_time_in_the_past() {
        let now = Utc::now();
        let result = Market::new(
            "q".to_string(),
            vec!["Yes".to_string(), "No".to_string()],
            1,
            None,
            now,
            now - Duration::minutes(1),
            PricingModel::PariMutuel,
            100,
        );
        assert!(matches!(result, Err(MarketError::InvalidCloseTime(_))));
    }

    #[test]
    fn test_amm_requires_exactly_two_options() {
        let now = Utc::now();
        let result = Market::new(
            "q".to_string(),
            vec!["A".to_string(), "B".to_string(), "C".to_string()],
            1,
            None,
            now,
            now + Duration::minutes(10),
            PricingModel::ConstantProductAmm,
            100,
        );
        assert!(matches!(
            result,
            Err(MarketError::InvalidOptionCount {
                expected: 2,
                actual: 3,
                ..
            })
        ));
    }

    #[test]
    fn test_quote_rejects_unknown_option_and_zero_amount() {
        let market = pari_market(&["Yes", "No"]);
        assert!(matches!(
            market.quote("Maybe", 10),
            Err(MarketError::InvalidOption(_))
        ));
        assert!(matches!(
            market.quote("Yes", 0),
            Err(MarketError::InvalidAmount(0))
        ));
    }

    #[test]
    fn test_pari_mutuel_quote_and_odds() {
        let mut market = pari_market(&["Yes", "No"]);
        market.apply_stake(1, 0, 100).unwrap();
        market.apply_stake(2, 1, 300).unwrap();

        let quote = market.quote("Yes", 50).unwrap();
        assert_eq!(quote.shares, 50.0);
        assert_eq!(quote.price_per_share, 1.0);
        assert_eq!(quote.odds, 4.0); // 400 / 100

        // Nothing staked on a fresh market: odds are infinite.
        let fresh = pari_market(&["Yes", "No"]);
        assert!(fresh.quote("Yes", 10).unwrap().odds.is_infinite());
    }

    #[test]
    fn test_amm_quote_example() {
        let market = amm_market();
        let quote = market.quote("Yes", 50).unwrap();
        assert!((quote.shares - 33.333_333).abs() < 1e-3);
        assert!((quote.price_per_share - 1.5).abs() < 0.01);
    }

    #[test]
    fn test_stake_accumulates_per_participant() {
        let mut market = pari_market(&["Yes", "No"]);
        market.apply_stake(1, 0, 100).unwrap();
        market.apply_stake(1, 0, 50).unwrap();
        assert_eq!(market.participant_stake(0, 1), 150);
        assert_eq!(market.total_staked, 150);
    }

    #[test]
    fn test_total_staked_matches_pool_sum() {
        let mut market = pari_market(&["A", "B", "C"]);
        market.apply_stake(1, 0, 100).unwrap();
        market.apply_stake(2, 1, 40).unwrap();
        market.apply_stake(3, 1, 60).unwrap();
        market.apply_stake(1, 2, 25).unwrap();
        let pool_sum: u64 = (0..market.options.len()).map(|i| market.staked_on(i)).sum();
        assert_eq!(market.total_staked, pool_sum);
    }

    #[test]
    fn test_stake_rejected_after_close_flip() {
        let mut market = pari_market(&["Yes", "No"]);
        assert!(market.begin_awaiting_resolution());
        assert!(matches!(
            market.apply_stake(1, 0, 10),
            Err(MarketError::MarketClosed(_))
        ));
    }

    #[test]
    fn test_state_machine_is_monotone() {
        let mut market = pari_market(&["Yes", "No"]);

        // Cannot resolve or refund while open.
        assert!(matches!(
            market.complete_resolution(0),
            Err(MarketError::MarketNotClosed(_))
        ));

        assert!(market.begin_awaiting_resolution());
        // Second flip attempt is a no-op.
        assert!(!market.begin_awaiting_resolution());

        market.complete_resolution(0).unwrap();
        assert_eq!(market.state, MarketState::Resolved);
        assert_eq!(market.result.as_deref(), Some("Yes"));

        // Terminal state rejects everything.
        assert!(matches!(
            market.complete_resolution(1),
            Err(MarketError::AlreadyResolved(_))
        ));
        assert!(matches!(
            market.complete_refund(),
            Err(MarketError::AlreadyResolved(_))
        ));
        assert!(!market.begin_awaiting_resolution());
        assert_eq!(market.result.as_deref(), Some("Yes"));
    }

    #[test]
    fn test_refund_is_terminal_too() {
        let mut market = pari_market(&["Yes", "No"]);
        market.begin_awaiting_resolution();
        market.complete_refund().unwrap();
        assert_eq!(market.state, MarketState::Refunded);
        assert!(matches!(
            market.complete_resolution(0),
            Err(MarketError::AlreadyRefunded(_))
        ));
    }

    #[test]
    fn test_bet_history_lists_every_position() {
        let mut market = pari_market(&["Yes", "No"]);
        market.apply_stake(1, 0, 100).unwrap();
        market.apply_stake(2, 1, 300).unwrap();
        let mut history = market.bet_history();
        history.sort();
        assert_eq!(
            history,
            vec![(1, "Yes".to_string(), 100), (2, "No".to_string(), 300)]
        );
    }
}
