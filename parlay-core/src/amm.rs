//! Constant-product liquidity pool used to quote live prices on
//! two-option markets.
//!
//! Stakes are priced against a pair of virtual liquidity reserves with
//! the invariant `liquidity[A] * liquidity[B] = k`. Buying exposure on
//! one option adds the staked points to the opposite reserve and pays
//! out the shares that keep the product constant, so the effective
//! price per share rises as more is bought in the same direction.
//!
//! The pool only quotes prices. Settlement is always pari-mutuel over
//! the raw point stakes (see [`crate::settlement`]).

use serde::{Deserialize, Serialize};

/// Sides of a two-option pool, by option index.
pub const SIDE_A: usize = 0;
/// Sides of a two-option pool, by option index.
pub const SIDE_B: usize = 1;

/// A two-sided constant-product liquidity pool.
///
/// Both reserves start at the same size, fixing `k = initial²` for the
/// lifetime of the market.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LiquidityPool {
    /// Virtual reserves per option, indexed by option position.
    liquidity: [f64; 2],

    /// The constant product, fixed at creation.
    k: f64,
}

impl LiquidityPool {
    /// Create a pool with equal initial liquidity on both sides.
    pub fn new(initial_liquidity: u64) -> Self {
        let initial = initial_liquidity as f64;
        Self {
            liquidity: [initial, initial],
            k: initial * initial,
        }
    }

    /// Current virtual reserve for one side.
    pub fn liquidity(&self, side: usize) -> f64 {
        self.liquidity[side]
    }

    /// The constant product fixed at creation.
    pub fn k(&self) -> f64 {
        self.k
    }

    /// Shares bought by staking `points` on `side`, without mutating
    /// the pool. Returns `None` if the trade would not yield a
    /// strictly positive, finite number of shares or would drain the
    /// bought side's reserve.
    pub fn quote(&self, side: usize, points: u64) -> Option<f64> {
        if points == 0 {
            return None;
        }
        let other = 1 - side;
        let new_other = self.liquidity[other] + points as f64;
        let shares_out = self.liquidity[side] - self.k / new_other;
        let remaining = self.liquidity[side] - shares_out;
        if !shares_out.is_finite() || shares_out <= 0.0 || remaining <= 0.0 {
            return None;
        }
        Some(shares_out)
    }

    /// Commit a stake of `points` on `side`, returning the shares
    /// bought. The caller is expected to have quoted first; `None`
    /// means the trade was rejected and the pool is unchanged.
    pub fn apply(&mut self, side: usize, points: u64) -> Option<f64> {
        let shares_out = self.quote(side, points)?;
        let other = 1 - side;
        self.liquidity[other] += points as f64;
        self.liquidity[side] -= shares_out;
        Some(shares_out)
    }

    /// Check the constant-product invariant within floating tolerance.
    pub fn invariant_holds(&self) -> bool {
        let product = self.liquidity[SIDE_A] * self.liquidity[SIDE_B];
        (product - self.k).abs() <= self.k * 1e-9
    }
}
