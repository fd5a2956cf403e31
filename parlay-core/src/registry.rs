//! In-memory market registry.
//!
//! The registry is an append-only list of every market created during
//! the process lifetime; markets transition state in place and are
//! never removed. Each entry wraps its market in a `tokio` mutex that
//! serves as the per-market exclusive section: every read-modify-write
//! (quote-then-stake, resolve, refund) runs under it, so concurrent
//! operations on one market are serialized while different markets
//! proceed in parallel. Listings clone each market under its own lock,
//! so readers never observe a market mid-mutation.

use crate::market::{Market, MarketState, UserId};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tokio::task::AbortHandle;

/// A registered market together with its lifecycle task slot.
pub struct MarketHandle {
    /// Market id, readable without taking the market lock.
    pub id: String,
    market: tokio::sync::Mutex<Market>,
    lifecycle: Mutex<Option<AbortHandle>>,
}

impl MarketHandle {
    fn new(market: Market) -> Self {
        Self {
            id: market.id.clone(),
            market: tokio::sync::Mutex::new(market),
            lifecycle: Mutex::new(None),
        }
    }

    /// Enter the market's exclusive section.
    pub async fn lock(&self) -> tokio::sync::MutexGuard<'_, Market> {
        self.market.lock().await
    }

    /// Attach the market's lifecycle task so it can be cancelled on
    /// manual resolution.
    pub fn set_lifecycle(&self, handle: AbortHandle) {
        *self.lifecycle.lock() = Some(handle);
    }

    /// Cancel the lifecycle task. Idempotent: the handle is taken on
    /// first call, so the task is aborted at most once.
    pub fn cancel_lifecycle(&self) {
        if let Some(handle) = self.lifecycle.lock().take() {
            handle.abort();
        }
    }
}

/// Status views over the registry, matching how markets are listed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusFilter {
    /// State `Open` and the close time has not passed.
    Open,
    /// Closed but not yet terminal. Also covers markets whose close
    /// time passed before the lifecycle timer has flipped the state.
    AwaitingResolution,
    /// Resolved with a winner.
    Resolved,
    /// Auto-refunded after the grace period.
    Refunded,
}

impl StatusFilter {
    fn matches(&self, market: &Market, now: DateTime<Utc>) -> bool {
        match self {
            Self::Open => market.is_open_at(now),
            Self::AwaitingResolution => {
                market.state == MarketState::AwaitingResolution
                    || (market.state == MarketState::Open && now >= market.close_at)
            }
            Self::Resolved => market.state == MarketState::Resolved,
            Self::Refunded => market.state == MarketState::Refunded,
        }
    }
}

/// Criteria for listing markets. Unset fields match everything.
#[derive(Clone, Debug, Default)]
pub struct MarketFilter {
    pub status: Option<StatusFilter>,
    pub category: Option<String>,
    pub creator: Option<UserId>,
}

impl MarketFilter {
    fn matches(&self, market: &Market, now: DateTime<Utc>) -> bool {
        if let Some(status) = &self.status {
            if !status.matches(market, now) {
                return false;
            }
        }
        if let Some(category) = &self.category {
            if market.category.as_deref() != Some(category.as_str()) {
                return false;
            }
        }
        if let Some(creator) = self.creator {
            if market.creator_id != creator {
                return false;
            }
        }
        true
    }
}

/// Append-only collection of all markets in the process.
#[derive(Default)]
pub struct MarketRegistry {
    markets: RwLock<Vec<Arc<MarketHandle>>>,
}

impl MarketRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly created market. The sole insertion point.
    pub fn insert(&self, market: Market) -> Arc<MarketHandle> {
        let handle = Arc::new(MarketHandle::new(market));
        self.markets.write().push(handle.clone());
        handle
    }

    /// Look up a market by id.
    pub fn get(&self, id: &str) -> Option<Arc<MarketHandle>> {
        self.markets.read().iter().find(|h| h.id == id).cloned()
    }

    /// All handles, in insertion order.
    pub fn handles(&self) -> Vec<Arc<MarketHandle>> {
        self.markets.read().clone()
    }

    /// Snapshot every market matching the filter.
    ///
    /// Each market is cloned under its own lock, one at a time; the
    /// list lock itself is released before any market lock is taken.
    pub async fn snapshot(&self, filter: &MarketFilter, now: DateTime<Utc>) -> Vec<Market> {
        let handles = self.handles();
        let mut out = Vec::new();
        for handle in handles {
            let market = handle.lock().await;
            if filter.matches(&market, now) {
                out.push(market.clone());
            }
        }
        out
    }

    /// Distinct categories across all markets, for listing menus.
    pub async fn categories(&self) -> Vec<String> {
        let mut categories = Vec::new();
        for handle in self.handles() {
            let market = handle.lock().await;
            if let Some(category) = &market.category {
                if !categories.contains(category) {
                    categories.push(category.clone());
                }
            }
        }
        categories
    }

    pub fn len(&self) -> usize {
        self.markets.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.markets.read().is_empty()
    }
}
