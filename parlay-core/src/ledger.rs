//! # Points Ledger Client
//!
//! The ledger is the external service of record for user point
//! balances. The engine only ever talks to it through the
//! [`LedgerClient`] trait: balance queries, point credits/debits and
//! atomic transfers, each of which is an independently failable
//! network operation.
//!
//! Two implementations are provided: [`HttpLedger`] speaking the
//! points-API wire protocol over HTTP, and [`MemoryLedger`], an
//! in-process balance store for tests and demos.

use crate::market::UserId;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use thiserror::Error;

/// Errors surfaced by ledger operations.
///
/// A failed credit or debit must not be assumed to mean "no effect";
/// callers never double-apply without a way to detect partial
/// application. A failed transfer means no transfer occurred.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Network or auth failure reaching the ledger.
    #[error("Ledger unavailable: {0}")]
    Unavailable(String),

    /// The ledger refused the operation.
    #[error("Ledger rejected the request (status {status}): {message}")]
    Rejected { status: u16, message: String },

    /// The source account cannot cover the amount.
    #[error("Insufficient funds in account {account}")]
    InsufficientFunds { account: UserId },
}

impl From<reqwest::Error> for LedgerError {
    fn from(err: reqwest::Error) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// A remote, failable transactional balance store.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Current point balance of a user.
    async fn get_balance(&self, user_id: UserId) -> Result<u64, LedgerError>;

    /// Add `amount` points (> 0) to a user's balance.
    async fn credit_points(&self, user_id: UserId, amount: u64) -> Result<(), LedgerError>;

    /// Remove `amount` points (> 0) from a user's balance.
    async fn debit_points(&self, user_id: UserId, amount: u64) -> Result<(), LedgerError>;

    /// Move `amount` points from one user to another. Atomic at the
    /// ledger's discretion; an error means no transfer occurred.
    async fn transfer_points(
        &self,
        from_user_id: UserId,
        to_user_id: UserId,
        amount: u64,
    ) -> Result<(), LedgerError>;
}

#[derive(Deserialize)]
struct MemberResponse {
    #[serde(default)]
    balances: HashMap<String, u64>,
}

/// HTTP adapter for the points-ledger API.
///
/// Authenticates with a bearer API key and addresses accounts as
/// realm members: `GET /api/v4/realms/{realm}/members/{user}` for
/// balances, `PATCH .../members/{user}/tokenBalance` for credits and
/// debits (signed token delta), and `PATCH .../members/{user}/transfer`
/// for transfers.
pub struct HttpLedger {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    realm_id: String,
}

impl HttpLedger {
    /// Create a client for one realm of the ledger service.
    pub fn new(base_url: &str, api_key: &str, realm_id: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            realm_id: realm_id.to_string(),
        }
    }

    fn member_url(&self, user_id: UserId) -> String {
        format!(
            "{}/api/v4/realms/{}/members/{}",
            self.base_url, self.realm_id, user_id
        )
    }

    async fn adjust_balance(&self, user_id: UserId, delta: i64) -> Result<(), LedgerError> {
        let response = self
            .client
            .patch(format!("{}/tokenBalance", self.member_url(user_id)))
            .bearer_auth(&self.api_key)
            .json(&json!({ "tokens": delta }))
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(LedgerError::Rejected {
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            })
        }
    }
}

#[async_trait]
impl LedgerClient for HttpLedger {
    async fn get_balance(&self, user_id: UserId) -> Result<u64, LedgerError> {
        let response = self
            .client
            .get(self.member_url(user_id))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(LedgerError::Unavailable(format!(
                "balance query failed with status {}",
                response.status()
            )));
        }
        let member: MemberResponse = response.json().await?;
        // A member may hold several point kinds; the realm's primary
        // kind is the first one reported.
        Ok(member.balances.values().next().copied().unwrap_or(0))
    }

    async fn credit_points(&self, user_id: UserId, amount: u64) -> Result<(), LedgerError> {
        self.adjust_balance(user_id, amount as i64).await
    }

    async fn debit_points(&self, user_id: UserId, amount: u64) -> Result<(), LedgerError> {
        self.adjust_balance(user_id, -(amount as i64)).await
    }

    async fn transfer_points(
        &self,
        from_user_id: UserId,
        to_user_id: UserId,
        amount: u64,
    ) -> Result<(), LedgerError> {
        let response = self
            .client
            .patch(format!("{}/transfer", self.member_url(from_user_id)))
            .bearer_auth(&self.api_key)
            .json(&json!({ "recipientId": to_user_id, "tokens": amount }))
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(LedgerError::Rejected {
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            })
        }
    }
}

/// In-process ledger keeping balances in a mutex-guarded map.
///
/// Used by the test suite and the CLI demo mode; transfers debit and
/// credit under a single lock so they are atomic.
#[derive(Default)]
pub struct MemoryLedger {
    balances: Mutex<HashMap<UserId, u64>>,
}

impl MemoryLedger {
    /// Empty ledger: every account starts at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an account with an opening balance.
    pub fn with_balance(self, user_id: UserId, amount: u64) -> Self {
        self.balances.lock().insert(user_id, amount);
        self
    }
}

#[async_trait]
impl LedgerClient for MemoryLedger {
    async fn get_balance(&self, user_id: UserId) -> Result<u64, LedgerError> {
        Ok(self.balances.lock().get(&user_id).copied().unwrap_or(0))
    }

    async fn credit_points(&self, user_id: UserId, amount: u64) -> Result<(), LedgerError> {
        *self.balances.lock().entry(user_id).or_insert(0) += amount;
        Ok(())
    }

    async fn debit_points(&self, user_id: UserId, amount: u64) -> Result<(), LedgerError> {
        let mut balances = self.balances.lock();
        let balance = balances.entry(user_id).or_insert(0);
        if *balance < amount {
            return Err(LedgerError::InsufficientFunds { account: user_id });
        }
        *balance -= amount;
        Ok(())
    }

    async fn transfer_points(
        &self,
        from_user_id: UserId,
        to_user_id: UserId,
        amount: u64,
    ) -> Result<(), LedgerError> {
        let mut balances = self.balances.lock();
        let from = balances.entry(from_user_id).or_insert(0);
        if *from < amount {
            return Err(LedgerError::InsufficientFunds {
                account: from_user_id,
            });
        }
        *from -= amount;
        *balances.entry(to_user_id).or_insert(0) += amount;
        Ok(())
    }
}
