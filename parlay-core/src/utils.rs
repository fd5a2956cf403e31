//! # Utility Functions
//!
//! Common helpers for market identifiers and display formatting.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a random 8-character uppercase hex market ID
pub fn generate_market_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_uppercase()
}

/// Format timestamp as human-readable string
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Format a point amount with thousands separators
pub fn format_points(amount: u64) -> String {
    let digits = amount.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
