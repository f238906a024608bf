use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::SYSTEM_ADDRESS;

/// A single value transfer between two addresses. Immutable once built.
///
/// The timestamp (Unix millis, UTC) is informational only; it records when
/// the transfer was created, not when it was mined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub from_address: String,
    pub to_address: String,
    pub amount: u64,
    pub timestamp: i64,
}

impl Transaction {
    /// Create a transfer stamped with the current wall clock.
    pub fn new(
        from_address: impl Into<String>,
        to_address: impl Into<String>,
        amount: u64,
    ) -> Self {
        Self {
            from_address: from_address.into(),
            to_address: to_address.into(),
            amount,
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    /// Mint a mining reward to `miner_address` from the system sender.
    pub fn reward(miner_address: impl Into<String>, amount: u64) -> Self {
        Self::new(SYSTEM_ADDRESS, miner_address, amount)
    }

    /// True when the coins were minted rather than transferred.
    pub fn is_reward(&self) -> bool {
        self.from_address == SYSTEM_ADDRESS
    }
}
