use chrono::Utc;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::{ChainError, GENESIS_PREVIOUS_HASH, MAX_MINE_ATTEMPTS};
use crate::crypto::HashProvider;
use crate::transaction::Transaction;

/// A sealed ledger entry. Blocks are only ever produced by
/// [`Block::genesis`] or [`BlockDraft::seal`] and never mutated afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: i64, // Unix millis (UTC)
    pub transactions: Vec<Transaction>,
    pub previous_hash: String,
    pub nonce: u64, // Proof-of-Work nonce
    pub hash: String,
}

impl Block {
    /// The fixed first block: no transactions, sentinel previous hash,
    /// hash computed once without any nonce search.
    pub fn genesis(provider: &dyn HashProvider) -> Self {
        let mut block = Self {
            index: 0,
            timestamp: Utc::now().timestamp_millis(),
            transactions: Vec::new(),
            previous_hash: GENESIS_PREVIOUS_HASH.to_string(),
            nonce: 0,
            hash: String::new(),
        };
        block.hash = block.compute_hash(provider);
        block
    }

    /// Digest of this block's contents (excluding the cached `hash` field).
    /// Transactions are serialized deterministically as JSON and included
    /// in the preimage.
    pub fn compute_hash(&self, provider: &dyn HashProvider) -> String {
        let txs_json = serde_json::to_string(&self.transactions).expect("serialize txs");
        let preimage = format!(
            "{}:{}:{}:{}:{}",
            self.index, self.timestamp, self.previous_hash, self.nonce, txs_json
        );
        provider.digest(&preimage)
    }

    /// Check the cached `hash` against the block contents.
    /// (Does NOT check chain linkage.)
    pub fn is_consistent(&self, provider: &dyn HashProvider) -> bool {
        self.hash == self.compute_hash(provider)
    }
}

/// Knobs for one sealing run. Snapshotted from the ledger at stage time, so
/// a difficulty change mid-mine never affects the block in flight.
#[derive(Debug, Clone, Copy)]
pub struct PowSettings {
    pub difficulty: u32,
    pub attempt_cap: u64,
    pub on_cap: CapPolicy,
}

impl Default for PowSettings {
    fn default() -> Self {
        Self {
            difficulty: super::DEFAULT_DIFFICULTY,
            attempt_cap: MAX_MINE_ATTEMPTS,
            on_cap: CapPolicy::Fail,
        }
    }
}

/// What to do when the attempt cap runs out before the target is met.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapPolicy {
    /// Surface [`ChainError::PowExhausted`] to the caller. The default.
    Fail,
    /// Overwrite the digest prefix with the target so the block still
    /// "satisfies" difficulty. Demo-mode fallback kept for parity with the
    /// legacy web build; not real proof-of-work.
    Coerce,
}

/// An unmined block: everything fixed except `nonce` and `hash`, which only
/// exist once [`BlockDraft::seal`] finds them.
#[derive(Debug, Clone)]
pub struct BlockDraft {
    index: u64,
    timestamp: i64,
    transactions: Vec<Transaction>,
    previous_hash: String,
}

impl BlockDraft {
    pub fn new(index: u64, previous_hash: String, transactions: Vec<Transaction>) -> Self {
        Self {
            index,
            timestamp: Utc::now().timestamp_millis(),
            transactions,
            previous_hash,
        }
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Perform Proof-of-Work: recompute the digest with an incrementing
    /// nonce until it starts with `difficulty` zeros or the attempt cap is
    /// hit. Difficulty 0 accepts the first digest.
    pub fn seal(&self, provider: &dyn HashProvider, settings: PowSettings) -> Result<Block, ChainError> {
        let target = "0".repeat(settings.difficulty as usize);
        let mut block = Block {
            index: self.index,
            timestamp: self.timestamp,
            transactions: self.transactions.clone(),
            previous_hash: self.previous_hash.clone(),
            nonce: 0,
            hash: String::new(),
        };

        let mut attempts: u64 = 0;
        loop {
            block.hash = block.compute_hash(provider);
            attempts += 1;
            if block.hash.starts_with(&target) {
                debug!(
                    "sealed block #{} after {} attempts (nonce={})",
                    block.index, attempts, block.nonce
                );
                return Ok(block);
            }
            if attempts >= settings.attempt_cap {
                break;
            }
            block.nonce = block.nonce.wrapping_add(1);
        }

        match settings.on_cap {
            CapPolicy::Fail => Err(ChainError::PowExhausted {
                difficulty: settings.difficulty,
                attempts,
            }),
            CapPolicy::Coerce => {
                warn!(
                    "attempt cap {} hit at difficulty {}; coercing hash prefix (demo fallback)",
                    settings.attempt_cap, settings.difficulty
                );
                let tail = block.hash.get(target.len()..).unwrap_or("");
                block.hash = format!("{target}{tail}");
                Ok(block)
            }
        }
    }
}
