pub mod block;
pub mod model;

pub use block::{Block, BlockDraft, CapPolicy, PowSettings};
pub use model::Blockchain;

use thiserror::Error;

/// Default Proof-of-Work difficulty (number of leading zero hex chars).
pub const DEFAULT_DIFFICULTY: u32 = 2;

/// Fixed reward minted to the miner after each sealed block.
pub const MINING_REWARD: u64 = 100;

/// Upper bound on nonce attempts per block, so mining never spins forever
/// on slow targets or an out-of-range difficulty.
pub const MAX_MINE_ATTEMPTS: u64 = 1_000_000;

/// Sentinel previous-hash carried by the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// Everything that can go wrong while extending the chain. Nothing here is
/// fatal: callers get the error and the ledger state stays intact.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChainError {
    /// The attempt cap ran out before a digest met the difficulty target.
    #[error("proof-of-work target of {difficulty} leading zeros not met within {attempts} attempts")]
    PowExhausted { difficulty: u32, attempts: u64 },

    /// A sealed block no longer links to the chain tip it was staged against.
    #[error("block links to previous hash {found} but the chain tip is {expected}")]
    StaleBlock { expected: String, found: String },
}
