//! In-memory blockchain ledger with Proof-of-Work.
//!
//! The crate models a single-process, append-only chain: transactions are
//! queued in a pending pool, sealed into blocks by a nonce search over a
//! pluggable hash provider, and balances are derived by rescanning the chain.
//! There is no networking, persistence or signature verification.

pub mod blockchain;
pub mod crypto;
pub mod miner;
pub mod transaction;
pub mod wallet;

pub use blockchain::{Block, Blockchain, ChainError};
pub use crypto::{HashProvider, Sha256Hasher};
pub use miner::{MineOutcome, Miner, MinerError};
pub use transaction::Transaction;
pub use wallet::Wallet;
