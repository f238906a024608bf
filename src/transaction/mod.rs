pub mod model;

pub use model::Transaction;

/// Sentinel sender for minted coins (mining rewards, faucet seeds).
/// Transactions "from" this address debit nobody.
pub const SYSTEM_ADDRESS: &str = "System";
