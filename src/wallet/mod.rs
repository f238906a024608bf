use serde::{Deserialize, Serialize};

use crate::crypto::HashProvider;

/// A simulated wallet: the address is the account identifier used by
/// transactions and balance queries. The private key is display-only — no
/// ledger operation verifies signatures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub address: String,
    pub private_key: String,
}

impl Wallet {
    /// Mint a wallet from the provider's identifier generator.
    pub fn generate(provider: &dyn HashProvider) -> Self {
        Self {
            address: provider.new_identifier(),
            private_key: provider.new_identifier(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Sha256Hasher;

    #[test]
    fn generated_wallets_are_unique() {
        let a = Wallet::generate(&Sha256Hasher);
        let b = Wallet::generate(&Sha256Hasher);
        assert_ne!(a.address, b.address);
        assert_eq!(a.address.len(), 32);
        assert!(a.address.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
