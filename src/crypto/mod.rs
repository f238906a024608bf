use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Source of digests and fresh identifiers for the ledger.
///
/// Implementations must be deterministic (same input, same digest within one
/// provider) and emit a fixed-length hex string, so a leading-zero difficulty
/// target is meaningful. A provider whose digests trivially start with zeros
/// breaks the mining contract.
pub trait HashProvider: Send + Sync {
    /// Fixed-length hexadecimal digest of `input`.
    fn digest(&self, input: &str) -> String;

    /// Mint a fresh 32-hex-char identifier (wallet addresses, key material).
    fn new_identifier(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }
}

/// Real SHA-256 provider. The default for everything but constrained targets.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256Hasher;

impl HashProvider for Sha256Hasher {
    fn digest(&self, input: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(input.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Fast deterministic substitute for low-powered targets.
///
/// NOT cryptographic: a DJB2 hash of the input seeds a xorshift32 generator
/// that emits 32 pseudo-random bytes. Leading zeros in the hex output stay
/// statistically rare, so difficulty targets still pace mining.
#[derive(Debug, Default, Clone, Copy)]
pub struct XorShiftHasher;

impl HashProvider for XorShiftHasher {
    fn digest(&self, input: &str) -> String {
        // DJB2: seed = seed * 33 + byte, wrapping at 32 bits.
        let mut seed: i32 = 5381;
        for b in input.as_bytes() {
            seed = seed.wrapping_shl(5).wrapping_add(seed).wrapping_add(*b as i32);
        }
        if seed == 0 {
            seed = 1;
        }

        let mut bytes = [0u8; 32];
        for chunk in bytes.chunks_mut(4) {
            seed ^= seed.wrapping_shl(13);
            seed ^= ((seed as u32) >> 17) as i32;
            seed ^= seed.wrapping_shl(5);
            chunk.copy_from_slice(&(seed as u32).to_le_bytes());
        }
        hex::encode(bytes)
    }
}
