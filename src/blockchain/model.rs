use std::sync::Arc;

use log::{debug, info};

use super::{Block, BlockDraft, CapPolicy, ChainError, GENESIS_PREVIOUS_HASH, MAX_MINE_ATTEMPTS, MINING_REWARD, PowSettings};
use crate::crypto::{HashProvider, Sha256Hasher};
use crate::transaction::Transaction;
use crate::wallet::Wallet;

/// In-memory ledger: the append-only chain plus the pool of transactions
/// waiting to be mined. Lives for the process only; nothing is persisted.
///
/// The chain and pool are private so state can only change through the
/// operations below. A block becomes visible in `chain()` only once fully
/// sealed.
pub struct Blockchain {
    chain: Vec<Block>,
    pending_transactions: Vec<Transaction>,
    difficulty: u32,
    mining_reward: u64,
    attempt_cap: u64,
    on_cap: CapPolicy,
    hasher: Arc<dyn HashProvider>,
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new(super::DEFAULT_DIFFICULTY)
    }
}

impl Blockchain {
    /// New ledger with a genesis block, hashed with SHA-256.
    pub fn new(difficulty: u32) -> Self {
        Self::with_hasher(difficulty, Arc::new(Sha256Hasher))
    }

    /// New ledger over an arbitrary hash provider (e.g. the fast
    /// non-cryptographic one for constrained targets or tests).
    pub fn with_hasher(difficulty: u32, hasher: Arc<dyn HashProvider>) -> Self {
        let genesis = Block::genesis(hasher.as_ref());
        Self {
            chain: vec![genesis],
            pending_transactions: Vec::new(),
            difficulty,
            mining_reward: MINING_REWARD,
            attempt_cap: MAX_MINE_ATTEMPTS,
            on_cap: CapPolicy::Fail,
            hasher,
        }
    }

    /// Queue a transaction for the next mined block. Always accepted: the
    /// ledger never checks funds — whether a sender can afford a transfer is
    /// caller (UI) policy.
    pub fn create_transaction(&mut self, transaction: Transaction) {
        debug!(
            "queued tx {} -> {} ({})",
            transaction.from_address, transaction.to_address, transaction.amount
        );
        self.pending_transactions.push(transaction);
    }

    /// Seal the pending pool into a new block, append it and roll the pool
    /// over to a single reward transaction for `miner_address`.
    ///
    /// On [`ChainError::PowExhausted`] (cap policy [`CapPolicy::Fail`]) the
    /// chain and pool are left exactly as they were.
    pub fn mine_pending_transactions(
        &mut self,
        miner_address: &str,
    ) -> Result<&Block, ChainError> {
        let draft = self.stage_block();
        let block = draft.seal(self.hasher.as_ref(), self.pow_settings())?;
        self.commit_block(block, miner_address)
    }

    /// Snapshot the chain tip and pending pool into an unmined draft. The
    /// snapshot is a copy: transactions queued after this point belong to
    /// the *next* block, never the one being sealed.
    pub fn stage_block(&self) -> BlockDraft {
        BlockDraft::new(
            self.chain.len() as u64,
            self.last_block().hash.clone(),
            self.pending_transactions.clone(),
        )
    }

    /// Append a sealed block and roll the pool: the transactions it carried
    /// are dropped from the front of the pool, a reward for `miner_address`
    /// takes their place, and anything queued while the seal ran stays
    /// behind it for the next block.
    ///
    /// Rejects blocks staged against a superseded tip instead of corrupting
    /// the chain.
    pub fn commit_block(
        &mut self,
        block: Block,
        miner_address: &str,
    ) -> Result<&Block, ChainError> {
        let tip = self.last_block();
        if block.previous_hash != tip.hash || block.index != self.chain.len() as u64 {
            return Err(ChainError::StaleBlock {
                expected: tip.hash.clone(),
                found: block.previous_hash,
            });
        }

        let included = block.transactions.len().min(self.pending_transactions.len());
        let carried = self.pending_transactions.split_off(included);
        self.pending_transactions.clear();
        self.pending_transactions
            .push(Transaction::reward(miner_address, self.mining_reward));
        self.pending_transactions.extend(carried);

        info!(
            "appended block #{} (hash={}, nonce={}, txs={})",
            block.index,
            block.hash,
            block.nonce,
            block.transactions.len()
        );
        self.chain.push(block);
        Ok(self.last_block())
    }

    /// Balance of `address`, derived by rescanning every transaction in the
    /// chain: credits where it is the recipient, debits where it is the
    /// sender. Pure and idempotent; may go negative because the ledger never
    /// rejects transfers for insufficient funds.
    pub fn get_balance_of_address(&self, address: &str) -> i128 {
        let mut balance: i128 = 0;
        for block in &self.chain {
            for tx in &block.transactions {
                if tx.from_address == address {
                    balance -= tx.amount as i128;
                }
                if tx.to_address == address {
                    balance += tx.amount as i128;
                }
            }
        }
        balance
    }

    /// Mint a wallet from the hash provider's identifier generator. The
    /// private key is carried for display realism only — no ledger operation
    /// ever checks a signature.
    pub fn create_wallet(&self) -> Wallet {
        Wallet::generate(self.hasher.as_ref())
    }

    /// Validate the entire chain: genesis immutability, linkage and hash
    /// integrity of every block.
    pub fn is_valid_chain(&self) -> bool {
        let genesis = &self.chain[0];
        if genesis.index != 0
            || genesis.previous_hash != GENESIS_PREVIOUS_HASH
            || !genesis.is_consistent(self.hasher.as_ref())
        {
            return false;
        }

        for i in 1..self.chain.len() {
            let current = &self.chain[i];
            let prev = &self.chain[i - 1];
            if current.previous_hash != prev.hash || current.index != prev.index + 1 {
                return false;
            }
            if !current.is_consistent(self.hasher.as_ref()) {
                return false;
            }
        }
        true
    }

    /// Return the last block in the chain.
    pub fn last_block(&self) -> &Block {
        self.chain
            .last()
            .expect("chain always holds at least the genesis block")
    }

    /// Read-only view of the chain, genesis first.
    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    /// Read-only view of the transactions awaiting inclusion.
    pub fn pending_transactions(&self) -> &[Transaction] {
        &self.pending_transactions
    }

    /// Number of blocks in the chain, genesis included. Never zero.
    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    /// Change the difficulty for future blocks. Already-mined blocks are
    /// never re-evaluated.
    pub fn set_difficulty(&mut self, difficulty: u32) {
        self.difficulty = difficulty;
    }

    pub fn mining_reward(&self) -> u64 {
        self.mining_reward
    }

    pub fn set_attempt_cap(&mut self, attempt_cap: u64) {
        self.attempt_cap = attempt_cap;
    }

    pub fn set_cap_policy(&mut self, on_cap: CapPolicy) {
        self.on_cap = on_cap;
    }

    /// The settings one sealing run should use, snapshotted together.
    pub fn pow_settings(&self) -> PowSettings {
        PowSettings {
            difficulty: self.difficulty,
            attempt_cap: self.attempt_cap,
            on_cap: self.on_cap,
        }
    }

    /// Handle to the hash provider, for sealing outside the ledger lock.
    pub fn hasher(&self) -> Arc<dyn HashProvider> {
        Arc::clone(&self.hasher)
    }
}
