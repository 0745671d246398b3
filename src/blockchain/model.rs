use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use log::{debug, info, warn};
use secp256k1::PublicKey;

use super::Block;
use crate::error::{LedgerError, Result};
use crate::transaction::Transaction;
use crate::wallet::{public_key_to_hex, verify_transaction};

/// Ledger handle shared by the miner, wallets and the consensus agent.
pub type SharedLedger = Arc<Mutex<Ledger>>;

/// How much `is_valid_chain` checks beyond linkage and proof-of-work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationMode {
    /// Linkage and proof-of-work only. Signatures are not checked.
    #[default]
    ProofOnly,
    /// Additionally require valid signatures on regular transactions and a
    /// self-paid reward of exactly the ledger reward.
    Strict,
}

impl FromStr for ValidationMode {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "proof-only" | "proof_only" => Ok(ValidationMode::ProofOnly),
            "strict" => Ok(ValidationMode::Strict),
            other => Err(LedgerError::Configuration(format!(
                "unknown validation mode '{other}' (expected 'proof-only' or 'strict')"
            ))),
        }
    }
}

/// The accepted chain plus the pool of unconfirmed transactions.
#[derive(Debug, Clone)]
pub struct Ledger {
    pub chain: Vec<Block>,
    pub mempool: Vec<Transaction>,
    pub difficulty: u32,
    pub reward: u64,
    pub peers: BTreeSet<String>,
    pub validation: ValidationMode,
}

impl Ledger {
    /// An empty ledger. The first mined block becomes genesis.
    pub fn new(difficulty: u32, reward: u64) -> Self {
        Self {
            chain: Vec::new(),
            mempool: Vec::new(),
            difficulty,
            reward,
            peers: BTreeSet::new(),
            validation: ValidationMode::default(),
        }
    }

    pub fn with_validation(mut self, validation: ValidationMode) -> Self {
        self.validation = validation;
        self
    }

    pub fn into_shared(self) -> SharedLedger {
        Arc::new(Mutex::new(self))
    }

    pub fn latest_block(&self) -> Option<&Block> {
        self.chain.last()
    }

    /// Hash a new block must link to; `None` while the chain is empty.
    pub fn tip_hash(&self) -> Option<String> {
        self.latest_block().map(Block::hash)
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn set_difficulty(&mut self, difficulty: u32) {
        // NOTE: Changing difficulty affects future appends and validation.
        self.difficulty = difficulty;
    }

    /// Append a mined block.
    ///
    /// The block must satisfy the current difficulty and link to the current
    /// tip (or be a genesis block on an empty chain). On success the
    /// transactions it consumed leave the mempool and `reward_recipient` is
    /// credited through replay. On failure nothing changes.
    pub fn add_block(&mut self, block: Block, reward_recipient: &PublicKey) -> Result<()> {
        let hash = block.hash();
        if !block.satisfies_proof(self.difficulty) {
            warn!(
                "Block {} rejected. Does not satisfy difficulty {}",
                hash, self.difficulty
            );
            return Err(LedgerError::RejectedBlock {
                hash,
                difficulty: self.difficulty,
            });
        }

        if block.previous_hash != self.tip_hash() {
            warn!("Block {} rejected. Its parent is not the current tip", hash);
            return Err(LedgerError::StaleTip { hash });
        }

        let consumed = &block.transactions.regular;
        if self.mempool.starts_with(consumed) {
            self.mempool.drain(..consumed.len());
        } else {
            self.mempool.retain(|tx| !consumed.contains(tx));
        }
        debug!(
            "Mempool cleared of {} txs ({} left)",
            consumed.len(),
            self.mempool.len()
        );

        self.chain.push(block);
        info!("Block {} added at height {}", hash, self.chain.len() - 1);
        info!(
            "Rewarded {} to {}",
            self.reward,
            public_key_to_hex(reward_recipient)
        );
        Ok(())
    }

    /// Append a transaction to the mempool.
    pub fn push_transaction(&mut self, tx: Transaction) {
        self.mempool.push(tx);
        debug!("Mempool size now {}", self.mempool.len());
    }

    /// Union `peers` into the known peer set. Returns how many were new.
    pub fn register_peers<I>(&mut self, peers: I) -> usize
    where
        I: IntoIterator<Item = String>,
    {
        let before = self.peers.len();
        self.peers.extend(
            peers
                .into_iter()
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty()),
        );
        self.peers.len() - before
    }

    /// Swap in a whole new chain. The mempool is left as is.
    pub fn replace_chain(&mut self, chain: Vec<Block>) {
        info!(
            "Replacing local chain (length {}) with chain of length {}",
            self.chain.len(),
            chain.len()
        );
        self.chain = chain;
    }

    /// Validate a candidate chain against this ledger's rules: one leading
    /// genesis block, every link matching its predecessor's hash, every block
    /// meeting the difficulty (and, in strict mode, properly authorized).
    pub fn is_valid_chain(&self, candidate: &[Block]) -> bool {
        if candidate.is_empty() {
            return false;
        }

        let mut prev_hash: Option<String> = None;
        for (i, block) in candidate.iter().enumerate() {
            match (&block.previous_hash, &prev_hash) {
                (None, None) => {}
                (Some(link), Some(prev)) if link == prev => {}
                (None, Some(_)) => {
                    debug!("invalid chain: second genesis block at height {i}");
                    return false;
                }
                _ => {
                    debug!("invalid chain: broken link at height {i}");
                    return false;
                }
            }

            let hash = block.hash();
            if !super::block::meets_difficulty(&hash, self.difficulty) {
                debug!("invalid chain: block {i} fails difficulty {}", self.difficulty);
                return false;
            }

            if self.validation == ValidationMode::Strict && !self.is_authorized(block) {
                debug!("invalid chain: block {i} carries unauthorized transactions");
                return false;
            }

            prev_hash = Some(hash);
        }
        true
    }

    fn is_authorized(&self, block: &Block) -> bool {
        let reward = &block.transactions.reward;
        reward.has_note()
            && reward.sender == reward.recipient
            && reward.amount == self.reward
            && block.transactions.regular.iter().all(verify_transaction)
    }

    /// Balance from appended blocks. Rewards credit their recipient; regular
    /// transfers credit the recipient and debit the sender.
    pub fn confirmed_balance(&self, key: &PublicKey) -> i128 {
        self.chain
            .iter()
            .map(|block| {
                let reward = &block.transactions.reward;
                let credited = if reward.recipient == *key {
                    i128::from(reward.amount)
                } else {
                    0
                };
                credited + balance_of(&block.transactions.regular, key)
            })
            .sum()
    }

    /// Balance from the mempool only.
    pub fn pending_balance(&self, key: &PublicKey) -> i128 {
        balance_of(&self.mempool, key)
    }

    pub fn total_balance(&self, key: &PublicKey) -> i128 {
        self.confirmed_balance(key) + self.pending_balance(key)
    }
}

fn balance_of(txs: &[Transaction], key: &PublicKey) -> i128 {
    txs.iter().map(|tx| tx.balance_delta(key)).sum()
}
