use chrono::Utc;
use sha2::{Digest, Sha256};

use crate::transaction::Transaction;

/// The transactions sealed in a block: exactly one reward, then the regular
/// transfers in mempool order.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockTransactions {
    pub reward: Transaction,
    pub regular: Vec<Transaction>,
}

impl BlockTransactions {
    /// Reward first, then regular transactions.
    pub fn iter(&self) -> impl Iterator<Item = &Transaction> {
        std::iter::once(&self.reward).chain(self.regular.iter())
    }

    pub fn len(&self) -> usize {
        1 + self.regular.len()
    }
}

/// A block linking to its predecessor by hash and sealed by a proof value.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    /// `None` only for the genesis block.
    pub previous_hash: Option<String>,
    pub timestamp: f64, // seconds since the Unix epoch
    pub transactions: BlockTransactions,
    pub proof: u64, // Proof-of-Work nonce
}

/// Current time as fractional Unix seconds.
pub fn now_secs() -> f64 {
    let now = Utc::now();
    now.timestamp() as f64 + f64::from(now.timestamp_subsec_micros()) / 1_000_000.0
}

impl Block {
    /// Create the genesis block (no predecessor, no regular transactions).
    pub fn genesis(reward: Transaction) -> Self {
        Self {
            previous_hash: None,
            timestamp: now_secs(),
            transactions: BlockTransactions {
                reward,
                regular: Vec::new(),
            },
            proof: 0,
        }
    }

    /// Create a new block on top of `previous_hash` (not mined yet).
    pub fn new(previous_hash: String, reward: Transaction, regular: Vec<Transaction>) -> Self {
        Self {
            previous_hash: Some(previous_hash),
            timestamp: now_secs(),
            transactions: BlockTransactions { reward, regular },
            proof: 0,
        }
    }

    pub fn is_genesis(&self) -> bool {
        self.previous_hash.is_none()
    }

    /// Everything in the hash preimage except the proof, which is appended last.
    /// Splitting it out lets the proof search reuse the prefix.
    pub fn preimage_base(&self) -> String {
        let regular = self
            .transactions
            .regular
            .iter()
            .map(Transaction::preimage)
            .collect::<Vec<_>>()
            .join(",");
        format!(
            "{}:{}:{}|[{}]:",
            self.previous_hash.as_deref().unwrap_or("none"),
            self.timestamp,
            self.transactions.reward.preimage(),
            regular
        )
    }

    /// SHA-256 (hex) over previous hash, timestamp, transactions and proof.
    pub fn hash(&self) -> String {
        hash_with_proof(&self.preimage_base(), self.proof)
    }

    /// True iff the first `difficulty` hex characters of the hash are `'0'`.
    pub fn satisfies_proof(&self, difficulty: u32) -> bool {
        meets_difficulty(&self.hash(), difficulty)
    }
}

pub(crate) fn hash_with_proof(base: &str, proof: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(base.as_bytes());
    hasher.update(proof.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

pub(crate) fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
    let difficulty = difficulty as usize;
    hash.len() >= difficulty && hash.chars().take(difficulty).all(|c| c == '0')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::{CancelSignal, Ledger, NonceStrategy};
    use crate::transaction::Authorization;
    use crate::wallet::{Wallet, generate_keypair};

    fn sample_block() -> Block {
        let miner = Wallet::new(Ledger::new(1, 50).into_shared(), None);
        let (_, other) = generate_keypair();
        let regular = vec![Transaction::new(
            miner.public_key,
            other,
            5,
            Authorization::Signature(miner.sign(&other, 5)),
        )];
        Block::new(
            "prev".into(),
            Transaction::reward(miner.public_key, 50, "hello"),
            regular,
        )
    }

    #[test]
    fn hash_is_deterministic_hex() {
        let b = sample_block();
        assert_eq!(b.hash(), b.clone().hash());
        assert_eq!(b.hash().len(), 64);
        assert!(b.hash().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn mining_produces_leading_zeros() {
        let mut b = sample_block();
        NonceStrategy::Sequential
            .search(&mut b, 2, &CancelSignal::default().token())
            .unwrap();
        assert!(b.hash().starts_with("00"));
        assert!(b.satisfies_proof(2));
    }

    #[test]
    fn every_field_changes_the_hash() {
        let b = sample_block();
        let before = b.hash();

        let mut m = b.clone();
        m.proof += 1;
        assert_ne!(before, m.hash());

        let mut m = b.clone();
        m.timestamp += 0.5;
        assert_ne!(before, m.hash());

        let mut m = b.clone();
        m.previous_hash = None;
        assert_ne!(before, m.hash());

        let mut m = b.clone();
        m.transactions.reward.amount += 1;
        assert_ne!(before, m.hash());

        let mut m = b.clone();
        m.transactions.regular[0].amount = 6;
        assert_ne!(before, m.hash());

        let mut m = b.clone();
        m.transactions.regular.clear();
        assert_ne!(before, m.hash());
    }

    #[test]
    fn difficulty_predicate_counts_hex_zeros() {
        assert!(meets_difficulty("000abc", 3));
        assert!(!meets_difficulty("00a0bc", 3));
        assert!(meets_difficulty("abc", 0));
        assert!(!meets_difficulty("00", 3));
    }

    #[test]
    fn transactions_iterate_reward_first() {
        let b = sample_block();
        let txs: Vec<_> = b.transactions.iter().collect();
        assert_eq!(txs.len(), b.transactions.len());
        assert_eq!(txs[0], &b.transactions.reward);
        assert!(txs[0].has_note());
        assert!(!txs[1].has_note());
    }
}
