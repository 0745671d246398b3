use std::collections::HashMap;
use std::time::Instant;

use log::{debug, info};
use secp256k1::PublicKey;

use crate::blockchain::{Block, CancelSignal, CancelToken, NonceStrategy, SharedLedger};
use crate::error::{LedgerError, Result};
use crate::transaction::Transaction;
use crate::wallet::{Wallet, public_key_to_hex};

/// Reward note carried by every genesis block.
pub const GENESIS_NOTE: &str = "Chancellor on brink of second bailout for banks";

/// The miner: builds blocks from the mempool, searches for a proof and
/// submits the result to the ledger.
///
/// Cloning is cheap and clones share the ledger and the cancel signal.
#[derive(Clone)]
pub struct Node {
    ledger: SharedLedger,
    reward_key: Option<PublicKey>,
    strategy: NonceStrategy,
    cancel: CancelSignal,
    accounts: HashMap<String, Wallet>,
}

impl Node {
    pub fn new(ledger: SharedLedger) -> Self {
        Self {
            ledger,
            reward_key: None,
            strategy: NonceStrategy::default(),
            cancel: CancelSignal::default(),
            accounts: HashMap::new(),
        }
    }

    pub fn with_reward_key(mut self, key: PublicKey) -> Self {
        self.reward_key = Some(key);
        self
    }

    pub fn with_strategy(mut self, strategy: NonceStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn set_reward_key(&mut self, key: PublicKey) {
        self.reward_key = Some(key);
    }

    pub fn reward_key(&self) -> Option<PublicKey> {
        self.reward_key
    }

    /// Register a wallet managed by this node, keyed by nickname or key hex.
    pub fn add_account(&mut self, wallet: Wallet) {
        self.accounts.insert(wallet.label(), wallet);
    }

    pub fn account(&self, label: &str) -> Option<&Wallet> {
        self.accounts.get(label)
    }

    pub fn accounts(&self) -> impl Iterator<Item = &Wallet> {
        self.accounts.values()
    }

    /// Signal shared with whoever may need to stop in-flight searches.
    pub fn cancel_handle(&self) -> CancelSignal {
        self.cancel.clone()
    }

    /// Stop every proof search started before this call.
    pub fn cancel_mining(&self) {
        self.cancel.raise();
    }

    /// Mine one block and append it to the ledger.
    ///
    /// On an empty chain this builds the genesis block, otherwise a block on
    /// the current tip carrying a snapshot of the mempool. The ledger lock is
    /// released during the proof search; the ledger re-checks proof and tip on
    /// submission.
    pub fn mine(&self, note: &str) -> Result<Block> {
        self.mine_with(note, self.cancel.token())
    }

    fn mine_with(&self, note: &str, cancel: CancelToken) -> Result<Block> {
        let reward_key = self.reward_key.ok_or_else(|| {
            LedgerError::Configuration(
                "no public key set to collect block rewards, create a wallet first".into(),
            )
        })?;

        let (mut block, difficulty) = self.build_block(reward_key, note);
        debug!(
            "MINER - searching proof for block with {} txs (difficulty {}, {:?})",
            block.transactions.len(),
            difficulty,
            self.strategy
        );

        let started = Instant::now();
        let proof = self.strategy.search(&mut block, difficulty, &cancel)?;

        {
            let mut ledger = self.ledger.lock().expect("mutex poisoned");
            ledger.add_block(block.clone(), &reward_key)?;
        }

        info!(
            "MINER - sealed block {} (proof={}, {} ms) for {}",
            block.hash(),
            proof,
            started.elapsed().as_millis(),
            public_key_to_hex(&reward_key)
        );
        Ok(block)
    }

    /// Snapshot the tip and mempool into an unmined block.
    fn build_block(&self, reward_key: PublicKey, note: &str) -> (Block, u32) {
        let ledger = self.ledger.lock().expect("mutex poisoned");
        let block = match ledger.tip_hash() {
            None => Block::genesis(Transaction::reward(reward_key, ledger.reward, GENESIS_NOTE)),
            Some(previous_hash) => Block::new(
                previous_hash,
                Transaction::reward(reward_key, ledger.reward, note),
                ledger.mempool.clone(),
            ),
        };
        (block, ledger.difficulty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::Ledger;
    use crate::transaction::Authorization;
    use std::thread;
    use std::time::Duration;

    fn node_with_wallet(difficulty: u32) -> (SharedLedger, Node, Wallet) {
        let ledger = Ledger::new(difficulty, 50).into_shared();
        let wallet = Wallet::new(ledger.clone(), Some("miner".into()));
        let mut node = Node::new(ledger.clone()).with_strategy(NonceStrategy::Sequential);
        node.set_reward_key(wallet.public_key);
        node.add_account(wallet.clone());
        (ledger, node, wallet)
    }

    #[test]
    fn mining_without_reward_key_is_configuration_error() {
        let ledger = Ledger::new(1, 50).into_shared();
        let node = Node::new(ledger.clone());
        assert!(matches!(node.mine(""), Err(LedgerError::Configuration(_))));
        assert!(ledger.lock().unwrap().chain.is_empty());
    }

    #[test]
    fn first_block_is_genesis_with_fixed_note() {
        let (ledger, node, wallet) = node_with_wallet(1);
        let block = node.mine("ignored").unwrap();

        assert!(block.is_genesis());
        assert!(block.transactions.regular.is_empty());
        let reward = &block.transactions.reward;
        assert_eq!(reward.sender, wallet.public_key);
        assert_eq!(reward.recipient, wallet.public_key);
        assert_eq!(reward.amount, 50);
        assert_eq!(reward.authorization, Authorization::Note(GENESIS_NOTE.into()));
        assert_eq!(ledger.lock().unwrap().chain, vec![block]);
    }

    #[test]
    fn later_blocks_consume_mempool_and_link_to_tip() {
        let (ledger, node, wallet) = node_with_wallet(2);
        let genesis = node.mine("").unwrap();
        let peer = Wallet::new(ledger.clone(), None);
        let tx = wallet.send(peer.public_key, 20).unwrap();

        let block = node.mine("block two").unwrap();
        assert_eq!(block.previous_hash, Some(genesis.hash()));
        assert_eq!(block.transactions.regular, vec![tx]);
        assert_eq!(
            block.transactions.reward.authorization,
            Authorization::Note("block two".into())
        );
        assert!(block.hash().starts_with("00"));

        let ledger = ledger.lock().unwrap();
        assert!(ledger.mempool.is_empty());
        assert_eq!(ledger.len(), 2);
        assert!(ledger.is_valid_chain(&ledger.chain));
    }

    #[test]
    fn raised_difficulty_during_search_rejects_block() {
        let (ledger, node, _) = node_with_wallet(1);
        node.mine("").unwrap();
        let reward_key = node.reward_key().unwrap();
        let (mut block, difficulty) = node.build_block(reward_key, "");
        let token = node.cancel.token();
        node.strategy
            .search(&mut block, difficulty, &token)
            .unwrap();
        while block.satisfies_proof(2) {
            block.proof += 1;
            node.strategy
                .search(&mut block, difficulty, &token)
                .unwrap();
        }

        let mut guard = ledger.lock().unwrap();
        guard.set_difficulty(2);
        assert!(matches!(
            guard.add_block(block, &reward_key),
            Err(LedgerError::RejectedBlock { difficulty: 2, .. })
        ));
    }

    #[test]
    fn cancel_stops_long_search() {
        let (_, node, _) = node_with_wallet(64);
        let worker = node.clone();
        let handle = thread::spawn(move || worker.mine(""));
        // The worker may not have taken its token yet; raise until it stops.
        while !handle.is_finished() {
            node.cancel_mining();
            thread::sleep(Duration::from_millis(10));
        }
        assert!(matches!(handle.join().unwrap(), Err(LedgerError::Cancelled)));
    }

    #[test]
    fn new_search_does_not_clear_earlier_cancel() {
        let (ledger, node, _) = node_with_wallet(1);
        let earlier = node.cancel.token();
        node.cancel_mining();

        // A search started after the cancel runs normally...
        node.mine("").unwrap();
        // ...and the one started before it still observes the cancel.
        assert!(matches!(
            node.mine_with("", earlier),
            Err(LedgerError::Cancelled)
        ));
        assert_eq!(ledger.lock().unwrap().len(), 1);
    }

    #[test]
    fn accounts_are_keyed_by_label() {
        let (ledger, mut node, wallet) = node_with_wallet(1);
        assert_eq!(
            node.account("miner").map(|w| w.public_key),
            Some(wallet.public_key)
        );
        let anonymous = Wallet::new(ledger, None);
        let label = anonymous.public_key_hex();
        node.add_account(anonymous);
        assert!(node.account(&label).is_some());
        assert_eq!(node.accounts().count(), 2);
    }
}
