use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::blockchain::codec::{BlockJson, TransactionJson};
use crate::blockchain::{Ledger, SharedLedger};
use crate::config::{Config, check_difficulty};
use crate::consensus::{ConsensusAgent, HttpPeerClient};
use crate::error::Result;
use crate::node::Node;
use crate::persistence::{JsonFileStore, LedgerStore};
use crate::wallet::Wallet;

/// Shared application state: the ledger plus the components that act on it.
pub struct AppState {
    pub ledger: SharedLedger,
    pub node: Node,
    pub wallet: Wallet,
    pub consensus: ConsensusAgent<HttpPeerClient>,
    pub store: JsonFileStore,
}

impl AppState {
    /// Load persisted state (or start empty) and wire the node's wallet,
    /// miner and consensus agent to one shared ledger.
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = JsonFileStore::new(&config.data_dir);
        let ledger = match store.load_ledger_state()? {
            Some(ledger) => {
                check_difficulty(ledger.difficulty, "persisted difficulty")?;
                info!(
                    "Loaded ledger with {} blocks from {}",
                    ledger.len(),
                    store.path().display()
                );
                ledger
            }
            None => Ledger::new(config.difficulty, config.block_reward),
        }
        .with_validation(config.validation_mode)
        .into_shared();

        let wallet = match &config.miner_secret_key {
            Some(secret) => {
                Wallet::from_secret_hex(ledger.clone(), secret, config.miner_nickname.clone())?
            }
            None => {
                let wallet = Wallet::new(ledger.clone(), config.miner_nickname.clone());
                warn!(
                    "MINER_SECRET_KEY not set, rewards go to a fresh key {}",
                    wallet.public_key_hex()
                );
                wallet
            }
        };

        let mut node = Node::new(ledger.clone())
            .with_reward_key(wallet.public_key)
            .with_strategy(config.nonce_strategy);
        node.add_account(wallet.clone());

        let consensus = ConsensusAgent::new(ledger.clone(), HttpPeerClient::new(config.peer_timeout)?)
            .with_cancel_signal(node.cancel_handle());

        Ok(Self {
            ledger,
            node,
            wallet,
            consensus,
            store,
        })
    }

    /// Save the current ledger. Failures are logged, not propagated: the
    /// in-memory state stays authoritative.
    pub fn persist(&self) {
        if let Err(e) = self.store.save_shared(&self.ledger) {
            warn!("failed to persist ledger: {e}");
        }
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/* ---------- Chain API Models ---------- */

#[derive(Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
    pub length: usize,
    pub difficulty: u32,
}

#[derive(Deserialize)]
pub struct MineRequest {
    pub note: Option<String>,
}

#[derive(Serialize)]
pub struct MineResponse {
    pub message: String,
    pub hash: String,
    #[serde(flatten)]
    pub block: BlockJson,
}

#[derive(Serialize, Deserialize)]
pub struct DifficultyResponse {
    pub difficulty: u32,
}

#[derive(Deserialize)]
pub struct SetDifficultyRequest {
    pub difficulty: u32,
}

/* ---------- TX API Models ---------- */

#[derive(Deserialize)]
pub struct NewTxRequest {
    pub recipient: String,
    pub amount: u64,
}

#[derive(Serialize)]
pub struct MempoolResponse {
    pub size: usize,
    pub transactions: Vec<TransactionJson>,
}

#[derive(Serialize)]
pub struct BalanceResponse {
    pub public_key: String,
    pub confirmed: i128,
    pub pending: i128,
    pub total: i128,
}

/* ---------- Peer API Models ---------- */

#[derive(Deserialize)]
pub struct RegisterNodesRequest {
    pub nodes: Vec<String>,
}

#[derive(Serialize)]
pub struct RegisterNodesResponse {
    pub message: String,
    pub new_peers: Vec<String>,
}

#[derive(Serialize)]
pub struct PeersResponse {
    pub peers: Vec<String>,
}

#[derive(Serialize)]
pub struct ConsensusResponse {
    pub new_chain: bool,
    pub message: String,
}
