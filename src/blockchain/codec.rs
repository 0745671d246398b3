//! Serialized shapes exchanged with peers and written to disk.
//!
//! Field names are fixed for interop. Keys are hex-encoded compressed points,
//! regular authorizations are hex DER signatures and reward authorizations
//! are free text.

use serde::{Deserialize, Serialize};

use super::{Block, BlockTransactions, Ledger};
use crate::error::{LedgerError, Result};
use crate::transaction::{Authorization, Transaction};
use crate::wallet::{public_key_from_hex, public_key_to_hex, signature_from_hex};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionJson {
    pub sender: String,
    pub recipient: String,
    pub amount: u64,
    pub authorization: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionsJson {
    pub reward: Option<TransactionJson>,
    pub regular: Vec<TransactionJson>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockJson {
    pub previous_hash: Option<String>,
    pub timestamp: f64,
    pub transactions: TransactionsJson,
    pub proof: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerJson {
    pub chain: Vec<BlockJson>,
    pub pending_transactions: Vec<TransactionJson>,
    pub difficulty: u32,
    pub reward: u64,
    pub peers: Vec<String>,
}

impl From<&Transaction> for TransactionJson {
    fn from(tx: &Transaction) -> Self {
        Self {
            sender: public_key_to_hex(&tx.sender),
            recipient: public_key_to_hex(&tx.recipient),
            amount: tx.amount,
            authorization: tx.authorization.to_wire(),
        }
    }
}

impl TransactionJson {
    /// Decode a regular transfer; the authorization must be a hex DER signature.
    pub fn into_regular(self) -> Result<Transaction> {
        let signature = signature_from_hex(&self.authorization)?;
        self.into_transaction(Authorization::Signature(signature))
    }

    /// Decode a reward transaction; the authorization is kept as a note.
    pub fn into_reward(self) -> Result<Transaction> {
        let note = Authorization::Note(self.authorization.clone());
        self.into_transaction(note)
    }

    fn into_transaction(self, authorization: Authorization) -> Result<Transaction> {
        Ok(Transaction::new(
            public_key_from_hex(&self.sender)?,
            public_key_from_hex(&self.recipient)?,
            self.amount,
            authorization,
        ))
    }
}

impl From<&Block> for BlockJson {
    fn from(block: &Block) -> Self {
        Self {
            previous_hash: block.previous_hash.clone(),
            timestamp: block.timestamp,
            transactions: TransactionsJson {
                reward: Some(TransactionJson::from(&block.transactions.reward)),
                regular: block
                    .transactions
                    .regular
                    .iter()
                    .map(TransactionJson::from)
                    .collect(),
            },
            proof: block.proof,
        }
    }
}

impl TryFrom<BlockJson> for Block {
    type Error = LedgerError;

    fn try_from(json: BlockJson) -> Result<Self> {
        let reward = json
            .transactions
            .reward
            .ok_or_else(|| LedgerError::Decode("block has no reward transaction".into()))?
            .into_reward()?;
        let regular = json
            .transactions
            .regular
            .into_iter()
            .map(TransactionJson::into_regular)
            .collect::<Result<Vec<_>>>()?;

        Ok(Block {
            previous_hash: json.previous_hash,
            timestamp: json.timestamp,
            transactions: BlockTransactions { reward, regular },
            proof: json.proof,
        })
    }
}

impl From<&Ledger> for LedgerJson {
    fn from(ledger: &Ledger) -> Self {
        Self {
            chain: ledger.chain.iter().map(BlockJson::from).collect(),
            pending_transactions: ledger.mempool.iter().map(TransactionJson::from).collect(),
            difficulty: ledger.difficulty,
            reward: ledger.reward,
            peers: ledger.peers.iter().cloned().collect(),
        }
    }
}

impl TryFrom<LedgerJson> for Ledger {
    type Error = LedgerError;

    fn try_from(json: LedgerJson) -> Result<Self> {
        let mut ledger = Ledger::new(json.difficulty, json.reward);
        ledger.chain = json
            .chain
            .into_iter()
            .map(Block::try_from)
            .collect::<Result<Vec<_>>>()?;
        ledger.mempool = json
            .pending_transactions
            .into_iter()
            .map(TransactionJson::into_regular)
            .collect::<Result<Vec<_>>>()?;
        ledger.register_peers(json.peers);
        Ok(ledger)
    }
}

/// Serialize the whole ledger to its JSON interchange form.
pub fn serialize(ledger: &Ledger) -> Result<String> {
    Ok(serde_json::to_string(&LedgerJson::from(ledger))?)
}

/// Parse and decode a serialized ledger. Any malformed key, signature or
/// missing field is a `Decode` error.
pub fn deserialize(raw: &str) -> Result<Ledger> {
    let json: LedgerJson = serde_json::from_str(raw)?;
    Ledger::try_from(json)
}
