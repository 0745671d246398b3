use thiserror::Error;

/// Every failure the ledger core can surface to a caller.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("block {hash} rejected: does not satisfy difficulty {difficulty}")]
    RejectedBlock { hash: String, difficulty: u32 },

    #[error("block {hash} rejected: its parent is no longer the chain tip")]
    StaleTip { hash: String },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("insufficient funds: requested {requested}, confirmed balance is {available}")]
    InsufficientFunds { requested: u64, available: i128 },

    #[error("decode error: {0}")]
    Decode(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("proof search cancelled")]
    Cancelled,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::Decode(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
