use secp256k1::{PublicKey, ecdsa::Signature};
use sha2::{Digest, Sha256};

/// What a transaction carries to justify itself.
///
/// Regular transfers are signed by the sender. Reward transactions carry a
/// free-form note instead, which nobody can verify.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authorization {
    Signature(Signature),
    Note(String),
}

impl Authorization {
    /// Serialized form: DER signature as hex, or the note text verbatim.
    pub fn to_wire(&self) -> String {
        match self {
            Authorization::Signature(sig) => hex::encode(sig.serialize_der().to_vec()),
            Authorization::Note(note) => note.clone(),
        }
    }

    /// Unambiguous hex rendering used inside block hash preimages.
    fn to_preimage(&self) -> String {
        match self {
            Authorization::Signature(sig) => {
                format!("sig={}", hex::encode(sig.serialize_der().to_vec()))
            }
            Authorization::Note(note) => format!("note={}", hex::encode(note.as_bytes())),
        }
    }
}

/// An immutable value transfer between two public keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub sender: PublicKey,
    pub recipient: PublicKey,
    pub amount: u64,
    pub authorization: Authorization,
}

impl Transaction {
    pub fn new(
        sender: PublicKey,
        recipient: PublicKey,
        amount: u64,
        authorization: Authorization,
    ) -> Self {
        Self {
            sender,
            recipient,
            amount,
            authorization,
        }
    }

    /// Build the reward (coinbase) transaction paying `amount` to `key`.
    pub fn reward(key: PublicKey, amount: u64, note: impl Into<String>) -> Self {
        Self::new(key, key, amount, Authorization::Note(note.into()))
    }

    /// Canonical payload covered by the sender's signature. Excludes the
    /// authorization itself.
    pub fn signing_payload(sender: &PublicKey, recipient: &PublicKey, amount: u64) -> Vec<u8> {
        format!(
            "{}:{}:{}",
            hex::encode(sender.serialize()),
            hex::encode(recipient.serialize()),
            amount
        )
        .into_bytes()
    }

    /// SHA-256 of the signing payload for the given fields.
    pub fn sighash_for(sender: &PublicKey, recipient: &PublicKey, amount: u64) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(Self::signing_payload(sender, recipient, amount));
        let digest = hasher.finalize();
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest[..]);
        out
    }

    pub fn sighash(&self) -> [u8; 32] {
        Self::sighash_for(&self.sender, &self.recipient, self.amount)
    }

    /// Deterministic rendering of every field, fed into the block hash.
    pub fn preimage(&self) -> String {
        format!(
            "{}>{}:{}:{}",
            hex::encode(self.sender.serialize()),
            hex::encode(self.recipient.serialize()),
            self.amount,
            self.authorization.to_preimage()
        )
    }

    /// True when the authorization is a free-form note rather than a
    /// signature. Whether a transaction is a block's reward is decided by its
    /// slot in `BlockTransactions`, not by this.
    pub fn has_note(&self) -> bool {
        matches!(self.authorization, Authorization::Note(_))
    }

    pub fn involves(&self, key: &PublicKey) -> bool {
        self.sender == *key || self.recipient == *key
    }

    /// Effect of this transfer on `key`'s balance. A self-transfer nets to zero.
    pub fn balance_delta(&self, key: &PublicKey) -> i128 {
        let mut delta = 0i128;
        if self.recipient == *key {
            delta += i128::from(self.amount);
        }
        if self.sender == *key {
            delta -= i128::from(self.amount);
        }
        delta
    }
}
