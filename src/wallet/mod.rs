use std::collections::HashMap;

use log::{info, warn};
use rand::rngs::OsRng;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey, ecdsa::Signature};

use crate::blockchain::SharedLedger;
use crate::error::{LedgerError, Result};
use crate::transaction::{Authorization, Transaction};

/// Generate a fresh secp256k1 keypair.
pub fn generate_keypair() -> (SecretKey, PublicKey) {
    let secp = Secp256k1::new();
    secp.generate_keypair(&mut OsRng)
}

/// Generate a new keypair and return (priv_hex, pub_hex_compressed).
pub fn generate_keypair_hex() -> (String, String) {
    let (sk, pk) = generate_keypair();
    (hex::encode(sk.secret_bytes()), public_key_to_hex(&pk))
}

/// Compressed SEC1 encoding of a public key, hex-encoded.
pub fn public_key_to_hex(pk: &PublicKey) -> String {
    hex::encode(pk.serialize())
}

pub fn public_key_from_hex(pubkey_hex: &str) -> Result<PublicKey> {
    let bytes = hex::decode(pubkey_hex.trim())
        .map_err(|_| LedgerError::Decode(format!("invalid public key hex: {pubkey_hex}")))?;
    PublicKey::from_slice(&bytes)
        .map_err(|_| LedgerError::Decode(format!("invalid public key bytes: {pubkey_hex}")))
}

pub fn secret_key_from_hex(secret_hex: &str) -> Result<SecretKey> {
    let bytes = hex::decode(secret_hex.trim())
        .map_err(|_| LedgerError::Decode("invalid secret key hex".into()))?;
    SecretKey::from_slice(&bytes).map_err(|_| LedgerError::Decode("invalid secret key bytes".into()))
}

/// Parse a hex DER ECDSA signature.
pub fn signature_from_hex(sig_hex: &str) -> Result<Signature> {
    let bytes = hex::decode(sig_hex)
        .map_err(|_| LedgerError::Decode("invalid signature hex".into()))?;
    Signature::from_der(&bytes).map_err(|_| LedgerError::Decode("invalid DER signature".into()))
}

/// Check a transaction's signature against its sender. Reward notes never verify.
pub fn verify_transaction(tx: &Transaction) -> bool {
    let Authorization::Signature(sig) = &tx.authorization else {
        return false;
    };
    let secp = Secp256k1::verification_only();
    let msg = Message::from_digest(tx.sighash());
    secp.verify_ecdsa(&msg, sig, &tx.sender).is_ok()
}

/// A signing identity bound to a shared ledger.
///
/// The wallet owns no ledger state: balances are replayed from the ledger on
/// every query and the only write it performs is appending to the mempool.
#[derive(Clone)]
pub struct Wallet {
    secret_key: SecretKey,
    pub public_key: PublicKey,
    pub nickname: Option<String>,
    peer_nicknames: HashMap<String, String>,
    ledger: SharedLedger,
}

impl Wallet {
    /// Create a wallet with a freshly generated keypair.
    pub fn new(ledger: SharedLedger, nickname: Option<String>) -> Self {
        let (secret_key, _) = generate_keypair();
        Self::from_secret_key(ledger, secret_key, nickname)
    }

    pub fn from_secret_key(
        ledger: SharedLedger,
        secret_key: SecretKey,
        nickname: Option<String>,
    ) -> Self {
        let secp = Secp256k1::signing_only();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        Self {
            secret_key,
            public_key,
            nickname,
            peer_nicknames: HashMap::new(),
            ledger,
        }
    }

    pub fn from_secret_hex(
        ledger: SharedLedger,
        secret_hex: &str,
        nickname: Option<String>,
    ) -> Result<Self> {
        let secret_key = secret_key_from_hex(secret_hex)?;
        Ok(Self::from_secret_key(ledger, secret_key, nickname))
    }

    pub fn public_key_hex(&self) -> String {
        public_key_to_hex(&self.public_key)
    }

    /// Name used when listing this wallet: the nickname, else the key hex.
    pub fn label(&self) -> String {
        self.nickname.clone().unwrap_or_else(|| self.public_key_hex())
    }

    pub fn set_nickname(&mut self, nickname: impl Into<String>) {
        self.nickname = Some(nickname.into());
    }

    pub fn add_peer_nickname(&mut self, peer: &PublicKey, nickname: impl Into<String>) {
        self.peer_nicknames
            .insert(public_key_to_hex(peer), nickname.into());
    }

    pub fn peer_nickname(&self, peer: &PublicKey) -> Option<&str> {
        self.peer_nicknames
            .get(&public_key_to_hex(peer))
            .map(String::as_str)
    }

    /// Spend confirmed funds: sign a transfer to `recipient` and append it to
    /// the mempool. Pending funds, incoming or outgoing, are not spendable.
    pub fn send(&self, recipient: PublicKey, amount: u64) -> Result<Transaction> {
        // Balance check and append happen under one lock.
        let mut ledger = self.ledger.lock().expect("mutex poisoned");
        let available = ledger.confirmed_balance(&self.public_key);
        if i128::from(amount) > available {
            warn!(
                "WALLET - {} attempted to send {} but only has {} confirmed",
                self.label(),
                amount,
                available
            );
            return Err(LedgerError::InsufficientFunds {
                requested: amount,
                available,
            });
        }

        let signature = self.sign(&recipient, amount);
        let tx = Transaction::new(
            self.public_key,
            recipient,
            amount,
            Authorization::Signature(signature),
        );
        ledger.push_transaction(tx.clone());
        info!(
            "WALLET - {} sent {} to {}",
            self.label(),
            amount,
            public_key_to_hex(&recipient)
        );
        Ok(tx)
    }

    /// Sign `{sender, recipient, amount}` with this wallet's key.
    pub fn sign(&self, recipient: &PublicKey, amount: u64) -> Signature {
        let secp = Secp256k1::signing_only();
        let msg = Message::from_digest(Transaction::sighash_for(
            &self.public_key,
            recipient,
            amount,
        ));
        secp.sign_ecdsa(&msg, &self.secret_key)
    }

    /// Recompute the signed payload of `transaction` and check `authorization`
    /// against its sender.
    pub fn verify(&self, authorization: &Authorization, transaction: &Transaction) -> bool {
        let mut candidate = transaction.clone();
        candidate.authorization = authorization.clone();
        verify_transaction(&candidate)
    }

    pub fn confirmed_balance(&self) -> i128 {
        let ledger = self.ledger.lock().expect("mutex poisoned");
        ledger.confirmed_balance(&self.public_key)
    }

    pub fn pending_balance(&self) -> i128 {
        let ledger = self.ledger.lock().expect("mutex poisoned");
        ledger.pending_balance(&self.public_key)
    }

    pub fn balance(&self) -> i128 {
        let ledger = self.ledger.lock().expect("mutex poisoned");
        ledger.total_balance(&self.public_key)
    }

    /// Mempool transactions this wallet sends or receives.
    pub fn mempool_transactions(&self) -> Vec<Transaction> {
        let ledger = self.ledger.lock().expect("mutex poisoned");
        ledger
            .mempool
            .iter()
            .filter(|tx| tx.involves(&self.public_key))
            .cloned()
            .collect()
    }

    /// Confirmed transactions (rewards included) this wallet sends or receives.
    pub fn confirmed_transactions(&self) -> Vec<Transaction> {
        let ledger = self.ledger.lock().expect("mutex poisoned");
        ledger
            .chain
            .iter()
            .flat_map(|block| block.transactions.iter())
            .filter(|tx| tx.involves(&self.public_key))
            .cloned()
            .collect()
    }

    /// Confirmed history followed by pending transactions.
    pub fn all_transactions(&self) -> Vec<Transaction> {
        let mut txs = self.confirmed_transactions();
        txs.extend(self.mempool_transactions());
        txs
    }

    /// Render `sender -> recipient: (amount)` lines, substituting this
    /// wallet's nickname and known peer nicknames for raw keys.
    pub fn describe(&self, txs: &[Transaction]) -> String {
        let mut out = String::new();
        for tx in txs {
            out.push_str(&format!(
                "\t- {} -> {}: ({})\n",
                self.name_for(&tx.sender),
                self.name_for(&tx.recipient),
                tx.amount
            ));
        }
        out
    }

    fn name_for(&self, key: &PublicKey) -> String {
        if *key == self.public_key {
            return self.label();
        }
        self.peer_nickname(key)
            .map(str::to_string)
            .unwrap_or_else(|| public_key_to_hex(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::{Ledger, NonceStrategy};
    use crate::node::Node;

    fn funded(reward: u64) -> (SharedLedger, Wallet, Node) {
        let ledger = Ledger::new(1, reward).into_shared();
        let wallet = Wallet::new(ledger.clone(), Some("brandon".into()));
        let node = Node::new(ledger.clone())
            .with_reward_key(wallet.public_key)
            .with_strategy(NonceStrategy::Sequential);
        node.mine("").expect("genesis");
        (ledger, wallet, node)
    }

    #[test]
    fn keypair_hex_roundtrips_through_parsers() {
        let (sk_hex, pk_hex) = generate_keypair_hex();
        let sk = secret_key_from_hex(&sk_hex).unwrap();
        let pk = public_key_from_hex(&pk_hex).unwrap();
        let secp = Secp256k1::signing_only();
        assert_eq!(PublicKey::from_secret_key(&secp, &sk), pk);
        assert_eq!(pk_hex.len(), 66);
    }

    #[test]
    fn malformed_keys_are_decode_errors() {
        assert!(matches!(public_key_from_hex("zz"), Err(LedgerError::Decode(_))));
        assert!(matches!(public_key_from_hex("02ab"), Err(LedgerError::Decode(_))));
        assert!(matches!(signature_from_hex("00"), Err(LedgerError::Decode(_))));
    }

    #[test]
    fn send_signs_and_queues_transaction() {
        let (ledger, wallet, _node) = funded(50);
        let peer = Wallet::new(ledger.clone(), Some("laura".into()));

        let tx = wallet.send(peer.public_key, 25).unwrap();
        assert!(wallet.verify(&tx.authorization, &tx));
        assert!(verify_transaction(&tx));
        assert_eq!(ledger.lock().unwrap().mempool, vec![tx]);
    }

    #[test]
    fn verify_rejects_signature_from_another_key() {
        let (ledger, wallet, _node) = funded(50);
        let peer = Wallet::new(ledger.clone(), None);
        let tx = wallet.send(peer.public_key, 5).unwrap();

        let forged = Authorization::Signature(peer.sign(&peer.public_key, 5));
        assert!(!wallet.verify(&forged, &tx));

        let mut tampered = tx.clone();
        tampered.amount = 6;
        assert!(!wallet.verify(&tx.authorization, &tampered));
        assert!(!wallet.verify(&Authorization::Note("hi".into()), &tx));
    }

    #[test]
    fn send_beyond_confirmed_balance_fails_and_appends_nothing() {
        let (ledger, wallet, _node) = funded(50);
        let peer = Wallet::new(ledger.clone(), None);

        let err = wallet.send(peer.public_key, 51).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientFunds {
                requested: 51,
                available: 50
            }
        ));
        assert!(ledger.lock().unwrap().mempool.is_empty());
    }

    #[test]
    fn pending_incoming_funds_are_not_spendable() {
        let (ledger, wallet, _node) = funded(50);
        let peer = Wallet::new(ledger.clone(), None);
        wallet.send(peer.public_key, 20).unwrap();

        assert_eq!(peer.balance(), 20);
        assert!(matches!(
            peer.send(wallet.public_key, 1),
            Err(LedgerError::InsufficientFunds { .. })
        ));
    }

    #[test]
    fn balances_follow_send_and_confirmation() {
        let (ledger, brandon, node) = funded(50);
        let laura = Wallet::new(ledger.clone(), Some("laura".into()));
        assert_eq!(brandon.confirmed_balance(), 50);

        brandon.send(laura.public_key, 25).unwrap();
        assert_eq!(laura.pending_balance(), 25);
        assert_eq!(laura.balance(), 25);
        assert_eq!(laura.confirmed_balance(), 0);
        assert_eq!(brandon.pending_balance(), -25);
        assert_eq!(brandon.balance(), 25);

        node.mine("second").unwrap();
        assert_eq!(laura.confirmed_balance(), 25);
        assert_eq!(laura.pending_balance(), 0);
        assert_eq!(brandon.confirmed_balance(), 75);
    }

    #[test]
    fn history_and_description_use_nicknames() {
        let (ledger, mut brandon, node) = funded(50);
        let laura = Wallet::new(ledger.clone(), None);
        let tom = Wallet::new(ledger.clone(), None);
        brandon.add_peer_nickname(&laura.public_key, "Laura");

        brandon.send(laura.public_key, 10).unwrap();
        node.mine("").unwrap();
        brandon.send(tom.public_key, 5).unwrap();

        assert_eq!(brandon.confirmed_transactions().len(), 3);
        assert_eq!(brandon.mempool_transactions().len(), 1);
        let all = brandon.all_transactions();
        assert_eq!(all.len(), 4);
        assert!(laura.mempool_transactions().is_empty());

        let text = brandon.describe(&all[1..3]);
        assert!(text.contains("brandon -> Laura: (10)"));
        let pending = brandon.describe(&brandon.mempool_transactions());
        assert!(pending.contains(&format!("brandon -> {}: (5)", tom.public_key_hex())));
    }
}
