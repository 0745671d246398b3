mod client;

pub use client::{HttpPeerClient, PeerClient};

use futures::future::join_all;
use log::{debug, info, warn};

use crate::blockchain::{Block, CancelSignal, SharedLedger, codec};

/// Result of one reconciliation round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// A strictly longer valid chain replaced the local one.
    Adopted,
    Unchanged,
}

/// Longest-valid-chain fork choice against the registered peers.
pub struct ConsensusAgent<C> {
    ledger: SharedLedger,
    client: C,
    cancel_mining: Option<CancelSignal>,
}

impl<C: PeerClient> ConsensusAgent<C> {
    pub fn new(ledger: SharedLedger, client: C) -> Self {
        Self {
            ledger,
            client,
            cancel_mining: None,
        }
    }

    /// Raise `signal` whenever a new chain is adopted, so in-flight proof
    /// searches on the old tip stop.
    pub fn with_cancel_signal(mut self, signal: CancelSignal) -> Self {
        self.cancel_mining = Some(signal);
        self
    }

    /// Union `addresses` into the ledger's peer set. Returns how many were new.
    pub fn register_peers<I>(&self, addresses: I) -> usize
    where
        I: IntoIterator<Item = String>,
    {
        let mut ledger = self.ledger.lock().expect("mutex poisoned");
        let added = ledger.register_peers(addresses);
        debug!("CONSENSUS - {} new peers ({} known)", added, ledger.peers.len());
        added
    }

    pub fn peers(&self) -> Vec<String> {
        let ledger = self.ledger.lock().expect("mutex poisoned");
        ledger.peers.iter().cloned().collect()
    }

    /// Query every peer concurrently and adopt the longest valid chain if it
    /// is strictly longer than ours. Unreachable or malformed peers are
    /// skipped. The mempool is never touched.
    pub async fn reconcile(&self) -> ReconcileOutcome {
        let peers = self.peers();
        if peers.is_empty() {
            return ReconcileOutcome::Unchanged;
        }

        let responses = join_all(peers.iter().map(|peer| {
            let fetch = self.client.fetch_chain(peer);
            async move { (peer, fetch.await) }
        }))
        .await;

        let mut best: Option<Vec<Block>> = None;
        let mut best_len = self.ledger.lock().expect("mutex poisoned").len();

        for (peer, response) in responses {
            let body = match response {
                Ok(body) => body,
                Err(e) => {
                    warn!("CONSENSUS - skipping peer {peer}: {e}");
                    continue;
                }
            };
            let candidate = match codec::deserialize(&body) {
                Ok(remote) => remote.chain,
                Err(e) => {
                    warn!("CONSENSUS - discarding chain from {peer}: {e}");
                    continue;
                }
            };

            let valid = {
                let ledger = self.ledger.lock().expect("mutex poisoned");
                ledger.is_valid_chain(&candidate)
            };
            if !valid {
                warn!("CONSENSUS - chain from {peer} is invalid");
                continue;
            }

            debug!("CONSENSUS - peer {peer} has valid chain of length {}", candidate.len());
            if candidate.len() > best_len {
                best_len = candidate.len();
                best = Some(candidate);
            }
        }

        let Some(chain) = best else {
            info!("CONSENSUS - local chain is the longest valid chain among peers");
            return ReconcileOutcome::Unchanged;
        };

        let mut ledger = self.ledger.lock().expect("mutex poisoned");
        // The local chain may have grown while peers were queried.
        if chain.len() <= ledger.len() {
            return ReconcileOutcome::Unchanged;
        }
        ledger.replace_chain(chain);
        if let Some(signal) = &self.cancel_mining {
            signal.raise();
        }
        ReconcileOutcome::Adopted
    }
}
