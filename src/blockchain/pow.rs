use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use rand::Rng;

use super::block::{Block, hash_with_proof, meets_difficulty};
use crate::error::{LedgerError, Result};

/// Upper bound for randomly sampled proofs.
pub const MAX_RANDOM_PROOF: u64 = 9_999_999_999_999;

/// How many candidates to try between checks of the cancel token.
const CANCEL_CHECK_INTERVAL: u64 = 4096;

/// Cancellation shared by the miner and whoever can make its work stale.
///
/// Raising the signal bumps a generation counter. A search holds a
/// [`CancelToken`] taken when it started and stops once the generation has
/// moved on, so starting a new search never clears a cancel aimed at an
/// older one.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    generation: Arc<AtomicU64>,
}

impl CancelSignal {
    pub fn raise(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// A token cancelled by every `raise` that happens after this call.
    pub fn token(&self) -> CancelToken {
        CancelToken {
            signal: self.clone(),
            generation: self.generation(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CancelToken {
    signal: CancelSignal,
    generation: u64,
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        self.signal.generation() != self.generation
    }
}

/// How proof candidates are chosen during the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NonceStrategy {
    /// Count up from the block's current proof. Deterministic; used in tests.
    Sequential,
    /// Sample uniformly from `1..=MAX_RANDOM_PROOF`, so miners sharing the same
    /// template do not walk the same nonces.
    #[default]
    RandomSample,
}

impl NonceStrategy {
    /// Search for a proof making `block` satisfy `difficulty`. On success the
    /// proof is stored in the block and returned. Runs until it finds one or
    /// `cancel` is cancelled.
    pub fn search(&self, block: &mut Block, difficulty: u32, cancel: &CancelToken) -> Result<u64> {
        let base = block.preimage_base();
        let mut rng = rand::thread_rng();
        let mut next = block.proof;
        let mut attempts: u64 = 0;

        loop {
            if attempts % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
                return Err(LedgerError::Cancelled);
            }
            attempts = attempts.wrapping_add(1);

            let candidate = match self {
                NonceStrategy::Sequential => {
                    let c = next;
                    next = next.wrapping_add(1);
                    c
                }
                NonceStrategy::RandomSample => rng.gen_range(1..=MAX_RANDOM_PROOF),
            };

            if meets_difficulty(&hash_with_proof(&base, candidate), difficulty) {
                block.proof = candidate;
                return Ok(candidate);
            }
        }
    }
}

impl FromStr for NonceStrategy {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(NonceStrategy::Sequential),
            "random" | "random-sample" => Ok(NonceStrategy::RandomSample),
            other => Err(LedgerError::Configuration(format!(
                "unknown nonce strategy '{other}' (expected 'random' or 'sequential')"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::Transaction;
    use crate::wallet::generate_keypair;

    fn block() -> Block {
        let (_, pk) = generate_keypair();
        Block::genesis(Transaction::reward(pk, 50, "note"))
    }

    #[test]
    fn random_sampling_finds_valid_proof_in_range() {
        let mut b = block();
        let proof = NonceStrategy::RandomSample
            .search(&mut b, 1, &CancelSignal::default().token())
            .unwrap();
        assert!((1..=MAX_RANDOM_PROOF).contains(&proof));
        assert_eq!(b.proof, proof);
        assert!(b.satisfies_proof(1));
    }

    #[test]
    fn sequential_search_is_deterministic() {
        let mut a = block();
        let mut b = a.clone();
        let flag = CancelSignal::default().token();
        let pa = NonceStrategy::Sequential.search(&mut a, 2, &flag).unwrap();
        let pb = NonceStrategy::Sequential.search(&mut b, 2, &flag).unwrap();
        assert_eq!(pa, pb);
    }

    #[test]
    fn raised_signal_cancels_search() {
        let mut b = block();
        let signal = CancelSignal::default();
        let token = signal.token();
        signal.raise();
        let err = NonceStrategy::Sequential
            .search(&mut b, 64, &token)
            .unwrap_err();
        assert!(matches!(err, LedgerError::Cancelled));
        assert_eq!(b.proof, 0);
    }

    #[test]
    fn tokens_only_see_later_raises() {
        let signal = CancelSignal::default();
        let old = signal.token();
        signal.raise();
        let fresh = signal.token();
        assert!(old.is_cancelled());
        assert!(!fresh.is_cancelled());
        assert_eq!(signal.generation(), 1);
    }

    #[test]
    fn parses_strategy_names() {
        assert_eq!("sequential".parse::<NonceStrategy>().unwrap(), NonceStrategy::Sequential);
        assert_eq!("Random".parse::<NonceStrategy>().unwrap(), NonceStrategy::RandomSample);
        assert!("fast".parse::<NonceStrategy>().is_err());
    }
}
