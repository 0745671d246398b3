use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use log::debug;

use crate::blockchain::{Ledger, SharedLedger, codec};
use crate::error::Result;

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Where ledger state lives between runs.
pub trait LedgerStore {
    /// `None` when nothing has been saved yet.
    fn load_ledger_state(&self) -> Result<Option<Ledger>>;
    fn save_ledger_state(&self, ledger: &Ledger) -> Result<()>;
}

/// Stores the serialized ledger as `ledger.json` inside a data directory.
///
/// Clones share one write lock, so saves through any clone never overlap.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl JsonFileStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join("ledger.json"),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot the shared ledger and save it. The write lock is held from
    /// snapshot to rename, so saves land in the order their snapshots were
    /// taken and the file never lags behind a completed save.
    pub fn save_shared(&self, ledger: &SharedLedger) -> Result<()> {
        let _guard = self.write_lock.lock().expect("mutex poisoned");
        let snapshot = ledger.lock().expect("mutex poisoned").clone();
        self.write_file(&snapshot)
    }

    // Write then rename so a crash never leaves a truncated file.
    fn write_file(&self, ledger: &Ledger) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let tmp = self.path.with_extension(format!(
            "json.{}.{}.tmp",
            std::process::id(),
            TMP_SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        fs::write(&tmp, codec::serialize(ledger)?)?;
        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        debug!(
            "STORE - saved {} blocks to {}",
            ledger.len(),
            self.path.display()
        );
        Ok(())
    }
}

impl LedgerStore for JsonFileStore {
    fn load_ledger_state(&self) -> Result<Option<Ledger>> {
        if !self.path.is_file() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)?;
        let ledger = codec::deserialize(&raw)?;
        debug!(
            "STORE - loaded {} blocks from {}",
            ledger.len(),
            self.path.display()
        );
        Ok(Some(ledger))
    }

    fn save_ledger_state(&self, ledger: &Ledger) -> Result<()> {
        let _guard = self.write_lock.lock().expect("mutex poisoned");
        self.write_file(ledger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::NonceStrategy;
    use crate::error::LedgerError;
    use crate::node::Node;
    use crate::wallet::Wallet;
    use std::thread;
    use tempfile::TempDir;

    #[test]
    fn missing_file_loads_as_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path());
        assert!(store.load_ledger_state().unwrap().is_none());
    }

    #[test]
    fn saved_state_loads_back() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested"));

        let shared = Ledger::new(1, 50).into_shared();
        let wallet = Wallet::new(shared.clone(), None);
        let node = Node::new(shared.clone())
            .with_reward_key(wallet.public_key)
            .with_strategy(NonceStrategy::Sequential);
        node.mine("").unwrap();
        node.mine("two").unwrap();

        let ledger = shared.lock().unwrap().clone();
        store.save_ledger_state(&ledger).unwrap();
        assert!(store.path().is_file());

        let loaded = store.load_ledger_state().unwrap().unwrap();
        assert_eq!(loaded.tip_hash(), ledger.tip_hash());
        assert_eq!(loaded.confirmed_balance(&wallet.public_key), 100);
    }

    #[test]
    fn corrupt_file_is_decode_error() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path());
        fs::write(store.path(), "{ not json").unwrap();
        assert!(matches!(
            store.load_ledger_state(),
            Err(LedgerError::Decode(_))
        ));
    }

    #[test]
    fn concurrent_saves_keep_the_latest_chain() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path());
        let shared = Ledger::new(1, 50).into_shared();
        let wallet = Wallet::new(shared.clone(), None);
        let node = Node::new(shared.clone())
            .with_reward_key(wallet.public_key)
            .with_strategy(NonceStrategy::Sequential);

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let (node, store, shared) = (node.clone(), store.clone(), shared.clone());
                thread::spawn(move || {
                    for _ in 0..10 {
                        // Losing a race to another worker is a StaleTip; skip it.
                        let _ = node.mine("");
                        store.save_shared(&shared).unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let ledger = shared.lock().unwrap().clone();
        let loaded = store.load_ledger_state().unwrap().unwrap();
        assert_eq!(loaded.len(), ledger.len());
        assert_eq!(loaded.tip_hash(), ledger.tip_hash());
        let leftovers = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }
}
