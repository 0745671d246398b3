pub mod block;
pub mod codec;
pub mod model;
pub mod pow;

pub use block::{Block, BlockTransactions};
pub use model::{Ledger, SharedLedger, ValidationMode};
pub use pow::{CancelSignal, CancelToken, NonceStrategy};

/// Default Proof-of-Work difficulty (number of leading hex zeros).
pub const DEFAULT_DIFFICULTY: u32 = 4;

/// Fixed block reward.
pub const BASE_REWARD: u64 = 50;

/// Difficulty ceiling accepted over the API (keep low to avoid long waits).
pub const DIFF_MAX: u32 = 8;
