pub mod block;
pub mod difficulty;
pub mod fork;
pub mod miner;
pub mod model;

pub use block::{Block, Proof, calculate_hash, hash_matches_difficulty};
pub use difficulty::{DifficultyPolicy, next_difficulty};
pub use fork::{cumulative_difficulty, select_chain};
pub use miner::{MiningTask, mine};
pub use model::{
    Ledger, deserialize_chain, is_valid_chain, is_valid_new_block, replay_chain, serialize_chain,
    validate_chain, validate_new_block,
};

/// Blocks between two difficulty retargets.
pub const ADJUSTMENT_INTERVAL: u64 = 10;

/// Expected seconds per block.
pub const BLOCK_TIME_TARGET_SECS: i64 = 10;

/// Allowed clock drift for block timestamps, in seconds.
pub const TIMESTAMP_TOLERANCE_SECS: i64 = 60;

/// 2001-01-01T00:00:00Z
pub const GENESIS_TIMESTAMP: i64 = 978_307_200;

/// Receiver of the genesis grant.
pub const GENESIS_ADDRESS: &str = "0429a91b39ad936a5e0690ffdb3136a554da25ba577182f6f187ba329e564a93cc5a3ee6f3258fe5139fd75d92851c85a3fb3f3f2b71e98ac254b8b73cc12db613";

pub const GENESIS_TX_ID: &str = "5e7a184fe16430f399d37a3e0197614ea3188624aa25b021139bb61a73fd412b";

pub const GENESIS_HASH: &str = "ebedd13bed1b58577c21322552fccc4a9d15ecde59656539324289e7724d8ebc";
