use log::debug;

use super::{ADJUSTMENT_INTERVAL, BLOCK_TIME_TARGET_SECS, Block};

/// Retarget rule for the difficulty of the next block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DifficultyPolicy {
    pub adjustment_interval: u64,
    pub block_time_target_secs: i64,
}

impl Default for DifficultyPolicy {
    fn default() -> Self {
        Self {
            adjustment_interval: ADJUSTMENT_INTERVAL,
            block_time_target_secs: BLOCK_TIME_TARGET_SECS,
        }
    }
}

impl DifficultyPolicy {
    /// Difficulty required for the block after the tail of `chain`.
    ///
    /// On every retarget boundary the last interval's elapsed time is compared
    /// with the expected time: at most half raises it by one, at least double
    /// lowers it by one (never below zero). Otherwise the tail's value is kept.
    pub fn next_difficulty(&self, chain: &[Block]) -> u32 {
        let Some(tail) = chain.last() else {
            return 0;
        };
        let current = tail.proof.difficulty;
        let interval = self.adjustment_interval;
        if interval == 0 || tail.index == 0 || tail.index % interval != 0 {
            return current;
        }

        let Some(first) = chain
            .len()
            .checked_sub(1 + interval as usize)
            .and_then(|i| chain.get(i))
        else {
            return current;
        };

        let expected = self.block_time_target_secs * interval as i64;
        let elapsed = tail.timestamp.saturating_sub(first.timestamp);
        let next = if elapsed <= expected / 2 {
            current.saturating_add(1)
        } else if elapsed >= expected * 2 {
            current.saturating_sub(1)
        } else {
            current
        };
        debug!(
            "retarget at {}: elapsed {elapsed}s, expected {expected}s, difficulty {current} -> {next}",
            tail.index
        );
        next
    }
}

/// [`DifficultyPolicy::next_difficulty`] with the default interval and target.
pub fn next_difficulty(chain: &[Block]) -> u32 {
    DifficultyPolicy::default().next_difficulty(chain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::Proof;

    /// Blocks 0..=tail_index, spaced `spacing` seconds apart, all at `difficulty`.
    /// Hashes are irrelevant to the policy.
    fn chain(tail_index: u64, spacing: i64, difficulty: u32) -> Vec<Block> {
        (0..=tail_index)
            .map(|i| Block {
                timestamp: 1_700_000_000 + i as i64 * spacing,
                index: i,
                transactions: vec![],
                hash: String::new(),
                previous_hash: String::new(),
                proof: Proof {
                    nonce: 0,
                    difficulty,
                },
            })
            .collect()
    }

    #[test]
    fn half_the_expected_time_raises_difficulty() {
        // 10 blocks in 50s against an expected 100s.
        assert_eq!(next_difficulty(&chain(10, 5, 3)), 4);
    }

    #[test]
    fn double_the_expected_time_lowers_difficulty() {
        assert_eq!(next_difficulty(&chain(10, 20, 3)), 2);
    }

    #[test]
    fn exactly_expected_time_keeps_difficulty() {
        assert_eq!(next_difficulty(&chain(10, 10, 3)), 3);
    }

    #[test]
    fn off_boundary_inherits_tail() {
        assert_eq!(next_difficulty(&chain(9, 1, 3)), 3);
        assert_eq!(next_difficulty(&chain(11, 1, 3)), 3);
        assert_eq!(next_difficulty(&chain(0, 1, 0)), 0);
    }

    #[test]
    fn never_drops_below_zero() {
        assert_eq!(next_difficulty(&chain(10, 100, 0)), 0);
    }

    #[test]
    fn custom_interval() {
        let policy = DifficultyPolicy {
            adjustment_interval: 5,
            block_time_target_secs: 10,
        };
        assert_eq!(policy.next_difficulty(&chain(5, 1, 1)), 2);
        assert_eq!(policy.next_difficulty(&chain(20, 10, 1)), 1);
    }

    #[test]
    fn empty_chain_is_zero() {
        assert_eq!(next_difficulty(&[]), 0);
    }
}
