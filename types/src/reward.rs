//! Reward pool state.

use serde::{Deserialize, Serialize};

use crate::amount::Wei;

/// Snapshot of the contract's reward pool.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardPoolStatus {
    pub current_pool: Wei,
    /// Fixed reward credited per approved feedback.
    pub reward_per_feedback: Wei,
    /// How many more approvals the pool can pay for.
    pub remaining_rewards: u64,
}

impl RewardPoolStatus {
    pub fn can_pay_reward(&self) -> bool {
        self.remaining_rewards > 0 && self.current_pool >= self.reward_per_feedback
    }
}
