use serde::Serialize;

use crate::reward::reward_for;

/// Credit effect of replacing `previous_score` with `new_score`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScoreAdjustment {
    pub previous_score: Option<u8>,
    pub new_score: u8,
    pub credits_diff: i64,
    pub new_balance: i64,
}

/// Signed credit delta for moving from `previous_score` to `new_score`.
///
/// The delta is the difference between the two reward tiers, so it can be
/// negative. Nothing here remembers earlier adjustments: the caller must pass
/// the score that is actually on record, or a repeated call counts twice.
#[must_use]
pub fn credits_diff(previous_score: Option<u8>, new_score: u8) -> i64 {
    reward_for(Some(new_score)) - reward_for(previous_score)
}

/// Total reward a submission is owed at `score` when other submissions of the
/// same video have already been paid `earned_by_duplicates`.
///
/// A fingerprint group earns one reward tier between all of its members, so
/// a duplicate only collects what its score adds above the group's payout.
#[must_use]
pub fn reward_owed(score: u8, earned_by_duplicates: i64) -> i64 {
    (reward_for(Some(score)) - earned_by_duplicates.max(0)).max(0)
}

/// [`credits_diff`] together with the balance it produces.
#[must_use]
pub fn adjust_credits(
    previous_score: Option<u8>,
    new_score: u8,
    current_balance: i64,
) -> ScoreAdjustment {
    let credits_diff = credits_diff(previous_score, new_score);
    ScoreAdjustment {
        previous_score,
        new_score,
        credits_diff,
        new_balance: current_balance + credits_diff,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upgrade_into_top_tier() {
        let adj = adjust_credits(Some(85), 92, 100);
        assert_eq!(adj.credits_diff, 50);
        assert_eq!(adj.new_balance, 150);
    }

    #[test]
    fn downgrade_out_of_top_tier() {
        let adj = adjust_credits(Some(92), 85, 150);
        assert_eq!(adj.credits_diff, -50);
        assert_eq!(adj.new_balance, 100);
    }

    #[test]
    fn first_score_grants_full_tier() {
        let adj = adjust_credits(None, 95, 50);
        assert_eq!(adj.credits_diff, 80);
        assert_eq!(adj.new_balance, 130);
    }

    #[test]
    fn change_within_a_tier_is_free() {
        let adj = adjust_credits(Some(91), 99, 10);
        assert_eq!(adj.credits_diff, 0);
        assert_eq!(adj.new_balance, 10);
    }

    #[test]
    fn diff_from_nothing_to_below_tier_is_zero() {
        assert_eq!(credits_diff(None, 79), 0);
        assert_eq!(credits_diff(None, 80), 30);
    }

    #[test]
    fn owed_reward_nets_out_duplicate_payouts() {
        assert_eq!(reward_owed(95, 0), 80);
        assert_eq!(reward_owed(95, 80), 0);
        assert_eq!(reward_owed(95, 30), 50);
        assert_eq!(reward_owed(85, 80), 0);
        assert_eq!(reward_owed(70, 0), 0);
    }

    #[test]
    fn balance_may_go_negative() {
        let adj = adjust_credits(Some(95), 10, 20);
        assert_eq!(adj.credits_diff, -80);
        assert_eq!(adj.new_balance, -60);
    }
}
