/// Credit tiers as `(minimum score, credits)`, highest first.
const REWARD_TIERS: &[(u8, i64)] = &[(90, 80), (80, 30)];

/// Credits granted for a viral score. Scores below the lowest tier earn nothing.
#[must_use]
pub fn reward_for_score(score: u8) -> i64 {
    REWARD_TIERS
        .iter()
        .find(|(min, _)| score >= *min)
        .map_or(0, |(_, credits)| *credits)
}

/// Reward for an optional score; a missing score earns nothing.
#[must_use]
pub fn reward_for(score: Option<u8>) -> i64 {
    score.map_or(0, reward_for_score)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_boundaries() {
        assert_eq!(reward_for_score(0), 0);
        assert_eq!(reward_for_score(79), 0);
        assert_eq!(reward_for_score(80), 30);
        assert_eq!(reward_for_score(89), 30);
        assert_eq!(reward_for_score(90), 80);
        assert_eq!(reward_for_score(100), 80);
    }

    #[test]
    fn missing_score_earns_nothing() {
        assert_eq!(reward_for(None), 0);
        assert_eq!(reward_for(Some(95)), 80);
    }

    #[test]
    fn reward_is_monotonic() {
        let rewards: Vec<i64> = (0..=100).map(reward_for_score).collect();
        assert!(rewards.windows(2).all(|w| w[0] <= w[1]));
    }
}
