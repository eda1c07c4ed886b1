//! Weighted per-frame score from the six grader sub-scores.

use viralscore_core::SubScores;

/// Dimension weights in hundredths, in [`SubScores::as_array`] order.
///
/// Emotional impact carries the most weight. The weights sum to 100 so the
/// result is a convex combination of the sub-scores.
pub(crate) const WEIGHTS: [u32; 6] = [18, 18, 14, 20, 15, 15];

/// Combine six sub-scores into one frame score, rounded half-up.
///
/// Computed in integer hundredths, so the result never depends on float
/// rounding and always lies in `[min(sub_scores), max(sub_scores)]`.
#[must_use]
pub fn frame_score(sub_scores: &SubScores) -> u8 {
    let weighted: u32 = sub_scores
        .as_array()
        .into_iter()
        .zip(WEIGHTS)
        .map(|(score, weight)| u32::from(score) * weight)
        .sum();
    let rounded = (weighted + 50) / 100;
    u8::try_from(rounded).unwrap_or(u8::MAX)
}
