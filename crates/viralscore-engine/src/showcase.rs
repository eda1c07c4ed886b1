use viralscore_core::SubmissionStatus;

/// Minimum viral score for the public showcase.
pub const SHOWCASE_MIN_SCORE: u8 = 90;

/// Whether a submission belongs in the public showcase.
///
/// Evaluated on every read; nothing caches the answer, so a score correction
/// takes effect immediately.
#[must_use]
pub fn should_showcase(score: u8, license_agreed: bool, status: SubmissionStatus) -> bool {
    score >= SHOWCASE_MIN_SCORE && license_agreed && status == SubmissionStatus::Scored
}
