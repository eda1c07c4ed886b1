//! Duration classification and the frame-sampling plan derived from it.

use viralscore_core::SamplingStrategy;

use crate::error::EngineError;

/// Longest video that uses the short strategy, in seconds.
pub const SHORT_MAX_SECONDS: f64 = 300.0;

/// Longest accepted video, in seconds.
pub const MAX_DURATION_SECONDS: f64 = 600.0;

/// Classify a video duration into its sampling strategy.
///
/// # Errors
///
/// - [`EngineError::InvalidDuration`] for zero, negative or non-finite input.
/// - [`EngineError::DurationExceeded`] above ten minutes; the message tells
///   the creator how long the video is and how to split it.
pub fn validate_duration(duration_seconds: f64) -> Result<SamplingStrategy, EngineError> {
    if !duration_seconds.is_finite() || duration_seconds <= 0.0 {
        return Err(EngineError::InvalidDuration(duration_seconds));
    }
    if duration_seconds > MAX_DURATION_SECONDS {
        return Err(EngineError::DurationExceeded {
            seconds: duration_seconds,
            message: exceeded_message(duration_seconds),
        });
    }
    if duration_seconds <= SHORT_MAX_SECONDS {
        Ok(SamplingStrategy::SHORT)
    } else {
        Ok(SamplingStrategy::LONG)
    }
}

fn exceeded_message(duration_seconds: f64) -> String {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let total = duration_seconds.round() as u64;
    let (minutes, seconds) = (total / 60, total % 60);
    format!(
        "video is {minutes} min {seconds} s long, which exceeds the 10 minute limit; \
         split it into at most 2 segments of no more than 10 minutes each and submit them separately"
    )
}

/// Evenly spaced sampling timestamps, keeping clear of the very first and
/// last moments of the video.
///
/// `offset = min(0.5, duration * 0.02)`; the first and last timestamps sit
/// `offset` seconds inside the video.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn plan_frame_timestamps(duration_seconds: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![duration_seconds / 2.0],
        _ => {
            let offset = (duration_seconds * 0.02).min(0.5);
            let interval = (duration_seconds - 2.0 * offset) / (count - 1) as f64;
            (0..count).map(|i| offset + interval * i as f64).collect()
        }
    }
}
