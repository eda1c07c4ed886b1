//! Final viral score and the informational dimension breakdown.

use serde::{Deserialize, Serialize};
use viralscore_core::{FrameAnalysis, SubScores, MAX_SCORE};

use crate::error::EngineError;

/// Mean frame score of the non-dropped frames, rounded half-up.
///
/// # Errors
///
/// Returns [`EngineError::InsufficientFrames`] when every frame is dropped.
pub fn viral_score(frames: &[FrameAnalysis]) -> Result<u8, EngineError> {
    let kept: Vec<u32> = frames
        .iter()
        .filter(|f| !f.dropped)
        .map(|f| u32::from(f.frame_score))
        .collect();
    if kept.is_empty() {
        return Err(EngineError::InsufficientFrames);
    }
    let n = u32::try_from(kept.len()).map_err(|_| EngineError::InsufficientFrames)?;
    let sum: u32 = kept.iter().sum();
    let rounded = (2 * sum + n) / (2 * n);
    Ok(u8::try_from(rounded).unwrap_or(MAX_SCORE).min(MAX_SCORE))
}

/// Seven positional dimensions derived from the scoring frames.
///
/// Stored alongside the score as an audit detail; it never feeds back into
/// the viral score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionBreakdown {
    pub opening_attraction: u8,
    pub visual_composition: u8,
    pub color_and_lighting: u8,
    pub rhythm_and_pacing: u8,
    pub climax_impact: u8,
    pub ending_closure: u8,
    pub consistency: u8,
}

impl DimensionBreakdown {
    /// Compute the breakdown over the non-dropped frames, in frame order.
    #[must_use]
    pub fn from_frames(frames: &[FrameAnalysis]) -> Self {
        let scoring: Vec<SubScores> = frames
            .iter()
            .filter(|f| !f.dropped)
            .map(|f| f.sub_scores)
            .collect();
        let n = scoring.len();

        let opening = &scoring[..n.min(2)];
        let middle = if n > 4 { &scoring[2..n - 2] } else { &[][..] };
        let ending = &scoring[n.saturating_sub(2)..];
        let climax_range = (n * 6 / 10)..(n * 85 / 100);
        let climax = if climax_range.is_empty() {
            &scoring[..]
        } else {
            &scoring[climax_range]
        };

        let emo = |s: &SubScores| s.emotional_impact;
        let comp = |s: &SubScores| s.composition;
        let color = |s: &SubScores| s.color_grading;
        let light = |s: &SubScores| s.lighting;
        let narr = |s: &SubScores| s.narrative_value;

        let opening_attraction = weighted(&[
            (avg(opening, emo), 0.4),
            (avg(opening, comp), 0.3),
            (avg(opening, color), 0.3),
        ]);
        let visual_composition = avg(&scoring, comp);
        let color_and_lighting = weighted(&[(avg(&scoring, color), 0.5), (avg(&scoring, light), 0.5)]);

        let emo_spread = (std_dev(middle, emo) * 3.0).min(50.0);
        let rhythm_and_pacing = clamp_score(
            f64::from(avg(middle, narr)) * 0.5 + emo_spread + f64::from(avg(middle, comp)) * 0.2,
        );

        let climax_impact = weighted(&[
            (avg(climax, emo), 0.5),
            (avg(climax, color), 0.25),
            (avg(climax, light), 0.25),
        ]);
        let ending_closure = weighted(&[
            (avg(ending, emo), 0.3),
            (avg(ending, comp), 0.3),
            (avg(ending, narr), 0.4),
        ]);
        let consistency = clamp_score(
            100.0 - 1.5 * (std_dev(&scoring, comp) + std_dev(&scoring, color)),
        );

        Self {
            opening_attraction,
            visual_composition,
            color_and_lighting,
            rhythm_and_pacing,
            climax_impact,
            ending_closure,
            consistency,
        }
    }
}

/// Rounded mean of one dimension; 0 for an empty set.
fn avg(frames: &[SubScores], dim: impl Fn(&SubScores) -> u8) -> u8 {
    if frames.is_empty() {
        return 0;
    }
    #[allow(clippy::cast_precision_loss)]
    let mean = frames.iter().map(|f| f64::from(dim(f))).sum::<f64>() / frames.len() as f64;
    clamp_score(mean)
}

/// Population standard deviation of one dimension; 0 for an empty set.
fn std_dev(frames: &[SubScores], dim: impl Fn(&SubScores) -> u8) -> f64 {
    if frames.is_empty() {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let len = frames.len() as f64;
    let mean = frames.iter().map(|f| f64::from(dim(f))).sum::<f64>() / len;
    let variance = frames
        .iter()
        .map(|f| (f64::from(dim(f)) - mean).powi(2))
        .sum::<f64>()
        / len;
    variance.sqrt()
}

fn weighted(parts: &[(u8, f64)]) -> u8 {
    clamp_score(parts.iter().map(|&(v, w)| f64::from(v) * w).sum())
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn clamp_score(value: f64) -> u8 {
    value.round().clamp(0.0, f64::from(MAX_SCORE)) as u8
}
