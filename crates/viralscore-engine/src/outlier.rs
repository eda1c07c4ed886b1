//! Outlier removal: the lowest-scoring frames are set aside before the
//! viral score is averaged.

use viralscore_core::FrameAnalysis;

/// Mark the `drop_count` lowest-scoring frames as dropped.
///
/// Frames are ranked by `frame_score` with a stable sort, so among equal
/// scores the earlier frame is dropped first. The returned frames keep their
/// original order; only the `dropped` flag changes.
///
/// A `drop_count` that would leave no scoring frame is clamped to
/// `len - 1` and logged as an invariant violation.
#[must_use]
pub fn drop_outliers(frames: &[FrameAnalysis], drop_count: usize) -> Vec<FrameAnalysis> {
    let mut annotated: Vec<FrameAnalysis> = frames
        .iter()
        .cloned()
        .map(|mut f| {
            f.dropped = false;
            f
        })
        .collect();

    let mut k = drop_count;
    if !annotated.is_empty() && k >= annotated.len() {
        tracing::error!(
            drop_count,
            frame_count = annotated.len(),
            "drop count would remove every frame; keeping one"
        );
        k = annotated.len() - 1;
    }
    if k == 0 {
        return annotated;
    }

    let mut ranked: Vec<usize> = (0..annotated.len()).collect();
    ranked.sort_by_key(|&i| annotated[i].frame_score);
    for &i in ranked.iter().take(k) {
        annotated[i].dropped = true;
    }
    annotated
}

#[cfg(test)]
mod tests {
    use viralscore_core::SubScores;

    use super::*;

    fn frames(scores: &[u8]) -> Vec<FrameAnalysis> {
        scores
            .iter()
            .enumerate()
            .map(|(i, &s)| FrameAnalysis {
                frame_index: i,
                timestamp: 0.0,
                image_ref: format!("frame-{i}"),
                sub_scores: SubScores::uniform(s),
                frame_score: s,
                dropped: false,
            })
            .collect()
    }

    fn dropped_indices(frames: &[FrameAnalysis]) -> Vec<usize> {
        frames
            .iter()
            .filter(|f| f.dropped)
            .map(|f| f.frame_index)
            .collect()
    }

    #[test]
    fn zero_drop_count_drops_nothing() {
        let out = drop_outliers(&frames(&[10, 20, 30]), 0);
        assert!(dropped_indices(&out).is_empty());
    }

    #[test]
    fn drops_the_lowest_scores() {
        let out = drop_outliers(&frames(&[70, 40, 90, 20, 60]), 2);
        assert_eq!(dropped_indices(&out), vec![1, 3]);
    }

    #[test]
    fn ties_drop_lowest_index_first() {
        let out = drop_outliers(&frames(&[50, 30, 80, 30, 30]), 2);
        assert_eq!(dropped_indices(&out), vec![1, 3]);
    }

    #[test]
    fn preserves_original_order() {
        let input = frames(&[70, 40, 90, 20, 60]);
        let out = drop_outliers(&input, 1);
        let order: Vec<usize> = out.iter().map(|f| f.frame_index).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
        assert_eq!(out.len(), input.len());
    }

    #[test]
    fn exactly_k_frames_are_dropped() {
        let input = frames(&[5, 9, 1, 7, 3, 3, 8, 2, 6, 4, 0, 10]);
        for k in 0..input.len() {
            let out = drop_outliers(&input, k);
            assert_eq!(out.iter().filter(|f| f.dropped).count(), k, "k={k}");
            let max_dropped = out.iter().filter(|f| f.dropped).map(|f| f.frame_score).max();
            let min_kept = out.iter().filter(|f| !f.dropped).map(|f| f.frame_score).min();
            if let (Some(d), Some(m)) = (max_dropped, min_kept) {
                assert!(d <= m, "k={k}: dropped {d} above kept {m}");
            }
        }
    }

    #[test]
    fn drop_count_at_or_above_len_keeps_one_frame() {
        let out = drop_outliers(&frames(&[40, 10, 30]), 3);
        assert_eq!(dropped_indices(&out), vec![1, 2]);
        let out = drop_outliers(&frames(&[40, 10, 30]), 99);
        assert_eq!(out.iter().filter(|f| !f.dropped).count(), 1);
    }

    #[test]
    fn empty_input_is_empty_output() {
        assert!(drop_outliers(&[], 2).is_empty());
    }

    #[test]
    fn stale_dropped_flags_are_reset() {
        let mut input = frames(&[10, 20, 30]);
        input[2].dropped = true;
        let out = drop_outliers(&input, 1);
        assert_eq!(dropped_indices(&out), vec![0]);
    }
}
