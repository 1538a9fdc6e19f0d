//! Detection-to-track association.

use nalgebra::DMatrix;

use crate::bbox::{iou, BBox};
use crate::track::Track;

/// Build the IoU similarity matrix (n_detections x n_tracks).
///
/// Cells where the detection label differs from the track label are 0.0,
/// so class partitioning falls out of the threshold check.
pub fn iou_matrix(detections: &[(&str, BBox)], tracks: &[&Track]) -> DMatrix<f64> {
    DMatrix::from_fn(detections.len(), tracks.len(), |i, j| {
        let (label, bbox) = &detections[i];
        let track = tracks[j];
        if track.class_label != *label {
            0.0
        } else {
            iou(bbox, &track.bbox)
        }
    })
}

/// Match detections to tracks greedily, one detection at a time in row order.
///
/// Each detection takes the unclaimed track with the highest similarity
/// strictly above `threshold`. A track is claimed by at most one detection;
/// on equal similarity the lower column wins. This is not a global optimum:
/// an early detection can take a track a later one overlaps better.
///
/// # Returns
/// One entry per detection: the matched column, or `None`.
pub fn match_detections_in_order(similarity: &DMatrix<f64>, threshold: f64) -> Vec<Option<usize>> {
    let n_detections = similarity.nrows();
    let n_tracks = similarity.ncols();

    let mut claimed = vec![false; n_tracks];
    let mut matches = Vec::with_capacity(n_detections);

    for i in 0..n_detections {
        let mut best: Option<(usize, f64)> = None;
        for j in 0..n_tracks {
            if claimed[j] {
                continue;
            }
            let sim = similarity[(i, j)];
            if sim.is_nan() || sim <= threshold {
                continue;
            }
            if best.map_or(true, |(_, best_sim)| sim > best_sim) {
                best = Some((j, sim));
            }
        }

        if let Some((j, _)) = best {
            claimed[j] = true;
        }
        matches.push(best.map(|(j, _)| j));
    }

    matches
}

/// Get unmatched indices from a match result.
pub fn get_unmatched<T>(matches: &[Option<T>]) -> Vec<usize> {
    matches
        .iter()
        .enumerate()
        .filter(|(_, m)| m.is_none())
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn track(id: u64, label: &str, bbox: [f64; 4]) -> Track {
        Track::new(id, label.to_string(), bbox.into(), 0.9, 1)
    }

    // ===== Similarity matrix =====

    #[test]
    fn test_iou_matrix_shape_and_values() {
        let t1 = track(1, "car", [0.0, 0.0, 10.0, 10.0]);
        let t2 = track(2, "car", [100.0, 100.0, 110.0, 110.0]);
        let dets = [
            ("car", BBox::new(5.0, 5.0, 15.0, 15.0)),
            ("car", BBox::new(100.0, 100.0, 110.0, 110.0)),
            ("car", BBox::new(500.0, 500.0, 510.0, 510.0)),
        ];
        let m = iou_matrix(&dets, &[&t1, &t2]);

        assert_eq!(m.nrows(), 3);
        assert_eq!(m.ncols(), 2);
        assert_relative_eq!(m[(0, 0)], 25.0 / 175.0, epsilon = 1e-12);
        assert_eq!(m[(0, 1)], 0.0);
        assert_relative_eq!(m[(1, 1)], 1.0, epsilon = 1e-12);
        assert_eq!(m[(2, 0)], 0.0);
        assert_eq!(m[(2, 1)], 0.0);
    }

    #[test]
    fn test_iou_matrix_class_partition() {
        let car = track(1, "car", [0.0, 0.0, 10.0, 10.0]);
        let dets = [("truck", BBox::new(0.0, 0.0, 10.0, 10.0))];
        let m = iou_matrix(&dets, &[&car]);
        assert_eq!(m[(0, 0)], 0.0);
    }

    #[test]
    fn test_iou_matrix_empty() {
        let m = iou_matrix(&[], &[]);
        assert_eq!(m.nrows(), 0);
        assert_eq!(m.ncols(), 0);
    }

    // ===== Greedy in-order matching =====

    #[test]
    fn test_best_match_per_detection() {
        let matrix = DMatrix::from_row_slice(2, 3, &[
            0.4, 0.9, 0.5,
            0.8, 0.1, 0.2,
        ]);
        let matches = match_detections_in_order(&matrix, 0.3);
        assert_eq!(matches, vec![Some(1), Some(0)]);
    }

    #[test]
    fn test_threshold_is_strict() {
        let matrix = DMatrix::from_row_slice(1, 1, &[0.3]);
        assert_eq!(match_detections_in_order(&matrix, 0.3), vec![None]);

        let matrix = DMatrix::from_row_slice(1, 1, &[0.300001]);
        assert_eq!(match_detections_in_order(&matrix, 0.3), vec![Some(0)]);
    }

    #[test]
    fn test_first_detection_wins_contested_track() {
        // Detection 1 overlaps track 0 better, but detection 0 comes first.
        let matrix = DMatrix::from_row_slice(2, 1, &[
            0.5,
            0.95,
        ]);
        let matches = match_detections_in_order(&matrix, 0.3);
        assert_eq!(matches, vec![Some(0), None]);
    }

    #[test]
    fn test_second_detection_falls_back_to_next_best() {
        let matrix = DMatrix::from_row_slice(2, 2, &[
            0.9, 0.6,
            0.8, 0.7,
        ]);
        let matches = match_detections_in_order(&matrix, 0.3);
        assert_eq!(matches, vec![Some(0), Some(1)]);
    }

    #[test]
    fn test_tie_goes_to_lower_column() {
        let matrix = DMatrix::from_row_slice(1, 3, &[0.5, 0.7, 0.7]);
        assert_eq!(match_detections_in_order(&matrix, 0.3), vec![Some(1)]);
    }

    #[test]
    fn test_nan_never_matches() {
        let matrix = DMatrix::from_row_slice(1, 2, &[f64::NAN, 0.2]);
        assert_eq!(match_detections_in_order(&matrix, 0.1), vec![Some(1)]);
    }

    #[test]
    fn test_no_tracks() {
        let matrix = DMatrix::zeros(3, 0);
        assert_eq!(match_detections_in_order(&matrix, 0.3), vec![None, None, None]);
    }

    // ===== get_unmatched =====

    #[test]
    fn test_get_unmatched() {
        let unmatched = get_unmatched::<usize>(&[None, Some(0), None, Some(2), None]);
        assert_eq!(unmatched, vec![0, 2, 4]);
    }

    #[test]
    fn test_get_unmatched_none() {
        assert!(get_unmatched(&[Some(0), Some(1)]).is_empty());
    }
}
