// src/core/detector.rs
//
// Threshold-based noise segmentation.

use serde::{Deserialize, Serialize};

use super::samples::{Sample, SampleStore};

/// A maximal run of samples at or above the threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoiseSegment {
    pub start_index: usize,
    /// Inclusive
    pub end_index: usize,
    pub sample_count: usize,
    /// Offset of the first sample from the start of the recording
    pub start_secs: f64,
    /// sample_count × inferred interval
    pub duration_secs: f64,
    pub peak_db: f64,
}

impl NoiseSegment {
    pub fn contains(&self, index: usize) -> bool {
        (self.start_index..=self.end_index).contains(&index)
    }
}

/// Splits a recording into noise segments.
///
/// A sample is noisy when `decibel >= threshold`; a reading exactly at the
/// threshold is noisy. By default a single quiet sample ends a segment.
#[derive(Debug, Clone)]
pub struct SegmentDetector {
    threshold_db: f64,
    /// Quiet samples tolerated between two noisy runs before they split
    max_gap_samples: usize,
}

impl SegmentDetector {
    pub fn new(threshold_db: f64) -> Self {
        Self {
            threshold_db,
            max_gap_samples: 0,
        }
    }

    /// Bridge runs of up to `samples` quiet readings inside a segment
    pub fn with_max_gap(mut self, samples: usize) -> Self {
        self.max_gap_samples = samples;
        self
    }

    pub fn threshold_db(&self) -> f64 {
        self.threshold_db
    }

    pub fn detect(&self, store: &SampleStore) -> Vec<NoiseSegment> {
        self.detect_samples(store.samples(), store.sample_interval_secs())
    }

    /// Single left-to-right scan over `samples`
    pub fn detect_samples(&self, samples: &[Sample], interval_secs: f64) -> Vec<NoiseSegment> {
        let mut segments = Vec::new();
        // (start, last noisy index)
        let mut open: Option<(usize, usize)> = None;

        for (i, sample) in samples.iter().enumerate() {
            if sample.decibel >= self.threshold_db {
                open = Some(match open {
                    Some((start, _)) => (start, i),
                    None => (i, i),
                });
            } else if let Some((start, last)) = open {
                if i - last > self.max_gap_samples {
                    segments.push(build_segment(samples, start, last, interval_secs));
                    open = None;
                }
            }
        }

        if let Some((start, last)) = open {
            segments.push(build_segment(samples, start, last, interval_secs));
        }

        segments
    }
}

fn build_segment(samples: &[Sample], start: usize, end: usize, interval_secs: f64) -> NoiseSegment {
    let run = &samples[start..=end];
    let peak_db = run
        .iter()
        .map(|s| s.decibel)
        .fold(f64::NEG_INFINITY, f64::max);
    let sample_count = end - start + 1;

    NoiseSegment {
        start_index: start,
        end_index: end,
        sample_count,
        start_secs: samples[start].elapsed_secs,
        duration_secs: sample_count as f64 * interval_secs,
        peak_db,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn levels(dbs: &[f64]) -> Vec<Sample> {
        dbs.iter()
            .enumerate()
            .map(|(i, &db)| Sample::new(i as f64 * 5.0, db))
            .collect()
    }

    #[test]
    fn test_no_noise_gives_no_segments() {
        let detector = SegmentDetector::new(35.0);
        assert!(detector.detect_samples(&levels(&[20.0; 10]), 5.0).is_empty());
    }

    #[test]
    fn test_all_noise_gives_one_spanning_segment() {
        let detector = SegmentDetector::new(35.0);
        let segments = detector.detect_samples(&levels(&[50.0; 8]), 5.0);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].start_index, 0);
        assert_eq!(segments[0].end_index, 7);
        assert_eq!(segments[0].duration_secs, 40.0);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let detector = SegmentDetector::new(35.0);
        let segments = detector.detect_samples(&levels(&[34.9, 35.0, 34.9]), 5.0);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].start_index, 1);
        assert_eq!(segments[0].peak_db, 35.0);
    }

    #[test]
    fn test_single_dropout_splits_by_default() {
        let detector = SegmentDetector::new(35.0);
        let samples = levels(&[40.0, 45.0, 30.0, 50.0, 20.0]);
        let segments = detector.detect_samples(&samples, 5.0);
        assert_eq!(segments.len(), 2);
        assert_eq!((segments[0].start_index, segments[0].end_index), (0, 1));
        assert_eq!(segments[0].peak_db, 45.0);
        assert_eq!((segments[1].start_index, segments[1].end_index), (3, 3));
        assert_eq!(segments[1].start_secs, 15.0);
    }

    #[test]
    fn test_gap_tolerance_bridges_short_dropouts() {
        let samples = levels(&[40.0, 30.0, 40.0, 30.0, 30.0, 40.0, 30.0]);

        let bridged = SegmentDetector::new(35.0).with_max_gap(1).detect_samples(&samples, 5.0);
        assert_eq!(bridged.len(), 2);
        assert_eq!((bridged[0].start_index, bridged[0].end_index), (0, 2));
        assert_eq!(bridged[0].sample_count, 3);
        // Trailing quiet sample is not absorbed
        assert_eq!((bridged[1].start_index, bridged[1].end_index), (5, 5));

        let wide = SegmentDetector::new(35.0).with_max_gap(2).detect_samples(&samples, 5.0);
        assert_eq!(wide.len(), 1);
        assert_eq!((wide[0].start_index, wide[0].end_index), (0, 5));
    }

    #[test]
    fn test_segments_are_disjoint_and_ordered() {
        let samples = levels(&[50.0, 20.0, 50.0, 50.0, 20.0, 20.0, 50.0]);
        let segments = SegmentDetector::new(35.0).detect_samples(&samples, 5.0);
        for pair in segments.windows(2) {
            assert!(pair[0].end_index < pair[1].start_index);
        }
        assert!(segments[1].contains(3));
        assert!(!segments[1].contains(4));
    }
}
