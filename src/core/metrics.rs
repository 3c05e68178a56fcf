// src/core/metrics.rs
//
// Per-recording sleep-quality proxy metrics.

use chrono::NaiveDateTime;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::detector::NoiseSegment;
use super::samples::{ConditionLabel, SampleStore};
use super::stats;
use crate::config::AnalysisConfig;

/// Below this level the sleeper is assumed to be in deep sleep
pub const DEEP_SLEEP_MAX_DB: f64 = 30.0;
/// 30–35 dB: light sleep, no movement
pub const LIGHT_SLEEP_MAX_DB: f64 = 35.0;
/// 35–40 dB: tossing and turning; at 40 dB and above sleep is disturbed
pub const RESTLESS_MAX_DB: f64 = 40.0;

const SECONDS_PER_HOUR: f64 = 3600.0;

/// Where a set of metrics came from and how it was computed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub source_id: String,
    pub condition: ConditionLabel,
    pub threshold_db: f64,
    pub onset_window_minutes: f64,
    pub max_gap_samples: usize,
    /// Wall-clock time of the first sample, when the file carried one
    pub started_at: Option<NaiveDateTime>,
}

/// Share of samples in each sleep band (sums to 1)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SleepBands {
    pub deep: f64,
    pub light: f64,
    pub restless: f64,
    pub disturbed: f64,
}

/// Summary of one elapsed hour of the recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyProfile {
    pub hour: usize,
    pub sample_count: usize,
    pub mean_db: f64,
    pub deep_ratio: f64,
    pub restless_ratio: f64,
}

/// Immutable summary of one recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingMetrics {
    pub provenance: Provenance,
    pub sample_count: usize,
    pub dropped_rows: usize,
    pub sample_interval_secs: f64,
    pub duration_secs: f64,
    /// Fraction of samples inside noise segments
    pub noise_ratio: f64,
    pub mean_db: f64,
    /// Population standard deviation
    pub std_db: f64,
    pub min_db: f64,
    pub max_db: f64,
    pub segment_count: usize,
    pub mean_segment_secs: f64,
    pub max_segment_secs: f64,
    /// Noise ratio over the onset window
    pub onset_noise_ratio: f64,
    /// The recording was shorter than the onset window
    pub onset_partial: bool,
    pub bands: SleepBands,
    pub hourly: Vec<HourlyProfile>,
}

impl RecordingMetrics {
    pub fn source_id(&self) -> &str {
        &self.provenance.source_id
    }

    pub fn condition(&self) -> &ConditionLabel {
        &self.provenance.condition
    }

    pub fn value(&self, field: MetricField) -> f64 {
        field.value(self)
    }
}

/// Scalar metric fields that can be aggregated and compared
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricField {
    NoiseRatio,
    MeanDb,
    StdDb,
    MaxDb,
    SegmentCount,
    MeanSegmentSecs,
    MaxSegmentSecs,
    OnsetNoiseRatio,
    DeepSleepRatio,
    DisturbedRatio,
}

impl MetricField {
    pub fn all() -> Vec<Self> {
        vec![
            Self::NoiseRatio,
            Self::MeanDb,
            Self::StdDb,
            Self::MaxDb,
            Self::SegmentCount,
            Self::MeanSegmentSecs,
            Self::MaxSegmentSecs,
            Self::OnsetNoiseRatio,
            Self::DeepSleepRatio,
            Self::DisturbedRatio,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            MetricField::NoiseRatio => "noise_ratio",
            MetricField::MeanDb => "mean_db",
            MetricField::StdDb => "std_db",
            MetricField::MaxDb => "max_db",
            MetricField::SegmentCount => "segment_count",
            MetricField::MeanSegmentSecs => "mean_segment_secs",
            MetricField::MaxSegmentSecs => "max_segment_secs",
            MetricField::OnsetNoiseRatio => "onset_noise_ratio",
            MetricField::DeepSleepRatio => "deep_sleep_ratio",
            MetricField::DisturbedRatio => "disturbed_ratio",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase().replace('-', "_");
        Self::all().into_iter().find(|f| f.name() == name)
    }

    /// Ratio fields are fractions in [0, 1]; deltas on them are quoted in
    /// percentage points.
    pub fn is_ratio(&self) -> bool {
        matches!(
            self,
            MetricField::NoiseRatio
                | MetricField::OnsetNoiseRatio
                | MetricField::DeepSleepRatio
                | MetricField::DisturbedRatio
        )
    }

    pub fn unit(&self) -> &'static str {
        match self {
            MetricField::MeanDb | MetricField::StdDb | MetricField::MaxDb => "dB",
            MetricField::MeanSegmentSecs | MetricField::MaxSegmentSecs => "s",
            MetricField::SegmentCount => "",
            _ => "pp",
        }
    }

    pub fn value(&self, metrics: &RecordingMetrics) -> f64 {
        match self {
            MetricField::NoiseRatio => metrics.noise_ratio,
            MetricField::MeanDb => metrics.mean_db,
            MetricField::StdDb => metrics.std_db,
            MetricField::MaxDb => metrics.max_db,
            MetricField::SegmentCount => metrics.segment_count as f64,
            MetricField::MeanSegmentSecs => metrics.mean_segment_secs,
            MetricField::MaxSegmentSecs => metrics.max_segment_secs,
            MetricField::OnsetNoiseRatio => metrics.onset_noise_ratio,
            MetricField::DeepSleepRatio => metrics.bands.deep,
            MetricField::DisturbedRatio => metrics.bands.disturbed,
        }
    }
}

impl fmt::Display for MetricField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MetricField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| {
            let known: Vec<_> = Self::all().iter().map(|f| f.name()).collect();
            format!("unknown metric {s:?} (expected one of: {})", known.join(", "))
        })
    }
}

/// Derive metrics from a store and its segments
///
/// Segments are expected to come from a detector run over the same store.
/// Any segment reaching past the end of the store is skipped.
pub fn calculate_metrics(
    store: &SampleStore,
    segments: &[NoiseSegment],
    config: &AnalysisConfig,
) -> RecordingMetrics {
    let samples = store.samples();
    let total = samples.len();
    let decibels: Vec<f64> = store.decibels().collect();

    let (segments, foreign): (Vec<&NoiseSegment>, Vec<&NoiseSegment>) = segments
        .iter()
        .partition(|s| s.start_index <= s.end_index && s.end_index < total);
    if !foreign.is_empty() {
        warn!(
            "{}: ignoring {} segment(s) outside its {} samples",
            store.source_id(),
            foreign.len(),
            total
        );
    }

    let mut noisy = vec![false; total];
    for segment in &segments {
        noisy[segment.start_index..=segment.end_index].fill(true);
    }
    let noisy_count = noisy.iter().filter(|&&n| n).count();

    let durations: Vec<f64> = segments.iter().map(|s| s.duration_secs).collect();
    let max_segment_secs = durations.iter().copied().fold(0.0, f64::max);

    let window_secs = config.onset_window_secs();
    let onset_partial = store.duration_secs() < window_secs;
    let onset: Vec<bool> = if onset_partial {
        noisy.clone()
    } else {
        samples
            .iter()
            .zip(&noisy)
            .filter(|(s, _)| s.elapsed_secs < window_secs)
            .map(|(_, &n)| n)
            .collect()
    };
    let onset_noise_ratio = ratio(onset.iter().filter(|&&n| n).count(), onset.len());

    RecordingMetrics {
        provenance: Provenance {
            source_id: store.source_id().to_string(),
            condition: store.condition().clone(),
            threshold_db: config.threshold_db,
            onset_window_minutes: config.onset_window_minutes,
            max_gap_samples: config.max_gap_samples,
            started_at: store.started_at(),
        },
        sample_count: total,
        dropped_rows: store.dropped_rows(),
        sample_interval_secs: store.sample_interval_secs(),
        duration_secs: store.duration_secs(),
        noise_ratio: ratio(noisy_count, total),
        mean_db: stats::mean(&decibels),
        std_db: stats::population_std_dev(&decibels),
        min_db: decibels.iter().copied().fold(f64::INFINITY, f64::min),
        max_db: decibels.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        segment_count: segments.len(),
        mean_segment_secs: stats::mean(&durations),
        max_segment_secs,
        onset_noise_ratio,
        onset_partial,
        bands: sleep_bands(&decibels),
        hourly: hourly_profile(store),
    }
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

/// Classify every sample into a sleep band
pub fn sleep_bands(decibels: &[f64]) -> SleepBands {
    let mut counts = [0usize; 4];
    for &db in decibels {
        let band = if db < DEEP_SLEEP_MAX_DB {
            0
        } else if db < LIGHT_SLEEP_MAX_DB {
            1
        } else if db < RESTLESS_MAX_DB {
            2
        } else {
            3
        };
        counts[band] += 1;
    }

    let n = decibels.len();
    SleepBands {
        deep: ratio(counts[0], n),
        light: ratio(counts[1], n),
        restless: ratio(counts[2], n),
        disturbed: ratio(counts[3], n),
    }
}

/// Group samples by elapsed hour; hours without samples are skipped
pub fn hourly_profile(store: &SampleStore) -> Vec<HourlyProfile> {
    let mut hours: BTreeMap<usize, Vec<f64>> = BTreeMap::new();
    for sample in store.samples() {
        let hour = (sample.elapsed_secs / SECONDS_PER_HOUR).floor() as usize;
        hours.entry(hour).or_default().push(sample.decibel);
    }

    hours
        .into_iter()
        .map(|(hour, dbs)| {
            let bands = sleep_bands(&dbs);
            HourlyProfile {
                hour,
                sample_count: dbs.len(),
                mean_db: stats::mean(&dbs),
                deep_ratio: bands.deep,
                restless_ratio: bands.restless,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::detector::SegmentDetector;
    use crate::core::samples::Sample;

    fn store(dbs: &[f64], interval: f64) -> SampleStore {
        let samples = dbs
            .iter()
            .enumerate()
            .map(|(i, &db)| Sample::new(i as f64 * interval, db))
            .collect();
        SampleStore::new("t", ConditionLabel::new("A").unwrap(), samples, 0, None).unwrap()
    }

    fn metrics_for(store: &SampleStore, config: &AnalysisConfig) -> RecordingMetrics {
        let segments = SegmentDetector::new(config.threshold_db).detect(store);
        calculate_metrics(store, &segments, config)
    }

    #[test]
    fn test_quiet_recording() {
        let config = AnalysisConfig {
            threshold_db: 35.0,
            ..Default::default()
        };
        let m = metrics_for(&store(&[20.0; 50], 5.0), &config);
        assert_eq!(m.noise_ratio, 0.0);
        assert_eq!(m.segment_count, 0);
        assert_eq!(m.mean_segment_secs, 0.0);
        assert_eq!(m.max_segment_secs, 0.0);
        assert_eq!(m.std_db, 0.0);
        assert_eq!(m.bands.deep, 1.0);
    }

    #[test]
    fn test_population_statistics() {
        let config = AnalysisConfig::default();
        let m = metrics_for(&store(&[30.0, 40.0], 5.0), &config);
        assert_eq!(m.mean_db, 35.0);
        assert_eq!(m.std_db, 5.0);
        assert_eq!(m.min_db, 30.0);
        assert_eq!(m.max_db, 40.0);
    }

    #[test]
    fn test_segment_durations() {
        let config = AnalysisConfig {
            threshold_db: 35.0,
            ..Default::default()
        };
        let dbs = [50.0, 50.0, 20.0, 50.0, 50.0, 50.0, 50.0, 20.0];
        let m = metrics_for(&store(&dbs, 5.0), &config);
        assert_eq!(m.segment_count, 2);
        assert_eq!(m.mean_segment_secs, 15.0);
        assert_eq!(m.max_segment_secs, 20.0);
        assert_eq!(m.noise_ratio, 0.75);
    }

    #[test]
    fn test_onset_window_restricts_ratio() {
        // 2 hours at 60 s; noisy only during the first 10 minutes
        let dbs: Vec<f64> = (0..120).map(|i| if i < 10 { 50.0 } else { 20.0 }).collect();
        let config = AnalysisConfig {
            threshold_db: 35.0,
            onset_window_minutes: 30.0,
            ..Default::default()
        };
        let m = metrics_for(&store(&dbs, 60.0), &config);
        assert!(!m.onset_partial);
        assert!((m.onset_noise_ratio - 10.0 / 30.0).abs() < 1e-12);
        assert!((m.noise_ratio - 10.0 / 120.0).abs() < 1e-12);
    }

    #[test]
    fn test_short_recording_flags_partial_window() {
        let dbs = [50.0, 20.0, 20.0, 20.0];
        let config = AnalysisConfig {
            threshold_db: 35.0,
            ..Default::default()
        };
        let m = metrics_for(&store(&dbs, 5.0), &config);
        assert!(m.onset_partial);
        assert_eq!(m.onset_noise_ratio, m.noise_ratio);
        assert_eq!(m.onset_noise_ratio, 0.25);
    }

    #[test]
    fn test_segments_from_a_longer_recording_are_skipped() {
        let config = AnalysisConfig {
            threshold_db: 35.0,
            ..Default::default()
        };
        let long = store(&[20.0, 50.0, 50.0, 20.0, 20.0, 50.0, 50.0, 50.0], 5.0);
        let segments = SegmentDetector::new(35.0).detect(&long);
        assert_eq!(segments.len(), 2);

        let short = store(&[20.0, 50.0, 50.0, 20.0, 20.0], 5.0);
        let m = calculate_metrics(&short, &segments, &config);
        assert_eq!(m.segment_count, 1);
        assert!((m.noise_ratio - 0.4).abs() < 1e-12);
        assert_eq!(m.max_segment_secs, 10.0);
    }

    #[test]
    fn test_provenance_carries_start_time() {
        let start = chrono::NaiveDate::from_ymd_opt(2025, 11, 15)
            .unwrap()
            .and_hms_opt(23, 0, 0)
            .unwrap();
        let config = AnalysisConfig::default();
        let timed = store(&[20.0, 30.0], 5.0).with_start_time(start);
        assert_eq!(metrics_for(&timed, &config).provenance.started_at, Some(start));
        assert_eq!(metrics_for(&store(&[20.0], 5.0), &config).provenance.started_at, None);
    }

    #[test]
    fn test_sleep_bands() {
        let bands = sleep_bands(&[25.0, 30.0, 34.9, 35.0, 39.0, 40.0, 60.0, 29.9]);
        assert_eq!(bands.deep, 0.25);
        assert_eq!(bands.light, 0.25);
        assert_eq!(bands.restless, 0.25);
        assert_eq!(bands.disturbed, 0.25);
    }

    #[test]
    fn test_hourly_profile() {
        // 90 minutes at 10 minute steps: hour 0 has 6 samples, hour 1 has 3
        let dbs = [25.0, 25.0, 25.0, 25.0, 25.0, 25.0, 37.0, 37.0, 37.0];
        let s = store(&dbs, 600.0);
        let hourly = hourly_profile(&s);
        assert_eq!(hourly.len(), 2);
        assert_eq!(hourly[0].sample_count, 6);
        assert_eq!(hourly[0].deep_ratio, 1.0);
        assert_eq!(hourly[1].hour, 1);
        assert_eq!(hourly[1].mean_db, 37.0);
        assert_eq!(hourly[1].restless_ratio, 1.0);
    }

    #[test]
    fn test_metric_field_names() {
        for field in MetricField::all() {
            assert_eq!(MetricField::from_name(field.name()), Some(field));
        }
        assert_eq!("onset-noise-ratio".parse::<MetricField>(), Ok(MetricField::OnsetNoiseRatio));
        assert!("loudness".parse::<MetricField>().is_err());
        assert!(MetricField::NoiseRatio.is_ratio());
        assert!(!MetricField::MeanDb.is_ratio());
    }
}
