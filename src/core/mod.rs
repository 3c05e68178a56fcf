//! Core ingestion, segmentation and per-recording metrics

pub mod analyzer;
pub mod decoder;
pub mod detector;
pub mod metrics;
pub mod samples;
pub mod stats;

pub use analyzer::{
    analyze, AnalyzerBuilder, RecordingAnalysis, RecordingAnalyzer, RecordingInput,
    RecordingSource,
};
pub use detector::{NoiseSegment, SegmentDetector};
pub use metrics::{
    calculate_metrics, HourlyProfile, MetricField, Provenance, RecordingMetrics, SleepBands,
};
pub use samples::{ConditionLabel, Sample, SampleStore, DEFAULT_SAMPLE_INTERVAL_SECS};
