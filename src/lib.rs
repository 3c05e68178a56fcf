//! SleepCheckr - Sleep noise analysis for overnight decibel recordings
//!
//! Turns phone-recorded decibel logs into sleep-quality proxy metrics and
//! tests whether one sleeping condition is noisier than another.
//!
//! ## Features
//!
//! - **Tolerant ingestion**: column aliases, UTF-8/EUC-KR decoding, the headerless dBMeter export
//! - **Noise segmentation**: threshold runs with optional gap bridging
//! - **Per-recording metrics**: noise ratio, onset window, sleep bands, hourly profile
//! - **Condition comparison**: order-independent summaries and a swappable significance test
//! - **Dose-response**: correlation between an exposure level and a condition mean
//!
//! ## Module Structure
//!
//! - `core` - Ingestion, segmentation and per-recording metrics
//! - `comparison` - Condition summaries and hypothesis verdicts
//! - `config` - Analysis configuration and threshold presets
//! - `cli` - Command-line interface
//! - `error` - Error taxonomy
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sleepcheckr::comparison::{aggregate, HypothesisEvaluator};
//! use sleepcheckr::core::{ConditionLabel, RecordingAnalyzer};
//!
//! let analyzer = RecordingAnalyzer::builder().threshold_db(35.0).build()?;
//! let a = ConditionLabel::new("A")?;
//! let b = ConditionLabel::new("B")?;
//!
//! let baseline = aggregate(&a, &[analyzer.analyze_path(a.clone(), "night1_A.csv")?])?;
//! let treatment = aggregate(&b, &[analyzer.analyze_path(b.clone(), "night2_B.csv")?])?;
//!
//! let verdict = HypothesisEvaluator::default().evaluate(&baseline, &treatment);
//! println!("{}", verdict.verdict.description());
//! ```
//!
//! ## Threshold Presets
//!
//! | Preset   | Threshold | Use Case                          |
//! |----------|-----------|-----------------------------------|
//! | Quiet    | 35 dB     | Quiet bedroom, phone near the bed |
//! | Standard | 40 dB     | Typical bedroom                   |
//! | Urban    | 45 dB     | Traffic or fan background         |

// Ingestion, segmentation and metrics
pub mod core;

// Cross-condition comparison
pub mod comparison;

// Configuration and presets
pub mod config;

// Command-line interface
pub mod cli;

pub mod error;

// Re-export commonly used types at crate root for convenience
pub use crate::comparison::{
    aggregate, aggregate_outcomes, dose_response, ConditionSummary, DecisionRule, DoseResponse,
    HypothesisEvaluator, HypothesisVerdict, SignificanceTest, Verdict,
};
pub use crate::config::{AnalysisConfig, ConfigBuilder, SignificanceMethod, ThresholdPreset};
pub use crate::core::{
    analyze, AnalyzerBuilder, ConditionLabel, MetricField, NoiseSegment, RecordingAnalyzer,
    RecordingInput, RecordingMetrics, Sample, SampleStore, SegmentDetector,
};
pub use crate::error::{AnalysisError, Result};
