// src/core/analyzer.rs
//
// High-level recording analysis API with builder pattern.

use log::{debug, info};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

use super::decoder::{load_store, read_file};
use super::detector::{NoiseSegment, SegmentDetector};
use super::metrics::{calculate_metrics, MetricField, RecordingMetrics};
use super::samples::{ConditionLabel, SampleStore};
use crate::config::{AnalysisConfig, ConfigBuilder, SignificanceMethod, ThresholdPreset};
use crate::error::Result;

/// Where the bytes of a recording come from
#[derive(Debug, Clone)]
pub enum RecordingSource {
    Path(PathBuf),
    Bytes { source_id: String, bytes: Vec<u8> },
}

/// One recording together with its explicit condition label
#[derive(Debug, Clone)]
pub struct RecordingInput {
    pub condition: ConditionLabel,
    pub source: RecordingSource,
}

impl RecordingInput {
    pub fn from_path<P: AsRef<Path>>(condition: ConditionLabel, path: P) -> Self {
        Self {
            condition,
            source: RecordingSource::Path(path.as_ref().to_path_buf()),
        }
    }

    pub fn from_bytes(
        condition: ConditionLabel,
        source_id: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            condition,
            source: RecordingSource::Bytes {
                source_id: source_id.into(),
                bytes: bytes.into(),
            },
        }
    }

    /// File path, or the caller-supplied id for in-memory input
    pub fn source_id(&self) -> String {
        match &self.source {
            RecordingSource::Path(path) => path.display().to_string(),
            RecordingSource::Bytes { source_id, .. } => source_id.clone(),
        }
    }

    fn load(&self, config: &AnalysisConfig) -> Result<SampleStore> {
        match &self.source {
            RecordingSource::Path(path) => {
                let bytes = read_file(path)?;
                load_store(&self.source_id(), self.condition.clone(), &bytes, config)
            }
            RecordingSource::Bytes { source_id, bytes } => {
                load_store(source_id, self.condition.clone(), bytes, config)
            }
        }
    }
}

/// Metrics plus the segments they were computed from
#[derive(Debug, Clone)]
pub struct RecordingAnalysis {
    pub metrics: RecordingMetrics,
    pub segments: Vec<NoiseSegment>,
}

/// Builder for RecordingAnalyzer configuration
pub struct AnalyzerBuilder {
    config: ConfigBuilder,
}

impl AnalyzerBuilder {
    pub fn new() -> Self {
        Self {
            config: ConfigBuilder::new(),
        }
    }

    /// Take the threshold from `preset`; other settings are kept
    pub fn preset(mut self, preset: ThresholdPreset) -> Self {
        self.config = self.config.threshold_db(preset.threshold_db());
        self
    }

    pub fn threshold_db(mut self, db: f64) -> Self {
        self.config = self.config.threshold_db(db);
        self
    }

    pub fn onset_window_minutes(mut self, minutes: f64) -> Self {
        self.config = self.config.onset_window_minutes(minutes);
        self
    }

    pub fn sample_interval_secs(mut self, secs: f64) -> Self {
        self.config = self.config.sample_interval_secs(secs);
        self
    }

    pub fn max_gap_samples(mut self, samples: usize) -> Self {
        self.config = self.config.max_gap_samples(samples);
        self
    }

    pub fn encodings<I, S>(mut self, encodings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config = self.config.encodings(encodings);
        self
    }

    pub fn metric(mut self, metric: MetricField) -> Self {
        self.config = self.config.metric(metric);
        self
    }

    pub fn significance(mut self, method: SignificanceMethod) -> Self {
        self.config = self.config.significance(method);
        self
    }

    pub fn build(self) -> Result<RecordingAnalyzer> {
        Ok(RecordingAnalyzer {
            config: self.config.build()?,
        })
    }
}

impl Default for AnalyzerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs ingestion, segmentation and metric calculation for recordings
#[derive(Debug, Clone)]
pub struct RecordingAnalyzer {
    config: AnalysisConfig,
}

impl RecordingAnalyzer {
    /// Create analyzer with a validated configuration
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn builder() -> AnalyzerBuilder {
        AnalyzerBuilder::new()
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn detector(&self) -> SegmentDetector {
        SegmentDetector::new(self.config.threshold_db).with_max_gap(self.config.max_gap_samples)
    }

    pub fn analyze(&self, input: &RecordingInput) -> Result<RecordingMetrics> {
        Ok(self.analyze_detailed(input)?.metrics)
    }

    pub fn analyze_path<P: AsRef<Path>>(
        &self,
        condition: ConditionLabel,
        path: P,
    ) -> Result<RecordingMetrics> {
        self.analyze(&RecordingInput::from_path(condition, path))
    }

    pub fn analyze_detailed(&self, input: &RecordingInput) -> Result<RecordingAnalysis> {
        let store = input.load(&self.config)?;
        Ok(self.analyze_store(&store))
    }

    /// Analyze an already validated store
    pub fn analyze_store(&self, store: &SampleStore) -> RecordingAnalysis {
        let segments = self.detector().detect(store);
        let metrics = calculate_metrics(store, &segments, &self.config);
        debug!(
            "{}: {} segments, noise ratio {:.3}",
            store.source_id(),
            segments.len(),
            metrics.noise_ratio
        );
        RecordingAnalysis { metrics, segments }
    }

    /// Analyze independent recordings in parallel; results keep input order
    pub fn analyze_batch(&self, inputs: &[RecordingInput]) -> Vec<Result<RecordingMetrics>> {
        info!("Analyzing {} recordings", inputs.len());
        inputs.par_iter().map(|input| self.analyze(input)).collect()
    }
}

/// One-shot analysis of a single recording
pub fn analyze(input: &RecordingInput, config: &AnalysisConfig) -> Result<RecordingMetrics> {
    RecordingAnalyzer::new(config.clone())?.analyze(input)
}
