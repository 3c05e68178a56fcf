// src/config/profiles.rs
//
// Analysis configuration, threshold presets and the config builder

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::metrics::MetricField;
use crate::error::{AnalysisError, Result};

/// Encodings tried, in order, when no explicit list is configured.
/// The phone export is UTF-8; Korean spreadsheets re-save as EUC-KR (CP949).
pub const DEFAULT_ENCODINGS: [&str; 2] = ["utf-8", "euc-kr"];

/// Calibration presets for the noise threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdPreset {
    /// Quiet bedroom, phone close to the bed
    Quiet,
    /// Typical bedroom
    Standard,
    /// Street noise or a fan in the room
    Urban,
}

impl ThresholdPreset {
    pub fn all() -> Vec<Self> {
        vec![Self::Quiet, Self::Standard, Self::Urban]
    }

    pub fn threshold_db(&self) -> f64 {
        match self {
            ThresholdPreset::Quiet => 35.0,
            ThresholdPreset::Standard => 40.0,
            ThresholdPreset::Urban => 45.0,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ThresholdPreset::Quiet => "quiet",
            ThresholdPreset::Standard => "standard",
            ThresholdPreset::Urban => "urban",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ThresholdPreset::Quiet => "Quiet bedroom; restless movement starts around 35 dB",
            ThresholdPreset::Standard => "Typical bedroom; sleep is disturbed above 40 dB",
            ThresholdPreset::Urban => "Steady background noise from traffic or a fan",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "quiet" => Some(Self::Quiet),
            "standard" | "default" => Some(Self::Standard),
            "urban" | "noisy" => Some(Self::Urban),
            _ => None,
        }
    }
}

/// Strategy used to decide whether two conditions can be told apart
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "kebab-case")]
pub enum SignificanceMethod {
    /// Inconclusive when a side has one recording and the delta sits within
    /// the combined standard deviation
    DeltaHeuristic,
    /// Welch's unequal-variance two-sample t-test
    WelchT { alpha: f64 },
}

impl Default for SignificanceMethod {
    fn default() -> Self {
        SignificanceMethod::DeltaHeuristic
    }
}

/// Complete configuration threaded through every analysis call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Samples at or above this level are noisy
    pub threshold_db: f64,
    /// Length of the sleep-onset window
    pub onset_window_minutes: f64,
    /// Minimum treatment − baseline difference, in percentage points for
    /// ratio metrics and native units otherwise
    pub hypothesis_min_delta_pp: f64,
    /// Fixed sample interval; inferred from the data when absent
    pub nominal_sample_interval_seconds: Option<f64>,
    /// Quiet samples bridged inside a segment (0 = strict contiguity)
    pub max_gap_samples: usize,
    /// Text encodings to try, in order
    pub encodings: Vec<String>,
    /// Metric the hypothesis is judged on
    pub metric: MetricField,
    pub significance: SignificanceMethod,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self::from_preset(ThresholdPreset::Standard)
    }
}

impl AnalysisConfig {
    pub fn from_preset(preset: ThresholdPreset) -> Self {
        Self {
            threshold_db: preset.threshold_db(),
            onset_window_minutes: 30.0,
            hypothesis_min_delta_pp: 5.0,
            nominal_sample_interval_seconds: None,
            max_gap_samples: 0,
            encodings: DEFAULT_ENCODINGS.iter().map(|e| e.to_string()).collect(),
            metric: MetricField::NoiseRatio,
            significance: SignificanceMethod::DeltaHeuristic,
        }
    }

    /// Load a JSON config file; absent fields keep their defaults
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| AnalysisError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&json).map_err(|e| {
            AnalysisError::InvalidConfig(format!("{}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(AnalysisError::InvalidConfig(msg));

        if !self.threshold_db.is_finite() {
            return invalid(format!("threshold_db must be finite, got {}", self.threshold_db));
        }
        if !(self.onset_window_minutes > 0.0 && self.onset_window_minutes.is_finite()) {
            return invalid(format!(
                "onset_window_minutes must be positive, got {}",
                self.onset_window_minutes
            ));
        }
        // A zero threshold would let both orderings of a comparison be "supported"
        if !(self.hypothesis_min_delta_pp > 0.0 && self.hypothesis_min_delta_pp.is_finite()) {
            return invalid(format!(
                "hypothesis_min_delta_pp must be positive, got {}",
                self.hypothesis_min_delta_pp
            ));
        }
        if let Some(secs) = self.nominal_sample_interval_seconds {
            if !(secs > 0.0 && secs.is_finite()) {
                return invalid(format!(
                    "nominal_sample_interval_seconds must be positive, got {secs}"
                ));
            }
        }
        if self.encodings.is_empty() {
            return invalid("at least one encoding is required".to_string());
        }
        for label in &self.encodings {
            if encoding_rs::Encoding::for_label(label.trim().as_bytes()).is_none() {
                return invalid(format!("unknown encoding {label:?}"));
            }
        }
        if let SignificanceMethod::WelchT { alpha } = self.significance {
            if !(alpha > 0.0 && alpha < 1.0) {
                return invalid(format!("alpha must lie in (0, 1), got {alpha}"));
            }
        }
        Ok(())
    }

    pub fn onset_window_secs(&self) -> f64 {
        self.onset_window_minutes * 60.0
    }
}

/// Builder for custom configurations
pub struct ConfigBuilder {
    config: AnalysisConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: AnalysisConfig::default(),
        }
    }

    pub fn from_preset(preset: ThresholdPreset) -> Self {
        Self {
            config: AnalysisConfig::from_preset(preset),
        }
    }

    pub fn from_config(config: AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn threshold_db(mut self, db: f64) -> Self {
        self.config.threshold_db = db;
        self
    }

    pub fn onset_window_minutes(mut self, minutes: f64) -> Self {
        self.config.onset_window_minutes = minutes;
        self
    }

    pub fn min_delta_pp(mut self, pp: f64) -> Self {
        self.config.hypothesis_min_delta_pp = pp;
        self
    }

    pub fn sample_interval_secs(mut self, secs: f64) -> Self {
        self.config.nominal_sample_interval_seconds = Some(secs);
        self
    }

    pub fn max_gap_samples(mut self, samples: usize) -> Self {
        self.config.max_gap_samples = samples;
        self
    }

    pub fn encodings<I, S>(mut self, encodings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.encodings = encodings.into_iter().map(Into::into).collect();
        self
    }

    pub fn metric(mut self, metric: MetricField) -> Self {
        self.config.metric = metric;
        self
    }

    pub fn significance(mut self, method: SignificanceMethod) -> Self {
        self.config.significance = method;
        self
    }

    /// Configuration as set so far, not yet validated
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn build(self) -> Result<AnalysisConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
