// src/core/samples.rs
//
// Normalized in-memory representation of one overnight recording.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use super::stats;
use crate::error::{AnalysisError, Result};

/// Interval assumed when it can neither be inferred nor was configured
pub const DEFAULT_SAMPLE_INTERVAL_SECS: f64 = 5.0;

const MAX_LABEL_LEN: usize = 32;

/// One decibel reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Seconds since the first sample of the recording
    pub elapsed_secs: f64,
    pub decibel: f64,
}

impl Sample {
    pub fn new(elapsed_secs: f64, decibel: f64) -> Self {
        Self { elapsed_secs, decibel }
    }
}

/// Experimental condition a recording was captured under (e.g. `A`, `B`).
///
/// Always supplied by the caller. Letters are upper-cased so `b` and `B`
/// name the same condition.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConditionLabel(String);

impl ConditionLabel {
    pub fn new(label: &str) -> Result<Self> {
        let trimmed = label.trim();
        let invalid = |reason: &str| AnalysisError::InvalidLabel {
            label: label.to_string(),
            reason: reason.to_string(),
        };

        if trimmed.is_empty() {
            return Err(invalid("label is empty"));
        }
        if trimmed.len() > MAX_LABEL_LEN {
            return Err(invalid("label is longer than 32 characters"));
        }
        if !trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(invalid("only ASCII letters, digits, '_' and '-' are allowed"));
        }

        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Guess a label from a `<name>_<LABEL>.csv` file name.
    ///
    /// Only a hint for cross-checking an explicit label; never used to assign one.
    pub fn hint_from_file_name(path: &Path) -> Option<Self> {
        let stem = path.file_stem()?.to_str()?;
        let (_, tail) = stem.rsplit_once('_')?;
        if tail.len() > 2 {
            return None;
        }
        Self::new(tail).ok()
    }
}

impl FromStr for ConditionLabel {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for ConditionLabel {
    type Error = AnalysisError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(&value)
    }
}

impl From<ConditionLabel> for String {
    fn from(label: ConditionLabel) -> Self {
        label.0
    }
}

impl fmt::Display for ConditionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validated samples of one recording plus its metadata.
///
/// Read-only after construction: samples are sorted by time, rebased so the
/// first one sits at 0 s, and guaranteed non-empty.
#[derive(Debug, Clone)]
pub struct SampleStore {
    source_id: String,
    condition: ConditionLabel,
    samples: Vec<Sample>,
    sample_interval_secs: f64,
    interval_inferred: bool,
    dropped_rows: usize,
    started_at: Option<NaiveDateTime>,
}

impl SampleStore {
    /// Build a store from raw samples.
    ///
    /// `dropped_rows` counts rows the ingestion layer already discarded;
    /// samples with a non-finite reading or time are discarded here and added
    /// to it. With `nominal_interval` set, the interval is taken as given
    /// instead of inferred.
    pub fn new(
        source_id: impl Into<String>,
        condition: ConditionLabel,
        samples: Vec<Sample>,
        dropped_rows: usize,
        nominal_interval: Option<f64>,
    ) -> Result<Self> {
        let source_id = source_id.into();
        let total = samples.len();

        let mut samples: Vec<Sample> = samples
            .into_iter()
            .filter(|s| s.decibel.is_finite() && s.elapsed_secs.is_finite())
            .collect();
        let dropped_rows = dropped_rows + (total - samples.len());

        if samples.is_empty() {
            return Err(AnalysisError::EmptyData {
                source_id,
                dropped_rows,
            });
        }

        // Stable: equal timestamps keep file order
        samples.sort_by(|a, b| a.elapsed_secs.total_cmp(&b.elapsed_secs));
        let origin = samples[0].elapsed_secs;
        for s in &mut samples {
            s.elapsed_secs -= origin;
        }

        let (sample_interval_secs, interval_inferred) = match nominal_interval {
            Some(secs) if secs > 0.0 && secs.is_finite() => (secs, false),
            Some(secs) => {
                return Err(AnalysisError::InvalidConfig(format!(
                    "nominal sample interval must be positive, got {secs}"
                )))
            }
            None => match infer_interval(&samples) {
                Some(secs) => (secs, true),
                None => (DEFAULT_SAMPLE_INTERVAL_SECS, false),
            },
        };

        Ok(Self {
            source_id,
            condition,
            samples,
            sample_interval_secs,
            interval_inferred,
            dropped_rows,
            started_at: None,
        })
    }

    /// Attach the wall-clock time of the first sample
    pub fn with_start_time(mut self, started_at: NaiveDateTime) -> Self {
        self.started_at = Some(started_at);
        self
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn condition(&self) -> &ConditionLabel {
        &self.condition
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Always false for a constructed store
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn sample_interval_secs(&self) -> f64 {
        self.sample_interval_secs
    }

    pub fn interval_inferred(&self) -> bool {
        self.interval_inferred
    }

    pub fn dropped_rows(&self) -> usize {
        self.dropped_rows
    }

    pub fn started_at(&self) -> Option<NaiveDateTime> {
        self.started_at
    }

    /// Recorded time, as sample count × interval
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 * self.sample_interval_secs
    }

    pub fn decibels(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().map(|s| s.decibel)
    }
}

/// Median gap between consecutive samples; `None` when it is not positive
pub fn infer_interval(samples: &[Sample]) -> Option<f64> {
    if samples.len() < 2 {
        return None;
    }
    let mut gaps: Vec<f64> = samples
        .windows(2)
        .map(|w| w[1].elapsed_secs - w[0].elapsed_secs)
        .collect();
    let gap = stats::median(&mut gaps);
    (gap > 0.0).then_some(gap)
}
