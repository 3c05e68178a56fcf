// src/comparison/hypothesis.rs
//
// Treatment-vs-baseline verdicts and exposure dose-response.

use log::debug;
use serde::{Deserialize, Serialize};

use super::aggregate::ConditionSummary;
use super::significance::{significance_test, DeltaHeuristic, SignificanceTest};
use crate::config::AnalysisConfig;
use crate::core::metrics::MetricField;
use crate::core::samples::ConditionLabel;
use crate::core::stats;
use crate::error::{AnalysisError, Result};

/// Ternary outcome of a hypothesis check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// The treatment raised the metric by at least the threshold
    Supported,
    /// The difference is real but below the threshold
    Rejected,
    /// Too little data to tell the difference from noise
    Inconclusive,
}

impl Verdict {
    pub fn symbol(&self) -> &'static str {
        match self {
            Verdict::Supported => "✓",
            Verdict::Rejected => "✗",
            Verdict::Inconclusive => "?",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Verdict::Supported => "Hypothesis supported",
            Verdict::Rejected => "Hypothesis rejected",
            Verdict::Inconclusive => "Inconclusive",
        }
    }
}

/// Metric and minimum effect a treatment has to reach
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecisionRule {
    pub field: MetricField,
    /// Percentage points for ratio fields, native units otherwise
    pub min_delta_pp: f64,
}

impl DecisionRule {
    pub fn new(field: MetricField, min_delta_pp: f64) -> Result<Self> {
        if !(min_delta_pp > 0.0 && min_delta_pp.is_finite()) {
            return Err(AnalysisError::InvalidConfig(format!(
                "minimum delta must be positive, got {min_delta_pp}"
            )));
        }
        Ok(Self {
            field,
            min_delta_pp,
        })
    }

    /// Threshold in the field's own scale
    pub fn threshold(&self) -> f64 {
        if self.field.is_ratio() {
            self.min_delta_pp / 100.0
        } else {
            self.min_delta_pp
        }
    }
}

/// Result of comparing one treatment against the baseline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HypothesisVerdict {
    pub field: MetricField,
    pub baseline: ConditionLabel,
    pub treatment: ConditionLabel,
    pub baseline_mean: f64,
    pub treatment_mean: f64,
    pub baseline_n: usize,
    pub treatment_n: usize,
    /// treatment − baseline
    pub delta: f64,
    pub threshold: f64,
    pub verdict: Verdict,
    pub method: String,
    pub p_value: Option<f64>,
}

/// Compares condition summaries under a decision rule
#[derive(Debug)]
pub struct HypothesisEvaluator {
    rule: DecisionRule,
    test: Box<dyn SignificanceTest>,
}

impl HypothesisEvaluator {
    pub fn new(rule: DecisionRule, test: Box<dyn SignificanceTest>) -> Self {
        Self { rule, test }
    }

    /// Rule and test taken from the configuration
    pub fn from_config(config: &AnalysisConfig) -> Result<Self> {
        let rule = DecisionRule::new(config.metric, config.hypothesis_min_delta_pp)?;
        Ok(Self::new(rule, significance_test(config.significance)))
    }

    pub fn rule(&self) -> &DecisionRule {
        &self.rule
    }

    pub fn method(&self) -> &'static str {
        self.test.name()
    }

    pub fn evaluate(
        &self,
        baseline: &ConditionSummary,
        treatment: &ConditionSummary,
    ) -> HypothesisVerdict {
        let field = self.rule.field;
        let baseline_mean = baseline.mean(field);
        let treatment_mean = treatment.mean(field);
        let delta = treatment_mean - baseline_mean;
        let threshold = self.rule.threshold();

        // Means are sums of fractions; a delta that should equal the threshold
        // can land a few ulps short. The slack never exceeds half the
        // threshold, so a pair can still not be supported in both directions.
        let scale = baseline_mean.abs().max(treatment_mean.abs()).max(threshold);
        let slack = stats::rounding_slack(scale).min(threshold / 2.0);

        let assessment = self.test.assess(field, baseline, treatment);
        let verdict = if !assessment.distinguishable {
            Verdict::Inconclusive
        } else if delta >= threshold - slack {
            Verdict::Supported
        } else {
            Verdict::Rejected
        };

        debug!(
            "{} vs {} on {}: delta {:.4}, threshold {:.4} -> {:?}",
            treatment.condition, baseline.condition, field, delta, threshold, verdict
        );

        HypothesisVerdict {
            field,
            baseline: baseline.condition.clone(),
            treatment: treatment.condition.clone(),
            baseline_mean,
            treatment_mean,
            baseline_n: baseline.sample_size,
            treatment_n: treatment.sample_size,
            delta,
            threshold,
            verdict,
            method: self.test.name().to_string(),
            p_value: assessment.p_value,
        }
    }

    /// Compare several treatments against one baseline, in the given order
    pub fn evaluate_all(
        &self,
        baseline: &ConditionSummary,
        treatments: &[ConditionSummary],
    ) -> Vec<HypothesisVerdict> {
        treatments
            .iter()
            .map(|treatment| self.evaluate(baseline, treatment))
            .collect()
    }
}

impl Default for HypothesisEvaluator {
    fn default() -> Self {
        Self::new(
            DecisionRule {
                field: MetricField::NoiseRatio,
                min_delta_pp: 5.0,
            },
            Box::new(DeltaHeuristic),
        )
    }
}

/// One condition placed on the exposure axis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DosePoint {
    pub condition: ConditionLabel,
    pub exposure: f64,
    pub mean: f64,
}

/// Correlation between an exposure level and a condition mean
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoseResponse {
    pub field: MetricField,
    /// Sorted by exposure
    pub points: Vec<DosePoint>,
    /// `None` with fewer than two points or a constant axis
    pub r: Option<f64>,
    /// Two-sided, from three points up
    pub p_value: Option<f64>,
}

pub fn dose_response(field: MetricField, points: &[(f64, &ConditionSummary)]) -> DoseResponse {
    let mut points: Vec<DosePoint> = points
        .iter()
        .map(|(exposure, summary)| DosePoint {
            condition: summary.condition.clone(),
            exposure: *exposure,
            mean: summary.mean(field),
        })
        .collect();
    points.sort_by(|a, b| {
        a.exposure
            .total_cmp(&b.exposure)
            .then_with(|| a.condition.cmp(&b.condition))
    });

    let x: Vec<f64> = points.iter().map(|p| p.exposure).collect();
    let y: Vec<f64> = points.iter().map(|p| p.mean).collect();
    let r = stats::pearson_r(&x, &y);

    let n = points.len();
    let p_value = r.filter(|_| n >= 3).map(|r| {
        let df = (n - 2) as f64;
        let denom = 1.0 - r * r;
        if denom <= 0.0 {
            0.0
        } else {
            stats::student_t_two_sided_p(r * (df / denom).sqrt(), df)
        }
    });

    DoseResponse {
        field,
        points,
        r,
        p_value,
    }
}
