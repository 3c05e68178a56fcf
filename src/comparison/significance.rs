// src/comparison/significance.rs
//
// Swappable strategies deciding whether two conditions can be told apart.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use super::aggregate::ConditionSummary;
use crate::config::SignificanceMethod;
use crate::core::metrics::MetricField;
use crate::core::stats;

/// Outcome of a significance check
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    /// The delta can be distinguished from noise
    pub distinguishable: bool,
    /// Two-sided p-value, for methods that produce one
    pub p_value: Option<f64>,
}

/// A named test over two condition summaries
pub trait SignificanceTest: Debug + Send + Sync {
    fn name(&self) -> &'static str;

    fn assess(
        &self,
        field: MetricField,
        baseline: &ConditionSummary,
        treatment: &ConditionSummary,
    ) -> Assessment;
}

/// Build the test selected by `method`
pub fn significance_test(method: SignificanceMethod) -> Box<dyn SignificanceTest> {
    match method {
        SignificanceMethod::DeltaHeuristic => Box::new(DeltaHeuristic),
        SignificanceMethod::WelchT { alpha } => Box::new(WelchTTest { alpha }),
    }
}

/// Treats a delta as noise when one side has a single recording and the
/// delta lies within one combined standard deviation of zero.
///
/// An ad-hoc guard, not a formal test.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeltaHeuristic;

impl SignificanceTest for DeltaHeuristic {
    fn name(&self) -> &'static str {
        "delta-heuristic"
    }

    fn assess(
        &self,
        field: MetricField,
        baseline: &ConditionSummary,
        treatment: &ConditionSummary,
    ) -> Assessment {
        let b = baseline.field(field);
        let t = treatment.field(field);
        let delta = t.mean - b.mean;
        let combined = (b.std_dev.powi(2) + t.std_dev.powi(2)).sqrt();
        let slack = stats::rounding_slack(b.mean.abs().max(t.mean.abs()).max(combined));

        let underpowered = baseline.sample_size == 1 || treatment.sample_size == 1;
        Assessment {
            distinguishable: !(underpowered && delta.abs() <= combined + slack),
            p_value: None,
        }
    }
}

/// Welch's unequal-variance two-sample t-test
#[derive(Debug, Clone, Copy)]
pub struct WelchTTest {
    pub alpha: f64,
}

impl Default for WelchTTest {
    fn default() -> Self {
        Self { alpha: 0.05 }
    }
}

impl WelchTTest {
    /// Two-sided p-value, or `None` when either side has fewer than two
    /// recordings.
    pub fn p_value(
        &self,
        field: MetricField,
        baseline: &ConditionSummary,
        treatment: &ConditionSummary,
    ) -> Option<f64> {
        let (nb, nt) = (baseline.sample_size, treatment.sample_size);
        if nb < 2 || nt < 2 {
            return None;
        }

        let b = baseline.field(field);
        let t = treatment.field(field);
        let delta = t.mean - b.mean;

        // Summaries carry population spread; convert to sample variance
        let se_b = sample_variance(b.std_dev, nb) / nb as f64;
        let se_t = sample_variance(t.std_dev, nt) / nt as f64;
        let se2 = se_b + se_t;

        if se2 == 0.0 {
            return Some(if delta == 0.0 { 1.0 } else { 0.0 });
        }

        let df = se2.powi(2)
            / (se_b.powi(2) / (nb - 1) as f64 + se_t.powi(2) / (nt - 1) as f64);
        let t_stat = delta / se2.sqrt();
        Some(stats::student_t_two_sided_p(t_stat, df))
    }
}

fn sample_variance(population_std: f64, n: usize) -> f64 {
    population_std.powi(2) * n as f64 / (n - 1) as f64
}

impl SignificanceTest for WelchTTest {
    fn name(&self) -> &'static str {
        "welch-t"
    }

    fn assess(
        &self,
        field: MetricField,
        baseline: &ConditionSummary,
        treatment: &ConditionSummary,
    ) -> Assessment {
        let p_value = self.p_value(field, baseline, treatment);
        Assessment {
            distinguishable: p_value.is_some_and(|p| p < self.alpha),
            p_value,
        }
    }
}
