//! Cross-recording comparison: condition summaries and hypothesis verdicts

pub mod aggregate;
pub mod hypothesis;
pub mod significance;

pub use aggregate::{aggregate, aggregate_outcomes, ConditionSummary, ExcludedRecording, FieldSummary};
pub use hypothesis::{
    dose_response, DecisionRule, DosePoint, DoseResponse, HypothesisEvaluator, HypothesisVerdict,
    Verdict,
};
pub use significance::{significance_test, Assessment, DeltaHeuristic, SignificanceTest, WelchTTest};
