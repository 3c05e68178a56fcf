//! Output formatting for CLI results

use colorful::Colorful;
use serde::Serialize;

use crate::comparison::{ConditionSummary, DoseResponse, ExcludedRecording, HypothesisVerdict, Verdict};
use crate::config::{AnalysisConfig, ThresholdPreset};
use crate::core::metrics::{MetricField, RecordingMetrics};

/// JSON document printed by `analyze --json`
#[derive(Debug, Serialize)]
pub struct AnalyzeReport<'a> {
    pub config: &'a AnalysisConfig,
    pub recordings: &'a [RecordingMetrics],
    pub failures: &'a [ExcludedRecording],
}

/// JSON document printed by `compare --json`
#[derive(Debug, Serialize)]
pub struct CompareReport<'a> {
    pub config: &'a AnalysisConfig,
    pub summaries: &'a [ConditionSummary],
    pub verdicts: &'a [HypothesisVerdict],
    pub dose_response: Option<&'a DoseResponse>,
}

pub fn format_json<T: Serialize>(report: &T) -> serde_json::Result<String> {
    serde_json::to_string_pretty(report)
}

/// Ratio fields as percentages, everything else in its own unit
pub fn format_value(field: MetricField, value: f64) -> String {
    if field.is_ratio() {
        format!("{:.1}%", value * 100.0)
    } else if field == MetricField::SegmentCount {
        format!("{:.1}", value)
    } else {
        format!("{:.1} {}", value, field.unit())
    }
}

fn format_delta(field: MetricField, delta: f64) -> String {
    if field.is_ratio() {
        format!("{:+.1} pp", delta * 100.0)
    } else {
        format!("{:+.2} {}", delta, field.unit()).trim_end().to_string()
    }
}

/// Format one recording for terminal output
pub fn format_recording(metrics: &RecordingMetrics, verbose: bool) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "{} {}\n",
        format!("[{}]", metrics.condition()).cyan(),
        metrics.source_id().to_string().bold()
    ));
    output.push_str(&format!(
        "  {} samples every {:.1}s, {:.1} h recorded",
        metrics.sample_count,
        metrics.sample_interval_secs,
        metrics.duration_secs / 3600.0
    ));
    if metrics.dropped_rows > 0 {
        output.push_str(&format!(" ({} rows dropped)", metrics.dropped_rows));
    }
    output.push('\n');

    output.push_str(&format!(
        "  Noise ratio: {:.1}% at ≥ {:.1} dB\n",
        metrics.noise_ratio * 100.0,
        metrics.provenance.threshold_db
    ));
    output.push_str(&format!(
        "  Level: mean {:.1} dB, σ {:.1} dB, range {:.1}–{:.1} dB\n",
        metrics.mean_db, metrics.std_db, metrics.min_db, metrics.max_db
    ));
    output.push_str(&format!(
        "  Segments: {} (mean {:.0}s, longest {:.0}s)\n",
        metrics.segment_count, metrics.mean_segment_secs, metrics.max_segment_secs
    ));

    let onset = format!(
        "  Onset ({:.0} min): {:.1}% noisy",
        metrics.provenance.onset_window_minutes,
        metrics.onset_noise_ratio * 100.0
    );
    output.push_str(&onset);
    if metrics.onset_partial {
        output.push_str(&format!(" {}", "(recording shorter than window)".yellow()));
    }
    output.push('\n');

    let bands = &metrics.bands;
    output.push_str(&format!(
        "  Sleep bands: deep {:.0}% | light {:.0}% | restless {:.0}% | disturbed {:.0}%\n",
        bands.deep * 100.0,
        bands.light * 100.0,
        bands.restless * 100.0,
        bands.disturbed * 100.0
    ));

    if verbose {
        output.push_str("  Hourly:\n");
        for hour in &metrics.hourly {
            output.push_str(&format!(
                "    h{:<2} {:>5.1} dB  deep {:>3.0}%  restless {:>3.0}%  ({} samples)\n",
                hour.hour,
                hour.mean_db,
                hour.deep_ratio * 100.0,
                hour.restless_ratio * 100.0,
                hour.sample_count
            ));
        }
    }

    output
}

pub fn format_failure(failure: &ExcludedRecording) -> String {
    format!(
        "{} {}\n  {} {}\n",
        "✗".red(),
        failure.source_id.clone().bold(),
        format!("[{}]", failure.kind).red(),
        failure.reason
    )
}

/// Format a condition summary
pub fn format_summary(summary: &ConditionSummary, highlight: MetricField) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "{} n = {}\n",
        format!("Condition {}", summary.condition).bold(),
        summary.sample_size
    ));
    if summary.degenerate {
        output.push_str(&format!(
            "  {}\n",
            "single recording: spread is zero".yellow()
        ));
    }

    for field in MetricField::all() {
        let f = summary.field(field);
        let line = format!(
            "  {:<18} {:>10} ± {}",
            field.name(),
            format_value(field, f.mean),
            format_value(field, f.std_dev)
        );
        if field == highlight {
            output.push_str(&format!("{}\n", line.cyan()));
        } else {
            output.push_str(&line);
            output.push('\n');
        }
    }

    for excluded in &summary.excluded {
        output.push_str(&format!(
            "  {} {} ({})\n",
            "excluded".yellow(),
            excluded.source_id,
            excluded.reason
        ));
    }

    output
}

/// Format a hypothesis verdict
pub fn format_verdict(verdict: &HypothesisVerdict) -> String {
    let header = format!(
        "{} {}",
        verdict.verdict.symbol(),
        verdict.verdict.description()
    );
    let header = match verdict.verdict {
        Verdict::Supported => header.green(),
        Verdict::Rejected => header.red(),
        Verdict::Inconclusive => header.yellow(),
    };

    let mut output = format!(
        "{}: {} vs {} on {}\n",
        header, verdict.treatment, verdict.baseline, verdict.field
    );
    output.push_str(&format!(
        "  {} → {} (Δ {}, need {}; n = {} vs {})\n",
        format_value(verdict.field, verdict.baseline_mean),
        format_value(verdict.field, verdict.treatment_mean),
        format_delta(verdict.field, verdict.delta),
        format_delta(verdict.field, verdict.threshold),
        verdict.baseline_n,
        verdict.treatment_n
    ));

    let mut method = format!("  test: {}", verdict.method);
    if let Some(p) = verdict.p_value {
        method.push_str(&format!(", p = {:.4}", p));
    }
    output.push_str(&method);
    output.push('\n');

    output
}

pub fn format_dose_response(response: &DoseResponse) -> String {
    let mut output = format!("{} ({})\n", "Dose-response".bold(), response.field);

    for point in &response.points {
        output.push_str(&format!(
            "  {:<8} exposure {:>8.2}  {}\n",
            point.condition.as_str(),
            point.exposure,
            format_value(response.field, point.mean)
        ));
    }

    match response.r {
        Some(r) => {
            output.push_str(&format!("  Pearson r = {:.3}", r));
            if let Some(p) = response.p_value {
                output.push_str(&format!(", p = {:.4}", p));
            }
            output.push('\n');
        }
        None => output.push_str("  correlation undefined (need two distinct points)\n"),
    }

    output
}

pub fn format_presets() -> String {
    let mut output = String::from("Threshold presets:\n");
    for preset in ThresholdPreset::all() {
        output.push_str(&format!(
            "  {:<10} {:>4.0} dB  {}\n",
            preset.name(),
            preset.threshold_db(),
            preset.description()
        ));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparison::{aggregate, HypothesisEvaluator};
    use crate::core::analyzer::{analyze, RecordingInput};
    use crate::core::samples::ConditionLabel;

    fn metrics(label: &str, source: &str, noisy: usize) -> RecordingMetrics {
        let mut csv = String::from("time,db\n");
        for i in 0..20 {
            let db = if i < noisy { 50.0 } else { 20.0 };
            csv.push_str(&format!("{},{}\n", i * 5, db));
        }
        let input = RecordingInput::from_bytes(ConditionLabel::new(label).unwrap(), source, csv);
        analyze(&input, &AnalysisConfig::default()).unwrap()
    }

    #[test]
    fn test_format_recording() {
        let m = metrics("A", "night1.csv", 2);
        let output = format_recording(&m, true);
        assert!(output.contains("night1.csv"));
        assert!(output.contains("Noise ratio: 10.0%"));
        assert!(output.contains("Hourly"));
        assert!(output.contains("recording shorter than window"));
    }

    #[test]
    fn test_format_verdict() {
        let a = ConditionLabel::new("A").unwrap();
        let b = ConditionLabel::new("B").unwrap();
        let base = aggregate(&a, &[metrics("A", "a1", 0), metrics("A", "a2", 1)]).unwrap();
        let treat = aggregate(&b, &[metrics("B", "b1", 4), metrics("B", "b2", 5)]).unwrap();

        let verdict = HypothesisEvaluator::default().evaluate(&base, &treat);
        let output = format_verdict(&verdict);
        assert!(output.contains("Hypothesis supported"));
        assert!(output.contains("+20.0 pp"));
        assert!(output.contains("delta-heuristic"));
    }

    #[test]
    fn test_json_report() {
        let m = metrics("A", "night1.csv", 2);
        let config = AnalysisConfig::default();
        let report = AnalyzeReport {
            config: &config,
            recordings: std::slice::from_ref(&m),
            failures: &[],
        };
        let json = format_json(&report).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["recordings"][0]["provenance"]["condition"], "A");
        assert_eq!(value["recordings"][0]["noise_ratio"], 0.1);
        assert_eq!(value["config"]["metric"], "noise_ratio");
    }

    #[test]
    fn test_format_presets() {
        let output = format_presets();
        assert!(output.contains("quiet"));
        assert!(output.contains("urban"));
    }
}
