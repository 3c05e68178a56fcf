// src/cli/mod.rs
//
// Command-line interface module

mod args;
mod output;

pub use args::{parse_exposure, parse_input, Args, Command, InputSpec, SettingsArgs, TestKind};
pub use output::{
    format_dose_response, format_failure, format_json, format_presets, format_recording,
    format_summary, format_verdict, AnalyzeReport, CompareReport,
};

use anyhow::{bail, Context, Result};
use indicatif::{ParallelProgressIterator, ProgressBar, ProgressStyle};
use log::warn;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::comparison::{
    aggregate_outcomes, dose_response, ConditionSummary, ExcludedRecording, HypothesisEvaluator,
};
use crate::config::AnalysisConfig;
use crate::core::analyzer::{RecordingAnalyzer, RecordingInput};
use crate::core::metrics::RecordingMetrics;
use crate::core::samples::ConditionLabel;
use crate::error;

/// Run the CLI
pub fn run(args: Args) -> Result<()> {
    match args.command {
        Command::Presets => {
            print!("{}", format_presets());
            Ok(())
        }
        Command::Analyze { inputs, settings } => {
            let config = settings.resolve().context("invalid analysis settings")?;
            run_analyze(&inputs, config, args.verbose, args.json)
        }
        Command::Compare {
            inputs,
            baseline,
            treatments,
            exposures,
            settings,
        } => {
            let config = settings.resolve().context("invalid analysis settings")?;
            let request = CompareRequest {
                baseline,
                treatments,
                exposures,
            };
            run_compare(&inputs, &request, config, args.json)
        }
    }
}

struct CompareRequest {
    baseline: ConditionLabel,
    treatments: Vec<ConditionLabel>,
    exposures: Vec<(ConditionLabel, f64)>,
}

fn run_analyze(inputs: &[InputSpec], config: AnalysisConfig, verbose: bool, json: bool) -> Result<()> {
    let recordings = expand_inputs(inputs)?;
    let analyzer = RecordingAnalyzer::new(config)?;
    let outcomes = analyze_with_progress(&analyzer, &recordings, json);

    let mut analyzed = Vec::new();
    let mut failures = Vec::new();
    for (input, outcome) in recordings.iter().zip(outcomes) {
        match outcome {
            Ok(metrics) => analyzed.push(metrics),
            Err(err) => failures.push(ExcludedRecording {
                source_id: input.source_id(),
                kind: err.kind().to_string(),
                reason: err.to_string(),
            }),
        }
    }

    if json {
        let report = AnalyzeReport {
            config: analyzer.config(),
            recordings: &analyzed,
            failures: &failures,
        };
        println!("{}", format_json(&report)?);
    } else {
        for metrics in &analyzed {
            println!("{}", format_recording(metrics, verbose));
        }
        for failure in &failures {
            println!("{}", format_failure(failure));
        }
    }

    if !failures.is_empty() {
        bail!("{} of {} recording(s) failed", failures.len(), recordings.len());
    }
    Ok(())
}

fn run_compare(
    inputs: &[InputSpec],
    request: &CompareRequest,
    config: AnalysisConfig,
    json: bool,
) -> Result<()> {
    if request.treatments.contains(&request.baseline) {
        bail!("treatment {} is the baseline condition", request.baseline);
    }

    let recordings = expand_inputs(inputs)?;
    let analyzer = RecordingAnalyzer::new(config)?;
    let outcomes = analyze_with_progress(&analyzer, &recordings, json);

    let mut groups: BTreeMap<ConditionLabel, Vec<(String, error::Result<RecordingMetrics>)>> =
        BTreeMap::new();
    for (input, outcome) in recordings.iter().zip(outcomes) {
        groups
            .entry(input.condition.clone())
            .or_default()
            .push((input.source_id(), outcome));
    }

    if !groups.contains_key(&request.baseline) {
        bail!("no input labelled with baseline condition {}", request.baseline);
    }
    let treatments: Vec<ConditionLabel> = if request.treatments.is_empty() {
        groups
            .keys()
            .filter(|label| **label != request.baseline)
            .cloned()
            .collect()
    } else {
        request.treatments.clone()
    };
    if treatments.is_empty() {
        bail!("nothing to compare: only condition {} was given", request.baseline);
    }
    for label in treatments.iter().chain(request.exposures.iter().map(|(l, _)| l)) {
        if !groups.contains_key(label) {
            bail!("no input labelled with condition {}", label);
        }
    }

    let mut summaries = BTreeMap::new();
    for (label, outcomes) in groups {
        let summary = aggregate_outcomes(&label, outcomes)
            .with_context(|| format!("cannot summarise condition {label}"))?;
        summaries.insert(label, summary);
    }

    let evaluator = HypothesisEvaluator::from_config(analyzer.config())?;
    let baseline = &summaries[&request.baseline];
    let treatment_summaries: Vec<ConditionSummary> = treatments
        .iter()
        .map(|label| summaries[label].clone())
        .collect();
    let verdicts = evaluator.evaluate_all(baseline, &treatment_summaries);

    let dose = if request.exposures.is_empty() {
        None
    } else {
        let points: Vec<(f64, &ConditionSummary)> = request
            .exposures
            .iter()
            .map(|(label, exposure)| (*exposure, &summaries[label]))
            .collect();
        Some(dose_response(evaluator.rule().field, &points))
    };

    let summaries: Vec<ConditionSummary> = summaries.into_values().collect();
    if json {
        let report = CompareReport {
            config: analyzer.config(),
            summaries: &summaries,
            verdicts: &verdicts,
            dose_response: dose.as_ref(),
        };
        println!("{}", format_json(&report)?);
    } else {
        for summary in &summaries {
            println!("{}", format_summary(summary, evaluator.rule().field));
        }
        for verdict in &verdicts {
            println!("{}", format_verdict(verdict));
        }
        if let Some(dose) = &dose {
            println!("{}", format_dose_response(dose));
        }
    }

    Ok(())
}

fn analyze_with_progress(
    analyzer: &RecordingAnalyzer,
    recordings: &[RecordingInput],
    quiet: bool,
) -> Vec<error::Result<RecordingMetrics>> {
    let progress = if quiet || recordings.len() < 2 {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(recordings.len() as u64)
    };
    if let Ok(style) = ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}") {
        progress.set_style(style);
    }
    progress.set_message("recordings");

    let outcomes = recordings
        .par_iter()
        .progress_with(progress.clone())
        .map(|input| analyzer.analyze(input))
        .collect();
    progress.finish_and_clear();
    outcomes
}

/// Turn `LABEL=PATH` specs into recordings, walking directories
fn expand_inputs(specs: &[InputSpec]) -> Result<Vec<RecordingInput>> {
    let mut recordings = Vec::new();

    for spec in specs {
        let files = collect_csv_files(&spec.path)?;
        if files.is_empty() {
            bail!("no .csv files found under {}", spec.path.display());
        }
        for file in files {
            if let Some(hint) = ConditionLabel::hint_from_file_name(&file) {
                if hint != spec.label {
                    warn!(
                        "{}: file name suggests condition {} but it was labelled {}",
                        file.display(),
                        hint,
                        spec.label
                    );
                }
            }
            recordings.push(RecordingInput::from_path(spec.label.clone(), file));
        }
    }

    Ok(recordings)
}

/// A file is taken as given; directories are walked for `*.csv`
pub fn collect_csv_files(path: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    if path.is_file() {
        files.push(path.to_path_buf());
    } else if path.is_dir() {
        for entry in WalkDir::new(path)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            let is_csv = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
            if is_csv && entry.file_type().is_file() {
                files.push(path.to_path_buf());
            }
        }
    } else {
        bail!("input not found: {}", path.display());
    }

    Ok(files)
}
