//! CLI argument parsing with preset support

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::{AnalysisConfig, ConfigBuilder, SignificanceMethod, ThresholdPreset};
use crate::core::metrics::MetricField;
use crate::core::samples::ConditionLabel;
use crate::error::{AnalysisError, Result};

#[derive(Parser, Debug)]
#[command(name = "sleepcheckr", version)]
#[command(about = "Sleep-noise analysis and condition comparison for overnight decibel recordings")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Verbose output (debug logging, per-hour details)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Analyze recordings and print per-recording metrics
    Analyze {
        /// Labelled input: LABEL=PATH (file or directory of .csv files)
        #[arg(short, long = "input", value_name = "LABEL=PATH", value_parser = parse_input, required = true)]
        inputs: Vec<InputSpec>,

        #[command(flatten)]
        settings: SettingsArgs,
    },

    /// Aggregate conditions and test the treatment hypothesis
    Compare {
        /// Labelled input: LABEL=PATH (file or directory of .csv files)
        #[arg(short, long = "input", value_name = "LABEL=PATH", value_parser = parse_input, required = true)]
        inputs: Vec<InputSpec>,

        /// Baseline condition
        #[arg(short, long, value_parser = parse_label)]
        baseline: ConditionLabel,

        /// Treatment condition (repeatable; default: every other condition)
        #[arg(short, long = "treatment", value_parser = parse_label)]
        treatments: Vec<ConditionLabel>,

        /// Exposure level for dose-response: LABEL=VALUE
        #[arg(long = "exposure", value_name = "LABEL=VALUE", value_parser = parse_exposure)]
        exposures: Vec<(ConditionLabel, f64)>,

        #[command(flatten)]
        settings: SettingsArgs,
    },

    /// List threshold presets
    Presets,
}

/// Significance test selectable on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TestKind {
    DeltaHeuristic,
    WelchT,
}

/// Analysis settings shared by every subcommand
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct SettingsArgs {
    /// JSON config file; flags below override it
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Threshold preset (quiet, standard, urban)
    #[arg(long, value_parser = parse_preset)]
    pub preset: Option<ThresholdPreset>,

    /// Noise threshold in dB
    #[arg(long, env = "SLEEPCHECKR_THRESHOLD_DB")]
    pub threshold_db: Option<f64>,

    /// Sleep-onset window in minutes
    #[arg(long)]
    pub onset_window_minutes: Option<f64>,

    /// Minimum treatment effect (percentage points for ratio metrics)
    #[arg(long)]
    pub min_delta_pp: Option<f64>,

    /// Fixed sample interval in seconds instead of inferring it
    #[arg(long, value_name = "SECONDS")]
    pub sample_interval: Option<f64>,

    /// Quiet samples bridged inside a noise segment
    #[arg(long)]
    pub max_gap_samples: Option<usize>,

    /// Text encoding to try (repeatable, in order)
    #[arg(long = "encoding", value_name = "LABEL")]
    pub encodings: Vec<String>,

    /// Metric the hypothesis is judged on
    #[arg(long)]
    pub metric: Option<MetricField>,

    /// Significance test
    #[arg(long = "test", value_enum)]
    pub test: Option<TestKind>,

    /// Significance level for the Welch t-test
    #[arg(long)]
    pub alpha: Option<f64>,
}

impl SettingsArgs {
    /// Merge config file, preset and flag overrides into a validated config
    pub fn resolve(&self) -> Result<AnalysisConfig> {
        let mut builder = match &self.config {
            Some(path) => ConfigBuilder::from_config(AnalysisConfig::load(path)?),
            None => ConfigBuilder::from_preset(self.preset.unwrap_or(ThresholdPreset::Standard)),
        };

        if let (Some(_), Some(preset)) = (&self.config, self.preset) {
            builder = builder.threshold_db(preset.threshold_db());
        }
        if let Some(db) = self.threshold_db {
            builder = builder.threshold_db(db);
        }
        if let Some(minutes) = self.onset_window_minutes {
            builder = builder.onset_window_minutes(minutes);
        }
        if let Some(pp) = self.min_delta_pp {
            builder = builder.min_delta_pp(pp);
        }
        if let Some(secs) = self.sample_interval {
            builder = builder.sample_interval_secs(secs);
        }
        if let Some(gap) = self.max_gap_samples {
            builder = builder.max_gap_samples(gap);
        }
        if !self.encodings.is_empty() {
            builder = builder.encodings(self.encodings.iter().cloned());
        }
        if let Some(metric) = self.metric {
            builder = builder.metric(metric);
        }

        let current = builder.config().significance;
        let significance = match (self.test, self.alpha) {
            (Some(TestKind::DeltaHeuristic), _) => SignificanceMethod::DeltaHeuristic,
            (Some(TestKind::WelchT), alpha) => SignificanceMethod::WelchT {
                alpha: alpha.unwrap_or(0.05),
            },
            (None, Some(alpha)) => match current {
                SignificanceMethod::WelchT { .. } => SignificanceMethod::WelchT { alpha },
                SignificanceMethod::DeltaHeuristic => {
                    return Err(AnalysisError::InvalidConfig(
                        "--alpha only applies to the welch-t test".to_string(),
                    ))
                }
            },
            (None, None) => current,
        };

        builder.significance(significance).build()
    }
}

/// A condition label paired with a file or directory
#[derive(Debug, Clone, PartialEq)]
pub struct InputSpec {
    pub label: ConditionLabel,
    pub path: PathBuf,
}

fn split_pair(s: &str) -> std::result::Result<(&str, &str), String> {
    s.split_once('=')
        .filter(|(label, value)| !label.trim().is_empty() && !value.trim().is_empty())
        .ok_or_else(|| format!("expected LABEL=VALUE, got {s:?}"))
}

pub fn parse_input(s: &str) -> std::result::Result<InputSpec, String> {
    let (label, path) = split_pair(s)?;
    Ok(InputSpec {
        label: parse_label(label)?,
        path: PathBuf::from(path.trim()),
    })
}

pub fn parse_exposure(s: &str) -> std::result::Result<(ConditionLabel, f64), String> {
    let (label, value) = split_pair(s)?;
    let exposure: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid exposure value: {value}"))?;
    if !exposure.is_finite() {
        return Err(format!("invalid exposure value: {value}"));
    }
    Ok((parse_label(label)?, exposure))
}

pub fn parse_label(s: &str) -> std::result::Result<ConditionLabel, String> {
    ConditionLabel::new(s).map_err(|e| e.to_string())
}

fn parse_preset(s: &str) -> std::result::Result<ThresholdPreset, String> {
    ThresholdPreset::from_name(s).ok_or_else(|| format!("unknown preset: {s}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_input() {
        let spec = parse_input("b=nights/b").unwrap();
        assert_eq!(spec.label.as_str(), "B");
        assert_eq!(spec.path, PathBuf::from("nights/b"));

        assert!(parse_input("nights/b").is_err());
        assert!(parse_input("=x.csv").is_err());
        assert!(parse_input("A B=x.csv").is_err());
    }

    #[test]
    fn test_parse_exposure() {
        assert_eq!(parse_exposure("B=2.5").unwrap().1, 2.5);
        assert!(parse_exposure("B=lots").is_err());
    }

    #[test]
    fn test_compare_command() {
        let args = Args::try_parse_from([
            "sleepcheckr",
            "compare",
            "-i",
            "A=a.csv",
            "-i",
            "B=b.csv",
            "--baseline",
            "A",
            "--treatment",
            "B",
            "--preset",
            "quiet",
            "--min-delta-pp",
            "3",
            "--json",
        ])
        .unwrap();

        assert!(args.json);
        match args.command {
            Command::Compare {
                inputs,
                baseline,
                treatments,
                settings,
                ..
            } => {
                assert_eq!(inputs.len(), 2);
                assert_eq!(baseline.as_str(), "A");
                assert_eq!(treatments.len(), 1);
                let config = settings.resolve().unwrap();
                assert_eq!(config.threshold_db, 35.0);
                assert_eq!(config.hypothesis_min_delta_pp, 3.0);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_settings_overrides() {
        let settings = SettingsArgs {
            preset: Some(ThresholdPreset::Urban),
            threshold_db: Some(42.0),
            max_gap_samples: Some(2),
            metric: Some(MetricField::OnsetNoiseRatio),
            test: Some(TestKind::WelchT),
            ..Default::default()
        };
        let config = settings.resolve().unwrap();
        assert_eq!(config.threshold_db, 42.0);
        assert_eq!(config.max_gap_samples, 2);
        assert_eq!(config.metric, MetricField::OnsetNoiseRatio);
        assert_eq!(config.significance, SignificanceMethod::WelchT { alpha: 0.05 });
    }

    #[test]
    fn test_alpha_requires_welch() {
        let settings = SettingsArgs {
            alpha: Some(0.01),
            ..Default::default()
        };
        assert!(settings.resolve().is_err());
    }
}
