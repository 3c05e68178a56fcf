//! Configuration module for SleepCheckr

mod profiles;

pub use profiles::{
    AnalysisConfig, ConfigBuilder, SignificanceMethod, ThresholdPreset, DEFAULT_ENCODINGS,
};
