// Shared fixtures for the integration tests
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

pub fn get_binary_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_sleepcheckr"))
}

pub fn run_sleepcheckr<I, S>(args: I) -> Output
where
    I: IntoIterator<Item = S>,
    S: AsRef<std::ffi::OsStr>,
{
    Command::new(get_binary_path())
        .args(args)
        .env_remove("SLEEPCHECKR_THRESHOLD_DB")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute sleepcheckr")
}

/// `time,db` CSV body with one row per level, `interval` seconds apart
pub fn csv_body(levels: &[f64], interval: f64) -> String {
    let mut out = String::from("time,db\n");
    for (i, db) in levels.iter().enumerate() {
        out.push_str(&format!("{},{}\n", i as f64 * interval, db));
    }
    out
}

/// `len` samples at `quiet` dB with `noisy` indices raised to `loud` dB
pub fn levels_with_burst(len: usize, noisy: std::ops::Range<usize>, quiet: f64, loud: f64) -> Vec<f64> {
    (0..len)
        .map(|i| if noisy.contains(&i) { loud } else { quiet })
        .collect()
}

pub fn write_file(dir: &Path, name: &str, contents: impl AsRef<[u8]>) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create fixture directory");
    }
    fs::write(&path, contents).expect("Failed to write fixture");
    path
}

pub fn write_recording(dir: &Path, name: &str, levels: &[f64]) -> PathBuf {
    write_file(dir, name, csv_body(levels, 5.0))
}

/// 100 samples at 5 s, quiet except for `noisy_samples` loud readings at the start
pub fn write_night(dir: &Path, name: &str, noisy_samples: usize) -> PathBuf {
    write_recording(dir, name, &levels_with_burst(100, 0..noisy_samples, 20.0, 50.0))
}
