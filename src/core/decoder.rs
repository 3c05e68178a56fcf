// src/core/decoder.rs
//
// Recording ingestion: text decoding under an explicit encoding list, CSV
// parsing with column aliases, and timestamp normalization.
// Accepts both the standard `time,dB` layout and the headerless dBMeter
// phone-app export (`2025. 11. 15. 오전 3:02:46, 53.058983`).

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use encoding_rs::{Encoding, UTF_8};
use log::{debug, warn};
use std::path::Path;

use super::samples::{ConditionLabel, Sample, SampleStore};
use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, ColumnKind, Result};

const TIMESTAMP_ALIASES: &[&str] = &[
    "time", "timestamp", "datetime", "date", "elapsed", "seconds", "t", "시간",
];

const DECIBEL_ALIASES: &[&str] = &[
    "db", "decibel", "decibels", "level", "db(a)", "dba", "spl", "sound level", "소음",
];

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Rows parsed out of one table, before validation into a `SampleStore`
#[derive(Debug, Clone)]
pub struct ParsedTable {
    /// Samples with times in absolute seconds (not yet rebased)
    pub samples: Vec<Sample>,
    pub dropped_rows: usize,
    /// Wall-clock time of the earliest dated sample
    pub started_at: Option<NaiveDateTime>,
    pub headerless: bool,
}

/// Read a recording file into memory
pub fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|source| AnalysisError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Decode bytes with the first encoding in `encodings` that accepts them
/// without replacement characters.
pub fn decode_text(source_id: &str, bytes: &[u8], encodings: &[String]) -> Result<String> {
    let mut tried = Vec::with_capacity(encodings.len());

    for label in encodings {
        let encoding = Encoding::for_label(label.trim().as_bytes())
            .ok_or_else(|| AnalysisError::InvalidConfig(format!("unknown encoding {label:?}")))?;

        let body = if encoding == UTF_8 {
            bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes)
        } else {
            bytes
        };

        if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(body) {
            debug!("{}: decoded as {}", source_id, encoding.name());
            return Ok(text.into_owned());
        }

        debug!("{}: not valid {}", source_id, encoding.name());
        tried.push(encoding.name().to_string());
    }

    Err(AnalysisError::Encoding {
        source_id: source_id.to_string(),
        tried,
    })
}

/// Parse CSV text into samples
pub fn parse_table(source_id: &str, text: &str) -> Result<ParsedTable> {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty()).peekable();

    let Some(first) = lines.peek().copied() else {
        return Ok(ParsedTable {
            samples: Vec::new(),
            dropped_rows: 0,
            started_at: None,
            headerless: false,
        });
    };

    let first_fields = split_fields(first);
    let (ts_col, db_col, headerless) = resolve_columns(source_id, &first_fields)?;
    if !headerless {
        lines.next();
    }

    let mut timeline = Timeline::default();
    let mut samples = Vec::new();
    let mut dropped_rows = 0;

    for line in lines {
        let fields = split_fields(line);
        let decibel = fields.get(db_col).and_then(|f| parse_decibel(f));
        let stamp = fields.get(ts_col).and_then(|f| parse_stamp(f));

        match (stamp, decibel) {
            (Some(stamp), Some(decibel)) => {
                samples.push(Sample::new(timeline.seconds(stamp), decibel));
            }
            _ => dropped_rows += 1,
        }
    }

    if dropped_rows > 0 {
        warn!(
            "{}: dropped {} row(s) with a missing or unreadable time or level",
            source_id, dropped_rows
        );
    }

    Ok(ParsedTable {
        samples,
        dropped_rows,
        started_at: timeline.started_at,
        headerless,
    })
}

/// Decode, parse and validate one recording
pub fn load_store(
    source_id: &str,
    condition: ConditionLabel,
    bytes: &[u8],
    config: &AnalysisConfig,
) -> Result<SampleStore> {
    let text = decode_text(source_id, bytes, &config.encodings)?;
    let table = parse_table(source_id, &text)?;
    let store = SampleStore::new(
        source_id,
        condition,
        table.samples,
        table.dropped_rows,
        config.nominal_sample_interval_seconds,
    )?;

    debug!(
        "{}: {} samples, interval {:.2}s, {:.1} min recorded",
        source_id,
        store.len(),
        store.sample_interval_secs(),
        store.duration_secs() / 60.0
    );

    Ok(match table.started_at {
        Some(start) => store.with_start_time(start),
        None => store,
    })
}

/// Comma-separated fields; commas inside double quotes stay in their field
fn split_fields(line: &str) -> Vec<&str> {
    let mut fields = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    for (i, c) in line.char_indices() {
        match c {
            '"' => quoted = !quoted,
            ',' if !quoted => {
                fields.push(clean_field(&line[start..i]));
                start = i + 1;
            }
            _ => {}
        }
    }
    fields.push(clean_field(&line[start..]));
    fields
}

fn clean_field(field: &str) -> &str {
    field.trim().trim_matches('"').trim()
}

fn normalize_header(field: &str) -> String {
    field.trim_start_matches('\u{feff}').trim().to_lowercase()
}

fn matches_alias(header: &str, alias: &str) -> bool {
    let header = normalize_header(header);
    if header == alias {
        return true;
    }
    // "Level (dB)" / "Time (s)"
    match header.split_once('(') {
        Some((name, _)) => name.trim() == alias,
        None => false,
    }
}

/// Column of the earliest-listed alias present, so `time` wins over `date`
fn find_column(fields: &[&str], aliases: &[&str]) -> Option<usize> {
    aliases
        .iter()
        .find_map(|alias| fields.iter().position(|f| matches_alias(f, alias)))
}

fn resolve_columns(source_id: &str, fields: &[&str]) -> Result<(usize, usize, bool)> {
    let ts_col = find_column(fields, TIMESTAMP_ALIASES);
    let db_col = find_column(fields, DECIBEL_ALIASES);

    match (ts_col, db_col) {
        (Some(ts), Some(db)) => Ok((ts, db, false)),
        (None, None) if fields.len() >= 2 && parse_decibel(fields[1]).is_some() => {
            debug!("{}: no header row, reading columns as (time, level)", source_id);
            Ok((0, 1, true))
        }
        (ts, _) => Err(AnalysisError::Schema {
            source_id: source_id.to_string(),
            missing: if ts.is_none() {
                ColumnKind::Timestamp
            } else {
                ColumnKind::Decibel
            },
            headers: fields.iter().map(|f| normalize_header(f)).collect(),
        }),
    }
}

fn parse_decibel(field: &str) -> Option<f64> {
    field
        .parse::<f64>()
        .ok()
        .or_else(|| parse_decimal_comma(field))
        .filter(|v| v.is_finite())
}

/// "35,2" as written by spreadsheets in comma-decimal locales
fn parse_decimal_comma(field: &str) -> Option<f64> {
    if field.contains('.') || field.matches(',').count() != 1 {
        return None;
    }
    field.replacen(',', ".", 1).parse().ok()
}

/// A timestamp as written in the file
#[derive(Debug, Clone, Copy, PartialEq)]
enum Stamp {
    /// Seconds since some origin
    Elapsed(f64),
    /// Clock time without a date
    Clock(NaiveTime),
    DateTime(NaiveDateTime),
}

fn parse_stamp(field: &str) -> Option<Stamp> {
    if field.is_empty() {
        return None;
    }
    if let Ok(secs) = field.parse::<f64>() {
        return secs.is_finite().then_some(Stamp::Elapsed(secs));
    }
    if field.contains("오전") || field.contains("오후") {
        return parse_dbmeter(field).map(Stamp::DateTime);
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y/%m/%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(field, fmt) {
            return Some(Stamp::DateTime(dt));
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(field) {
        return Some(Stamp::DateTime(dt.naive_local()));
    }
    for fmt in ["%H:%M:%S%.f", "%H:%M"] {
        if let Ok(t) = NaiveTime::parse_from_str(field, fmt) {
            return Some(Stamp::Clock(t));
        }
    }
    None
}

/// Parse the Korean dBMeter format: `2025. 11. 15. 오전 3:02:46`
fn parse_dbmeter(field: &str) -> Option<NaiveDateTime> {
    let tokens: Vec<&str> = field.split_whitespace().collect();
    let [year, month, day, meridiem, clock] = tokens.as_slice() else {
        return None;
    };

    let year: i32 = year.trim_end_matches('.').parse().ok()?;
    let month: u32 = month.trim_end_matches('.').parse().ok()?;
    let day: u32 = day.trim_end_matches('.').parse().ok()?;

    let mut parts = clock.split(':');
    let hour: u32 = parts.next()?.parse().ok()?;
    let minute: u32 = parts.next()?.parse().ok()?;
    let second: u32 = parts.next().unwrap_or("0").parse().ok()?;
    if hour == 0 || hour > 12 {
        return None;
    }

    let hour = match *meridiem {
        "오전" => hour % 12,
        "오후" => hour % 12 + 12,
        _ => return None,
    };

    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let time = NaiveTime::from_hms_opt(hour, minute, second)?;
    Some(NaiveDateTime::new(date, time))
}

/// Converts stamps to seconds, advancing a day when a clock time wraps
/// past midnight.
#[derive(Debug, Default)]
struct Timeline {
    last_clock: Option<NaiveTime>,
    day_offset: u32,
    started_at: Option<NaiveDateTime>,
}

impl Timeline {
    fn seconds(&mut self, stamp: Stamp) -> f64 {
        match stamp {
            Stamp::Elapsed(secs) => secs,
            Stamp::Clock(t) => {
                if let Some(last) = self.last_clock {
                    // Backward jump of more than half a day is a midnight wrap, not jitter
                    let back = (last - t).num_seconds();
                    if back > 12 * 3600 {
                        self.day_offset += 1;
                    }
                }
                self.last_clock = Some(t);
                self.day_offset as f64 * SECONDS_PER_DAY
                    + t.num_seconds_from_midnight() as f64
                    + t.nanosecond() as f64 / 1e9
            }
            Stamp::DateTime(dt) => {
                if self.started_at.map_or(true, |s| dt < s) {
                    self.started_at = Some(dt);
                }
                let utc = dt.and_utc();
                utc.timestamp() as f64 + utc.timestamp_subsec_nanos() as f64 / 1e9
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encodings() -> Vec<String> {
        vec!["utf-8".to_string(), "euc-kr".to_string()]
    }

    #[test]
    fn test_standard_header_and_aliases() {
        let text = "Time,Decibel\n23:30:00,35.2\n23:30:05,36.0\n";
        let table = parse_table("a.csv", text).unwrap();
        assert!(!table.headerless);
        assert_eq!(table.samples.len(), 2);
        assert_eq!(table.samples[1].elapsed_secs - table.samples[0].elapsed_secs, 5.0);

        let text = " LEVEL (dB) ,note, Seconds\n40.0,x,0\n41.0,y,5\n";
        let table = parse_table("b.csv", text).unwrap();
        assert_eq!(table.samples[1], Sample::new(5.0, 41.0));
    }

    #[test]
    fn test_quoted_fields_keep_their_commas() {
        let text = "\"time\",\"note\",\"dB\"\n0,\"quiet, mostly\",30\n5,\"snoring\",\"35,2\"\n\"10\",x,\"36.5\"\n";
        let table = parse_table("q.csv", text).unwrap();
        assert_eq!(table.dropped_rows, 0);
        let levels: Vec<f64> = table.samples.iter().map(|s| s.decibel).collect();
        assert_eq!(levels, vec![30.0, 35.2, 36.5]);
        assert_eq!(table.samples[2].elapsed_secs - table.samples[0].elapsed_secs, 10.0);

        assert_eq!(split_fields("a,\"b,c\", d"), vec!["a", "b,c", "d"]);
        assert_eq!(parse_decibel("1,234.5"), None);
    }

    #[test]
    fn test_time_column_preferred_over_date() {
        let text = "Date,Time,dB\n2025-11-15,23:30:00,35.2\n2025-11-15,23:30:05,36.0\n";
        let table = parse_table("dt.csv", text).unwrap();
        assert_eq!(table.samples.len(), 2);
        assert_eq!(table.dropped_rows, 0);
    }

    #[test]
    fn test_korean_header() {
        let text = "시간,dB\n23:30:00,35.2\n";
        let table = parse_table("k.csv", text).unwrap();
        assert_eq!(table.samples.len(), 1);
        assert_eq!(table.samples[0].decibel, 35.2);
    }

    #[test]
    fn test_midnight_rollover() {
        let text = "time,db\n23:59:55,30\n00:00:00,31\n00:00:05,32\n";
        let table = parse_table("m.csv", text).unwrap();
        let t: Vec<f64> = table.samples.iter().map(|s| s.elapsed_secs).collect();
        assert_eq!(t[1] - t[0], 5.0);
        assert_eq!(t[2] - t[1], 5.0);
    }

    #[test]
    fn test_small_backward_jitter_is_not_a_day() {
        let text = "time,db\n01:00:05,30\n01:00:04,31\n";
        let table = parse_table("j.csv", text).unwrap();
        assert_eq!(table.samples[1].elapsed_secs - table.samples[0].elapsed_secs, -1.0);
    }

    #[test]
    fn test_dbmeter_headerless_export() {
        let text = "2025. 11. 15. 오전 3:02:46, 53.058983\n\
                    2025. 11. 15. 오전 3:02:51, 41.5\n\
                    2025. 11. 15. 오후 12:00:00, 40.0\n";
        let table = parse_table("dbmeter.csv", text).unwrap();
        assert!(table.headerless);
        assert_eq!(table.samples.len(), 3);
        assert_eq!(table.samples[1].elapsed_secs - table.samples[0].elapsed_secs, 5.0);
        let start = table.started_at.unwrap();
        assert_eq!(start.to_string(), "2025-11-15 03:02:46");
        // 오후 12시 is noon
        let noon = table.samples[2].elapsed_secs - table.samples[0].elapsed_secs;
        assert_eq!(noon, (12 * 3600 - (3 * 3600 + 2 * 60 + 46)) as f64);
    }

    #[test]
    fn test_dbmeter_midnight_hour() {
        let dt = parse_dbmeter("2025. 11. 15. 오전 12:10:00").unwrap();
        assert_eq!(dt.time(), NaiveTime::from_hms_opt(0, 10, 0).unwrap());
        assert!(parse_dbmeter("2025. 11. 15. 오전 13:10:00").is_none());
    }

    #[test]
    fn test_iso_datetimes() {
        let text = "timestamp,dB\n2025-11-15 23:59:58,30\n2025-11-16T00:00:03,31\n";
        let table = parse_table("iso.csv", text).unwrap();
        assert_eq!(table.samples[1].elapsed_secs - table.samples[0].elapsed_secs, 5.0);
    }

    #[test]
    fn test_bad_rows_are_counted() {
        let text = "time,dB\n0,30\n5,\n10,abc\n,40\n15,NaN\n20,31\n";
        let table = parse_table("d.csv", text).unwrap();
        assert_eq!(table.samples.len(), 2);
        assert_eq!(table.dropped_rows, 4);
    }

    #[test]
    fn test_missing_decibel_column() {
        let err = parse_table("s.csv", "time,note\n0,quiet\n").unwrap_err();
        match err {
            AnalysisError::Schema { missing, headers, .. } => {
                assert_eq!(missing, ColumnKind::Decibel);
                assert_eq!(headers, vec!["time", "note"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_timestamp_column() {
        let err = parse_table("s.csv", "db,note\n30,quiet\n").unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::Schema { missing: ColumnKind::Timestamp, .. }
        ));
    }

    #[test]
    fn test_euc_kr_fallback() {
        let (bytes, _, _) = encoding_rs::EUC_KR.encode("시간,dB\n23:30:00,35.2\n");
        assert!(std::str::from_utf8(&bytes).is_err());

        let text = decode_text("e.csv", &bytes, &encodings()).unwrap();
        assert!(text.starts_with("시간"));

        let err = decode_text("e.csv", &bytes, &["utf-8".to_string()]).unwrap_err();
        match err {
            AnalysisError::Encoding { tried, .. } => assert_eq!(tried, vec!["UTF-8"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_utf8_bom_is_stripped() {
        let bytes = b"\xEF\xBB\xBFtime,dB\n0,30\n";
        let text = decode_text("bom.csv", bytes, &encodings()).unwrap();
        assert!(text.starts_with("time"));
    }

    #[test]
    fn test_header_only_file_is_empty_data() {
        let config = AnalysisConfig::default();
        let label = ConditionLabel::new("A").unwrap();
        let err = load_store("h.csv", label, b"time,dB\n", &config).unwrap_err();
        assert!(matches!(err, AnalysisError::EmptyData { dropped_rows: 0, .. }));
    }
}
