//! Append-only trial logs: one comma-separated stream per protocol run.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use booth_core::{SessionSummary, TrialRecord};
use parking_lot::Mutex;

pub trait TrialLog {
    /// Opens `stream`, writing `header` only if the stream is new.
    fn create_stream(&mut self, stream: &str, header: &[&str]) -> io::Result<()>;
    /// Appends one row; the row is durable when this returns.
    fn append_row(&mut self, stream: &str, fields: &[String]) -> io::Result<()>;
}

/// Seconds with millisecond resolution.
pub fn seconds(d: Duration) -> String {
    format!("{:.3}", d.as_secs_f64())
}

fn optional_seconds(d: Option<Duration>) -> String {
    d.map(seconds).unwrap_or_else(|| "NA".into())
}

pub const INTRODUCTION_HEADER: &[&str] = &["Number_of_trials", "Time.from_start"];
pub const SHAPING_HEADER: &[&str] = &["Trial_number", "Time_s"];
pub const TWO_PECKS_HEADER: &[&str] = &["Trial_number", "Time_first_s", "Time_second_s"];
pub const TIMED_HEADER: &[&str] = &["Trial_number", "Time_first_s", "Time_second_s", "Reward"];
pub const CLASSICAL_HEADER: &[&str] = &["Trial_number", "Trial_type", "Time_from_start", "Stimulus"];

/// Column layout of scored trial rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowFormat {
    GoNoGo,
    Scene,
}

impl RowFormat {
    pub fn header(&self) -> &'static [&'static str] {
        match self {
            RowFormat::GoNoGo => &[
                "Trial_number",
                "Trial_type",
                "Response_time_s",
                "Hit",
                "Miss",
                "Reject",
                "False_alarm",
                "Time_from_start",
                "Stimulus",
            ],
            RowFormat::Scene => &[
                "Trial_number",
                "Trial_type",
                "Sound_file",
                "Trial SNR/dB",
                "Response_time_s",
                "Hit",
                "Miss",
                "Reject",
                "False_alarm",
                "Time_from_start",
            ],
        }
    }

    pub fn fields(&self, record: &TrialRecord) -> Vec<String> {
        let flags = record.outcome.flags().map(|f| f.to_string());
        let mut row = vec![
            record.index.to_string(),
            record.category.label().to_string(),
        ];
        match self {
            RowFormat::GoNoGo => {
                row.push(optional_seconds(record.latency));
                row.extend(flags);
                row.push(seconds(record.elapsed));
                row.push(record.stimulus.clone());
            }
            RowFormat::Scene => {
                row.push(record.stimulus.clone());
                row.push(record.snr_db.map_or_else(|| "NA".into(), |snr| snr.to_string()));
                row.push(optional_seconds(record.latency));
                row.extend(flags);
                row.push(seconds(record.elapsed));
            }
        }
        row
    }
}

/// `{dir}/{stream}.csv` files, synced after every row.
#[derive(Debug, Clone)]
pub struct CsvTrialLog {
    dir: PathBuf,
}

impl CsvTrialLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, stream: &str) -> PathBuf {
        self.dir.join(format!("{stream}.csv"))
    }

    fn append<I, T>(&self, stream: &str, record: I) -> io::Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path(stream))?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer.write_record(record)?;
        writer.flush()?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_data()
    }

    /// Writes `{dir}/{stream}_summary.json`.
    pub fn write_summary(&self, stream: &str, summary: &SessionSummary) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(format!("{stream}_summary.json"));
        let json = serde_json::to_string_pretty(summary).map_err(io::Error::other)?;
        fs::write(&path, json)?;
        Ok(path)
    }
}

impl TrialLog for CsvTrialLog {
    fn create_stream(&mut self, stream: &str, header: &[&str]) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let is_new = fs::metadata(self.path(stream))
            .map(|m| m.len() == 0)
            .unwrap_or(true);
        if is_new {
            self.append(stream, header)?;
        }
        Ok(())
    }

    fn append_row(&mut self, stream: &str, fields: &[String]) -> io::Result<()> {
        self.append(stream, fields)
    }
}

#[derive(Debug, Clone, Default)]
struct MemoryStream {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

/// In-memory log whose clones share the same streams.
#[derive(Debug, Clone, Default)]
pub struct MemoryTrialLog(Arc<Mutex<BTreeMap<String, MemoryStream>>>);

impl MemoryTrialLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn streams(&self) -> Vec<String> {
        self.0.lock().keys().cloned().collect()
    }

    pub fn header(&self, stream: &str) -> Option<Vec<String>> {
        self.0.lock().get(stream).map(|s| s.header.clone())
    }

    pub fn rows(&self, stream: &str) -> Vec<Vec<String>> {
        self.0
            .lock()
            .get(stream)
            .map(|s| s.rows.clone())
            .unwrap_or_default()
    }
}

impl TrialLog for MemoryTrialLog {
    fn create_stream(&mut self, stream: &str, header: &[&str]) -> io::Result<()> {
        self.0
            .lock()
            .entry(stream.to_string())
            .or_insert_with(|| MemoryStream {
                header: header.iter().map(|h| h.to_string()).collect(),
                rows: Vec::new(),
            });
        Ok(())
    }

    fn append_row(&mut self, stream: &str, fields: &[String]) -> io::Result<()> {
        let mut streams = self.0.lock();
        let entry = streams.get_mut(stream).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no stream {stream}"))
        })?;
        entry.rows.push(fields.to_vec());
        Ok(())
    }
}
