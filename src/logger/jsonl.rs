//! JSONL activity log: one self-contained JSON object per line.
//!
//! Lines are assembled in memory and written with a single `write_all` so a
//! concurrent `tail -f` never sees a partial record.
//!
//! Degradation chain when the disk misbehaves:
//! 1. Primary file path
//! 2. Fallback path (default `/dev/shm/statusboard.jsonl`, RAM-backed)
//! 3. stderr with a `[STB-JSONL]` prefix
//! 4. Silent discard; the panel keeps running regardless

#![allow(missing_docs)]

use std::fs::{self, File, OpenOptions, rename};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, StbError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    DaemonStart,
    DaemonStop,
    DisplayInit,
    InputDegraded,
    PanelChange,
    CommandSelect,
    CommandTrigger,
    CommandComplete,
    CommandFail,
    CommandDropped,
    FrameDropped,
    AutoAdvanceToggle,
    Error,
}

/// A single JSONL record. Only `ts`, `event` and `severity` are always present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// RFC 3339 UTC timestamp, millisecond precision.
    pub ts: String,
    pub event: EventType,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub panel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_panel: Option<String>,
    /// `button` or `auto`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl LogEntry {
    /// New entry stamped with the current UTC time.
    pub fn new(event: EventType, severity: Severity) -> Self {
        Self {
            ts: format_utc_now(),
            event,
            severity,
            panel: None,
            from_panel: None,
            cause: None,
            command: None,
            selected: None,
            duration_ms: None,
            ok: None,
            error_code: None,
            error_message: None,
            details: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct JsonlConfig {
    pub path: PathBuf,
    pub fallback_path: Option<PathBuf>,
    /// Rotate once the live file would exceed this many bytes.
    pub max_size_bytes: u64,
    pub max_rotated_files: u32,
    pub fsync_interval_secs: u64,
}

impl Default for JsonlConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/log/statusboard/activity.jsonl"),
            fallback_path: Some(PathBuf::from("/dev/shm/statusboard.jsonl")),
            max_size_bytes: 8 * 1024 * 1024,
            max_rotated_files: 3,
            fsync_interval_secs: 10,
        }
    }
}

/// Which file the writer currently appends to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Primary,
    Fallback,
}

/// Where the next line goes. Only ever moves down the chain, except through
/// [`JsonlWriter::try_recover`].
enum Output {
    File {
        target: Target,
        file: BufWriter<File>,
        len: u64,
    },
    Stderr,
    Discard,
}

const WRITE_BUFFER: usize = 16 * 1024;

/// Append-only JSONL writer with size rotation and fallback.
pub struct JsonlWriter {
    config: JsonlConfig,
    output: Output,
    synced_at: SystemTime,
}

impl JsonlWriter {
    pub fn open(config: JsonlConfig) -> Self {
        let mut writer = Self {
            config,
            output: Output::Discard,
            synced_at: SystemTime::now(),
        };
        writer.output = writer.first_writable(Target::Primary);
        writer
    }

    pub fn write_entry(&mut self, entry: &LogEntry) {
        match serde_json::to_string(entry) {
            Ok(mut line) => {
                line.push('\n');
                self.append(&line);
            }
            Err(e) => eprintln!("[STB-JSONL] serialize error: {e}"),
        }
    }

    pub fn flush(&mut self) {
        if let Output::File { file, .. } = &mut self.output {
            let _ = file.flush();
        }
    }

    pub fn fsync(&mut self) {
        if let Output::File { file, .. } = &mut self.output {
            if file.flush().is_ok() {
                let _ = file.get_ref().sync_data();
            }
            self.synced_at = SystemTime::now();
        }
    }

    pub fn state(&self) -> &'static str {
        match &self.output {
            Output::File {
                target: Target::Primary,
                ..
            } => "normal",
            Output::File {
                target: Target::Fallback,
                ..
            } => "fallback",
            Output::Stderr => "stderr",
            Output::Discard => "discard",
        }
    }

    /// Reopen the primary path after a degradation, if it is writable again.
    pub fn try_recover(&mut self) {
        if matches!(
            self.output,
            Output::File {
                target: Target::Primary,
                ..
            }
        ) {
            return;
        }
        if let Some(output) = self.open_target(Target::Primary) {
            self.flush();
            self.output = output;
            eprintln!(
                "[STB-JSONL] recovered to primary path: {}",
                self.config.path.display()
            );
        }
    }

    fn path_of(&self, target: Target) -> Option<&Path> {
        match target {
            Target::Primary => Some(self.config.path.as_path()),
            Target::Fallback => self.config.fallback_path.as_deref(),
        }
    }

    fn open_target(&self, target: Target) -> Option<Output> {
        let path = self.path_of(target)?;
        let (file, len) = open_append(path).ok()?;
        Some(Output::File {
            target,
            file: BufWriter::with_capacity(WRITE_BUFFER, file),
            len,
        })
    }

    /// Walk the chain from `from` until something accepts writes.
    fn first_writable(&self, from: Target) -> Output {
        if from == Target::Primary {
            if let Some(output) = self.open_target(Target::Primary) {
                return output;
            }
        }
        match self.open_target(Target::Fallback) {
            Some(output) => {
                if let Some(path) = self.path_of(Target::Fallback) {
                    eprintln!("[STB-JSONL] primary path failed, using fallback: {}", path.display());
                }
                output
            }
            None => {
                eprintln!("[STB-JSONL] no writable log file, using stderr");
                Output::Stderr
            }
        }
    }

    /// Step one link down after a failed write on the current output.
    fn step_down(&mut self) {
        self.output = match std::mem::replace(&mut self.output, Output::Discard) {
            Output::File {
                target: Target::Primary,
                ..
            } => self.first_writable(Target::Fallback),
            Output::File {
                target: Target::Fallback,
                ..
            } => {
                eprintln!("[STB-JSONL] fallback write failed, using stderr");
                Output::Stderr
            }
            Output::Stderr | Output::Discard => Output::Discard,
        };
    }

    fn append(&mut self, line: &str) {
        let extra = line.len() as u64;
        loop {
            let full = match &self.output {
                Output::File { len, target, .. } if len + extra > self.config.max_size_bytes => {
                    Some(*target)
                }
                _ => None,
            };
            if let Some(target) = full {
                self.rotate(target);
            }
            match &mut self.output {
                Output::File { file, len, .. } => {
                    if file.write_all(line.as_bytes()).is_ok() {
                        *len += extra;
                        break;
                    }
                }
                Output::Stderr => {
                    if io::stderr().write_all(format!("[STB-JSONL] {line}").as_bytes()).is_ok() {
                        return;
                    }
                }
                Output::Discard => return,
            }
            self.step_down();
        }

        let due = SystemTime::now()
            .duration_since(self.synced_at)
            .unwrap_or(Duration::ZERO);
        if due.as_secs() >= self.config.fsync_interval_secs {
            self.fsync();
        }
    }

    /// Shift `target`'s generations up by one and start a fresh live file.
    fn rotate(&mut self, target: Target) {
        self.flush();
        self.output = Output::Discard;
        let Some(base) = self.path_of(target).map(Path::to_path_buf) else {
            return;
        };

        let keep = self.config.max_rotated_files;
        let _ = fs::remove_file(rotated_name(&base, keep));
        for generation in (1..keep).rev() {
            let _ = rename(rotated_name(&base, generation), rotated_name(&base, generation + 1));
        }
        let _ = rename(&base, rotated_name(&base, 1));

        self.output = match self.open_target(target) {
            Some(output) => output,
            None if target == Target::Primary => self.first_writable(Target::Fallback),
            None => Output::Stderr,
        };
    }
}

/// Open or create `path` for appending, creating parent directories.
fn open_append(path: &Path) -> Result<(File, u64)> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| StbError::io(parent, source))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| StbError::io(path, source))?;
    let len = file.metadata().map_or(0, |m| m.len());
    Ok((file, len))
}

/// `activity.jsonl` -> `activity.jsonl.2`
fn rotated_name(base: &Path, generation: u32) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(format!(".{generation}"));
    PathBuf::from(name)
}

fn format_utc_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
