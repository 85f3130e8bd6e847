//! Activity logger: a dedicated thread owns the `JsonlWriter`.
//!
//! Every other thread sends `ActivityEvent` through a bounded crossbeam
//! channel with `try_send()`, so the render loop and the button threads are
//! never blocked by a slow SD card.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use serde::{Deserialize, Serialize};

use crate::core::config::PathsConfig;
use crate::core::errors::{Result, StbError};
use crate::logger::jsonl::{EventType, JsonlConfig, JsonlWriter, LogEntry, Severity};
use crate::nav::state::Panel;

const CHANNEL_CAPACITY: usize = 256;

/// Every 512 records, try to climb back to the primary path if degraded.
const RECOVER_EVERY: u64 = 512;

/// Why the visible panel changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeCause {
    Button,
    Auto,
}

impl ChangeCause {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Button => "button",
            Self::Auto => "auto",
        }
    }
}

#[derive(Debug, Clone)]
pub enum ActivityEvent {
    DaemonStarted {
        version: String,
        config_hash: String,
    },
    DaemonStopped {
        reason: String,
        uptime_secs: u64,
    },
    DisplayInitialized {
        bus: String,
        address: u8,
    },
    InputDegraded {
        details: String,
    },
    PanelChanged {
        from: Panel,
        to: Panel,
        cause: ChangeCause,
    },
    CommandSelected {
        index: usize,
        label: String,
    },
    CommandTriggered {
        label: String,
    },
    CommandCompleted {
        label: String,
        duration_ms: u64,
    },
    CommandFailed {
        label: String,
        error_code: String,
        message: String,
        duration_ms: u64,
    },
    /// Trigger refused because the executor queue was full.
    CommandDropped {
        label: String,
    },
    FrameDropped {
        reason: String,
    },
    AutoAdvanceToggled {
        enabled: bool,
    },
    Error {
        code: String,
        message: String,
    },
    /// Sentinel: flush and stop the logger thread.
    Shutdown,
}

impl ActivityEvent {
    /// Convenience for reporting an `StbError` as-is.
    #[must_use]
    pub fn error(err: &StbError) -> Self {
        Self::Error {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

/// Back-pressure drops: `pending` is reported into the log and reset by the
/// logger thread, `total` only grows.
#[derive(Debug, Default)]
struct DropCounter {
    pending: AtomicU64,
    total: AtomicU64,
}

impl DropCounter {
    fn record(&self) {
        self.pending.fetch_add(1, Ordering::Relaxed);
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    fn take_pending(&self) -> u64 {
        self.pending.swap(0, Ordering::Relaxed)
    }

    fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}

/// Cheaply-cloneable, non-blocking sender.
#[derive(Clone)]
pub struct ActivityLoggerHandle {
    tx: Sender<ActivityEvent>,
    drops: Arc<DropCounter>,
}

impl ActivityLoggerHandle {
    /// Queue an event. When the channel is full the event is counted and dropped.
    pub fn send(&self, event: ActivityEvent) {
        if let Err(TrySendError::Full(_)) = self.tx.try_send(event) {
            self.drops.record();
        }
        // Disconnected only happens during shutdown.
    }

    /// Events dropped since the logger started, including ones already
    /// reported in the log.
    pub fn dropped_events(&self) -> u64 {
        self.drops.total()
    }

    /// Ask the logger thread to flush and exit. Blocks until queued.
    pub fn shutdown(&self) {
        let _ = self.tx.send(ActivityEvent::Shutdown);
    }

    /// A handle whose events go nowhere, for tests and dry runs.
    #[must_use]
    pub fn disconnected() -> Self {
        let (tx, _rx) = bounded(1);
        Self {
            tx,
            drops: Arc::default(),
        }
    }
}

pub struct ActivityLoggerConfig {
    pub jsonl_config: JsonlConfig,
    pub channel_capacity: usize,
}

impl ActivityLoggerConfig {
    #[must_use]
    pub fn from_paths(paths: &PathsConfig) -> Self {
        Self {
            jsonl_config: JsonlConfig {
                path: paths.jsonl_log.clone(),
                fallback_path: paths.jsonl_fallback.clone(),
                ..JsonlConfig::default()
            },
            channel_capacity: CHANNEL_CAPACITY,
        }
    }
}

/// Spawn the logger thread. It runs until `shutdown()` or until every handle is dropped.
pub fn spawn_logger(
    config: ActivityLoggerConfig,
) -> Result<(ActivityLoggerHandle, thread::JoinHandle<()>)> {
    let (tx, rx) = bounded::<ActivityEvent>(config.channel_capacity);
    let drops = Arc::new(DropCounter::default());
    let handle = ActivityLoggerHandle {
        tx,
        drops: Arc::clone(&drops),
    };

    let join = thread::Builder::new()
        .name("stb-logger".to_string())
        .spawn(move || logger_thread_main(&rx, config.jsonl_config, &drops))
        .map_err(|e| StbError::Runtime {
            details: format!("failed to spawn logger thread: {e}"),
        })?;

    Ok((handle, join))
}

fn logger_thread_main(rx: &Receiver<ActivityEvent>, jsonl_config: JsonlConfig, drops: &DropCounter) {
    let mut jsonl = JsonlWriter::open(jsonl_config);
    let mut written: u64 = 0;

    while let Ok(event) = rx.recv() {
        let d = drops.take_pending();
        if d > 0 {
            let mut warn = LogEntry::new(EventType::Error, Severity::Warning);
            warn.details = Some(format!("{d} log events dropped due to back-pressure"));
            jsonl.write_entry(&warn);
        }

        if matches!(event, ActivityEvent::Shutdown) {
            break;
        }

        jsonl.write_entry(&event_to_log_entry(&event));
        written += 1;
        if written % RECOVER_EVERY == 0 {
            jsonl.try_recover();
        }
    }

    jsonl.flush();
    jsonl.fsync();
}

#[allow(clippy::too_many_lines)]
fn event_to_log_entry(event: &ActivityEvent) -> LogEntry {
    match event {
        ActivityEvent::DaemonStarted {
            version,
            config_hash,
        } => {
            let mut e = LogEntry::new(EventType::DaemonStart, Severity::Info);
            e.details = Some(format!("version={version} config_hash={config_hash}"));
            e.ok = Some(true);
            e
        }
        ActivityEvent::DaemonStopped {
            reason,
            uptime_secs,
        } => {
            let mut e = LogEntry::new(EventType::DaemonStop, Severity::Info);
            e.details = Some(format!("reason={reason} uptime={uptime_secs}s"));
            e.ok = Some(true);
            e
        }
        ActivityEvent::DisplayInitialized { bus, address } => {
            let mut e = LogEntry::new(EventType::DisplayInit, Severity::Info);
            e.details = Some(format!("bus={bus} address=0x{address:02x}"));
            e.ok = Some(true);
            e
        }
        ActivityEvent::InputDegraded { details } => {
            let mut e = LogEntry::new(EventType::InputDegraded, Severity::Warning);
            e.details = Some(details.clone());
            e.ok = Some(false);
            e
        }
        ActivityEvent::PanelChanged { from, to, cause } => {
            let mut e = LogEntry::new(EventType::PanelChange, Severity::Info);
            e.from_panel = Some(from.to_string());
            e.panel = Some(to.to_string());
            e.cause = Some(cause.as_str().to_string());
            e
        }
        ActivityEvent::CommandSelected { index, label } => {
            let mut e = LogEntry::new(EventType::CommandSelect, Severity::Info);
            e.selected = Some(*index);
            e.command = Some(label.clone());
            e
        }
        ActivityEvent::CommandTriggered { label } => {
            let mut e = LogEntry::new(EventType::CommandTrigger, Severity::Info);
            e.command = Some(label.clone());
            e
        }
        ActivityEvent::CommandCompleted { label, duration_ms } => {
            let mut e = LogEntry::new(EventType::CommandComplete, Severity::Info);
            e.command = Some(label.clone());
            e.duration_ms = Some(*duration_ms);
            e.ok = Some(true);
            e
        }
        ActivityEvent::CommandFailed {
            label,
            error_code,
            message,
            duration_ms,
        } => {
            let mut e = LogEntry::new(EventType::CommandFail, Severity::Warning);
            e.command = Some(label.clone());
            e.error_code = Some(error_code.clone());
            e.error_message = Some(message.clone());
            e.duration_ms = Some(*duration_ms);
            e.ok = Some(false);
            e
        }
        ActivityEvent::CommandDropped { label } => {
            let mut e = LogEntry::new(EventType::CommandDropped, Severity::Warning);
            e.command = Some(label.clone());
            e.ok = Some(false);
            e
        }
        ActivityEvent::FrameDropped { reason } => {
            let mut e = LogEntry::new(EventType::FrameDropped, Severity::Warning);
            e.details = Some(reason.clone());
            e
        }
        ActivityEvent::AutoAdvanceToggled { enabled } => {
            let mut e = LogEntry::new(EventType::AutoAdvanceToggle, Severity::Info);
            e.details = Some(format!("auto_advance={enabled}"));
            e
        }
        ActivityEvent::Error { code, message } => {
            let mut e = LogEntry::new(EventType::Error, Severity::Critical);
            e.error_code = Some(code.clone());
            e.error_message = Some(message.clone());
            e.ok = Some(false);
            e
        }
        ActivityEvent::Shutdown => LogEntry::new(EventType::DaemonStop, Severity::Info),
    }
}
