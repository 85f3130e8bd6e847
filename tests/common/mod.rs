//! Shared fixtures for integration tests: scripted telemetry, registries, and
//! a polling helper for cross-thread assertions.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use statusboard::core::errors::{Result, StbError};
use statusboard::nav::commands::{CommandAction, CommandEntry, CommandRegistry};
use statusboard::telemetry::{DiskUsage, Temperature, TelemetrySource};

/// Telemetry whose every field can be switched to "unavailable".
#[derive(Debug)]
pub struct FakeTelemetry {
    pub address: Option<String>,
    pub hostname: Option<String>,
    pub temperature: Option<Temperature>,
    pub usage: Option<f64>,
    pub load: Option<f64>,
    pub disk: Option<DiskUsage>,
    pub reads: AtomicUsize,
}

impl Default for FakeTelemetry {
    fn default() -> Self {
        Self {
            address: Some("192.168.1.50".to_string()),
            hostname: Some("kiosk-lobby".to_string()),
            temperature: Some(Temperature::from_millidegrees(51_300)),
            usage: Some(18.3),
            load: Some(0.37),
            disk: Some(DiskUsage {
                total_bytes: 64 << 30,
                used_bytes: 16 << 30,
                free_bytes: 48 << 30,
            }),
            reads: AtomicUsize::new(0),
        }
    }
}

impl FakeTelemetry {
    fn read<T: Clone>(&self, field: &'static str, value: Option<&T>) -> Result<T> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        value
            .cloned()
            .ok_or_else(|| StbError::telemetry(field, "scripted failure"))
    }
}

impl TelemetrySource for FakeTelemetry {
    fn address(&self) -> Result<String> {
        self.read("address", self.address.as_ref())
    }
    fn hostname(&self) -> Result<String> {
        self.read("hostname", self.hostname.as_ref())
    }
    fn cpu_temperature(&self) -> Result<Temperature> {
        self.read("temperature", self.temperature.as_ref())
    }
    fn cpu_usage(&self) -> Result<f64> {
        self.read("usage", self.usage.as_ref())
    }
    fn load_average(&self) -> Result<f64> {
        self.read("load", self.load.as_ref())
    }
    fn disk_usage(&self) -> Result<DiskUsage> {
        self.read("disk", self.disk.as_ref())
    }
    fn local_time(&self) -> String {
        "12:00:00".to_string()
    }
}

/// Registry of `n` entries that only record which one ran.
pub fn recording_registry(n: usize) -> (CommandRegistry, Arc<Mutex<Vec<String>>>) {
    let ran = Arc::new(Mutex::new(Vec::new()));
    let entries = (0..n)
        .map(|i| {
            let label = format!("Cmd {i}");
            let sink = Arc::clone(&ran);
            let name = label.clone();
            CommandEntry::new(
                label,
                CommandAction::callable(move || {
                    sink.lock().push(name.clone());
                    Ok(())
                }),
            )
        })
        .collect();
    (
        CommandRegistry::new(entries).expect("non-empty registry"),
        ran,
    )
}

/// Registry whose entries fail with `message`.
pub fn failing_registry(message: &'static str) -> CommandRegistry {
    CommandRegistry::new(vec![CommandEntry::new(
        "Broken",
        CommandAction::callable(move || Err(message.to_string())),
    )])
    .expect("non-empty registry")
}

/// Poll `cond` every 5 ms until it holds or `limit` passes.
pub fn wait_until(limit: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}
