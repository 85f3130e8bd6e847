//! Telemetry source: stateless-looking queries for the informational panels.
//!
//! Every query fails independently. Callers at the render boundary turn an
//! `Err` into the "unavailable" sentinel for that one field.

#![allow(missing_docs)]

pub mod linux;

use serde::{Deserialize, Serialize};

use crate::core::errors::Result;

pub use linux::LinuxTelemetry;

/// CPU temperature reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Temperature {
    pub celsius: f64,
}

impl Temperature {
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_millidegrees(milli: i64) -> Self {
        Self {
            celsius: milli as f64 / 1000.0,
        }
    }

    #[must_use]
    pub fn fahrenheit(&self) -> f64 {
        self.celsius * 9.0 / 5.0 + 32.0
    }
}

/// Usage of the filesystem holding the configured disk path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskUsage {
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub free_bytes: u64,
}

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

#[allow(clippy::cast_precision_loss)]
impl DiskUsage {
    #[must_use]
    pub fn used_pct(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        (self.used_bytes as f64 * 100.0) / self.total_bytes as f64
    }

    #[must_use]
    pub fn total_gib(&self) -> f64 {
        self.total_bytes as f64 / GIB
    }

    #[must_use]
    pub fn used_gib(&self) -> f64 {
        self.used_bytes as f64 / GIB
    }

    #[must_use]
    pub fn free_gib(&self) -> f64 {
        self.free_bytes as f64 / GIB
    }
}

/// Data fetches used by the panel composers.
pub trait TelemetrySource: Send + Sync {
    /// Primary outbound IPv4 address.
    fn address(&self) -> Result<String>;
    fn hostname(&self) -> Result<String>;
    fn cpu_temperature(&self) -> Result<Temperature>;
    /// CPU busy percentage since the previous call.
    fn cpu_usage(&self) -> Result<f64>;
    /// One-minute load average.
    fn load_average(&self) -> Result<f64>;
    fn disk_usage(&self) -> Result<DiskUsage>;

    /// Wall-clock time for the Address panel.
    fn local_time(&self) -> String {
        chrono::Local::now().format("%H:%M:%S").to_string()
    }
}
