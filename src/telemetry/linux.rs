//! Linux telemetry via `/proc`, `/sys` and `statvfs`.

#![allow(missing_docs)]

use std::fs;
use std::net::{IpAddr, ToSocketAddrs, UdpSocket};
use std::path::{Path, PathBuf};
use std::process::Command;

use parking_lot::Mutex;

use crate::core::config::TelemetryConfig;
use crate::core::errors::{Result, StbError};
use crate::telemetry::{DiskUsage, TelemetrySource, Temperature};

/// Aggregate CPU counters from the first line of `/proc/stat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuTimes {
    pub idle: u64,
    pub total: u64,
}

/// Telemetry source backed by the running Linux host.
#[derive(Debug)]
pub struct LinuxTelemetry {
    config: TelemetryConfig,
    proc_root: PathBuf,
    last_cpu: Mutex<Option<CpuTimes>>,
}

impl LinuxTelemetry {
    #[must_use]
    pub fn new(config: TelemetryConfig) -> Self {
        Self::with_proc_root(config, PathBuf::from("/proc"))
    }

    /// Read `stat` and `loadavg` from somewhere other than `/proc`.
    #[must_use]
    pub fn with_proc_root(config: TelemetryConfig, proc_root: PathBuf) -> Self {
        Self {
            config,
            proc_root,
            last_cpu: Mutex::new(None),
        }
    }

    fn probe_address(&self) -> Result<IpAddr> {
        let probe = &self.config.address_probe;
        let socket = UdpSocket::bind("0.0.0.0:0")
            .map_err(|e| StbError::telemetry("address", format!("bind: {e}")))?;
        // connect() on UDP only selects a route; nothing is sent.
        socket
            .connect(probe.as_str())
            .map_err(|e| StbError::telemetry("address", format!("route to {probe}: {e}")))?;
        let local = socket
            .local_addr()
            .map_err(|e| StbError::telemetry("address", format!("local_addr: {e}")))?;
        if local.ip().is_unspecified() {
            return Err(StbError::telemetry("address", "no route selected"));
        }
        Ok(local.ip())
    }

    fn resolve_hostname_address(&self) -> Result<IpAddr> {
        let host = self.hostname()?;
        let resolved = (host.as_str(), 0)
            .to_socket_addrs()
            .map_err(|e| StbError::telemetry("address", format!("resolve {host}: {e}")))?
            .map(|addr| addr.ip())
            .find(IpAddr::is_ipv4)
            .ok_or_else(|| StbError::telemetry("address", format!("{host} has no IPv4 address")))?;
        if resolved.is_loopback() {
            return Err(StbError::telemetry("address", format!("{host} resolves to loopback")));
        }
        Ok(resolved)
    }
}

impl TelemetrySource for LinuxTelemetry {
    fn address(&self) -> Result<String> {
        self.probe_address()
            .or_else(|_| self.resolve_hostname_address())
            .or_else(|_| hostname_dash_i())
            .map(|ip| ip.to_string())
    }

    fn hostname(&self) -> Result<String> {
        let raw = nix::unistd::gethostname()
            .map_err(|e| StbError::telemetry("hostname", e.to_string()))?;
        Ok(raw.to_string_lossy().into_owned())
    }

    fn cpu_temperature(&self) -> Result<Temperature> {
        for path in &self.config.thermal_zones {
            if let Ok(t) = read_millidegrees(path) {
                return Ok(t);
            }
        }
        read_hwmon_temperature(&self.config.hwmon_root)
    }

    fn cpu_usage(&self) -> Result<f64> {
        let path = self.proc_root.join("stat");
        let raw = fs::read_to_string(&path).map_err(|source| StbError::io(&path, source))?;
        let current = parse_proc_stat(&raw)?;
        let previous = self.last_cpu.lock().replace(current);
        Ok(usage_between(previous, current))
    }

    fn load_average(&self) -> Result<f64> {
        let path = self.proc_root.join("loadavg");
        let raw = fs::read_to_string(&path).map_err(|source| StbError::io(&path, source))?;
        parse_loadavg(&raw)
    }

    fn disk_usage(&self) -> Result<DiskUsage> {
        let path = &self.config.disk_path;
        let stat = nix::sys::statvfs::statvfs(path.as_path())
            .map_err(|e| StbError::telemetry("disk", format!("{}: {e}", path.display())))?;
        // statvfs field widths follow the target's C types (32-bit on armhf).
        #[allow(clippy::useless_conversion)]
        let (fragment, blocks, blocks_free, blocks_available) = (
            u64::from(stat.fragment_size()),
            u64::from(stat.blocks()),
            u64::from(stat.blocks_free()),
            u64::from(stat.blocks_available()),
        );
        Ok(DiskUsage {
            total_bytes: blocks.saturating_mul(fragment),
            used_bytes: blocks.saturating_sub(blocks_free).saturating_mul(fragment),
            free_bytes: blocks_available.saturating_mul(fragment),
        })
    }
}

fn hostname_dash_i() -> Result<IpAddr> {
    let output = Command::new("hostname")
        .arg("-I")
        .output()
        .map_err(|e| StbError::telemetry("address", format!("hostname -I: {e}")))?;
    parse_hostname_i(&String::from_utf8_lossy(&output.stdout))
}

/// First non-loopback IPv4 address from `hostname -I` output.
pub fn parse_hostname_i(raw: &str) -> Result<IpAddr> {
    raw.split_whitespace()
        .filter_map(|token| token.parse::<IpAddr>().ok())
        .find(|ip| ip.is_ipv4() && !ip.is_loopback())
        .ok_or_else(|| StbError::telemetry("address", "hostname -I listed no usable address"))
}

fn read_millidegrees(path: &Path) -> Result<Temperature> {
    let raw = fs::read_to_string(path).map_err(|source| StbError::io(path, source))?;
    let milli = raw
        .trim()
        .parse::<i64>()
        .map_err(|e| StbError::telemetry("temperature", format!("{}: {e}", path.display())))?;
    Ok(Temperature::from_millidegrees(milli))
}

fn read_hwmon_temperature(root: &Path) -> Result<Temperature> {
    let entries = fs::read_dir(root).map_err(|source| StbError::io(root, source))?;
    let mut dirs: Vec<PathBuf> = entries.filter_map(|e| e.ok().map(|e| e.path())).collect();
    dirs.sort();
    dirs.iter()
        .find_map(|dir| read_millidegrees(&dir.join("temp1_input")).ok())
        .ok_or_else(|| StbError::telemetry("temperature", "no readable thermal sensor"))
}

/// Parse the aggregate `cpu` line of `/proc/stat`.
///
/// idle = idle + iowait; total = user..steal (guest time is already folded
/// into user by the kernel).
pub fn parse_proc_stat(raw: &str) -> Result<CpuTimes> {
    let line = raw
        .lines()
        .find(|l| l.starts_with("cpu "))
        .ok_or_else(|| StbError::telemetry("cpu_usage", "no aggregate cpu line"))?;
    let fields: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .take(8)
        .map(str::parse::<u64>)
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| StbError::telemetry("cpu_usage", e.to_string()))?;
    if fields.len() < 4 {
        return Err(StbError::telemetry(
            "cpu_usage",
            format!("expected at least 4 counters, got {}", fields.len()),
        ));
    }
    let idle = fields[3] + fields.get(4).copied().unwrap_or(0);
    Ok(CpuTimes {
        idle,
        total: fields.iter().sum(),
    })
}

/// Busy percentage between two samples; since boot when there is no previous one.
#[allow(clippy::cast_precision_loss)]
pub fn usage_between(previous: Option<CpuTimes>, current: CpuTimes) -> f64 {
    let (idle, total) = match previous {
        Some(prev) if current.total > prev.total => (
            current.idle.saturating_sub(prev.idle),
            current.total - prev.total,
        ),
        Some(_) => return 0.0,
        None => (current.idle, current.total),
    };
    if total == 0 {
        return 0.0;
    }
    (total.saturating_sub(idle) as f64 * 100.0) / total as f64
}

pub fn parse_loadavg(raw: &str) -> Result<f64> {
    raw.split_whitespace()
        .next()
        .ok_or_else(|| StbError::telemetry("load", "empty loadavg"))?
        .parse::<f64>()
        .map_err(|e| StbError::telemetry("load", e.to_string()))
}
