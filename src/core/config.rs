//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, StbError};

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "STB_CONFIG";

/// Full statusboard configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub display: DisplayConfig,
    pub navigation: NavigationConfig,
    pub buttons: ButtonsConfig,
    pub telemetry: TelemetryConfig,
    pub paths: PathsConfig,
    pub commands: Vec<CommandConfig>,
}

/// I2C display bus and transfer budget.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DisplayConfig {
    pub i2c_bus: PathBuf,
    /// Candidate controller addresses, tried in order at startup.
    pub addresses: Vec<u8>,
    /// How long the render loop waits for the flusher before dropping a frame.
    pub submit_timeout_ms: u64,
}

/// Render cadence and auto-advance policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NavigationConfig {
    pub render_interval_ms: u64,
    pub auto_advance: bool,
    pub auto_advance_secs: u64,
    /// How long a failed command's error stays on screen.
    pub error_display_secs: u64,
}

/// Push-button wiring (BCM numbering) and debounce window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ButtonsConfig {
    pub enabled: bool,
    /// GPIO character device. Pin numbers are line offsets on this chip.
    pub gpio_chip: PathBuf,
    pub debounce_ms: u64,
    pub poll_timeout_ms: u64,
    pub up: u64,
    pub down: u64,
    pub left: u64,
    pub right: u64,
    pub center: u64,
}

/// Where the Linux telemetry source reads from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TelemetryConfig {
    pub thermal_zones: Vec<PathBuf>,
    pub hwmon_root: PathBuf,
    pub disk_path: PathBuf,
    /// UDP target used to discover the outbound interface address.
    pub address_probe: String,
}

/// Filesystem paths used by statusboard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
    pub jsonl_log: PathBuf,
    pub jsonl_fallback: Option<PathBuf>,
}

/// One entry of the command menu.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandConfig {
    pub label: String,
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            display: DisplayConfig::default(),
            navigation: NavigationConfig::default(),
            buttons: ButtonsConfig::default(),
            telemetry: TelemetryConfig::default(),
            paths: PathsConfig::default(),
            commands: default_commands(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            i2c_bus: PathBuf::from("/dev/i2c-1"),
            addresses: vec![0x3C, 0x3D],
            submit_timeout_ms: 250,
        }
    }
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            render_interval_ms: 1_000,
            auto_advance: true,
            auto_advance_secs: 10,
            error_display_secs: 3,
        }
    }
}

impl Default for ButtonsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            gpio_chip: PathBuf::from("/dev/gpiochip0"),
            debounce_ms: 300,
            poll_timeout_ms: 100,
            up: 5,
            down: 6,
            left: 27,
            right: 23,
            center: 4,
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            thermal_zones: vec![
                PathBuf::from("/sys/class/thermal/thermal_zone0/temp"),
                PathBuf::from("/sys/class/thermal/thermal_zone1/temp"),
            ],
            hwmon_root: PathBuf::from("/sys/class/hwmon"),
            disk_path: PathBuf::from("/"),
            address_probe: "8.8.8.8:80".to_string(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let home_dir = env::var_os("HOME").map_or_else(
            || {
                eprintln!(
                    "[STB-CONFIG] WARNING: HOME not set, falling back to /tmp for data paths"
                );
                PathBuf::from("/tmp")
            },
            PathBuf::from,
        );
        Self {
            config_file: home_dir
                .join(".config")
                .join("statusboard")
                .join("config.toml"),
            jsonl_log: home_dir
                .join(".local")
                .join("share")
                .join("statusboard")
                .join("activity.jsonl"),
            jsonl_fallback: Some(PathBuf::from("/dev/shm/statusboard.jsonl")),
        }
    }
}

fn default_commands() -> Vec<CommandConfig> {
    vec![
        CommandConfig {
            label: "Restart".to_string(),
            program: "sudo".to_string(),
            args: vec!["reboot".to_string()],
        },
        CommandConfig {
            label: "Shutdown".to_string(),
            program: "sudo".to_string(),
            args: vec!["shutdown".to_string(), "-h".to_string(), "now".to_string()],
        },
    ]
}

impl NavigationConfig {
    #[must_use]
    pub fn render_interval(&self) -> Duration {
        Duration::from_millis(self.render_interval_ms)
    }

    #[must_use]
    pub fn auto_advance_threshold(&self) -> Duration {
        Duration::from_secs(self.auto_advance_secs)
    }

    #[must_use]
    pub fn error_display(&self) -> Duration {
        Duration::from_secs(self.error_display_secs)
    }
}

impl ButtonsConfig {
    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load from `$STB_CONFIG` when set, otherwise from the default path.
    pub fn load_from_env() -> Result<Self> {
        let explicit = env_var(CONFIG_PATH_ENV).map(PathBuf::from);
        Self::load(explicit.as_deref())
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| StbError::Io {
                path: path_buf.clone(),
                source,
            })?;
            Self::parse(&raw)?
        } else if is_explicit_path {
            return Err(StbError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides_from(env_var)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a TOML document without touching the environment.
    pub fn parse(raw: &str) -> Result<Self> {
        let parsed: Self = toml::from_str(raw)?;
        Ok(parsed)
    }

    /// Deterministic hash of the effective config for the startup log line.
    ///
    /// FNV-1a over the canonical JSON form, stable across processes.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        // display
        if let Some(raw) = lookup("STB_DISPLAY_I2C_BUS") {
            self.display.i2c_bus = PathBuf::from(raw);
        }
        set_u64(
            &mut lookup,
            "STB_DISPLAY_SUBMIT_TIMEOUT_MS",
            &mut self.display.submit_timeout_ms,
        )?;

        // navigation
        set_u64(
            &mut lookup,
            "STB_NAVIGATION_RENDER_INTERVAL_MS",
            &mut self.navigation.render_interval_ms,
        )?;
        set_bool(
            &mut lookup,
            "STB_NAVIGATION_AUTO_ADVANCE",
            &mut self.navigation.auto_advance,
        )?;
        set_u64(
            &mut lookup,
            "STB_NAVIGATION_AUTO_ADVANCE_SECS",
            &mut self.navigation.auto_advance_secs,
        )?;
        set_u64(
            &mut lookup,
            "STB_NAVIGATION_ERROR_DISPLAY_SECS",
            &mut self.navigation.error_display_secs,
        )?;

        // buttons
        set_bool(&mut lookup, "STB_BUTTONS_ENABLED", &mut self.buttons.enabled)?;
        if let Some(raw) = lookup("STB_BUTTONS_GPIO_CHIP") {
            self.buttons.gpio_chip = PathBuf::from(raw);
        }
        set_u64(
            &mut lookup,
            "STB_BUTTONS_DEBOUNCE_MS",
            &mut self.buttons.debounce_ms,
        )?;

        // telemetry
        if let Some(raw) = lookup("STB_TELEMETRY_DISK_PATH") {
            self.telemetry.disk_path = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("STB_TELEMETRY_ADDRESS_PROBE") {
            self.telemetry.address_probe = raw;
        }

        // paths
        if let Some(raw) = lookup("STB_PATHS_JSONL_LOG") {
            self.paths.jsonl_log = PathBuf::from(raw);
        }

        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.display.addresses.is_empty() {
            return Err(StbError::InvalidConfig {
                details: "display.addresses must list at least one address".to_string(),
            });
        }
        for addr in &self.display.addresses {
            if *addr > 0x7F {
                return Err(StbError::InvalidConfig {
                    details: format!("display.addresses entry {addr:#04x} is not a 7-bit address"),
                });
            }
        }

        if self.navigation.render_interval_ms == 0 {
            return Err(StbError::InvalidConfig {
                details: "navigation.render_interval_ms must be > 0".to_string(),
            });
        }
        if self.display.submit_timeout_ms >= self.navigation.render_interval_ms {
            return Err(StbError::InvalidConfig {
                details: format!(
                    "display.submit_timeout_ms ({}) must be < navigation.render_interval_ms ({})",
                    self.display.submit_timeout_ms, self.navigation.render_interval_ms
                ),
            });
        }
        if self.navigation.auto_advance_secs == 0 {
            return Err(StbError::InvalidConfig {
                details: "navigation.auto_advance_secs must be > 0".to_string(),
            });
        }
        if self.navigation.error_display_secs >= 60 {
            return Err(StbError::InvalidConfig {
                details: "navigation.error_display_secs must be < 60".to_string(),
            });
        }

        if self.buttons.poll_timeout_ms == 0 {
            return Err(StbError::InvalidConfig {
                details: "buttons.poll_timeout_ms must be > 0".to_string(),
            });
        }
        let pins = [
            self.buttons.up,
            self.buttons.down,
            self.buttons.left,
            self.buttons.right,
            self.buttons.center,
        ];
        if let Some(pin) = pins.iter().find(|&&pin| u32::try_from(pin).is_err()) {
            return Err(StbError::InvalidConfig {
                details: format!("button pin {pin} is not a valid GPIO line offset"),
            });
        }
        let distinct: HashSet<u64> = pins.iter().copied().collect();
        if distinct.len() != pins.len() {
            return Err(StbError::InvalidConfig {
                details: format!("button pins must be distinct, got {pins:?}"),
            });
        }

        if self.commands.is_empty() {
            return Err(StbError::InvalidConfig {
                details: "at least one [[commands]] entry is required".to_string(),
            });
        }
        for (idx, cmd) in self.commands.iter().enumerate() {
            if cmd.label.trim().is_empty() || cmd.program.trim().is_empty() {
                return Err(StbError::InvalidConfig {
                    details: format!("commands[{idx}] needs a non-empty label and program"),
                });
            }
        }

        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn set_u64<F>(lookup: &mut F, name: &str, slot: &mut u64) -> Result<()>
where
    F: FnMut(&str) -> Option<String>,
{
    if let Some(raw) = lookup(name) {
        *slot = raw.parse::<u64>().map_err(|error| StbError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })?;
    }
    Ok(())
}

fn set_bool<F>(lookup: &mut F, name: &str, slot: &mut bool) -> Result<()>
where
    F: FnMut(&str) -> Option<String>,
{
    if let Some(raw) = lookup(name) {
        *slot = raw.parse::<bool>().map_err(|error| StbError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })?;
    }
    Ok(())
}
