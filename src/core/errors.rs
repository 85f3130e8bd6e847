//! STB-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, StbError>;

/// Top-level error type for statusboard.
#[derive(Debug, Error)]
pub enum StbError {
    #[error("[STB-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[STB-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[STB-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[STB-2001] display init failed on {bus} (tried {tried}): {details}")]
    DisplayInit {
        bus: PathBuf,
        tried: String,
        details: String,
    },

    #[error("[STB-2002] display bus transfer failed: {details}")]
    DisplayBus { details: String },

    #[error("[STB-2101] gpio failure on pin {pin}: {details}")]
    Gpio { pin: u64, details: String },

    #[error("[STB-2201] telemetry unavailable for {field}: {details}")]
    Telemetry {
        field: &'static str,
        details: String,
    },

    #[error("[STB-2301] command '{label}' failed: {details}")]
    CommandFailed { label: String, details: String },

    #[error("[STB-2401] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[STB-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[STB-3003] channel closed in component {component}")]
    ChannelClosed { component: &'static str },

    #[error("[STB-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl StbError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "STB-1001",
            Self::MissingConfig { .. } => "STB-1002",
            Self::ConfigParse { .. } => "STB-1003",
            Self::DisplayInit { .. } => "STB-2001",
            Self::DisplayBus { .. } => "STB-2002",
            Self::Gpio { .. } => "STB-2101",
            Self::Telemetry { .. } => "STB-2201",
            Self::CommandFailed { .. } => "STB-2301",
            Self::Serialization { .. } => "STB-2401",
            Self::Io { .. } => "STB-3002",
            Self::ChannelClosed { .. } => "STB-3003",
            Self::Runtime { .. } => "STB-3900",
        }
    }

    /// Whether retrying might resolve the failure.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Io { .. }
                | Self::ChannelClosed { .. }
                | Self::DisplayBus { .. }
                | Self::Telemetry { .. }
                | Self::Runtime { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Convenience constructor for a telemetry field failure.
    #[must_use]
    pub fn telemetry(field: &'static str, details: impl Into<String>) -> Self {
        Self::Telemetry {
            field,
            details: details.into(),
        }
    }
}

impl From<serde_json::Error> for StbError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for StbError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_variants() -> Vec<StbError> {
        vec![
            StbError::InvalidConfig {
                details: String::new(),
            },
            StbError::MissingConfig {
                path: PathBuf::new(),
            },
            StbError::ConfigParse {
                context: "",
                details: String::new(),
            },
            StbError::DisplayInit {
                bus: PathBuf::new(),
                tried: String::new(),
                details: String::new(),
            },
            StbError::DisplayBus {
                details: String::new(),
            },
            StbError::Gpio {
                pin: 0,
                details: String::new(),
            },
            StbError::telemetry("temperature", ""),
            StbError::CommandFailed {
                label: String::new(),
                details: String::new(),
            },
            StbError::Serialization {
                context: "",
                details: String::new(),
            },
            StbError::io("", std::io::Error::other("test")),
            StbError::ChannelClosed { component: "" },
            StbError::Runtime {
                details: String::new(),
            },
        ]
    }

    #[test]
    fn error_codes_are_unique() {
        let errors = all_variants();
        let codes: Vec<&str> = errors.iter().map(StbError::code).collect();
        let unique: std::collections::HashSet<&&str> = codes.iter().collect();
        assert_eq!(
            codes.len(),
            unique.len(),
            "error codes must be unique: {codes:?}"
        );
    }

    #[test]
    fn error_codes_have_stb_prefix() {
        for err in &all_variants() {
            assert!(
                err.code().starts_with("STB-"),
                "code {} must start with STB-",
                err.code()
            );
        }
    }

    #[test]
    fn error_display_includes_code() {
        for err in &all_variants() {
            let msg = err.to_string();
            assert!(
                msg.contains(err.code()),
                "display should contain error code: {msg}"
            );
        }
    }

    #[test]
    fn retryable_errors_are_correct() {
        assert!(StbError::ChannelClosed { component: "test" }.is_retryable());
        assert!(
            StbError::DisplayBus {
                details: String::new()
            }
            .is_retryable()
        );
        assert!(StbError::telemetry("load", "gone").is_retryable());

        assert!(
            !StbError::DisplayInit {
                bus: PathBuf::from("/dev/i2c-1"),
                tried: "0x3c, 0x3d".to_string(),
                details: String::new(),
            }
            .is_retryable()
        );
        assert!(
            !StbError::InvalidConfig {
                details: String::new()
            }
            .is_retryable()
        );
        assert!(
            !StbError::CommandFailed {
                label: "Restart".to_string(),
                details: String::new()
            }
            .is_retryable()
        );
    }

    #[test]
    fn io_convenience_constructor() {
        let err = StbError::io(
            "/sys/class/thermal/thermal_zone0/temp",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(err.code(), "STB-3002");
        assert!(err.to_string().contains("thermal_zone0"));
    }

    #[test]
    fn from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: StbError = json_err.into();
        assert_eq!(err.code(), "STB-2401");
    }

    #[test]
    fn from_toml_error() {
        let toml_err = toml::from_str::<toml::Value>("= invalid").unwrap_err();
        let err: StbError = toml_err.into();
        assert_eq!(err.code(), "STB-1003");
    }
}
