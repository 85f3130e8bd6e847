//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use statusboard::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{Result, StbError};

// Navigation
pub use crate::nav::commands::{CommandAction, CommandEntry, CommandRegistry};
pub use crate::nav::state::{NavigationState, Panel, PanelChange, PanelSnapshot};

// Display
pub use crate::display::frame::Frame;
pub use crate::display::panels::{Overlay, Screen, compose_overlay, compose_panel, render_frame};
pub use crate::display::sink::{DisplayGuard, FrameSink};

// Telemetry
pub use crate::telemetry::{DiskUsage, LinuxTelemetry, Temperature, TelemetrySource};

// Input
pub use crate::input::buttons::{Button, InputDispatcher, InputOutcome};

// Daemon
pub use crate::daemon::executor::{CommandStatus, ExecutorHandle, spawn_executor};
pub use crate::daemon::render::{RenderLoop, RenderLoopParts, RenderWaker};
#[cfg(feature = "daemon")]
pub use crate::daemon::loop_main::{DaemonParts, StatusDaemon};
