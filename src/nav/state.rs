//! Navigation state: which panel is shown, which command is selected, and when
//! the user last touched a button.
//!
//! All four fields live behind one `parking_lot::Mutex`. Every operation,
//! including [`NavigationState::snapshot`], takes the lock exactly once, so a
//! multi-field transition is never observed half-applied. Nothing slow runs
//! under the lock: command entries are cloned out and executed by the caller.

#![allow(missing_docs)]

use std::fmt;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::nav::commands::{CommandEntry, CommandRegistry};

/// The four screens, in cycle order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Panel {
    Address,
    CpuHealth,
    DiskUsage,
    Commands,
}

impl Panel {
    pub const ALL: [Self; 4] = [Self::Address, Self::CpuHealth, Self::DiskUsage, Self::Commands];
    pub const COUNT: usize = Self::ALL.len();

    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Address => 0,
            Self::CpuHealth => 1,
            Self::DiskUsage => 2,
            Self::Commands => 3,
        }
    }

    #[must_use]
    pub const fn from_index(index: usize) -> Self {
        Self::ALL[index % Self::COUNT]
    }

    #[must_use]
    pub const fn next(self) -> Self {
        Self::from_index(self.index() + 1)
    }

    #[must_use]
    pub const fn prev(self) -> Self {
        Self::from_index(self.index() + Self::COUNT - 1)
    }

    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Address => "System IP",
            Self::CpuHealth => "CPU Info",
            Self::DiskUsage => "Disk Usage",
            Self::Commands => "Commands",
        }
    }
}

impl fmt::Display for Panel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Address => "address",
            Self::CpuHealth => "cpu_health",
            Self::DiskUsage => "disk_usage",
            Self::Commands => "commands",
        };
        f.write_str(name)
    }
}

/// Result of a panel move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelChange {
    pub from: Panel,
    pub to: Panel,
}

/// Immutable copy of the navigation state for one render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelSnapshot {
    pub panel: Panel,
    pub selected_command: usize,
    pub last_interaction: Instant,
    pub auto_advance_enabled: bool,
}

#[derive(Debug)]
struct NavInner {
    panel: Panel,
    selected_command: usize,
    last_interaction: Instant,
    auto_advance_enabled: bool,
}

/// The single authoritative navigation record, shared by `Arc` between the
/// render loop, button threads and the signal path.
#[derive(Debug)]
pub struct NavigationState {
    inner: Mutex<NavInner>,
    registry: CommandRegistry,
}

impl NavigationState {
    /// Start on the Address panel with the first command selected.
    #[must_use]
    pub fn new(registry: CommandRegistry, auto_advance_enabled: bool) -> Self {
        Self::starting_at(registry, auto_advance_enabled, Instant::now())
    }

    /// Like [`Self::new`] with an explicit start instant.
    #[must_use]
    pub fn starting_at(registry: CommandRegistry, auto_advance_enabled: bool, now: Instant) -> Self {
        Self {
            inner: Mutex::new(NavInner {
                panel: Panel::Address,
                selected_command: 0,
                last_interaction: now,
                auto_advance_enabled,
            }),
            registry,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    pub fn advance_panel(&self) -> PanelChange {
        let mut inner = self.inner.lock();
        let from = inner.panel;
        inner.panel = from.next();
        inner.last_interaction = Instant::now();
        PanelChange {
            from,
            to: inner.panel,
        }
    }

    pub fn retreat_panel(&self) -> PanelChange {
        let mut inner = self.inner.lock();
        let from = inner.panel;
        inner.panel = from.prev();
        inner.last_interaction = Instant::now();
        PanelChange {
            from,
            to: inner.panel,
        }
    }

    /// Move the selection down. Returns the new index, or `None` off the Commands panel.
    pub fn select_next_command(&self) -> Option<usize> {
        let count = self.registry.len();
        let mut inner = self.inner.lock();
        if inner.panel != Panel::Commands {
            return None;
        }
        inner.selected_command = (inner.selected_command + 1) % count;
        inner.last_interaction = Instant::now();
        Some(inner.selected_command)
    }

    /// Move the selection up. Returns the new index, or `None` off the Commands panel.
    pub fn select_prev_command(&self) -> Option<usize> {
        let count = self.registry.len();
        let mut inner = self.inner.lock();
        if inner.panel != Panel::Commands {
            return None;
        }
        inner.selected_command = (inner.selected_command + count - 1) % count;
        inner.last_interaction = Instant::now();
        Some(inner.selected_command)
    }

    /// Hand out the selected entry for execution by the caller.
    pub fn trigger_selected_command(&self) -> Option<CommandEntry> {
        let index = {
            let mut inner = self.inner.lock();
            if inner.panel != Panel::Commands {
                return None;
            }
            inner.last_interaction = Instant::now();
            inner.selected_command
        };
        self.registry.get(index).cloned()
    }

    /// Idle-driven advance, called once per render tick.
    ///
    /// Advances at most one panel and restarts the idle clock at `now`. Never
    /// leaves the Commands panel.
    pub fn maybe_auto_advance(&self, now: Instant, idle_threshold: Duration) -> Option<PanelChange> {
        let mut inner = self.inner.lock();
        if !inner.auto_advance_enabled || inner.panel == Panel::Commands {
            return None;
        }
        if now.saturating_duration_since(inner.last_interaction) <= idle_threshold {
            return None;
        }
        let from = inner.panel;
        inner.panel = from.next();
        inner.last_interaction = now;
        Some(PanelChange {
            from,
            to: inner.panel,
        })
    }

    pub fn set_auto_advance(&self, enabled: bool) {
        self.inner.lock().auto_advance_enabled = enabled;
    }

    /// Flip auto-advance and return the new setting.
    pub fn toggle_auto_advance(&self) -> bool {
        let mut inner = self.inner.lock();
        inner.auto_advance_enabled = !inner.auto_advance_enabled;
        inner.auto_advance_enabled
    }

    #[must_use]
    pub fn snapshot(&self) -> PanelSnapshot {
        let inner = self.inner.lock();
        PanelSnapshot {
            panel: inner.panel,
            selected_command: inner.selected_command,
            last_interaction: inner.last_interaction,
            auto_advance_enabled: inner.auto_advance_enabled,
        }
    }
}
