//! Button identities and the event-to-operation dispatch table.

#![allow(missing_docs)]

use std::fmt;
use std::sync::Arc;

use crate::core::config::ButtonsConfig;
use crate::daemon::executor::ExecutorHandle;
use crate::daemon::render::RenderWaker;
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle, ChangeCause};
use crate::nav::state::{NavigationState, PanelChange};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    Up,
    Down,
    Left,
    Right,
    Center,
}

impl Button {
    pub const ALL: [Self; 5] = [Self::Up, Self::Down, Self::Left, Self::Right, Self::Center];

    /// BCM pin number wired to this button.
    #[must_use]
    pub const fn pin(self, config: &ButtonsConfig) -> u64 {
        match self {
            Self::Up => config.up,
            Self::Down => config.down,
            Self::Left => config.left,
            Self::Right => config.right,
            Self::Center => config.center,
        }
    }
}

impl fmt::Display for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Left => "left",
            Self::Right => "right",
            Self::Center => "center",
        };
        f.write_str(name)
    }
}

/// What a button press did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputOutcome {
    PanelMoved(PanelChange),
    Selected(usize),
    /// Entry handed to the executor; `queued` is false if it was dropped.
    Triggered { label: String, queued: bool },
    /// Selection or trigger pressed away from the Commands panel.
    Ignored,
}

/// Maps accepted button edges onto navigation operations.
///
/// Shared by every input thread; holds no lock of its own.
pub struct InputDispatcher {
    nav: Arc<NavigationState>,
    executor: ExecutorHandle,
    waker: RenderWaker,
    logger: ActivityLoggerHandle,
}

impl InputDispatcher {
    #[must_use]
    pub fn new(
        nav: Arc<NavigationState>,
        executor: ExecutorHandle,
        waker: RenderWaker,
        logger: ActivityLoggerHandle,
    ) -> Self {
        Self {
            nav,
            executor,
            waker,
            logger,
        }
    }

    pub fn dispatch(&self, button: Button) -> InputOutcome {
        let outcome = match button {
            Button::Left => self.panel_moved(self.nav.retreat_panel()),
            Button::Right => self.panel_moved(self.nav.advance_panel()),
            Button::Up => self.selected(self.nav.select_prev_command()),
            Button::Down => self.selected(self.nav.select_next_command()),
            Button::Center => match self.nav.trigger_selected_command() {
                Some(entry) => {
                    let label = entry.label().to_string();
                    eprintln!("[STB-INPUT] trigger {label}");
                    self.logger.send(ActivityEvent::CommandTriggered {
                        label: label.clone(),
                    });
                    let queued = self.executor.submit(entry);
                    InputOutcome::Triggered { label, queued }
                }
                None => InputOutcome::Ignored,
            },
        };
        if outcome != InputOutcome::Ignored {
            self.waker.wake();
        }
        outcome
    }

    fn panel_moved(&self, change: PanelChange) -> InputOutcome {
        eprintln!("[STB-INPUT] panel {} -> {}", change.from, change.to);
        self.logger.send(ActivityEvent::PanelChanged {
            from: change.from,
            to: change.to,
            cause: ChangeCause::Button,
        });
        InputOutcome::PanelMoved(change)
    }

    fn selected(&self, index: Option<usize>) -> InputOutcome {
        let Some(index) = index else {
            return InputOutcome::Ignored;
        };
        let label = self
            .nav
            .registry()
            .get(index)
            .map(|e| e.label().to_string())
            .unwrap_or_default();
        eprintln!("[STB-INPUT] selected command {index} ({label})");
        self.logger
            .send(ActivityEvent::CommandSelected { index, label });
        InputOutcome::Selected(index)
    }
}
