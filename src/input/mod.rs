//! Button input: debouncing, dispatch, and the GPIO backend.
//!
//! Input failure is never fatal. With buttons disabled, no GPIO support
//! compiled in, or pins that cannot be armed, the daemon runs with an input
//! source that never fires.

pub mod buttons;
pub mod debounce;
#[cfg(feature = "hardware")]
pub mod gpio;

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::thread::JoinHandle;

use crate::core::config::ButtonsConfig;
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};
use buttons::InputDispatcher;

/// Running input threads, possibly none.
#[derive(Debug, Default)]
pub struct InputSource {
    threads: Vec<JoinHandle<()>>,
}

impl InputSource {
    /// A source that never produces events.
    #[must_use]
    pub fn inert() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_threads(threads: Vec<JoinHandle<()>>) -> Self {
        Self { threads }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.threads.is_empty()
    }

    /// Wait for every input thread. Threads exit once the shutdown flag is up.
    pub fn join(self) -> bool {
        self.threads
            .into_iter()
            .map(JoinHandle::join)
            .fold(true, |ok, r| ok & r.is_ok())
    }
}

/// Start button input, degrading to [`InputSource::inert`] on any failure.
pub fn start(
    config: &ButtonsConfig,
    dispatcher: &Arc<InputDispatcher>,
    shutdown: &Arc<AtomicBool>,
    logger: &ActivityLoggerHandle,
) -> InputSource {
    if !config.enabled {
        eprintln!("[STB-INPUT] buttons disabled in config");
        return InputSource::inert();
    }
    start_backend(config, dispatcher, shutdown, logger)
}

#[cfg(feature = "hardware")]
fn start_backend(
    config: &ButtonsConfig,
    dispatcher: &Arc<InputDispatcher>,
    shutdown: &Arc<AtomicBool>,
    logger: &ActivityLoggerHandle,
) -> InputSource {
    match gpio::start(config, dispatcher, shutdown, logger) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("[STB-INPUT] GPIO unavailable, continuing without buttons: {e}");
            logger.send(ActivityEvent::InputDegraded {
                details: e.to_string(),
            });
            InputSource::inert()
        }
    }
}

#[cfg(not(feature = "hardware"))]
fn start_backend(
    _config: &ButtonsConfig,
    _dispatcher: &Arc<InputDispatcher>,
    _shutdown: &Arc<AtomicBool>,
    logger: &ActivityLoggerHandle,
) -> InputSource {
    eprintln!("[STB-INPUT] built without GPIO support, continuing without buttons");
    logger.send(ActivityEvent::InputDegraded {
        details: "built without the hardware feature".to_string(),
    });
    InputSource::inert()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use crate::daemon::executor::{CommandStatus, spawn_executor};
    use crate::daemon::render::wake_channel;
    use crate::nav::commands::CommandRegistry;
    use crate::nav::state::NavigationState;
    use std::time::Duration;

    #[test]
    fn disabled_buttons_give_inert_source() {
        let config = Config::default();
        let (waker, _rx) = wake_channel();
        let (executor, join) = spawn_executor(
            Arc::new(CommandStatus::new()),
            Duration::from_secs(3),
            waker.clone(),
            ActivityLoggerHandle::disconnected(),
        )
        .unwrap();
        let nav = Arc::new(NavigationState::new(
            CommandRegistry::from_config(&config.commands).unwrap(),
            true,
        ));
        let dispatcher = Arc::new(InputDispatcher::new(
            nav,
            executor.clone(),
            waker,
            ActivityLoggerHandle::disconnected(),
        ));
        let buttons = ButtonsConfig {
            enabled: false,
            ..config.buttons
        };
        let source = start(
            &buttons,
            &dispatcher,
            &Arc::new(AtomicBool::new(false)),
            &ActivityLoggerHandle::disconnected(),
        );
        assert!(!source.is_active());
        assert!(source.join());

        executor.stop().unwrap();
        join.join().unwrap();
    }

    #[test]
    fn inert_join_is_ok() {
        assert!(InputSource::inert().join());
    }
}
