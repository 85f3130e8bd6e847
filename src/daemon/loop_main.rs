//! Daemon orchestration: thread startup, the signal-polling main loop, and the
//! ordered shutdown.
//!
//! Threads, all talking over bounded crossbeam channels:
//! - **Main**: polls `SignalHandler` (shutdown, auto-advance toggle)
//! - **Render loop**: ticks at the render interval, composes frames
//! - **Flusher**: owns the display, writes frames handed over by the render loop
//! - **Executor**: runs menu commands outside the navigation lock
//! - **Input**: one thread per button pin (possibly none)
//! - **Logger**: writes the JSONL activity log

#![allow(missing_docs)]

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::core::config::Config;
use crate::core::errors::{Result, StbError};
use crate::daemon::executor::{CommandStatus, ExecutorHandle, spawn_executor};
use crate::daemon::render::{
    RenderLoop, RenderLoopParts, RenderWaker, frame_channel, spawn_flusher, wake_channel,
};
use crate::daemon::signals::{ShutdownCoordinator, ShutdownTask, SignalHandler};
use crate::display::sink::{DisplayGuard, FrameSink};
use crate::input::InputSource;
use crate::input::buttons::InputDispatcher;
use crate::logger::activity::{
    ActivityEvent, ActivityLoggerConfig, ActivityLoggerHandle, spawn_logger,
};
use crate::nav::commands::CommandRegistry;
use crate::nav::state::NavigationState;
use crate::telemetry::TelemetrySource;

/// How often the main thread looks at the signal flags.
const SIGNAL_POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Upper bound on waiting for any single thread during shutdown.
const JOIN_TIMEOUT: Duration = Duration::from_secs(3);

/// Hardware the daemon renders to and reads from, already opened.
pub struct DaemonParts {
    pub sink: Box<dyn FrameSink>,
    /// Where the sink lives, for the startup log (e.g. `/dev/i2c-1`).
    pub display_bus: String,
    pub display_address: u8,
    pub telemetry: Arc<dyn TelemetrySource>,
}

/// A running statusboard: every worker thread started, display owned by the flusher.
pub struct StatusDaemon {
    signals: SignalHandler,
    logger: ActivityLoggerHandle,
    logger_join: JoinHandle<()>,
    nav: Arc<NavigationState>,
    waker: RenderWaker,
    dispatcher: Arc<InputDispatcher>,
    render_join: JoinHandle<()>,
    flusher_join: JoinHandle<bool>,
    executor: ExecutorHandle,
    executor_join: JoinHandle<()>,
    input: InputSource,
    start_time: Instant,
}

impl StatusDaemon {
    /// Start every thread. The sink must already be initialized.
    #[allow(clippy::too_many_lines)]
    pub fn start(config: Config, parts: DaemonParts, signals: SignalHandler) -> Result<Self> {
        let start_time = Instant::now();
        let registry = CommandRegistry::from_config(&config.commands)?;

        // 1. Logger first so startup is on record.
        let (logger, logger_join) = spawn_logger(ActivityLoggerConfig::from_paths(&config.paths))?;
        logger.send(ActivityEvent::DaemonStarted {
            version: env!("CARGO_PKG_VERSION").to_string(),
            config_hash: config.stable_hash().unwrap_or_default(),
        });
        logger.send(ActivityEvent::DisplayInitialized {
            bus: parts.display_bus.clone(),
            address: parts.display_address,
        });

        // 2. Shared state.
        let nav = Arc::new(NavigationState::new(registry, config.navigation.auto_advance));
        let status = Arc::new(CommandStatus::new());
        let (waker, wake_rx) = wake_channel();

        // 3. Flusher owns the display from here on.
        let (frame_tx, frame_rx) = frame_channel();
        let flusher_join = spawn_flusher(
            DisplayGuard::new(parts.sink),
            frame_rx,
            logger.clone(),
        )?;

        // 4. Executor.
        let (executor, executor_join) = spawn_executor(
            Arc::clone(&status),
            config.navigation.error_display(),
            waker.clone(),
            logger.clone(),
        )?;

        // 5. Render loop.
        let render = RenderLoop::new(RenderLoopParts {
            nav: Arc::clone(&nav),
            telemetry: parts.telemetry,
            status,
            frames: frame_tx,
            submit_timeout: Duration::from_millis(config.display.submit_timeout_ms),
            auto_advance_threshold: config.navigation.auto_advance_threshold(),
            interval: config.navigation.render_interval(),
            logger: logger.clone(),
        });
        let shutdown = signals.shutdown_flag();
        let render_join = thread::Builder::new()
            .name("stb-render".to_string())
            .spawn(move || render.run(&shutdown, &wake_rx))
            .map_err(|e| StbError::Runtime {
                details: format!("failed to spawn render loop: {e}"),
            })?;

        // 6. Buttons last: a press before the render loop exists would be lost.
        let dispatcher = Arc::new(InputDispatcher::new(
            Arc::clone(&nav),
            executor.clone(),
            waker.clone(),
            logger.clone(),
        ));
        let input = crate::input::start(
            &config.buttons,
            &dispatcher,
            &signals.shutdown_flag(),
            &logger,
        );

        eprintln!(
            "[STB-DAEMON] started: display {} at 0x{:02x}, {} commands, buttons {}",
            parts.display_bus,
            parts.display_address,
            nav.registry().len(),
            if input.is_active() { "armed" } else { "off" }
        );

        Ok(Self {
            signals,
            logger,
            logger_join,
            nav,
            waker,
            dispatcher,
            render_join,
            flusher_join,
            executor,
            executor_join,
            input,
            start_time,
        })
    }

    #[must_use]
    pub fn navigation(&self) -> Arc<NavigationState> {
        Arc::clone(&self.nav)
    }

    /// Entry point for button events that do not come from GPIO.
    #[must_use]
    pub fn dispatcher(&self) -> Arc<InputDispatcher> {
        Arc::clone(&self.dispatcher)
    }

    /// Poll signals until shutdown, then stop everything.
    ///
    /// Returns `true` if every shutdown step completed in time.
    pub fn run(self) -> bool {
        let reason = loop {
            if self.signals.should_shutdown() {
                eprintln!("[STB-DAEMON] shutdown requested");
                break "signal";
            }
            if self.signals.take_toggle_request() {
                let enabled = self.nav.toggle_auto_advance();
                eprintln!(
                    "[STB-SIGNAL] auto-advance {}",
                    if enabled { "enabled" } else { "disabled" }
                );
                self.logger
                    .send(ActivityEvent::AutoAdvanceToggled { enabled });
                self.waker.wake();
            }
            if self.render_join.is_finished() {
                eprintln!("[STB-DAEMON] render loop exited unexpectedly");
                break "render loop exited";
            }
            thread::sleep(SIGNAL_POLL_INTERVAL);
        };
        self.shutdown(reason)
    }

    fn shutdown(self, reason: &str) -> bool {
        let Self {
            signals,
            logger,
            logger_join,
            nav,
            waker,
            dispatcher,
            render_join,
            flusher_join,
            executor,
            executor_join,
            input,
            start_time,
        } = self;
        let uptime_secs = start_time.elapsed().as_secs();

        signals.request_shutdown();
        waker.wake();

        let stop_logger = logger.clone();
        let tasks: Vec<ShutdownTask<'_>> = vec![
            (
                "render loop",
                Box::new(move || join_within(render_join, JOIN_TIMEOUT).is_some()),
            ),
            ("buttons", Box::new(move || input.join())),
            (
                "executor",
                Box::new(move || {
                    if let Err(e) = executor.stop() {
                        eprintln!("[STB-SHUTDOWN] executor stop request failed: {e}");
                    }
                    drop(dispatcher);
                    join_within(executor_join, JOIN_TIMEOUT).is_some()
                }),
            ),
            (
                "display",
                Box::new(move || join_within(flusher_join, JOIN_TIMEOUT).unwrap_or(false)),
            ),
            (
                "logger",
                Box::new(move || {
                    stop_logger.send(ActivityEvent::DaemonStopped {
                        reason: reason.to_string(),
                        uptime_secs,
                    });
                    stop_logger.shutdown();
                    join_within(logger_join, JOIN_TIMEOUT).is_some()
                }),
            ),
        ];

        let clean = ShutdownCoordinator::new().execute(tasks);
        drop(nav);
        let dropped = logger.dropped_events();
        if dropped > 0 {
            eprintln!("[STB-DAEMON] {dropped} activity events were dropped");
        }
        eprintln!("[STB-DAEMON] shutdown complete (uptime={uptime_secs}s, clean={clean})");
        clean
    }
}

/// Join `handle` if it finishes within `limit`; otherwise leave it detached.
///
/// `None` means the thread timed out or panicked.
fn join_within<T>(handle: JoinHandle<T>, limit: Duration) -> Option<T> {
    let deadline = Instant::now() + limit;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            let name = handle.thread().name().unwrap_or("unnamed").to_string();
            eprintln!("[STB-SHUTDOWN] {name} did not stop within {}ms", limit.as_millis());
            return None;
        }
        thread::sleep(Duration::from_millis(10));
    }
    handle.join().ok()
}

/// Open the configured I2C display, then run until SIGINT/SIGTERM.
///
/// Display failure is fatal and happens before any thread starts.
#[cfg(feature = "hardware")]
pub fn run_on_hardware(config: Config) -> Result<bool> {
    let display = crate::display::sink::open_i2cdev(&config.display)?;
    let parts = DaemonParts {
        display_bus: config.display.i2c_bus.display().to_string(),
        display_address: display.address(),
        sink: Box::new(display),
        telemetry: Arc::new(crate::telemetry::LinuxTelemetry::new(
            config.telemetry.clone(),
        )),
    };
    let daemon = StatusDaemon::start(config, parts, SignalHandler::new())?;
    Ok(daemon.run())
}
