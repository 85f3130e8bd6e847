//! Signal handling: SIGTERM/SIGINT graceful shutdown and SIGUSR1 auto-advance
//! toggle, plus the ordered shutdown sequence.
//!
//! Uses `signal-hook` flag registration. The main thread polls `SignalHandler`
//! instead of blocking on signals.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use signal_hook::consts::{SIGINT, SIGTERM};

/// Signal state shared between the OS handlers and the daemon threads.
#[derive(Clone)]
pub struct SignalHandler {
    shutdown_flag: Arc<AtomicBool>,
    toggle_flag: Arc<AtomicBool>,
}

impl SignalHandler {
    /// Create a handler and register OS hooks. Registration failures are
    /// logged and otherwise ignored.
    pub fn new() -> Self {
        let handler = Self::unregistered();
        handler.register_signals();
        handler
    }

    /// Flags only, no OS hooks.
    pub fn unregistered() -> Self {
        Self {
            shutdown_flag: Arc::new(AtomicBool::new(false)),
            toggle_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn should_shutdown(&self) -> bool {
        self.shutdown_flag.load(Ordering::Relaxed)
    }

    /// Check and clear a pending auto-advance toggle.
    pub fn take_toggle_request(&self) -> bool {
        self.toggle_flag.swap(false, Ordering::Relaxed)
    }

    pub fn request_shutdown(&self) {
        self.shutdown_flag.store(true, Ordering::Relaxed);
    }

    pub fn request_toggle(&self) {
        self.toggle_flag.store(true, Ordering::Relaxed);
    }

    /// Shared shutdown flag for worker threads that poll it.
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown_flag)
    }

    fn register_signals(&self) {
        if let Err(e) = signal_hook::flag::register(SIGTERM, Arc::clone(&self.shutdown_flag)) {
            eprintln!("[STB-SIGNAL] failed to register SIGTERM: {e}");
        }
        if let Err(e) = signal_hook::flag::register(SIGINT, Arc::clone(&self.shutdown_flag)) {
            eprintln!("[STB-SIGNAL] failed to register SIGINT: {e}");
        }

        #[cfg(unix)]
        {
            use signal_hook::consts::SIGUSR1;
            if let Err(e) = signal_hook::flag::register(SIGUSR1, Arc::clone(&self.toggle_flag)) {
                eprintln!("[STB-SIGNAL] failed to register SIGUSR1: {e}");
            }
        }
    }
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// A named step of the shutdown sequence. Returns `true` on success.
pub type ShutdownTask<'a> = (&'a str, Box<dyn FnOnce() -> bool + 'a>);

/// Runs shutdown steps in order, abandoning the rest once `timeout` passes.
pub struct ShutdownCoordinator {
    pub timeout: Duration,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(10),
        }
    }

    /// Returns `true` only if every step ran and succeeded within the timeout.
    pub fn execute(&self, tasks: Vec<ShutdownTask<'_>>) -> bool {
        let start = Instant::now();
        let mut all_ok = true;

        for (name, task) in tasks {
            if start.elapsed() > self.timeout {
                eprintln!("[STB-SHUTDOWN] timeout reached, abandoning {name} and later steps");
                return false;
            }
            if task() {
                eprintln!("[STB-SHUTDOWN] {name}: ok");
            } else {
                eprintln!("[STB-SHUTDOWN] {name}: failed");
                all_ok = false;
            }
        }

        all_ok
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
