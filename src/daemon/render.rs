//! Render loop and display flusher.
//!
//! The render loop composes one screen per tick and hands the finished frame
//! to the flusher thread, which owns the display. The hand-off waits at most
//! `submit_timeout`; a busy flusher costs one frame, never a late tick.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, SendTimeoutError, Sender, bounded};

use crate::core::errors::{Result, StbError};
use crate::daemon::executor::CommandStatus;
use crate::display::frame::Frame;
use crate::display::panels::{Screen, compose_overlay, compose_panel, render_frame};
use crate::display::sink::DisplayGuard;
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle, ChangeCause};
use crate::nav::state::{NavigationState, Panel};
use crate::telemetry::TelemetrySource;

/// Wakes the render loop ahead of its next tick. Coalesces: one pending wake at most.
#[derive(Clone)]
pub struct RenderWaker {
    tx: Sender<()>,
}

impl RenderWaker {
    pub fn wake(&self) {
        let _ = self.tx.try_send(());
    }
}

pub fn wake_channel() -> (RenderWaker, Receiver<()>) {
    let (tx, rx) = bounded(1);
    (RenderWaker { tx }, rx)
}

/// What the frame hand-off did this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Submitted,
    /// Flusher still busy after the submit timeout.
    Dropped,
    /// Flusher is gone.
    Closed,
}

/// Result of one tick, for logging and tests.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub panel: Panel,
    pub auto_advanced: bool,
    pub overlay: bool,
    pub screen: Screen,
    pub delivery: Delivery,
}

pub struct RenderLoop {
    nav: Arc<NavigationState>,
    telemetry: Arc<dyn TelemetrySource>,
    status: Arc<CommandStatus>,
    frames: Sender<Frame>,
    submit_timeout: Duration,
    auto_advance_threshold: Duration,
    interval: Duration,
    logger: ActivityLoggerHandle,
}

pub struct RenderLoopParts {
    pub nav: Arc<NavigationState>,
    pub telemetry: Arc<dyn TelemetrySource>,
    pub status: Arc<CommandStatus>,
    pub frames: Sender<Frame>,
    pub submit_timeout: Duration,
    pub auto_advance_threshold: Duration,
    pub interval: Duration,
    pub logger: ActivityLoggerHandle,
}

impl RenderLoop {
    #[must_use]
    pub fn new(parts: RenderLoopParts) -> Self {
        Self {
            nav: parts.nav,
            telemetry: parts.telemetry,
            status: parts.status,
            frames: parts.frames,
            submit_timeout: parts.submit_timeout,
            auto_advance_threshold: parts.auto_advance_threshold,
            interval: parts.interval,
            logger: parts.logger,
        }
    }

    /// One pass: auto-advance, snapshot, compose, submit.
    pub fn tick(&self, now: Instant) -> TickReport {
        let advanced = self.nav.maybe_auto_advance(now, self.auto_advance_threshold);
        if let Some(change) = advanced {
            eprintln!("[STB-RENDER] auto-advance {} -> {}", change.from, change.to);
            self.logger.send(ActivityEvent::PanelChanged {
                from: change.from,
                to: change.to,
                cause: ChangeCause::Auto,
            });
        }

        let snapshot = self.nav.snapshot();
        let overlay = self.status.current(now);
        let screen = match &overlay {
            Some(o) => compose_overlay(o),
            None => compose_panel(&snapshot, self.nav.registry(), self.telemetry.as_ref()),
        };

        let delivery = self.submit(render_frame(&screen));
        TickReport {
            panel: snapshot.panel,
            auto_advanced: advanced.is_some(),
            overlay: overlay.is_some(),
            screen,
            delivery,
        }
    }

    fn submit(&self, frame: Frame) -> Delivery {
        match self.frames.send_timeout(frame, self.submit_timeout) {
            Ok(()) => Delivery::Submitted,
            Err(SendTimeoutError::Timeout(_)) => {
                eprintln!("[STB-RENDER] display busy, frame dropped");
                self.logger.send(ActivityEvent::FrameDropped {
                    reason: format!(
                        "flusher busy after {}ms",
                        self.submit_timeout.as_millis()
                    ),
                });
                Delivery::Dropped
            }
            Err(SendTimeoutError::Disconnected(_)) => Delivery::Closed,
        }
    }

    /// Tick until `shutdown` is raised. Wakes early on input.
    pub fn run(&self, shutdown: &AtomicBool, wake: &Receiver<()>) {
        while !shutdown.load(Ordering::Relaxed) {
            let started = Instant::now();
            if self.tick(started).delivery == Delivery::Closed {
                eprintln!("[STB-RENDER] display flusher gone, stopping render loop");
                break;
            }
            let remaining = self.interval.saturating_sub(started.elapsed());
            match wake.recv_timeout(remaining) {
                Ok(()) | Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => thread::sleep(remaining),
            }
        }
    }
}

/// Rendezvous channel between the render loop and the flusher.
pub fn frame_channel() -> (Sender<Frame>, Receiver<Frame>) {
    bounded(0)
}

/// Spawn the thread that owns the display.
///
/// It exits once every frame sender is dropped, blanking the panel on the
/// way out. Bus errors are logged and the next frame is tried.
pub fn spawn_flusher(
    guard: DisplayGuard,
    frames: Receiver<Frame>,
    logger: ActivityLoggerHandle,
) -> Result<thread::JoinHandle<bool>> {
    thread::Builder::new()
        .name("stb-flusher".to_string())
        .spawn(move || flusher_main(guard, &frames, &logger))
        .map_err(|e| StbError::Runtime {
            details: format!("failed to spawn display flusher: {e}"),
        })
}

fn flusher_main(
    mut guard: DisplayGuard,
    frames: &Receiver<Frame>,
    logger: &ActivityLoggerHandle,
) -> bool {
    let mut consecutive_failures: u32 = 0;
    while let Ok(frame) = frames.recv() {
        match guard.show(&frame) {
            Ok(()) => consecutive_failures = 0,
            Err(e) => {
                consecutive_failures += 1;
                // one log line per outage, not per frame
                if consecutive_failures == 1 {
                    eprintln!("[STB-DISPLAY] frame write failed: {e}");
                    logger.send(ActivityEvent::error(&e));
                }
            }
        }
    }
    match guard.release() {
        Ok(()) => true,
        Err(e) => {
            eprintln!("[STB-DISPLAY] final clear failed: {e}");
            false
        }
    }
}
