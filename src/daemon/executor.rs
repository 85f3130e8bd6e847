//! Command executor thread and the overlay it publishes to the render loop.
//!
//! Actions run here, never on a button thread and never under the navigation
//! lock. While an action runs the render loop shows "Executing..."; a failure
//! stays on screen until its deadline passes.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded, select, unbounded};
use parking_lot::Mutex;

use crate::core::errors::{Result, StbError};
use crate::daemon::render::RenderWaker;
use crate::display::panels::Overlay;
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};
use crate::nav::commands::CommandEntry;

/// Pending triggers beyond the one currently running.
pub const QUEUE_CAPACITY: usize = 2;

#[derive(Debug, Clone)]
struct ActiveOverlay {
    overlay: Overlay,
    until: Option<Instant>,
}

/// Shared overlay slot. `None` means render the normal panel.
#[derive(Debug, Default)]
pub struct CommandStatus {
    slot: Mutex<Option<ActiveOverlay>>,
}

impl CommandStatus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overlay to show at `now`. Expired failures are cleared here.
    pub fn current(&self, now: Instant) -> Option<Overlay> {
        let mut slot = self.slot.lock();
        if slot
            .as_ref()
            .and_then(|a| a.until)
            .is_some_and(|until| now >= until)
        {
            *slot = None;
        }
        slot.as_ref().map(|a| a.overlay.clone())
    }

    pub fn set_executing(&self, label: &str) {
        *self.slot.lock() = Some(ActiveOverlay {
            overlay: Overlay::Executing {
                label: label.to_string(),
            },
            until: None,
        });
    }

    pub fn set_failed(&self, message: String, until: Instant) {
        *self.slot.lock() = Some(ActiveOverlay {
            overlay: Overlay::Failed { message },
            until: Some(until),
        });
    }

    pub fn clear(&self) {
        *self.slot.lock() = None;
    }
}

/// Non-blocking front end to the executor thread.
///
/// Stop requests travel on their own unbounded channel so a full trigger
/// queue can never hold them back.
#[derive(Clone)]
pub struct ExecutorHandle {
    work: Sender<CommandEntry>,
    control: Sender<()>,
    stopping: Arc<AtomicBool>,
    logger: ActivityLoggerHandle,
}

impl ExecutorHandle {
    /// Queue `entry`. Returns `false` if the queue is full, or the executor is
    /// stopping, and the trigger was dropped.
    pub fn submit(&self, entry: CommandEntry) -> bool {
        if self.stopping.load(Ordering::Acquire) {
            discard(&entry, &self.logger);
            return false;
        }
        match self.work.try_send(entry) {
            Ok(()) => true,
            Err(TrySendError::Full(entry)) => {
                eprintln!(
                    "[STB-EXEC] queue full, dropping trigger for {}",
                    entry.label()
                );
                self.logger.send(ActivityEvent::CommandDropped {
                    label: entry.label().to_string(),
                });
                false
            }
            Err(_) => false,
        }
    }

    /// Ask the executor to exit after whatever is running now. Queued
    /// triggers are discarded, not run.
    ///
    /// # Errors
    /// `ChannelClosed` if the executor thread has already exited.
    pub fn stop(&self) -> Result<()> {
        self.stopping.store(true, Ordering::Release);
        self.control
            .send(())
            .map_err(|_| StbError::ChannelClosed {
                component: "executor",
            })
    }
}

pub fn spawn_executor(
    status: Arc<CommandStatus>,
    error_display: Duration,
    waker: RenderWaker,
    logger: ActivityLoggerHandle,
) -> Result<(ExecutorHandle, thread::JoinHandle<()>)> {
    let (work, work_rx) = bounded(QUEUE_CAPACITY);
    let (control, control_rx) = unbounded();
    let stopping = Arc::new(AtomicBool::new(false));
    let inbox = Inbox {
        work: work_rx,
        control: control_rx,
        stopping: Arc::clone(&stopping),
    };
    let thread_logger = logger.clone();
    let join = thread::Builder::new()
        .name("stb-exec".to_string())
        .spawn(move || executor_main(&inbox, &status, error_display, &waker, &thread_logger))
        .map_err(|e| StbError::Runtime {
            details: format!("failed to spawn executor thread: {e}"),
        })?;
    Ok((
        ExecutorHandle {
            work,
            control,
            stopping,
            logger,
        },
        join,
    ))
}

/// Receiving side of an [`ExecutorHandle`].
struct Inbox {
    work: Receiver<CommandEntry>,
    control: Receiver<()>,
    stopping: Arc<AtomicBool>,
}

fn executor_main(
    inbox: &Inbox,
    status: &CommandStatus,
    error_display: Duration,
    waker: &RenderWaker,
    logger: &ActivityLoggerHandle,
) {
    loop {
        select! {
            recv(inbox.control) -> _ => break,
            recv(inbox.work) -> msg => match msg {
                Ok(entry) if !inbox.stopping.load(Ordering::Acquire) => {
                    run_one(&entry, status, error_display, waker, logger);
                }
                Ok(entry) => {
                    discard(&entry, logger);
                    break;
                }
                Err(_) => break,
            },
        }
    }
    for entry in inbox.work.try_iter() {
        discard(&entry, logger);
    }
}

fn discard(entry: &CommandEntry, logger: &ActivityLoggerHandle) {
    eprintln!("[STB-EXEC] stopping, discarding trigger for {}", entry.label());
    logger.send(ActivityEvent::CommandDropped {
        label: entry.label().to_string(),
    });
}

/// Execute one entry and publish its overlay transitions.
pub fn run_one(
    entry: &CommandEntry,
    status: &CommandStatus,
    error_display: Duration,
    waker: &RenderWaker,
    logger: &ActivityLoggerHandle,
) {
    eprintln!("[STB-EXEC] executing {}", entry.label());
    status.set_executing(entry.label());
    waker.wake();

    let started = Instant::now();
    let result = entry.execute();
    #[allow(clippy::cast_possible_truncation)]
    let duration_ms = started.elapsed().as_millis() as u64;

    match result {
        Ok(()) => {
            status.clear();
            logger.send(ActivityEvent::CommandCompleted {
                label: entry.label().to_string(),
                duration_ms,
            });
        }
        Err(e) => {
            eprintln!("[STB-EXEC] {e}");
            status.set_failed(failure_message(&e), Instant::now() + error_display);
            logger.send(ActivityEvent::CommandFailed {
                label: entry.label().to_string(),
                error_code: e.code().to_string(),
                message: e.to_string(),
                duration_ms,
            });
        }
    }
    waker.wake();
}

/// Short text for the panel; the full error goes to the log.
fn failure_message(err: &StbError) -> String {
    match err {
        StbError::CommandFailed { details, .. } => details.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daemon::render::wake_channel;
    use crate::nav::commands::CommandAction;

    #[test]
    fn status_starts_empty() {
        assert!(CommandStatus::new().current(Instant::now()).is_none());
    }

    #[test]
    fn failure_overlay_expires() {
        let status = CommandStatus::new();
        let now = Instant::now();
        status.set_failed("boom".to_string(), now + Duration::from_secs(3));
        assert_eq!(
            status.current(now + Duration::from_secs(2)),
            Some(Overlay::Failed {
                message: "boom".to_string()
            })
        );
        assert!(status.current(now + Duration::from_secs(3)).is_none());
        // stays cleared
        assert!(status.current(now).is_none());
    }

    #[test]
    fn executing_overlay_has_no_deadline() {
        let status = CommandStatus::new();
        status.set_executing("Restart");
        let later = Instant::now() + Duration::from_secs(3600);
        assert_eq!(
            status.current(later),
            Some(Overlay::Executing {
                label: "Restart".to_string()
            })
        );
    }

    #[test]
    fn run_one_success_clears_overlay() {
        let status = CommandStatus::new();
        let (waker, wakes) = wake_channel();
        let entry = CommandEntry::new("ok", CommandAction::callable(|| Ok(())));
        run_one(
            &entry,
            &status,
            Duration::from_secs(3),
            &waker,
            &ActivityLoggerHandle::disconnected(),
        );
        assert!(status.current(Instant::now()).is_none());
        assert!(wakes.try_recv().is_ok());
    }

    #[test]
    fn run_one_failure_shows_message() {
        let status = CommandStatus::new();
        let (waker, _wakes) = wake_channel();
        let entry = CommandEntry::new(
            "Restart",
            CommandAction::callable(|| Err("permission denied".to_string())),
        );
        run_one(
            &entry,
            &status,
            Duration::from_secs(3),
            &waker,
            &ActivityLoggerHandle::disconnected(),
        );
        assert_eq!(
            status.current(Instant::now()),
            Some(Overlay::Failed {
                message: "permission denied".to_string()
            })
        );
    }

    #[test]
    fn overlay_visible_while_running() {
        let status = Arc::new(CommandStatus::new());
        let (waker, _wakes) = wake_channel();
        let (gate_tx, gate_rx) = bounded::<()>(0);
        let (handle, join) = spawn_executor(
            Arc::clone(&status),
            Duration::from_secs(3),
            waker,
            ActivityLoggerHandle::disconnected(),
        )
        .unwrap();

        let entry = CommandEntry::new(
            "Slow",
            CommandAction::callable(move || {
                let _ = gate_rx.recv();
                Ok(())
            }),
        );
        assert!(handle.submit(entry));

        let deadline = Instant::now() + Duration::from_secs(5);
        while status.current(Instant::now()).is_none() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(
            status.current(Instant::now()),
            Some(Overlay::Executing {
                label: "Slow".to_string()
            })
        );

        gate_tx.send(()).unwrap();
        handle.stop().unwrap();
        join.join().unwrap();
        assert!(status.current(Instant::now()).is_none());
    }

    #[test]
    fn excess_triggers_are_dropped() {
        let status = Arc::new(CommandStatus::new());
        let (waker, _wakes) = wake_channel();
        let (gate_tx, gate_rx) = bounded::<()>(0);
        let gate_rx = Arc::new(gate_rx);
        let (handle, join) = spawn_executor(
            Arc::clone(&status),
            Duration::from_secs(3),
            waker,
            ActivityLoggerHandle::disconnected(),
        )
        .unwrap();

        let blocking = |label: &str| {
            let rx = Arc::clone(&gate_rx);
            CommandEntry::new(
                label,
                CommandAction::callable(move || {
                    let _ = rx.recv();
                    Ok(())
                }),
            )
        };

        assert!(handle.submit(blocking("first")));
        // wait until the executor has taken "first" off the queue
        let deadline = Instant::now() + Duration::from_secs(5);
        while status.current(Instant::now()).is_none() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        let accepted = (0..QUEUE_CAPACITY + 2)
            .filter(|i| handle.submit(blocking(&format!("queued-{i}"))))
            .count();
        assert_eq!(accepted, QUEUE_CAPACITY);

        for _ in 0..=QUEUE_CAPACITY {
            gate_tx.send(()).unwrap();
        }
        handle.stop().unwrap();
        join.join().unwrap();
    }

    #[test]
    fn stop_discards_queued_triggers_behind_a_full_queue() {
        let status = Arc::new(CommandStatus::new());
        let (waker, _wakes) = wake_channel();
        let (gate_tx, gate_rx) = bounded::<()>(0);
        let ran = Arc::new(Mutex::new(Vec::new()));
        let (handle, join) = spawn_executor(
            Arc::clone(&status),
            Duration::from_secs(3),
            waker,
            ActivityLoggerHandle::disconnected(),
        )
        .unwrap();

        let recording = |label: &str| {
            let ran = Arc::clone(&ran);
            let name = label.to_string();
            CommandEntry::new(
                label,
                CommandAction::callable(move || {
                    ran.lock().push(name.clone());
                    Ok(())
                }),
            )
        };

        assert!(handle.submit(CommandEntry::new(
            "first",
            CommandAction::callable(move || {
                let _ = gate_rx.recv();
                Ok(())
            }),
        )));
        let deadline = Instant::now() + Duration::from_secs(5);
        while status.current(Instant::now()).is_none() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(handle.submit(recording("q1")));
        assert!(handle.submit(recording("q2")));

        let asked = Instant::now();
        handle.stop().unwrap();
        assert!(asked.elapsed() < Duration::from_millis(500));
        assert!(!handle.submit(recording("late")));

        gate_tx.send(()).unwrap();
        join.join().unwrap();
        assert!(ran.lock().is_empty());
        assert!(matches!(
            handle.stop(),
            Err(StbError::ChannelClosed { component: "executor" })
        ));
    }
}
