//! GPIO character-device backend: one polling thread per button line.
//!
//! Button pins are BCM numbers used directly as line offsets on
//! `buttons.gpio_chip`, so they do not depend on where the kernel places the
//! chip in the legacy sysfs number space. Lines are requested as falling-edge
//! inputs. The v1 character-device ABI carries no bias flags; the bonnet has
//! pull-ups, or set `gpio=5,6,27,23,4=ip,pu` in config.txt.

#![allow(missing_docs)]

use std::os::fd::AsFd;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Instant;

use linux_embedded_hal::gpio_cdev::{
    self, Chip, EventRequestFlags, LineEventHandle, LineRequestFlags,
};
use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};

use crate::core::config::ButtonsConfig;
use crate::core::errors::{Result, StbError};
use crate::input::InputSource;
use crate::input::buttons::{Button, InputDispatcher};
use crate::input::debounce::Debouncer;
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};

/// Label the kernel shows for our lines in `gpioinfo`.
const CONSUMER: &str = "statusboard";

/// Request falling-edge events for BCM `pin` on `chip_path`.
fn request(chip_path: &Path, pin: u64) -> Result<LineEventHandle> {
    let fail = |details: String| StbError::Gpio { pin, details };
    let offset = u32::try_from(pin).map_err(|_| fail("not a line offset".to_string()))?;
    let mut chip = Chip::new(chip_path)
        .map_err(|e: gpio_cdev::Error| fail(format!("{}: {e}", chip_path.display())))?;
    let line = chip
        .get_line(offset)
        .map_err(|e| fail(format!("line {offset} on {}: {e}", chip_path.display())))?;
    line.events(
        LineRequestFlags::INPUT,
        EventRequestFlags::FALLING_EDGE,
        CONSUMER,
    )
    .map_err(|e| fail(e.to_string()))
}

/// Request every button line, then start the polling threads.
///
/// All-or-nothing: if any line fails, the handles already taken are dropped,
/// which releases their lines, and the error is returned for the caller to
/// degrade on.
pub fn start(
    config: &ButtonsConfig,
    dispatcher: &Arc<InputDispatcher>,
    shutdown: &Arc<AtomicBool>,
    logger: &ActivityLoggerHandle,
) -> Result<InputSource> {
    let armed = Button::ALL
        .into_iter()
        .map(|button| request(&config.gpio_chip, button.pin(config)).map(|events| (button, events)))
        .collect::<Result<Vec<_>>>()?;

    let timeout = PollTimeout::try_from(config.poll_timeout_ms).unwrap_or(PollTimeout::MAX);
    let mut threads = Vec::with_capacity(armed.len());
    for (button, events) in armed {
        let dispatcher = Arc::clone(dispatcher);
        let shutdown = Arc::clone(shutdown);
        let logger = logger.clone();
        let debouncer = Debouncer::new(config.debounce());
        let handle = thread::Builder::new()
            .name(format!("stb-btn-{button}"))
            .spawn(move || {
                watch_line(
                    button,
                    events,
                    debouncer,
                    timeout,
                    &dispatcher,
                    &shutdown,
                    &logger,
                );
            })
            .map_err(|e| StbError::Runtime {
                details: format!("failed to spawn input thread for {button}: {e}"),
            })?;
        threads.push(handle);
    }
    eprintln!(
        "[STB-INPUT] {} buttons armed on {}",
        threads.len(),
        config.gpio_chip.display()
    );
    Ok(InputSource::from_threads(threads))
}

/// Wait up to `timeout` for the line's event fd to become readable.
fn wait_readable(events: &LineEventHandle, timeout: PollTimeout) -> nix::Result<bool> {
    let mut fds = [PollFd::new(events.file().as_fd(), PollFlags::POLLIN)];
    match poll(&mut fds, timeout) {
        Ok(ready) => Ok(ready > 0),
        Err(Errno::EINTR) => Ok(false),
        Err(e) => Err(e),
    }
}

#[allow(clippy::needless_pass_by_value)]
fn watch_line(
    button: Button,
    mut events: LineEventHandle,
    mut debouncer: Debouncer,
    timeout: PollTimeout,
    dispatcher: &InputDispatcher,
    shutdown: &AtomicBool,
    logger: &ActivityLoggerHandle,
) {
    let offset = events.line().offset();
    while !shutdown.load(Ordering::Relaxed) {
        let pressed = match wait_readable(&events, timeout) {
            Ok(false) => continue,
            Ok(true) => events.get_event().map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        match pressed {
            Ok(_) => {
                if debouncer.accept(Instant::now()) {
                    dispatcher.dispatch(button);
                }
            }
            Err(e) => {
                eprintln!("[STB-INPUT] {button} button stopped: {e}");
                logger.send(ActivityEvent::InputDegraded {
                    details: format!("{button} (line {offset}): {e}"),
                });
                break;
            }
        }
    }
}
