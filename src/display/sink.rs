//! Display sink: where finished frames go, and the startup probe that finds one.

#![allow(missing_docs)]

use std::path::Path;

use embedded_hal::i2c::{Error as _, I2c};

use crate::core::errors::{Result, StbError};
use crate::display::frame::Frame;
use crate::display::ssd1306::Ssd1306;

/// Accepts complete frames. Implementations own the underlying bus.
pub trait FrameSink: Send {
    fn show(&mut self, frame: &Frame) -> Result<()>;
    fn clear(&mut self) -> Result<()>;
}

impl<I2C> FrameSink for Ssd1306<I2C>
where
    I2C: I2c + Send,
{
    fn show(&mut self, frame: &Frame) -> Result<()> {
        self.flush(frame).map_err(bus_error)
    }

    fn clear(&mut self) -> Result<()> {
        Ssd1306::clear(self).map_err(bus_error)
    }
}

fn bus_error<E: embedded_hal::i2c::Error>(e: E) -> StbError {
    StbError::DisplayBus {
        details: format!("{:?}", e.kind()),
    }
}

fn format_addresses(addresses: &[u8]) -> String {
    addresses
        .iter()
        .map(|a| format!("0x{a:02x}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Probe `addresses` in order and return the first controller that accepts
/// the init sequence. The display is blank on success.
pub fn open<I2C: I2c>(mut i2c: I2C, bus: &Path, addresses: &[u8]) -> Result<Ssd1306<I2C>> {
    let mut last = String::from("no candidate addresses configured");
    for &address in addresses {
        let mut driver = Ssd1306::new(i2c, address);
        match driver.init().and_then(|()| driver.clear()) {
            Ok(()) => {
                eprintln!(
                    "[STB-DISPLAY] ssd1306 ready on {} at 0x{address:02x}",
                    bus.display()
                );
                return Ok(driver);
            }
            Err(e) => {
                eprintln!(
                    "[STB-DISPLAY] no display at 0x{address:02x} on {}: {:?}",
                    bus.display(),
                    e.kind()
                );
                last = format!("0x{address:02x}: {:?}", e.kind());
                i2c = driver.release();
            }
        }
    }
    Err(StbError::DisplayInit {
        bus: bus.to_path_buf(),
        tried: format_addresses(addresses),
        details: last,
    })
}

/// Open the Linux I2C character device named in config and probe it.
#[cfg(feature = "hardware")]
pub fn open_i2cdev(
    config: &crate::core::config::DisplayConfig,
) -> Result<Ssd1306<linux_embedded_hal::I2cdev>> {
    let dev = linux_embedded_hal::I2cdev::new(&config.i2c_bus).map_err(|e| {
        StbError::DisplayInit {
            bus: config.i2c_bus.clone(),
            tried: format_addresses(&config.addresses),
            details: e.to_string(),
        }
    })?;
    open(dev, &config.i2c_bus, &config.addresses)
}

/// Owns the sink for the life of the daemon and blanks the panel when dropped,
/// including during unwinding.
pub struct DisplayGuard {
    sink: Box<dyn FrameSink>,
    cleared: bool,
}

impl DisplayGuard {
    #[must_use]
    pub fn new(sink: Box<dyn FrameSink>) -> Self {
        Self {
            sink,
            cleared: false,
        }
    }

    pub fn show(&mut self, frame: &Frame) -> Result<()> {
        self.cleared = false;
        self.sink.show(frame)
    }

    /// Blank the panel now and report the outcome; drop will not retry.
    pub fn release(mut self) -> Result<()> {
        self.cleared = true;
        self.sink.clear()
    }
}

impl Drop for DisplayGuard {
    fn drop(&mut self) {
        if self.cleared {
            return;
        }
        if let Err(e) = self.sink.clear() {
            eprintln!("[STB-DISPLAY] clear on drop failed: {e}");
        }
    }
}
