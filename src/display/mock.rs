//! In-memory I2C bus and frame sink for dry runs and tests.
//!
//! Devices "present" at an address ACK every write; any other address returns
//! a NACK, which is how a missing display shows up on real hardware.

#![allow(missing_docs)]

use std::sync::Arc;

use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};
use parking_lot::Mutex;

use crate::core::errors::StbError;
use crate::display::frame::Frame;
use crate::display::sink::FrameSink;

#[derive(Debug, Default)]
struct BusState {
    devices: Vec<u8>,
    writes: Vec<(u8, Vec<u8>)>,
    fail_writes_after: Option<usize>,
}

/// Cloneable handle; clones share one bus.
#[derive(Debug, Clone, Default)]
pub struct MockI2c {
    state: Arc<Mutex<BusState>>,
}

impl MockI2c {
    #[must_use]
    pub fn with_devices(addresses: &[u8]) -> Self {
        let bus = Self::default();
        bus.state.lock().devices = addresses.to_vec();
        bus
    }

    /// Start failing every write once `n` writes have succeeded.
    pub fn fail_writes_after(&self, n: usize) {
        self.state.lock().fail_writes_after = Some(n);
    }

    #[must_use]
    pub fn writes(&self) -> Vec<(u8, Vec<u8>)> {
        self.state.lock().writes.clone()
    }

    /// Number of display-RAM page writes seen so far.
    #[must_use]
    pub fn data_write_count(&self) -> usize {
        self.state
            .lock()
            .writes
            .iter()
            .filter(|(_, bytes)| bytes.first() == Some(&0x40))
            .count()
    }

    /// True if the most recent eight data writes were all zero.
    #[must_use]
    pub fn last_frame_blank(&self) -> bool {
        let state = self.state.lock();
        let pages: Vec<&Vec<u8>> = state
            .writes
            .iter()
            .rev()
            .map(|(_, bytes)| bytes)
            .filter(|bytes| bytes.first() == Some(&0x40))
            .take(8)
            .collect();
        pages.len() == 8 && pages.iter().all(|p| p[1..].iter().all(|b| *b == 0))
    }
}

impl ErrorType for MockI2c {
    type Error = ErrorKind;
}

impl I2c for MockI2c {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut state = self.state.lock();
        if !state.devices.contains(&address) {
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }
        for op in operations {
            match op {
                Operation::Write(bytes) => {
                    if state
                        .fail_writes_after
                        .is_some_and(|limit| state.writes.len() >= limit)
                    {
                        return Err(ErrorKind::Bus);
                    }
                    state.writes.push((address, bytes.to_vec()));
                }
                Operation::Read(buf) => buf.fill(0),
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Recorded {
    shown: Vec<Frame>,
    clears: usize,
    fail_shows: bool,
}

/// Frame sink that keeps every frame it is given.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    inner: Arc<Mutex<Recorded>>,
}

impl RecordingSink {
    #[must_use]
    pub fn shown(&self) -> Vec<Frame> {
        self.inner.lock().shown.clone()
    }

    #[must_use]
    pub fn clears(&self) -> usize {
        self.inner.lock().clears
    }

    /// Make every later `show` fail with a bus error.
    pub fn fail_shows(&self) {
        self.inner.lock().fail_shows = true;
    }
}

impl FrameSink for RecordingSink {
    fn show(&mut self, frame: &Frame) -> crate::core::errors::Result<()> {
        let mut inner = self.inner.lock();
        if inner.fail_shows {
            return Err(StbError::DisplayBus {
                details: "recording sink set to fail".to_string(),
            });
        }
        inner.shown.push(frame.clone());
        Ok(())
    }

    fn clear(&mut self) -> crate::core::errors::Result<()> {
        self.inner.lock().clears += 1;
        Ok(())
    }
}
