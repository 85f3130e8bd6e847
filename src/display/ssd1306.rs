//! SSD1306 128x64 OLED driver over a blocking `embedded-hal` I2C bus.
//!
//! Page addressing mode: each flush writes eight 128-byte pages. Every I2C
//! write starts with a control byte, `0x00` for commands and `0x40` for
//! display RAM.

use embedded_hal::i2c::I2c;

use crate::display::frame::{Frame, PAGES, WIDTH};

const CONTROL_COMMAND: u8 = 0x00;
const CONTROL_DATA: u8 = 0x40;

#[allow(dead_code)]
mod cmd {
    pub const DISPLAY_OFF: u8 = 0xAE;
    pub const DISPLAY_ON: u8 = 0xAF;
    pub const SET_CLOCK_DIV: u8 = 0xD5;
    pub const SET_MUX_RATIO: u8 = 0xA8;
    pub const SET_DISPLAY_OFFSET: u8 = 0xD3;
    pub const SET_START_LINE: u8 = 0x40;
    pub const SET_CHARGE_PUMP: u8 = 0x8D;
    pub const SET_MEMORY_MODE: u8 = 0x20;
    pub const SET_SEG_REMAP: u8 = 0xA1;
    pub const SET_COM_SCAN_DEC: u8 = 0xC8;
    pub const SET_COM_PINS: u8 = 0xDA;
    pub const SET_CONTRAST: u8 = 0x81;
    pub const SET_PRECHARGE: u8 = 0xD9;
    pub const SET_VCOM_DETECT: u8 = 0xDB;
    pub const RESUME_RAM: u8 = 0xA4;
    pub const SET_NORMAL: u8 = 0xA6;
    pub const SET_PAGE_ADDR: u8 = 0xB0;
    pub const SET_LOW_COLUMN: u8 = 0x00;
    pub const SET_HIGH_COLUMN: u8 = 0x10;
}

const INIT_SEQUENCE: &[u8] = &[
    cmd::DISPLAY_OFF,
    cmd::SET_CLOCK_DIV,
    0x80,
    cmd::SET_MUX_RATIO,
    0x3F,
    cmd::SET_DISPLAY_OFFSET,
    0x00,
    cmd::SET_START_LINE,
    cmd::SET_CHARGE_PUMP,
    0x14,
    cmd::SET_MEMORY_MODE,
    0x02, // page addressing
    cmd::SET_SEG_REMAP,
    cmd::SET_COM_SCAN_DEC,
    cmd::SET_COM_PINS,
    0x12,
    cmd::SET_CONTRAST,
    0xCF,
    cmd::SET_PRECHARGE,
    0xF1,
    cmd::SET_VCOM_DETECT,
    0x40,
    cmd::RESUME_RAM,
    cmd::SET_NORMAL,
    cmd::DISPLAY_ON,
];

/// Driver bound to one bus address.
#[derive(Debug)]
pub struct Ssd1306<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C: I2c> Ssd1306<I2C> {
    /// Wrap `i2c` without touching the bus; call [`Self::init`] next.
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    /// 7-bit bus address this driver writes to.
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Give the bus back, e.g. to probe another address.
    pub fn release(self) -> I2C {
        self.i2c
    }

    /// Send the power-up sequence. Fails if nothing ACKs at `address`.
    pub fn init(&mut self) -> Result<(), I2C::Error> {
        self.commands(INIT_SEQUENCE)
    }

    /// Write all eight pages of `frame` to display RAM.
    pub fn flush(&mut self, frame: &Frame) -> Result<(), I2C::Error> {
        let mut data = [0u8; WIDTH + 1];
        data[0] = CONTROL_DATA;
        for page in 0..PAGES {
            #[allow(clippy::cast_possible_truncation)]
            let page_addr = cmd::SET_PAGE_ADDR | page as u8;
            self.commands(&[
                page_addr,
                cmd::SET_LOW_COLUMN,
                cmd::SET_HIGH_COLUMN,
            ])?;
            data[1..].copy_from_slice(frame.page(page));
            self.i2c.write(self.address, &data)?;
        }
        Ok(())
    }

    /// Blank display RAM.
    pub fn clear(&mut self) -> Result<(), I2C::Error> {
        self.flush(&Frame::new())
    }

    /// Panel power: `false` blanks the glass but keeps RAM.
    pub fn set_display_on(&mut self, on: bool) -> Result<(), I2C::Error> {
        self.commands(&[if on { cmd::DISPLAY_ON } else { cmd::DISPLAY_OFF }])
    }

    fn commands(&mut self, cmds: &[u8]) -> Result<(), I2C::Error> {
        let mut buf = Vec::with_capacity(cmds.len() + 1);
        buf.push(CONTROL_COMMAND);
        buf.extend_from_slice(cmds);
        self.i2c.write(self.address, &buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::mock::MockI2c;

    #[test]
    fn init_writes_command_stream() {
        let bus = MockI2c::with_devices(&[0x3C]);
        let mut driver = Ssd1306::new(bus.clone(), 0x3C);
        driver.init().expect("device present");
        let writes = bus.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].0, 0x3C);
        assert_eq!(writes[0].1[0], CONTROL_COMMAND);
        assert_eq!(writes[0].1.last(), Some(&cmd::DISPLAY_ON));
    }

    #[test]
    fn init_fails_without_ack() {
        let bus = MockI2c::with_devices(&[0x3D]);
        let mut driver = Ssd1306::new(bus.clone(), 0x3C);
        assert!(driver.init().is_err());
    }

    #[test]
    fn flush_sends_eight_data_pages() {
        let bus = MockI2c::with_devices(&[0x3C]);
        let mut driver = Ssd1306::new(bus.clone(), 0x3C);
        let mut frame = Frame::new();
        frame.set_pixel(0, 63, true);
        driver.flush(&frame).expect("flush");

        let data: Vec<Vec<u8>> = bus
            .writes()
            .into_iter()
            .map(|(_, bytes)| bytes)
            .filter(|bytes| bytes[0] == CONTROL_DATA)
            .collect();
        assert_eq!(data.len(), PAGES);
        assert!(data.iter().all(|page| page.len() == WIDTH + 1));
        assert_eq!(data[7][1], 0b1000_0000);
    }

    #[test]
    fn clear_sends_blank_pages() {
        let bus = MockI2c::with_devices(&[0x3C]);
        let mut driver = Ssd1306::new(bus.clone(), 0x3C);
        driver.clear().expect("clear");
        assert!(
            bus.writes()
                .iter()
                .filter(|(_, b)| b[0] == CONTROL_DATA)
                .all(|(_, b)| b[1..].iter().all(|byte| *byte == 0))
        );
    }
}
