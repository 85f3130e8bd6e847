//! OLED output: frame buffer, SSD1306 driver, sink lifecycle, and panel drawing.

pub mod frame;
pub mod mock;
pub mod panels;
pub mod sink;
pub mod ssd1306;

pub use frame::Frame;
pub use sink::{DisplayGuard, FrameSink};
