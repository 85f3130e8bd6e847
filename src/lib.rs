#![forbid(unsafe_code)]

//! statusboard (stb): a kiosk status display for 128×64 SSD1306 OLED panels.
//!
//! Four panels cycle on a small I2C display:
//! 1. **Address**: outbound IPv4 address and host name
//! 2. **CPU health**: temperature, usage and load
//! 3. **Disk usage**: totals plus a fill bar
//! 4. **Commands**: a button-driven menu of configured actions
//!
//! # Library usage
//!
//! ```rust,no_run
//! use statusboard::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use statusboard::core::config::Config;
//! use statusboard::nav::state::{NavigationState, Panel};
//! ```

pub mod prelude;

pub mod core;
pub mod daemon;
pub mod display;
pub mod input;
pub mod logger;
pub mod nav;
pub mod telemetry;
