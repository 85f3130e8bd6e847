//! Panel composition and drawing.
//!
//! Composition turns a navigation snapshot plus telemetry into a [`Screen`]:
//! positioned text rows, an optional usage bar, and at most one highlighted
//! row. Drawing rasterizes a `Screen` onto any binary draw target. Keeping the
//! two apart lets tests assert on text without decoding pixels.

#![allow(missing_docs)]

use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::mono_font::iso_8859_1::{FONT_5X8, FONT_6X10};
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};
use embedded_graphics::text::{Baseline, Text};

use crate::display::frame::{Frame, HEIGHT, WIDTH};
use crate::nav::commands::CommandRegistry;
use crate::nav::state::{Panel, PanelSnapshot};
use crate::telemetry::TelemetrySource;

pub const NOT_AVAILABLE: &str = "N/A";
pub const NO_ADDRESS: &str = "No IP Found";

const HOSTNAME_CHARS: usize = 16;
const ROW_PITCH: i32 = 12;
/// Command rows that fit below the heading.
const VISIBLE_COMMANDS: usize = 4;
const BAR_X: i32 = 4;
const BAR_Y: i32 = 58;
const BAR_WIDTH: u32 = 120;
const BAR_HEIGHT: u32 = 4;
/// Characters per row in the small font inside the border.
const WRAP_CHARS: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontSize {
    Large,
    Small,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRow {
    pub x: i32,
    pub y: i32,
    pub text: String,
    pub font: FontSize,
    /// Drawn dark on a full-width lit band.
    pub highlighted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageBar {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub filled: u32,
}

/// Resolved content of one frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Screen {
    pub rows: Vec<TextRow>,
    pub bar: Option<UsageBar>,
}

impl Screen {
    fn text(&mut self, y: i32, font: FontSize, text: impl Into<String>) {
        self.rows.push(TextRow {
            x: 2,
            y,
            text: text.into(),
            font,
            highlighted: false,
        });
    }

    #[must_use]
    pub fn texts(&self) -> Vec<&str> {
        self.rows.iter().map(|r| r.text.as_str()).collect()
    }

    #[must_use]
    pub fn highlighted(&self) -> Vec<&str> {
        self.rows
            .iter()
            .filter(|r| r.highlighted)
            .map(|r| r.text.as_str())
            .collect()
    }
}

/// Transient full-screen message from the command executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Overlay {
    Executing { label: String },
    Failed { message: String },
}

pub fn compose_overlay(overlay: &Overlay) -> Screen {
    let mut screen = Screen::default();
    match overlay {
        Overlay::Executing { label } => {
            screen.text(2, FontSize::Large, "Executing...");
            screen.text(16, FontSize::Small, label.clone());
        }
        Overlay::Failed { message } => {
            screen.text(2, FontSize::Large, "Error:");
            for (i, chunk) in wrap(message, WRAP_CHARS).into_iter().take(4).enumerate() {
                #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
                let y = 16 + i as i32 * ROW_PITCH;
                screen.text(y, FontSize::Small, chunk);
            }
        }
    }
    screen
}

fn wrap(message: &str, width: usize) -> Vec<String> {
    let chars: Vec<char> = message.chars().collect();
    if chars.is_empty() {
        return vec![String::new()];
    }
    chars.chunks(width).map(|c| c.iter().collect()).collect()
}

fn heading(panel: Panel) -> String {
    format!("{} ({}/{}):", panel.title(), panel.index() + 1, Panel::COUNT)
}

/// Compose the current panel, reading only the telemetry that panel shows.
pub fn compose_panel(
    snapshot: &PanelSnapshot,
    registry: &CommandRegistry,
    telemetry: &dyn TelemetrySource,
) -> Screen {
    let mut screen = Screen::default();
    screen.text(2, FontSize::Small, heading(snapshot.panel));
    match snapshot.panel {
        Panel::Address => address_panel(&mut screen, snapshot, telemetry),
        Panel::CpuHealth => cpu_panel(&mut screen, telemetry),
        Panel::DiskUsage => disk_panel(&mut screen, telemetry),
        Panel::Commands => commands_panel(&mut screen, snapshot, registry),
    }
    screen
}

fn address_panel(screen: &mut Screen, snapshot: &PanelSnapshot, telemetry: &dyn TelemetrySource) {
    let address = telemetry
        .address()
        .ok()
        .unwrap_or_else(|| NO_ADDRESS.to_string());
    let host = telemetry.hostname().ok().map_or_else(
        || NOT_AVAILABLE.to_string(),
        |h| h.chars().take(HOSTNAME_CHARS).collect(),
    );
    screen.text(16, FontSize::Large, address);
    screen.text(30, FontSize::Small, format!("Host: {host}"));
    screen.text(42, FontSize::Small, format!("Time: {}", telemetry.local_time()));
    let auto = if snapshot.auto_advance_enabled {
        "ON"
    } else {
        "OFF"
    };
    screen.text(54, FontSize::Small, format!("Auto: {auto}"));
}

fn cpu_panel(screen: &mut Screen, telemetry: &dyn TelemetrySource) {
    match telemetry.cpu_temperature().ok() {
        Some(t) => {
            screen.text(16, FontSize::Large, format!("Temp: {:.1}°C", t.celsius));
            screen.text(28, FontSize::Large, format!("      {:.1}°F", t.fahrenheit()));
        }
        None => screen.text(16, FontSize::Large, format!("Temp: {NOT_AVAILABLE}")),
    }
    let usage = telemetry
        .cpu_usage()
        .ok()
        .map_or_else(|| NOT_AVAILABLE.to_string(), |u| format!("{u:.1}%"));
    let load = telemetry
        .load_average()
        .ok()
        .map_or_else(|| NOT_AVAILABLE.to_string(), |l| format!("{l:.2}"));
    screen.text(42, FontSize::Small, format!("Usage: {usage}"));
    screen.text(54, FontSize::Small, format!("Load: {load}"));
}

fn disk_panel(screen: &mut Screen, telemetry: &dyn TelemetrySource) {
    let Ok(disk) = telemetry.disk_usage() else {
        screen.text(16, FontSize::Large, "Disk info N/A");
        return;
    };
    let pct = disk.used_pct();
    screen.text(16, FontSize::Small, format!("Total: {:.1} GB", disk.total_gib()));
    screen.text(28, FontSize::Small, format!("Used:  {:.1} GB", disk.used_gib()));
    screen.text(40, FontSize::Small, format!("Free:  {:.1} GB", disk.free_gib()));
    screen.text(52, FontSize::Small, format!("Usage: {pct:.1}%"));
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let filled = ((pct / 100.0) * f64::from(BAR_WIDTH)).clamp(0.0, f64::from(BAR_WIDTH)) as u32;
    screen.bar = Some(UsageBar {
        x: BAR_X,
        y: BAR_Y,
        width: BAR_WIDTH,
        height: BAR_HEIGHT,
        filled,
    });
}

/// First registry index shown so the selection stays inside the window.
fn command_window_start(selected: usize) -> usize {
    (selected + 1).saturating_sub(VISIBLE_COMMANDS)
}

fn commands_panel(screen: &mut Screen, snapshot: &PanelSnapshot, registry: &CommandRegistry) {
    let first = command_window_start(snapshot.selected_command);
    let visible = registry
        .labels()
        .enumerate()
        .skip(first)
        .take(VISIBLE_COMMANDS);
    for (slot, (i, label)) in visible.enumerate() {
        let selected = i == snapshot.selected_command;
        let prefix = if selected { "> " } else { "  " };
        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        let y = 16 + slot as i32 * ROW_PITCH;
        screen.rows.push(TextRow {
            x: 2,
            y,
            text: format!("{prefix}{label}"),
            font: FontSize::Small,
            highlighted: selected,
        });
    }
}

/// Rasterize `screen` inside a one-pixel border.
pub fn draw<D>(screen: &Screen, target: &mut D) -> Result<(), D::Error>
where
    D: DrawTarget<Color = BinaryColor>,
{
    let outline = PrimitiveStyle::with_stroke(BinaryColor::On, 1);
    let fill = PrimitiveStyle::with_fill(BinaryColor::On);
    #[allow(clippy::cast_possible_truncation)]
    let (width, height) = (WIDTH as u32, HEIGHT as u32);

    Rectangle::new(Point::zero(), Size::new(width, height))
        .into_styled(outline)
        .draw(target)?;

    for row in &screen.rows {
        let font = match row.font {
            FontSize::Large => &FONT_6X10,
            FontSize::Small => &FONT_5X8,
        };
        let color = if row.highlighted {
            Rectangle::new(Point::new(0, row.y - 2), Size::new(width, ROW_PITCH.unsigned_abs() + 1))
            .into_styled(fill)
            .draw(target)?;
            BinaryColor::Off
        } else {
            BinaryColor::On
        };
        Text::with_baseline(
            &row.text,
            Point::new(row.x, row.y),
            MonoTextStyle::new(font, color),
            Baseline::Top,
        )
        .draw(target)?;
    }

    if let Some(bar) = screen.bar {
        let origin = Point::new(bar.x, bar.y);
        Rectangle::new(origin, Size::new(bar.width + 1, bar.height + 1))
            .into_styled(outline)
            .draw(target)?;
        if bar.filled > 0 {
            Rectangle::new(origin, Size::new(bar.filled + 1, bar.height + 1))
                .into_styled(fill)
                .draw(target)?;
        }
    }
    Ok(())
}

/// Draw `screen` into a fresh frame.
#[must_use]
pub fn render_frame(screen: &Screen) -> Frame {
    let mut frame = Frame::new();
    let Ok(()) = draw(screen, &mut frame);
    frame
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::{Result, StbError};
    use crate::nav::commands::{CommandAction, CommandEntry};
    use crate::telemetry::{DiskUsage, Temperature};
    use std::time::Instant;

    struct Fixed {
        temp: Option<f64>,
        disk: Option<DiskUsage>,
    }

    impl TelemetrySource for Fixed {
        fn address(&self) -> Result<String> {
            Ok("192.168.1.20".to_string())
        }
        fn hostname(&self) -> Result<String> {
            Ok("raspberrypi-living-room".to_string())
        }
        fn cpu_temperature(&self) -> Result<Temperature> {
            self.temp
                .map(|celsius| Temperature { celsius })
                .ok_or_else(|| StbError::telemetry("temperature", "absent"))
        }
        fn cpu_usage(&self) -> Result<f64> {
            Ok(12.5)
        }
        fn load_average(&self) -> Result<f64> {
            Err(StbError::telemetry("load", "absent"))
        }
        fn disk_usage(&self) -> Result<DiskUsage> {
            self.disk
                .ok_or_else(|| StbError::telemetry("disk", "absent"))
        }
        fn local_time(&self) -> String {
            "12:34:56".to_string()
        }
    }

    fn registry() -> CommandRegistry {
        CommandRegistry::new(vec![
            CommandEntry::new("Restart", CommandAction::exec("true", &[])),
            CommandEntry::new("Shutdown", CommandAction::exec("true", &[])),
        ])
        .unwrap()
    }

    fn snapshot(panel: Panel, selected: usize) -> PanelSnapshot {
        PanelSnapshot {
            panel,
            selected_command: selected,
            last_interaction: Instant::now(),
            auto_advance_enabled: true,
        }
    }

    #[test]
    fn address_panel_text() {
        let t = Fixed { temp: None, disk: None };
        let screen = compose_panel(&snapshot(Panel::Address, 0), &registry(), &t);
        assert_eq!(
            screen.texts(),
            vec![
                "System IP (1/4):",
                "192.168.1.20",
                "Host: raspberrypi-livi",
                "Time: 12:34:56",
                "Auto: ON",
            ]
        );
    }

    #[test]
    fn cpu_panel_with_and_without_temperature() {
        let t = Fixed { temp: Some(47.2), disk: None };
        let screen = compose_panel(&snapshot(Panel::CpuHealth, 0), &registry(), &t);
        assert_eq!(
            screen.texts(),
            vec!["CPU Info (2/4):", "Temp: 47.2°C", "      117.0°F", "Usage: 12.5%", "Load: N/A"]
        );

        let t = Fixed { temp: None, disk: None };
        let screen = compose_panel(&snapshot(Panel::CpuHealth, 0), &registry(), &t);
        assert_eq!(screen.texts()[1], "Temp: N/A");
        assert_eq!(screen.texts()[2], "Usage: 12.5%");
    }

    #[test]
    fn disk_panel_with_bar() {
        let gib = 1024 * 1024 * 1024;
        let t = Fixed {
            temp: None,
            disk: Some(DiskUsage {
                total_bytes: 100 * gib,
                used_bytes: 42 * gib,
                free_bytes: 58 * gib,
            }),
        };
        let screen = compose_panel(&snapshot(Panel::DiskUsage, 0), &registry(), &t);
        assert_eq!(
            screen.texts(),
            vec![
                "Disk Usage (3/4):",
                "Total: 100.0 GB",
                "Used:  42.0 GB",
                "Free:  58.0 GB",
                "Usage: 42.0%",
            ]
        );
        let bar = screen.bar.expect("bar");
        assert_eq!(bar.filled, 50);
        assert_eq!(bar.width, 120);
    }

    #[test]
    fn disk_unavailable_is_single_line() {
        let t = Fixed { temp: None, disk: None };
        let screen = compose_panel(&snapshot(Panel::DiskUsage, 0), &registry(), &t);
        assert_eq!(screen.texts(), vec!["Disk Usage (3/4):", "Disk info N/A"]);
        assert!(screen.bar.is_none());
    }

    #[test]
    fn commands_panel_marks_selection() {
        let t = Fixed { temp: None, disk: None };
        let screen = compose_panel(&snapshot(Panel::Commands, 1), &registry(), &t);
        assert_eq!(
            screen.texts(),
            vec!["Commands (4/4):", "  Restart", "> Shutdown"]
        );
        assert_eq!(screen.highlighted(), vec!["> Shutdown"]);
        assert_eq!(screen.rows[2].y, 28);
    }

    #[test]
    fn commands_panel_scrolls_to_keep_selection_on_screen() {
        let entries = (0..6)
            .map(|i| CommandEntry::new(format!("Cmd{i}"), CommandAction::exec("true", &[])))
            .collect();
        let registry = CommandRegistry::new(entries).unwrap();
        let t = Fixed { temp: None, disk: None };

        let screen = compose_panel(&snapshot(Panel::Commands, 5), &registry, &t);
        assert_eq!(
            screen.texts(),
            vec!["Commands (4/4):", "  Cmd2", "  Cmd3", "  Cmd4", "> Cmd5"]
        );
        let row = screen.rows.iter().find(|r| r.highlighted).expect("selected row");
        assert_eq!(row.y, 52);
        assert!(row.y + ROW_PITCH <= i32::try_from(HEIGHT).unwrap());
        let frame = render_frame(&screen);
        assert!(frame.pixel(1, 51));
        assert!(frame.pixel(1, 61));

        // Moving back up within the window does not scroll.
        let screen = compose_panel(&snapshot(Panel::Commands, 2), &registry, &t);
        assert_eq!(screen.highlighted(), vec!["> Cmd2"]);
        assert_eq!(screen.texts()[1], "  Cmd0");
    }

    #[test]
    fn overlays() {
        let screen = compose_overlay(&Overlay::Executing {
            label: "Restart".into(),
        });
        assert_eq!(screen.texts(), vec!["Executing...", "Restart"]);

        let screen = compose_overlay(&Overlay::Failed {
            message: "sudo: a password is required to run this".into(),
        });
        assert_eq!(screen.texts()[0], "Error:");
        assert_eq!(screen.texts()[1].chars().count(), WRAP_CHARS);
        assert_eq!(screen.rows.len(), 3);
    }

    #[test]
    fn render_draws_border_and_highlight() {
        let t = Fixed { temp: None, disk: None };
        let screen = compose_panel(&snapshot(Panel::Commands, 0), &registry(), &t);
        let frame = render_frame(&screen);
        assert!(frame.pixel(0, 0));
        assert!(frame.pixel(127, 63));
        assert!(frame.pixel(0, 32));
        // highlight band
        assert!(frame.pixel(1, 14));
        assert!(!frame.pixel(64, 40));
    }

    #[test]
    fn render_fills_usage_bar() {
        let screen = Screen {
            rows: Vec::new(),
            bar: Some(UsageBar {
                x: BAR_X,
                y: BAR_Y,
                width: BAR_WIDTH,
                height: BAR_HEIGHT,
                filled: 60,
            }),
        };
        let frame = render_frame(&screen);
        assert!(frame.pixel(30, 60));
        assert!(!frame.pixel(100, 60));
        assert!(frame.pixel(100, 58));
    }
}
