//! Per-edge debouncing: each button keeps its own last-accepted instant.

use std::time::{Duration, Instant};

/// Accepts an edge only if `window` has passed since the last accepted one.
///
/// Independent of the navigation idle clock: a rejected bounce does not count
/// as user interaction.
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    last_accepted: Option<Instant>,
}

impl Debouncer {
    #[must_use]
    pub const fn new(window: Duration) -> Self {
        Self {
            window,
            last_accepted: None,
        }
    }

    pub fn accept(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_accepted
            && now.saturating_duration_since(last) < self.window
        {
            return false;
        }
        self.last_accepted = Some(now);
        true
    }
}
