//! Trailing-window aggregation
//!
//! Each timestamp is classified once into the smallest window that contains
//! it; every window at least that wide is then incremented. The comparison is
//! strict, so an event exactly one day old is outside the day window.

use tally_common::{UserStamp, WindowCounts, DAY_MS, MONTH_MS, WEEK_MS};
use tracing::warn;

/// Trailing report window, ordered narrowest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Window {
    Day,
    Week,
    Month,
}

impl Window {
    /// Every window, narrowest first
    pub const ALL: [Window; 3] = [Window::Day, Window::Week, Window::Month];

    /// Window length in milliseconds
    pub fn span_ms(self) -> i64 {
        match self {
            Window::Day => DAY_MS,
            Window::Week => WEEK_MS,
            Window::Month => MONTH_MS,
        }
    }

    /// Smallest window containing `timestamp`, `None` if older than a month
    ///
    /// Timestamps ahead of `now` fall in every window.
    pub fn classify(now: i64, timestamp: i64) -> Option<Window> {
        let age = now.saturating_sub(timestamp);
        Self::ALL.into_iter().find(|w| age < w.span_ms())
    }
}

/// Counts events relative to a fixed reference time
#[derive(Debug, Clone, Copy)]
pub struct WindowedAggregator {
    now: i64,
}

impl WindowedAggregator {
    /// Aggregator evaluating windows at `now` (Unix millis)
    pub fn at(now: i64) -> Self {
        Self { now }
    }

    /// Count raw event timestamps
    pub fn count_timestamps<I>(&self, timestamps: I) -> WindowCounts
    where
        I: IntoIterator<Item = i64>,
    {
        let mut counts = WindowCounts::default();
        for timestamp in timestamps {
            self.tally(&mut counts, timestamp);
        }
        counts
    }

    /// Count unique-user stamps by their timestamps
    ///
    /// Malformed stamps are logged and left out of every count.
    pub fn count_stamps<'a, I>(&self, stamps: I) -> WindowCounts
    where
        I: IntoIterator<Item = &'a UserStamp>,
    {
        let mut counts = WindowCounts::default();
        for stamp in stamps {
            match stamp.timestamp() {
                Ok(timestamp) => self.tally(&mut counts, timestamp),
                Err(e) => warn!(error = %e, "Skipping unique-user stamp"),
            }
        }
        counts
    }

    fn tally(&self, counts: &mut WindowCounts, timestamp: i64) {
        counts.total += 1;

        let Some(smallest) = Window::classify(self.now, timestamp) else {
            return;
        };
        for window in Window::ALL.into_iter().filter(|w| *w >= smallest) {
            match window {
                Window::Day => counts.last_day += 1,
                Window::Week => counts.last_week += 1,
                Window::Month => counts.last_month += 1,
            }
        }
    }
}
