//! The simulated clock.
//!
//! One clock per run, advanced in variable-sized steps decided by the
//! current phase. All derived strings (HH-MM, weekday label, formatted
//! date) come from here so the rest of the engine never touches raw
//! `chrono` formatting.

use chrono::{Datelike, NaiveDateTime, TimeDelta, Timelike};

/// Chinese weekday labels, Monday first.
const WEEKDAYS: [&str; 7] = [
    "星期一",
    "星期二",
    "星期三",
    "星期四",
    "星期五",
    "星期六",
    "星期天",
];

/// Simulated time for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimClock {
    start: NaiveDateTime,
    end: NaiveDateTime,
    current: NaiveDateTime,
}

impl SimClock {
    /// Create a clock covering `[start, start + duration_minutes)`.
    pub fn new(start: NaiveDateTime, duration_minutes: i64) -> Self {
        Self {
            start,
            end: start + TimeDelta::minutes(duration_minutes.max(0)),
            current: start,
        }
    }

    /// The current simulated instant.
    pub fn now(&self) -> NaiveDateTime {
        self.current
    }

    /// True once the configured duration has elapsed.
    pub fn is_finished(&self) -> bool {
        self.current >= self.end
    }

    /// Advance by a phase-sized step.
    pub fn advance(&mut self, minutes: i64) {
        self.current += TimeDelta::minutes(minutes.max(1));
    }

    /// Current time as `HH-MM`.
    pub fn hm(&self) -> String {
        format!("{:02}-{:02}", self.current.hour(), self.current.minute())
    }

    /// The Chinese weekday label for the current day.
    pub fn weekday_label(&self) -> &'static str {
        WEEKDAYS[self.current.weekday().num_days_from_monday() as usize]
    }

    /// `2024年11月18日 03點00分` style formatting for logs.
    pub fn formatted(&self) -> String {
        format!(
            "{}年{:02}月{:02}日 {:02}點{:02}分",
            self.current.year(),
            self.current.month(),
            self.current.day(),
            self.current.hour(),
            self.current.minute()
        )
    }

    /// `HH:MM:SS` for the status line.
    pub fn status_time(&self) -> String {
        format!(
            "{:02}:{:02}:{:02}",
            self.current.hour(),
            self.current.minute(),
            self.current.second()
        )
    }
}
