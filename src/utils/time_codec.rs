//! Conversions between seconds-of-day and `HH:MM:SS` text.

use chrono::{DateTime, Local, TimeZone, Timelike};

pub const SECONDS_PER_DAY: u32 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBundle {
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
}

impl TimeBundle {
    pub fn from_seconds(total: u32) -> Self {
        Self {
            hours: total / 3600,
            minutes: (total % 3600) / 60,
            seconds: total % 60,
        }
    }
}

/// Formats seconds-of-day as zero-padded 24-hour `HH:MM:SS`.
pub fn seconds_to_hms(seconds: u32) -> String {
    let t = TimeBundle::from_seconds(seconds);
    format!("{:02}:{:02}:{:02}", t.hours, t.minutes, t.seconds)
}

/// Parses strict `HH:MM:SS` (two digits per field) into seconds-of-day.
pub fn hms_to_seconds(text: &str) -> Option<u32> {
    let mut parts = text.split(':');
    let hours = parse_two_digits(parts.next()?)?;
    let minutes = parse_two_digits(parts.next()?)?;
    let seconds = parse_two_digits(parts.next()?)?;
    if parts.next().is_some() || hours > 23 || minutes > 59 || seconds > 59 {
        return None;
    }
    Some(hours * 3600 + minutes * 60 + seconds)
}

fn parse_two_digits(field: &str) -> Option<u32> {
    if field.len() != 2 || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}

/// Elapsed milliseconds as `MM:SS`; minutes keep counting past 59.
pub fn elapsed_ms_to_mm_ss(millis: u64) -> String {
    let total_seconds = millis / 1000;
    format!("{:02}:{:02}", total_seconds / 60, total_seconds % 60)
}

pub fn time_of_day_seconds<Tz: TimeZone>(at: &DateTime<Tz>) -> u32 {
    at.num_seconds_from_midnight()
}

pub fn now_time_of_day() -> u32 {
    time_of_day_seconds(&Local::now())
}

/// Human-readable duration: `1h 02m 03s`, `2m 03s` or `5s`.
pub fn duration_label(seconds: u32) -> String {
    let t = TimeBundle::from_seconds(seconds);
    if t.hours > 0 {
        format!("{}h {:02}m {:02}s", t.hours, t.minutes, t.seconds)
    } else if t.minutes > 0 {
        format!("{}m {:02}s", t.minutes, t.seconds)
    } else {
        format!("{}s", t.seconds)
    }
}
