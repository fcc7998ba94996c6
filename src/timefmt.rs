//! Time strings in the record store's native syntax.
//!
//! Elapsed times are `[[hh:]mm:]ss[.fff]`, `sNNN` is an explicit frame count,
//! `e` is the end of the record and `[hh:mm:ss ...]` is a wall-clock time.
//! Parsed values are frames at the record's frame frequency; clock times come
//! back negated so callers can tell the two forms apart.
use crate::fetch::DEFAULT_FREQUENCY;
const SECONDS_PER_DAY: f64 = 86_400.0;
/// Wall-clock time of day, in seconds since midnight.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClockTime(pub f64);
impl ClockTime {
    pub fn parse(text: &str) -> Option<Self> {
        let seconds = parse_seconds(text)?;
        Some(ClockTime(seconds % SECONDS_PER_DAY))
    }
    pub fn seconds(&self) -> f64 {
        self.0
    }
}
/// Parses `[[hh:]mm:]ss[.fff]` into seconds.
pub fn parse_seconds(text: &str) -> Option<f64> {
    let parts: Vec<&str> = text.trim().split(':').collect();
    if parts.len() > 3 {
        return None;
    }
    let mut seconds = 0.0;
    for part in &parts {
        let value: f64 = part.trim().parse().ok()?;
        if !value.is_finite() || value < 0.0 {
            return None;
        }
        seconds = seconds * 60.0 + value;
    }
    Some(seconds)
}
pub fn parse_time(
    text: &str,
    frame_hz: f64,
    length_frames: Option<u64>,
    base_time: Option<ClockTime>,
) -> Option<i64> {
    let frame_hz = if frame_hz > 0.0 {
        frame_hz
    } else {
        DEFAULT_FREQUENCY
    };
    let mut text = text.trim();
    let mut negative = false;
    while let Some(rest) = text.strip_prefix('-') {
        negative = !negative;
        text = rest.trim_start();
    }
    let value = parse_unsigned(text, frame_hz, length_frames, base_time)?;
    if negative {
        value.checked_neg()
    } else {
        Some(value)
    }
}
fn parse_unsigned(
    text: &str,
    frame_hz: f64,
    length_frames: Option<u64>,
    base_time: Option<ClockTime>,
) -> Option<i64> {
    if text.is_empty() {
        return Some(0);
    }
    if text == "e" {
        return length_frames.map(|len| len as i64);
    }
    if let Some(count) = text.strip_prefix('s') {
        return count.trim().parse::<i64>().ok();
    }
    if let Some(inner) = text.strip_prefix('[') {
        let inner = inner.trim_end_matches(']');
        let clock = ClockTime::parse(inner.split_whitespace().next()?)?;
        let base = base_time.map(|b| b.seconds()).unwrap_or(0.0);
        let mut elapsed = clock.seconds() - base;
        if elapsed < 0.0 {
            elapsed += SECONDS_PER_DAY;
        }
        return Some(-((elapsed * frame_hz).round() as i64));
    }
    let seconds = parse_seconds(text)?;
    Some((seconds * frame_hz).round() as i64)
}
fn split_clock(total_ms: u64) -> (u64, u64, u64, u64) {
    let ms = total_ms % 1000;
    let total_s = total_ms / 1000;
    (total_s / 3600, (total_s / 60) % 60, total_s % 60, ms)
}
/// Formats an elapsed frame count as `HH:MM:SS.mmm`.
pub fn format_elapsed(frames: u64, frame_hz: f64) -> String {
    let frame_hz = if frame_hz > 0.0 {
        frame_hz
    } else {
        DEFAULT_FREQUENCY
    };
    let total_ms = (frames as f64 * 1000.0 / frame_hz).floor() as u64;
    let (h, m, s, ms) = split_clock(total_ms);
    format!("{h:02}:{m:02}:{s:02}.{ms:03}")
}
/// Formats a time of day as `[HH:MM:SS.mmm]`, or `[HH:MM:SS.mmm DD/MM/YYYY]` with a date.
pub fn format_clock(seconds: f64, date: Option<&str>) -> String {
    let total_ms = ((seconds % SECONDS_PER_DAY) * 1000.0).floor().max(0.0) as u64;
    let (h, m, s, ms) = split_clock(total_ms);
    match date {
        Some(date) => format!("[{h:02}:{m:02}:{s:02}.{ms:03} {date}]"),
        None => format!("[{h:02}:{m:02}:{s:02}.{ms:03}]"),
    }
}
