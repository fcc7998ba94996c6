use crate::fetch::frequency::TimeBase;
/// Half-open window `[t0, tf)` in ticks of the unified clock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeWindow {
    pub t0: u64,
    pub tf: u64,
}
impl TimeWindow {
    pub fn new(t0: u64, duration: u64) -> Self {
        let duration = duration.max(1);
        Self {
            t0,
            tf: t0.saturating_add(duration),
        }
    }
    pub fn duration(&self) -> u64 {
        self.tf - self.t0
    }
    pub fn contains(&self, tick: u64) -> bool {
        (self.t0..self.tf).contains(&tick)
    }
}
/// Start used when the client sends none.
const DEFAULT_START: &str = "0";
/// Duration used when the client sends none: one second.
const DEFAULT_DURATION: &str = "1";
/// Resolves client `start`/`duration` strings into a tick window.
///
/// `parse` converts a time string into frames (the store's native syntax);
/// a negative result is taken by magnitude. Unparseable strings fall back to
/// the defaults, and a non-positive duration becomes a single tick.
pub fn resolve_window<F>(
    start: Option<&str>,
    duration: Option<&str>,
    time_base: &TimeBase,
    parse: F,
) -> TimeWindow
where
    F: Fn(&str) -> Option<i64>,
{
    let to_frames = |text: Option<&str>, fallback: &str| -> u64 {
        let text = text.unwrap_or(fallback);
        let frames = parse(text).or_else(|| {
            log::debug!("could not parse time {text:?}, using {fallback:?}");
            parse(fallback)
        });
        frames.unwrap_or(0).unsigned_abs()
    };
    let tpf = time_base.ticks_per_frame();
    let t0 = to_frames(start, DEFAULT_START).saturating_mul(tpf);
    let dt = to_frames(duration, DEFAULT_DURATION).saturating_mul(tpf);
    let window = TimeWindow::new(t0, dt);
    log::debug!(
        "resolved window [{}, {}) at {} ticks/s",
        window.t0,
        window.tf,
        time_base.tick_hz
    );
    window
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::timefmt::parse_time;
    fn base() -> TimeBase {
        TimeBase {
            frame_hz: 250.0,
            tick_hz: 500.0,
        }
    }
    fn parse(text: &str) -> Option<i64> {
        parse_time(text, 250.0, Some(1000), None)
    }
    #[test]
    fn defaults_to_first_second() {
        let window = resolve_window(None, None, &base(), parse);
        assert_eq!(window, TimeWindow { t0: 0, tf: 500 });
    }
    #[test]
    fn negative_values_are_taken_by_magnitude() {
        let window = resolve_window(Some("-2"), Some("-1"), &base(), parse);
        assert_eq!(window, TimeWindow { t0: 1000, tf: 1500 });
    }
    #[test]
    fn zero_duration_is_one_tick() {
        let window = resolve_window(Some("s10"), Some("0"), &base(), parse);
        assert_eq!(window, TimeWindow { t0: 20, tf: 21 });
        assert_eq!(window.duration(), 1);
    }
    #[test]
    fn unparseable_strings_use_defaults() {
        let window = resolve_window(Some("soon"), Some("a while"), &base(), parse);
        assert_eq!(window, TimeWindow { t0: 0, tf: 500 });
    }
    #[test]
    fn no_upper_bound_is_applied() {
        let window = resolve_window(Some("e"), Some("10"), &base(), parse);
        assert_eq!(window.t0, 2000);
        assert_eq!(window.tf, 2000 + 5000);
    }
}
