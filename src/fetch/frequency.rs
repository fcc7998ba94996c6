use crate::fetch::source::{ChannelDescriptor, DEFAULT_FREQUENCY};
/// Relative tolerance at which two accumulated multiples count as equal.
pub const LCM_TOLERANCE: f64 = 0.001;
/// Upper bound on accumulation steps in `approx_lcm`.
const MAX_LCM_STEPS: usize = 1 << 20;
/// Least common multiple of two positive reals, tolerant of representation error.
///
/// Multiples of `x` and `y` are accumulated (always advancing the smaller one)
/// until they agree within `LCM_TOLERANCE`. Non-positive inputs return 0.
pub fn approx_lcm(x: f64, y: f64) -> f64 {
    if !(x > 0.0 && y > 0.0 && x.is_finite() && y.is_finite()) {
        return 0.0;
    }
    let (mut a, mut b) = (x, y);
    for _ in 0..MAX_LCM_STEPS {
        if (a / b - 1.0).abs() <= LCM_TOLERANCE {
            return a;
        }
        if a < b {
            a += x;
        } else {
            b += y;
        }
    }
    log::warn!("approximate LCM of {x} and {y} did not converge; using the larger multiple");
    a.max(b)
}
/// The common clock shared by all channels of a record.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeBase {
    /// Rate of complete multiplexed frames.
    pub frame_hz: f64,
    /// Unified tick rate; a whole multiple of every channel's sampling rate.
    pub tick_hz: f64,
}
impl TimeBase {
    pub fn for_channels(frame_hz: f64, channels: &[ChannelDescriptor]) -> Self {
        let frame_hz = if frame_hz > 0.0 && frame_hz.is_finite() {
            frame_hz
        } else {
            DEFAULT_FREQUENCY
        };
        let tick_hz = channels.iter().fold(frame_hz, |acc, channel| {
            approx_lcm(acc, channel.sample_rate_hz(frame_hz))
        });
        let tick_hz = if tick_hz > 0.0 { tick_hz } else { frame_hz };
        Self { frame_hz, tick_hz }
    }
    /// Ticks spanned by one frame (at least 1).
    pub fn ticks_per_frame(&self) -> u64 {
        ((self.tick_hz / self.frame_hz).round() as u64).max(1)
    }
    /// Ticks between consecutive samples of a channel (at least 1).
    pub fn ticks_per_sample(&self, samples_per_frame: usize) -> u64 {
        let rate = self.frame_hz * samples_per_frame.max(1) as f64;
        ((self.tick_hz / rate).round() as u64).max(1)
    }
    /// Rescales a tick count into ticks of another clock, rounding to nearest.
    pub fn rescale(&self, ticks: u64, target_hz: f64) -> u64 {
        if target_hz <= 0.0 || ((target_hz / self.tick_hz) - 1.0).abs() <= LCM_TOLERANCE {
            return ticks;
        }
        (ticks as f64 * target_hz / self.tick_hz).round() as u64
    }
    /// Inverse of `rescale`: converts ticks of `source_hz` into ticks of this base.
    pub fn from_clock(&self, ticks: u64, source_hz: f64) -> u64 {
        if source_hz <= 0.0 || ((source_hz / self.tick_hz) - 1.0).abs() <= LCM_TOLERANCE {
            return ticks;
        }
        (ticks as f64 * self.tick_hz / source_hz).round() as u64
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    #[test]
    fn lcm_of_exact_integers() {
        assert_relative_eq!(approx_lcm(250.0, 500.0), 500.0);
        assert_relative_eq!(approx_lcm(4.0, 6.0), 12.0);
        assert_relative_eq!(approx_lcm(360.0, 360.0), 360.0);
    }
    #[test]
    fn lcm_tolerates_representation_error() {
        let base = 1000.0 / 3.0;
        let lcm = approx_lcm(base, base * 4.0 * (1.0 + 1e-9));
        assert_relative_eq!(lcm, base * 4.0, max_relative = LCM_TOLERANCE);
        let lcm = approx_lcm(0.1 + 0.2, 0.3 * 2.0);
        assert_relative_eq!(lcm, 0.6, max_relative = LCM_TOLERANCE);
    }
    #[test]
    fn degenerate_inputs_return_zero() {
        assert_eq!(approx_lcm(0.0, 250.0), 0.0);
        assert_eq!(approx_lcm(250.0, -1.0), 0.0);
        assert_eq!(approx_lcm(f64::NAN, 1.0), 0.0);
    }
    #[test]
    fn unrelated_rates_stop_after_the_step_bound() {
        let y = std::f64::consts::PI * 1e-7;
        let lcm = approx_lcm(1.0, y);
        assert!(lcm.is_finite());
        assert!(lcm >= 1.0 && lcm >= y);
        // the small rate only gets a third of the way to the large one
        assert_relative_eq!(lcm, 1.0);
    }
    #[test]
    fn mixed_rate_record_unifies() {
        let channels = vec![
            ChannelDescriptor::new(0, "ECG"),
            ChannelDescriptor::new(1, "ABP").with_samples_per_frame(2),
        ];
        let base = TimeBase::for_channels(250.0, &channels);
        assert_relative_eq!(base.tick_hz, 500.0);
        assert_eq!(base.ticks_per_frame(), 2);
        assert_eq!(base.ticks_per_sample(1), 2);
        assert_eq!(base.ticks_per_sample(2), 1);
    }
    #[test]
    fn coprime_multiplicities_take_the_full_product() {
        let channels = vec![
            ChannelDescriptor::new(0, "a").with_samples_per_frame(2),
            ChannelDescriptor::new(1, "b").with_samples_per_frame(3),
        ];
        let base = TimeBase::for_channels(100.0, &channels);
        assert_relative_eq!(base.tick_hz, 600.0);
        assert_eq!(base.ticks_per_sample(2), 3);
        assert_eq!(base.ticks_per_sample(3), 2);
    }
    #[test]
    fn empty_or_degenerate_records_fall_back() {
        assert_relative_eq!(TimeBase::for_channels(128.0, &[]).tick_hz, 128.0);
        let base = TimeBase::for_channels(0.0, &[]);
        assert_relative_eq!(base.frame_hz, DEFAULT_FREQUENCY);
        assert_relative_eq!(base.tick_hz, DEFAULT_FREQUENCY);
    }
    #[test]
    fn rescaling_between_clocks() {
        let base = TimeBase {
            frame_hz: 250.0,
            tick_hz: 500.0,
        };
        assert_eq!(base.rescale(1000, 250.0), 500);
        assert_eq!(base.rescale(1000, 500.0), 1000);
        assert_eq!(base.from_clock(500, 250.0), 1000);
    }
}
