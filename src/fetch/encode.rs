use serde::Serialize;
use crate::fetch::demux::SampleBuffer;
use crate::fetch::frequency::TimeBase;
use crate::fetch::range::TimeWindow;
use crate::fetch::response::sanitize_text;
use crate::fetch::source::ChannelDescriptor;
/// One channel of a fetch response. Field names are part of the wire format.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SignalBlock {
    pub name: String,
    pub units: String,
    pub t0: u64,
    pub tf: u64,
    pub gain: f64,
    pub base: i32,
    /// Ticks between consecutive samples of this channel.
    pub tps: u64,
    pub scale: f64,
    /// First differences of the raw samples, starting from an implicit 0.
    pub samp: Vec<i64>,
}
/// First differences of `samples`; prefix sums starting at 0 restore them.
pub fn delta_encode(samples: &[i32]) -> Vec<i64> {
    let mut previous = 0i64;
    samples
        .iter()
        .map(|&sample| {
            let current = i64::from(sample);
            let delta = current - previous;
            previous = current;
            delta
        })
        .collect()
}
pub fn encode_signal(
    buffer: &SampleBuffer,
    channel: &ChannelDescriptor,
    window: &TimeWindow,
    time_base: &TimeBase,
) -> SignalBlock {
    SignalBlock {
        name: sanitize_text(&channel.name),
        units: sanitize_text(channel.effective_units()),
        t0: window.t0,
        tf: window.tf,
        gain: channel.effective_gain(),
        base: channel.baseline,
        tps: time_base.ticks_per_sample(channel.samples_per_frame),
        scale: channel.effective_scale(),
        samp: delta_encode(&buffer.samples),
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::source::{DEFAULT_GAIN, DEFAULT_UNITS};
    fn prefix_sum(deltas: &[i64]) -> Vec<i32> {
        let mut acc = 0i64;
        deltas
            .iter()
            .map(|d| {
                acc += d;
                acc as i32
            })
            .collect()
    }
    #[test]
    fn deltas_restore_the_original_samples() {
        let samples = vec![
            995, 997, 1003, -32768, 1001, i32::MAX, i32::MIN, 0, 0, 12,
        ];
        let deltas = delta_encode(&samples);
        assert_eq!(deltas[0], 995);
        assert_eq!(deltas[1], 2);
        assert_eq!(prefix_sum(&deltas), samples);
    }
    #[test]
    fn empty_buffer_still_produces_metadata() {
        let channel = ChannelDescriptor::new(3, "RESP \"chest\"")
            .with_baseline(-12)
            .with_samples_per_frame(2)
            .with_scale(0.5);
        let buffer = SampleBuffer {
            channel: 3,
            samples: Vec::new(),
        };
        let time_base = TimeBase {
            frame_hz: 125.0,
            tick_hz: 500.0,
        };
        let block = encode_signal(&buffer, &channel, &TimeWindow { t0: 8, tf: 508 }, &time_base);
        assert_eq!(block.name, "RESP \"chest\"");
        assert_eq!(block.units, DEFAULT_UNITS);
        assert_eq!(block.gain, DEFAULT_GAIN);
        assert_eq!(block.base, -12);
        assert_eq!(block.tps, 2);
        assert_eq!(block.scale, 0.5);
        assert_eq!((block.t0, block.tf), (8, 508));
        assert!(block.samp.is_empty());
    }
    #[test]
    fn serializes_with_wire_field_names() {
        let channel = ChannelDescriptor::new(0, "ECG")
            .with_units("mV")
            .with_gain(200.0);
        let buffer = SampleBuffer {
            channel: 0,
            samples: vec![5, 7, 6],
        };
        let time_base = TimeBase {
            frame_hz: 360.0,
            tick_hz: 360.0,
        };
        let block = encode_signal(&buffer, &channel, &TimeWindow { t0: 0, tf: 3 }, &time_base);
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "name": "ECG", "units": "mV", "t0": 0, "tf": 3, "gain": 200.0,
                "base": 0, "tps": 1, "scale": 1.0, "samp": [5, 2, -1]
            })
        );
    }
}
