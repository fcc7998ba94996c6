use std::collections::BTreeSet;
use crate::fetch::frequency::TimeBase;
use crate::fetch::range::TimeWindow;
use crate::fetch::source::{ChannelDescriptor, RecordSource};
/// Largest per-channel preallocation, in samples.
const MAX_PREALLOCATED_SAMPLES: u64 = 1 << 20;
/// Channels picked by the client, kept in ascending index order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChannelSelection {
    channels: BTreeSet<usize>,
}
impl ChannelSelection {
    /// Builds a selection from raw request values.
    ///
    /// A value is a decimal channel index or a channel name. Out-of-range
    /// indices, unknown names and duplicates are dropped without error.
    pub fn from_requests<'a, I>(requests: I, channels: &[ChannelDescriptor]) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut selected = BTreeSet::new();
        for request in requests {
            let request = request.trim();
            match request.parse::<i64>() {
                Ok(index) if index >= 0 && (index as u64) < channels.len() as u64 => {
                    selected.insert(index as usize);
                }
                Ok(index) => log::debug!("ignoring out-of-range channel {index}"),
                Err(_) => match channels.iter().position(|c| c.name == request) {
                    Some(index) => {
                        selected.insert(index);
                    }
                    None => log::debug!("ignoring unknown channel {request:?}"),
                },
            }
        }
        Self { channels: selected }
    }
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
    pub fn len(&self) -> usize {
        self.channels.len()
    }
    pub fn contains(&self, channel: usize) -> bool {
        self.channels.contains(&channel)
    }
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.channels.iter().copied()
    }
}
/// Owner of each sample position within one multiplexed frame.
///
/// A slot holds the channel index when that channel is selected, `None`
/// otherwise, and the tick offset of its sample from the start of the frame.
/// `span` bounds the first and last selected slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameMap {
    slots: Vec<Option<usize>>,
    offsets: Vec<u64>,
    span: Option<(usize, usize)>,
}
impl FrameMap {
    pub fn new(
        channels: &[ChannelDescriptor],
        selection: &ChannelSelection,
        time_base: &TimeBase,
    ) -> Self {
        let width = channels.iter().map(|c| c.samples_per_frame).sum();
        let mut slots = Vec::with_capacity(width);
        let mut offsets = Vec::with_capacity(width);
        for (index, channel) in channels.iter().enumerate() {
            let owner = selection.contains(index).then_some(index);
            let tps = time_base.ticks_per_sample(channel.samples_per_frame);
            for k in 0..channel.samples_per_frame as u64 {
                slots.push(owner);
                offsets.push(k * tps);
            }
        }
        let first = slots.iter().position(Option::is_some);
        let last = slots.iter().rposition(Option::is_some);
        let span = first.zip(last);
        Self {
            slots,
            offsets,
            span,
        }
    }
    pub fn len(&self) -> usize {
        self.slots.len()
    }
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
    pub fn span(&self) -> Option<(usize, usize)> {
        self.span
    }
    pub fn slot(&self, position: usize) -> Option<usize> {
        self.slots.get(position).copied().flatten()
    }
    /// Ticks from the start of the frame to the sample at `position`.
    pub fn offset(&self, position: usize) -> u64 {
        self.offsets.get(position).copied().unwrap_or(0)
    }
}
/// Raw samples of one channel over the requested window.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SampleBuffer {
    pub channel: usize,
    pub samples: Vec<i32>,
}
/// Splits the record's frame stream over `window` into one buffer per selected channel.
///
/// Buffers come back in ascending channel order. Reading stops quietly at the
/// end of the data or on a read failure; samples collected so far are kept.
pub fn demultiplex(
    source: &mut dyn RecordSource,
    window: &TimeWindow,
    time_base: &TimeBase,
    selection: &ChannelSelection,
) -> Vec<SampleBuffer> {
    if selection.is_empty() {
        return Vec::new();
    }
    let tpf = time_base.ticks_per_frame();
    let first_frame = window.t0 / tpf;
    let end_frame = window.tf.div_ceil(tpf).max(first_frame + 1);
    let nominal_frames = end_frame - first_frame;
    let (map, mut buffers, lookup) = {
        let channels = source.channels();
        let map = FrameMap::new(channels, selection, time_base);
        let mut lookup = vec![None; channels.len()];
        let buffers: Vec<SampleBuffer> = selection
            .iter()
            .enumerate()
            .map(|(position, channel)| {
                lookup[channel] = Some(position);
                let hint = nominal_frames
                    .saturating_mul(channels[channel].samples_per_frame as u64)
                    .min(MAX_PREALLOCATED_SAMPLES);
                SampleBuffer {
                    channel,
                    samples: Vec::with_capacity(hint as usize),
                }
            })
            .collect();
        (map, buffers, lookup)
    };
    let Some((first, last)) = map.span() else {
        return buffers;
    };
    if let Err(err) = source.seek(first_frame) {
        log::debug!("cannot seek to frame {first_frame}: {err}");
        return buffers;
    }
    let mut frame = vec![0i32; map.len()];
    let mut frames_read = 0u64;
    while frames_read < nominal_frames {
        let frame_start = (first_frame + frames_read) * tpf;
        match source.read_frame(&mut frame) {
            Ok(true) => frames_read += 1,
            Ok(false) => {
                log::debug!("end of data after {frames_read} of {nominal_frames} frames");
                break;
            }
            Err(err) => {
                log::warn!("frame read failed after {frames_read} frames: {err}");
                break;
            }
        }
        for (position, value) in frame.iter().enumerate().take(last + 1).skip(first) {
            let Some(buffer) = map.slot(position).and_then(|channel| lookup[channel]) else {
                continue;
            };
            // frames at the window edges may hold samples outside it
            if window.contains(frame_start + map.offset(position)) {
                buffers[buffer].samples.push(*value);
            }
        }
    }
    buffers
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::source::{MemoryRecord, MemoryStore, RecordStore};
    fn channels() -> Vec<ChannelDescriptor> {
        vec![
            ChannelDescriptor::new(0, "ECG"),
            ChannelDescriptor::new(1, "ABP").with_samples_per_frame(2),
            ChannelDescriptor::new(2, "RESP"),
        ]
    }
    /// Frame `f` holds `[f, 100 + 2f, 101 + 2f, -f]`.
    fn store(frames: usize) -> MemoryStore {
        let data = (0..frames as i32)
            .map(|f| vec![f, 100 + 2 * f, 101 + 2 * f, -f])
            .collect();
        let mut store = MemoryStore::new();
        store.insert(
            "db",
            "rec",
            MemoryRecord::new(250.0, channels()).with_frames(data),
        );
        store
    }
    fn time_base() -> TimeBase {
        TimeBase::for_channels(250.0, &channels())
    }
    #[test]
    fn selection_is_ordered_and_deduplicated() {
        let a = ChannelSelection::from_requests(["2", "0", "2", "7", "-1"], &channels());
        let b = ChannelSelection::from_requests(["0", "2"], &channels());
        assert_eq!(a, b);
        assert_eq!(a.iter().collect::<Vec<_>>(), vec![0, 2]);
    }
    #[test]
    fn selection_accepts_names() {
        let selection = ChannelSelection::from_requests(["ABP", "nope"], &channels());
        assert_eq!(selection.iter().collect::<Vec<_>>(), vec![1]);
    }
    #[test]
    fn frame_map_marks_selected_slots() {
        let selection = ChannelSelection::from_requests(["1"], &channels());
        let map = FrameMap::new(&channels(), &selection, &time_base());
        assert_eq!(map.len(), 4);
        assert_eq!(map.span(), Some((1, 2)));
        assert_eq!(map.slot(0), None);
        assert_eq!(map.slot(2), Some(1));
        assert_eq!(map.offset(1), 0);
        assert_eq!(map.offset(2), 1);
        assert_eq!(map.offset(3), 0);
        let empty = FrameMap::new(&channels(), &ChannelSelection::default(), &time_base());
        assert_eq!(empty.span(), None);
    }
    #[test]
    fn splits_interleaved_frames() {
        let store = store(10);
        let mut source = store.open_record("db", "rec").unwrap();
        let selection = ChannelSelection::from_requests(["2", "1"], &channels());
        let window = TimeWindow { t0: 4, tf: 10 };
        let buffers = demultiplex(source.as_mut(), &window, &time_base(), &selection);
        assert_eq!(buffers.len(), 2);
        assert_eq!(buffers[0].channel, 1);
        assert_eq!(buffers[0].samples, vec![104, 105, 106, 107, 108, 109]);
        assert_eq!(buffers[1].channel, 2);
        assert_eq!(buffers[1].samples, vec![-2, -3, -4]);
    }
    #[test]
    fn one_tick_window_holds_one_sample_per_channel() {
        let store = store(30);
        let mut source = store.open_record("db", "rec").unwrap();
        let selection = ChannelSelection::from_requests(["0", "1"], &channels());
        let window = TimeWindow { t0: 20, tf: 21 };
        let buffers = demultiplex(source.as_mut(), &window, &time_base(), &selection);
        assert_eq!(buffers[0].samples, vec![10]);
        assert_eq!(buffers[1].samples, vec![120]);
    }
    #[test]
    fn window_edges_inside_a_frame_are_respected() {
        let store = store(30);
        let mut source = store.open_record("db", "rec").unwrap();
        let selection = ChannelSelection::from_requests(["0", "1"], &channels());
        let window = TimeWindow { t0: 5, tf: 8 };
        let buffers = demultiplex(source.as_mut(), &window, &time_base(), &selection);
        // ticks 5..8 cover the second half of frame 2 and the first of frame 3
        assert_eq!(buffers[0].samples, vec![3]);
        assert_eq!(buffers[1].samples, vec![105, 106, 107]);
    }
    #[test]
    fn truncates_at_end_of_data() {
        let store = store(5);
        let mut source = store.open_record("db", "rec").unwrap();
        let selection = ChannelSelection::from_requests(["0", "1"], &channels());
        let window = TimeWindow { t0: 6, tf: 500 };
        let buffers = demultiplex(source.as_mut(), &window, &time_base(), &selection);
        // frames 3 and 4 remain
        assert_eq!(buffers[0].samples, vec![3, 4]);
        assert_eq!(buffers[1].samples.len(), 4);
    }
    #[test]
    fn window_past_the_end_yields_empty_buffers() {
        let store = store(5);
        let mut source = store.open_record("db", "rec").unwrap();
        let selection = ChannelSelection::from_requests(["0"], &channels());
        let window = TimeWindow { t0: 1000, tf: 1500 };
        let buffers = demultiplex(source.as_mut(), &window, &time_base(), &selection);
        assert_eq!(buffers.len(), 1);
        assert!(buffers[0].samples.is_empty());
    }
    #[test]
    fn empty_selection_reads_nothing() {
        let store = store(5);
        let mut source = store.open_record("db", "rec").unwrap();
        let window = TimeWindow { t0: 0, tf: 10 };
        let buffers = demultiplex(
            source.as_mut(),
            &window,
            &time_base(),
            &ChannelSelection::default(),
        );
        assert!(buffers.is_empty());
    }
}
