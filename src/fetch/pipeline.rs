use crate::fetch::annotations::merge_annotations;
use crate::fetch::demux::{demultiplex, ChannelSelection};
use crate::fetch::encode::{encode_signal, SignalBlock};
use crate::fetch::frequency::TimeBase;
use crate::fetch::range::{resolve_window, TimeWindow};
use crate::fetch::response::FetchResponse;
use crate::fetch::source::RecordSource;
/// What the client asked for, as raw parameter values.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FetchRequest {
    pub signals: Vec<String>,
    pub annotators: Vec<String>,
    pub start: Option<String>,
    pub duration: Option<String>,
}
/// Runs one fetch against an open record.
pub struct FetchPipeline<'a> {
    source: &'a mut dyn RecordSource,
    time_base: TimeBase,
    max_annotators: usize,
}
impl<'a> FetchPipeline<'a> {
    pub fn new(source: &'a mut dyn RecordSource, max_annotators: usize) -> Self {
        let time_base = TimeBase::for_channels(source.header().frame_hz, source.channels());
        log::debug!(
            "frame rate {} Hz, tick rate {} Hz",
            time_base.frame_hz,
            time_base.tick_hz
        );
        Self {
            source,
            time_base,
            max_annotators,
        }
    }
    pub fn time_base(&self) -> TimeBase {
        self.time_base
    }
    pub fn window(&self, request: &FetchRequest) -> TimeWindow {
        let source = &*self.source;
        resolve_window(
            request.start.as_deref(),
            request.duration.as_deref(),
            &self.time_base,
            |text| source.parse_time(text),
        )
    }
    pub fn run(&mut self, request: &FetchRequest) -> FetchResponse {
        let window = self.window(request);
        let selection = ChannelSelection::from_requests(
            request.signals.iter().map(String::as_str),
            self.source.channels(),
        );
        let buffers = demultiplex(&mut *self.source, &window, &self.time_base, &selection);
        let channels = self.source.channels();
        let signals: Vec<SignalBlock> = buffers
            .iter()
            .map(|buffer| {
                encode_signal(buffer, &channels[buffer.channel], &window, &self.time_base)
            })
            .collect();
        let annotators = (!request.annotators.is_empty()).then(|| {
            merge_annotations(
                &*self.source,
                &request.annotators,
                &window,
                &self.time_base,
                self.max_annotators,
            )
        });
        FetchResponse::assemble(signals, annotators)
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::source::{
        AnnotationEvent, ChannelDescriptor, MemoryRecord, MemoryStore, RecordStore,
    };
    fn store() -> MemoryStore {
        let channels = vec![
            ChannelDescriptor::new(0, "ECG").with_units("mV").with_gain(200.0),
            ChannelDescriptor::new(1, "ABP")
                .with_units("mmHg")
                .with_samples_per_frame(2),
        ];
        let frames = (0..1000).map(|f| vec![1000 + f % 7, f, -f]).collect();
        let record = MemoryRecord::new(250.0, channels)
            .with_frames(frames)
            .with_annotator("atr", 250.0, vec![AnnotationEvent::new(10, 1)]);
        let mut store = MemoryStore::new();
        store.insert("db", "rec", record);
        store
    }
    #[test]
    fn one_second_of_the_slow_channel() {
        let store = store();
        let mut source = store.open_record("db", "rec").unwrap();
        let mut pipeline = FetchPipeline::new(source.as_mut(), 16);
        assert_eq!(pipeline.time_base().tick_hz, 500.0);
        let request = FetchRequest {
            signals: vec!["0".into()],
            ..FetchRequest::default()
        };
        let response = pipeline.run(&request);
        let signal = response.signal.unwrap();
        assert_eq!(signal.len(), 1);
        assert_eq!(signal[0].tps, 2);
        assert_eq!(signal[0].t0, 0);
        assert_eq!(signal[0].tf, 500);
        assert_eq!(signal[0].samp.len(), 250);
        assert_eq!(signal[0].samp[0], 1000);
        assert!(response.annotator.is_none());
    }
    #[test]
    fn annotations_share_the_tick_axis() {
        let store = store();
        let mut source = store.open_record("db", "rec").unwrap();
        let mut pipeline = FetchPipeline::new(source.as_mut(), 16);
        let request = FetchRequest {
            annotators: vec!["atr".into()],
            ..FetchRequest::default()
        };
        let response = pipeline.run(&request);
        assert!(response.signal.is_none());
        let annotators = response.annotator.unwrap();
        assert_eq!(annotators[0].annotation[0].t, 20);
    }
}
