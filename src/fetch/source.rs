use std::borrow::Cow;
use std::cell::Cell;
use std::collections::BTreeMap;
use std::rc::Rc;
use crate::fetch::FetchError;
use crate::timefmt::{self, ClockTime};
/// Physical units per raw unit used when a channel declares no gain.
pub const DEFAULT_GAIN: f64 = 200.0;
/// Unit label reported for channels that declare none.
pub const DEFAULT_UNITS: &str = "mV";
/// Frame frequency assumed when a record declares a non-positive one.
pub const DEFAULT_FREQUENCY: f64 = 250.0;
/// Raw value that marks a missing sample.
pub const INVALID_SAMPLE: i32 = -32768;
/// Static description of one channel of a record.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelDescriptor {
    pub index: usize,
    pub name: String,
    pub units: Option<String>,
    pub samples_per_frame: usize,
    /// Raw units per physical unit; zero means "not declared".
    pub gain: f64,
    pub adc_resolution: u32,
    pub adc_zero: i32,
    pub baseline: i32,
    pub scale: Option<f64>,
}
impl ChannelDescriptor {
    pub fn new(index: usize, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
            units: None,
            samples_per_frame: 1,
            gain: 0.0,
            adc_resolution: 16,
            adc_zero: 0,
            baseline: 0,
            scale: None,
        }
    }
    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }
    pub fn with_samples_per_frame(mut self, spf: usize) -> Self {
        self.samples_per_frame = spf.max(1);
        self
    }
    pub fn with_gain(mut self, gain: f64) -> Self {
        self.gain = gain;
        self
    }
    pub fn with_baseline(mut self, baseline: i32) -> Self {
        self.baseline = baseline;
        self
    }
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = Some(scale);
        self
    }
    pub fn effective_gain(&self) -> f64 {
        if self.gain > 0.0 && self.gain.is_finite() {
            self.gain
        } else {
            DEFAULT_GAIN
        }
    }
    pub fn effective_units(&self) -> &str {
        self.units.as_deref().unwrap_or(DEFAULT_UNITS)
    }
    pub fn effective_scale(&self) -> f64 {
        self.scale.unwrap_or(1.0)
    }
    /// Native sampling rate of this channel for a record with the given frame rate.
    pub fn sample_rate_hz(&self, frame_hz: f64) -> f64 {
        frame_hz * self.samples_per_frame as f64
    }
}
/// Record-level metadata read from the header.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecordHeader {
    pub frame_hz: f64,
    pub length_frames: Option<u64>,
    pub base_time: Option<ClockTime>,
    pub base_date: Option<String>,
    pub notes: Vec<String>,
}
impl RecordHeader {
    pub fn new(frame_hz: f64) -> Self {
        Self {
            frame_hz,
            ..Self::default()
        }
    }
}
/// One event as delivered by an annotation stream.
#[derive(Clone, Debug, PartialEq)]
pub struct AnnotationEvent {
    /// Absolute time in ticks of the stream's own frequency.
    pub time: u64,
    pub code: u8,
    pub subtype: i32,
    pub channel: i32,
    pub number: i32,
    /// Length-prefixed auxiliary bytes: `aux[0]` is the payload length.
    pub aux: Option<Vec<u8>>,
}
impl AnnotationEvent {
    pub fn new(time: u64, code: u8) -> Self {
        Self {
            time,
            code,
            subtype: 0,
            channel: 0,
            number: 0,
            aux: None,
        }
    }
    pub fn with_aux_text(mut self, text: &str) -> Self {
        let payload = &text.as_bytes()[..text.len().min(255)];
        let mut aux = Vec::with_capacity(payload.len() + 1);
        aux.push(payload.len() as u8);
        aux.extend_from_slice(payload);
        self.aux = Some(aux);
        self
    }
}
/// Name/description pair from a database or annotator catalog.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct CatalogEntry {
    pub name: String,
    pub desc: String,
}
impl CatalogEntry {
    pub fn new(name: impl Into<String>, desc: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            desc: desc.into(),
        }
    }
}
/// Read-only access to a collection of databases.
pub trait RecordStore {
    fn databases(&self) -> Result<Vec<CatalogEntry>, FetchError>;
    fn records(&self, db: &str) -> Result<Vec<String>, FetchError>;
    fn annotators(&self, db: &str) -> Result<Vec<CatalogEntry>, FetchError>;
    /// Opens a record for reading. The handle releases its resources when dropped.
    fn open_record(&self, db: &str, record: &str) -> Result<Box<dyn RecordSource>, FetchError>;
}
/// An open record: metadata plus a seekable stream of multiplexed frames.
pub trait RecordSource {
    fn header(&self) -> &RecordHeader;
    fn channels(&self) -> &[ChannelDescriptor];
    /// Positions the frame stream so the next read returns `frame`.
    fn seek(&mut self, frame: u64) -> Result<(), FetchError>;
    /// Reads the next frame into `frame` (length `frame_size()`).
    /// Returns `Ok(false)` once the data is exhausted.
    fn read_frame(&mut self, frame: &mut [i32]) -> Result<bool, FetchError>;
    fn open_annotator(&self, name: &str) -> Result<Box<dyn AnnotationSource>, FetchError>;
    fn frame_size(&self) -> usize {
        self.channels().iter().map(|c| c.samples_per_frame).sum()
    }
    /// Converts a time string to frames; negative results denote absolute times.
    fn parse_time(&self, text: &str) -> Option<i64> {
        let header = self.header();
        timefmt::parse_time(text, header.frame_hz, header.length_frames, header.base_time)
    }
}
/// An open annotation stream, ordered by time.
pub trait AnnotationSource {
    /// Tick rate of the event times.
    fn frequency(&self) -> f64;
    /// Skips forward so the next event is the first at or after `time`.
    fn seek(&mut self, time: u64) -> Result<(), FetchError>;
    fn next_event(&mut self) -> Result<Option<AnnotationEvent>, FetchError>;
    fn type_label(&self, code: u8) -> Cow<'static, str> {
        standard_label(code)
    }
}
const MNEMONICS: [&str; 42] = [
    " ", "N", "L", "R", "a", "V", "F", "J", "A", "S", "E", "j", "/", "Q", "~", "", "|", "", "s",
    "T", "*", "D", "\"", "=", "p", "B", "^", "t", "+", "u", "?", "!", "[", "]", "e", "n", "@",
    "x", "f", "(", ")", "r",
];
/// Mnemonic for a standard annotation code, or `[code]` when it has none.
pub fn standard_label(code: u8) -> Cow<'static, str> {
    match MNEMONICS.get(code as usize) {
        Some(m) if !m.is_empty() => Cow::Borrowed(m),
        _ => Cow::Owned(format!("[{code}]")),
    }
}
/// Counts live handles so callers can check that every path releases them.
#[derive(Clone, Debug, Default)]
struct HandleCounter(Rc<Cell<usize>>);
impl HandleCounter {
    fn acquire(&self) -> HandleGuard {
        self.0.set(self.0.get() + 1);
        HandleGuard(self.0.clone())
    }
    fn live(&self) -> usize {
        self.0.get()
    }
}
struct HandleGuard(Rc<Cell<usize>>);
impl Drop for HandleGuard {
    fn drop(&mut self) {
        self.0.set(self.0.get().saturating_sub(1));
        log::trace!("released in-memory handle, {} still open", self.0.get());
    }
}
/// Fully in-memory record used for tests and deterministic playback.
#[derive(Clone, Debug)]
pub struct MemoryRecord {
    header: RecordHeader,
    channels: Vec<ChannelDescriptor>,
    frames: Vec<Vec<i32>>,
    annotators: BTreeMap<String, (f64, Vec<AnnotationEvent>)>,
}
impl MemoryRecord {
    pub fn new(frame_hz: f64, channels: Vec<ChannelDescriptor>) -> Self {
        Self {
            header: RecordHeader {
                length_frames: Some(0),
                ..RecordHeader::new(frame_hz)
            },
            channels,
            frames: Vec::new(),
            annotators: BTreeMap::new(),
        }
    }
    /// Each inner vector is one multiplexed frame.
    pub fn with_frames(mut self, frames: Vec<Vec<i32>>) -> Self {
        self.header.length_frames = Some(frames.len() as u64);
        self.frames = frames;
        self
    }
    pub fn with_annotator(
        mut self,
        name: impl Into<String>,
        frequency: f64,
        events: Vec<AnnotationEvent>,
    ) -> Self {
        self.annotators.insert(name.into(), (frequency, events));
        self
    }
    pub fn with_base_time(mut self, base_time: ClockTime, base_date: Option<String>) -> Self {
        self.header.base_time = Some(base_time);
        self.header.base_date = base_date;
        self
    }
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.header.notes.push(note.into());
        self
    }
}
/// In-memory store keyed by `(database, record)`.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    databases: Vec<CatalogEntry>,
    records: BTreeMap<(String, String), Rc<MemoryRecord>>,
    annotator_catalog: BTreeMap<String, Vec<CatalogEntry>>,
    handles: HandleCounter,
}
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn insert(&mut self, db: &str, record: &str, data: MemoryRecord) {
        if !self.databases.iter().any(|d| d.name == db) {
            self.databases.push(CatalogEntry::new(db, db));
        }
        let catalog = self.annotator_catalog.entry(db.to_string()).or_default();
        for name in data.annotators.keys() {
            if !catalog.iter().any(|a| &a.name == name) {
                catalog.push(CatalogEntry::new(name.clone(), name.clone()));
            }
        }
        self.records
            .insert((db.to_string(), record.to_string()), Rc::new(data));
    }
    /// Number of record and annotation handles that have not been dropped.
    pub fn open_handles(&self) -> usize {
        self.handles.live()
    }
}
impl RecordStore for MemoryStore {
    fn databases(&self) -> Result<Vec<CatalogEntry>, FetchError> {
        Ok(self.databases.clone())
    }
    fn records(&self, db: &str) -> Result<Vec<String>, FetchError> {
        Ok(self
            .records
            .keys()
            .filter(|(d, _)| d == db)
            .map(|(_, r)| r.clone())
            .collect())
    }
    fn annotators(&self, db: &str) -> Result<Vec<CatalogEntry>, FetchError> {
        Ok(self.annotator_catalog.get(db).cloned().unwrap_or_default())
    }
    fn open_record(&self, db: &str, record: &str) -> Result<Box<dyn RecordSource>, FetchError> {
        let data = self
            .records
            .get(&(db.to_string(), record.to_string()))
            .cloned()
            .ok_or_else(|| FetchError::RecordNotFound {
                db: db.to_string(),
                record: record.to_string(),
            })?;
        Ok(Box::new(MemoryRecordHandle {
            data,
            position: 0,
            handles: self.handles.clone(),
            _guard: self.handles.acquire(),
        }))
    }
}
struct MemoryRecordHandle {
    data: Rc<MemoryRecord>,
    position: usize,
    handles: HandleCounter,
    _guard: HandleGuard,
}
impl RecordSource for MemoryRecordHandle {
    fn header(&self) -> &RecordHeader {
        &self.data.header
    }
    fn channels(&self) -> &[ChannelDescriptor] {
        &self.data.channels
    }
    fn seek(&mut self, frame: u64) -> Result<(), FetchError> {
        if frame > self.data.frames.len() as u64 {
            return Err(FetchError::SeekPastEnd { frame });
        }
        self.position = frame as usize;
        Ok(())
    }
    fn read_frame(&mut self, frame: &mut [i32]) -> Result<bool, FetchError> {
        let Some(next) = self.data.frames.get(self.position) else {
            return Ok(false);
        };
        for (slot, value) in frame.iter_mut().zip(next.iter()) {
            *slot = *value;
        }
        self.position += 1;
        Ok(true)
    }
    fn open_annotator(&self, name: &str) -> Result<Box<dyn AnnotationSource>, FetchError> {
        let (frequency, events) =
            self.data
                .annotators
                .get(name)
                .ok_or_else(|| FetchError::AnnotatorNotFound {
                    name: name.to_string(),
                })?;
        Ok(Box::new(MemoryAnnotations {
            frequency: *frequency,
            events: events.clone(),
            position: 0,
            _guard: self.handles.acquire(),
        }))
    }
}
struct MemoryAnnotations {
    frequency: f64,
    events: Vec<AnnotationEvent>,
    position: usize,
    _guard: HandleGuard,
}
impl AnnotationSource for MemoryAnnotations {
    fn frequency(&self) -> f64 {
        self.frequency
    }
    fn seek(&mut self, time: u64) -> Result<(), FetchError> {
        self.position = self.events.partition_point(|e| e.time < time);
        Ok(())
    }
    fn next_event(&mut self) -> Result<Option<AnnotationEvent>, FetchError> {
        let event = self.events.get(self.position).cloned();
        if event.is_some() {
            self.position += 1;
        }
        Ok(event)
    }
}
