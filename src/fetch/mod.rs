// src/fetch/mod.rs
// Extraction and encoding engine: one module per stage of a fetch.
pub mod annotations;
pub mod demux;
pub mod encode;
pub mod error;
pub mod frequency;
pub mod pipeline;
pub mod range;
pub mod response;
pub mod source;
pub use annotations::{merge_annotations, AnnotationRecord, AnnotatorBlock, MAX_ANNOTATORS};
pub use demux::{demultiplex, ChannelSelection, FrameMap, SampleBuffer};
pub use encode::{delta_encode, encode_signal, SignalBlock};
pub use error::FetchError;
pub use frequency::{approx_lcm, TimeBase};
pub use pipeline::{FetchPipeline, FetchRequest};
pub use range::{resolve_window, TimeWindow};
pub use response::{sanitize_text, FetchEnvelope, FetchResponse};
pub use source::{
    AnnotationEvent, AnnotationSource, CatalogEntry, ChannelDescriptor, MemoryRecord, MemoryStore,
    RecordHeader, RecordSource, RecordStore, DEFAULT_FREQUENCY, DEFAULT_GAIN, DEFAULT_UNITS,
    INVALID_SAMPLE,
};
