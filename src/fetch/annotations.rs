use serde::Serialize;
use crate::fetch::frequency::TimeBase;
use crate::fetch::range::TimeWindow;
use crate::fetch::response::sanitize_text;
use crate::fetch::source::{AnnotationEvent, AnnotationSource, RecordSource};
use crate::fetch::FetchError;
/// Default bound on annotators per request.
pub const MAX_ANNOTATORS: usize = 16;
/// One annotation as sent to the client. Field names are part of the wire format.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AnnotationRecord {
    /// Time in ticks of the unified clock.
    pub t: u64,
    pub a: String,
    pub s: i32,
    pub c: i32,
    pub n: i32,
    pub x: Option<String>,
}
/// All annotations of one stream that fall inside the window.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AnnotatorBlock {
    pub name: String,
    pub annotation: Vec<AnnotationRecord>,
}
/// Printable payload of a length-prefixed auxiliary string.
///
/// Only the bytes covered by the length prefix are considered; anything
/// outside printable ASCII is dropped.
pub fn aux_text(aux: &[u8]) -> Option<String> {
    let (&len, rest) = aux.split_first()?;
    let payload = &rest[..rest.len().min(len as usize)];
    Some(
        payload
            .iter()
            .filter(|b| (0x20..0x7f).contains(*b))
            .map(|&b| b as char)
            .collect(),
    )
}
fn to_record(
    stream: &dyn AnnotationSource,
    event: &AnnotationEvent,
    time_base: &TimeBase,
) -> AnnotationRecord {
    AnnotationRecord {
        t: time_base.from_clock(event.time, stream.frequency()),
        a: sanitize_text(&stream.type_label(event.code)),
        s: event.subtype,
        c: event.channel,
        n: event.number,
        x: event.aux.as_deref().and_then(aux_text).map(|x| sanitize_text(&x)),
    }
}
/// Appends the events of one open stream that fall inside `window`.
///
/// Events pushed before an error stay in `records`.
fn collect_events(
    stream: &mut dyn AnnotationSource,
    window: &TimeWindow,
    time_base: &TimeBase,
    records: &mut Vec<AnnotationRecord>,
) -> Result<(), FetchError> {
    let t0 = time_base.rescale(window.t0, stream.frequency());
    let tf = time_base.rescale(window.tf, stream.frequency());
    if t0 > 0 {
        stream.seek(t0)?;
    }
    while let Some(event) = stream.next_event()? {
        if event.time >= tf {
            break;
        }
        if event.time < t0 {
            continue;
        }
        records.push(to_record(stream, &event, time_base));
    }
    Ok(())
}
/// Collects annotations from each named stream, in request order.
///
/// A stream that cannot be opened is left out of the result; a stream that
/// fails mid-read keeps the events read before the failure. At most `limit`
/// names are considered.
pub fn merge_annotations(
    source: &dyn RecordSource,
    names: &[String],
    window: &TimeWindow,
    time_base: &TimeBase,
    limit: usize,
) -> Vec<AnnotatorBlock> {
    if names.len() > limit {
        log::warn!("{} annotators requested, reading the first {limit}", names.len());
    }
    let mut blocks = Vec::new();
    for name in names.iter().take(limit) {
        let mut stream = match source.open_annotator(name) {
            Ok(stream) => stream,
            Err(err) => {
                log::debug!("skipping annotator {name}: {err}");
                continue;
            }
        };
        let mut annotation = Vec::new();
        if let Err(err) = collect_events(stream.as_mut(), window, time_base, &mut annotation) {
            log::warn!(
                "annotator {name} failed after {} annotations: {err}",
                annotation.len()
            );
        }
        blocks.push(AnnotatorBlock {
            name: sanitize_text(name),
            annotation,
        });
    }
    blocks
}
