//! Dispatches one decoded request to the store and builds the JSON reply.
//!
//! Every failure degrades to an empty reply (`None`); the reason is logged.
use serde::Serialize;
use serde_json::Value;
use crate::config::ServerConfig;
use crate::fetch::{
    sanitize_text, CatalogEntry, FetchError, FetchPipeline, RecordSource, RecordStore, TimeBase,
};
use crate::request::{QueryParams, RequestKind};
use crate::timefmt::{format_clock, format_elapsed};
#[derive(Serialize)]
struct DatabaseList {
    database: Vec<CatalogEntry>,
}
#[derive(Serialize)]
struct RecordList {
    record: Vec<String>,
}
#[derive(Serialize)]
struct AnnotatorList {
    success: bool,
    annotator: Vec<CatalogEntry>,
}
#[derive(Serialize)]
struct InfoEnvelope {
    info: RecordInfo,
}
#[derive(Debug, Serialize)]
struct RecordInfo {
    db: String,
    record: String,
    tfreq: f64,
    start: Option<String>,
    end: Option<String>,
    duration: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    signal: Vec<SignalInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    note: Vec<String>,
}
#[derive(Debug, Serialize)]
struct SignalInfo {
    name: String,
    tps: u64,
    units: Option<String>,
    gain: f64,
    adcres: u32,
    adczero: i32,
    baseline: i32,
}
fn to_value<T: Serialize>(body: &T) -> Option<Value> {
    match serde_json::to_value(body) {
        Ok(value) => Some(value),
        Err(err) => {
            log::error!("failed to serialise reply: {err}");
            None
        }
    }
}
fn sanitize_catalog(entries: Vec<CatalogEntry>) -> Vec<CatalogEntry> {
    entries
        .into_iter()
        .map(|e| CatalogEntry::new(sanitize_text(&e.name), sanitize_text(&e.desc)))
        .collect()
}
fn record_info(db: &str, record: &str, source: &dyn RecordSource) -> RecordInfo {
    let header = source.header();
    let time_base = TimeBase::for_channels(header.frame_hz, source.channels());
    let length = header.length_frames.unwrap_or(0);
    let date = header.base_date.as_deref();
    let (start, end) = match header.base_time {
        Some(base) => {
            let elapsed = length as f64 / time_base.frame_hz;
            (
                Some(format_clock(base.seconds(), date)),
                Some(format_clock(base.seconds() + elapsed, date)),
            )
        }
        None => (None, None),
    };
    let signal = source
        .channels()
        .iter()
        .map(|c| SignalInfo {
            name: sanitize_text(&c.name),
            tps: time_base.ticks_per_sample(c.samples_per_frame),
            units: c.units.as_deref().map(sanitize_text),
            gain: c.effective_gain(),
            adcres: c.adc_resolution,
            adczero: c.adc_zero,
            baseline: c.baseline,
        })
        .collect();
    RecordInfo {
        db: sanitize_text(db),
        record: sanitize_text(record),
        tfreq: time_base.tick_hz,
        start,
        end,
        duration: format_elapsed(length, time_base.frame_hz),
        signal,
        note: header.notes.iter().map(|n| sanitize_text(n)).collect(),
    }
}
fn dispatch(
    store: &dyn RecordStore,
    kind: RequestKind,
    params: &QueryParams,
    config: &ServerConfig,
) -> Result<Option<Value>, FetchError> {
    if kind == RequestKind::DatabaseList {
        let database = sanitize_catalog(store.databases()?);
        return Ok(to_value(&DatabaseList { database }));
    }
    let Some(db) = params.get("db") else {
        log::debug!("no database given");
        return Ok(None);
    };
    match kind {
        RequestKind::RecordList => {
            let record = store
                .records(db)?
                .iter()
                .map(|r| sanitize_text(r))
                .collect();
            return Ok(to_value(&RecordList { record }));
        }
        RequestKind::AnnotatorList => {
            let annotator = sanitize_catalog(store.annotators(db)?);
            return Ok(to_value(&AnnotatorList {
                success: true,
                annotator,
            }));
        }
        _ => {}
    }
    let Some(record) = params.get("record") else {
        log::debug!("no record given");
        return Ok(None);
    };
    // The handle and every annotation stream opened from it are released at
    // the end of this scope, on success and on error alike.
    let mut source = store.open_record(db, record)?;
    if kind == RequestKind::Info {
        return Ok(to_value(&InfoEnvelope {
            info: record_info(db, record, source.as_ref()),
        }));
    }
    let request = params.fetch_request();
    let mut pipeline = FetchPipeline::new(source.as_mut(), config.max_annotators);
    let response = pipeline.run(&request);
    log::info!(
        "fetched {db}/{record}: {} signals, {} annotators",
        response.signal.as_ref().map_or(0, Vec::len),
        response.annotator.as_ref().map_or(0, Vec::len)
    );
    Ok(to_value(&response.into_envelope()))
}
/// Handles one request. `None` means the reply body is empty.
pub fn handle(
    store: &dyn RecordStore,
    params: &QueryParams,
    config: &ServerConfig,
) -> Option<Value> {
    let Some(action) = params.get("action") else {
        log::debug!("no action given");
        return None;
    };
    let Some(kind) = RequestKind::from_action(action) else {
        log::debug!("unknown action {action:?}");
        return None;
    };
    match dispatch(store, kind, params, config) {
        Ok(reply) => reply,
        Err(err) => {
            log::warn!("{action} request failed: {err}");
            None
        }
    }
}
