use serde_json::{json, Value};
use wavefetch::config::ServerConfig;
use wavefetch::fetch::{AnnotationEvent, ChannelDescriptor, MemoryRecord, MemoryStore};
use wavefetch::request::QueryParams;
use wavefetch::service::handle;
/// Two channels at 250 frames/s; the second is sampled twice per frame.
fn demo_store() -> MemoryStore {
    let channels = vec![
        ChannelDescriptor::new(0, "ECG").with_units("mV").with_gain(200.0),
        ChannelDescriptor::new(1, "ABP")
            .with_units("mmHg")
            .with_gain(100.0)
            .with_samples_per_frame(2),
    ];
    let frames = (0..1000).map(|f| vec![1000 + f, 2 * f, 2 * f + 1]).collect();
    let record = MemoryRecord::new(250.0, channels)
        .with_frames(frames)
        .with_annotator(
            "atr",
            250.0,
            vec![
                AnnotationEvent::new(10, 1),
                AnnotationEvent::new(300, 5).with_aux_text("(VT"),
            ],
        )
        .with_annotator("qrs", 500.0, vec![AnnotationEvent::new(100, 1)]);
    let mut store = MemoryStore::new();
    store.insert("demo", "r1", record);
    store
}
fn fetch(store: &MemoryStore, query: &str) -> Option<Value> {
    let query = format!("action=fetch&db=demo&record=r1&{query}");
    handle(store, &QueryParams::parse(&query), &ServerConfig::default())
}
fn deltas(block: &Value) -> Vec<i64> {
    block["samp"]
        .as_array()
        .map(|a| a.iter().filter_map(Value::as_i64).collect())
        .unwrap_or_default()
}
fn restore(deltas: &[i64]) -> Vec<i64> {
    deltas
        .iter()
        .scan(0i64, |acc, d| {
            *acc += d;
            Some(*acc)
        })
        .collect()
}
#[test]
fn one_second_of_the_frame_rate_channel() {
    let store = demo_store();
    let reply = fetch(&store, "signal=0").unwrap();
    let signal = &reply["fetch"]["signal"];
    assert_eq!(signal.as_array().map(Vec::len), Some(1));
    let block = &signal[0];
    assert_eq!(block["name"], json!("ECG"));
    assert_eq!(block["tps"], json!(2));
    assert_eq!(block["t0"], json!(0));
    assert_eq!(block["tf"], json!(500));
    let samp = deltas(block);
    assert_eq!(samp.len(), 250);
    assert_eq!(samp[0], 1000);
    assert!(samp[1..].iter().all(|&d| d == 1));
    assert!(reply["fetch"].get("annotator").is_none());
}
#[test]
fn oversampled_channel_gets_every_sample() {
    let store = demo_store();
    let reply = fetch(&store, "signal=ABP&t0=1&dt=0.5").unwrap();
    let block = &reply["fetch"]["signal"][0];
    assert_eq!(block["tps"], json!(1));
    assert_eq!(block["t0"], json!(500));
    assert_eq!(block["tf"], json!(750));
    let samples = restore(&deltas(block));
    assert_eq!(samples.len(), 250);
    assert_eq!(&samples[..4], &[500, 501, 502, 503]);
}
#[test]
fn empty_request_gives_empty_fetch_object() {
    let store = demo_store();
    assert_eq!(fetch(&store, ""), Some(json!({"fetch": {}})));
    // an index that names no channel selects nothing
    assert_eq!(fetch(&store, "signal=7"), Some(json!({"fetch": {}})));
}
#[test]
fn selection_order_and_duplicates_do_not_matter() {
    let store = demo_store();
    let forward = fetch(&store, "signal=0&signal=1").unwrap();
    let backward = fetch(&store, "signal=1&signal=0&signal=ECG").unwrap();
    assert_eq!(forward, backward);
    let names: Vec<&str> = forward["fetch"]["signal"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|b| b["name"].as_str())
        .collect();
    assert_eq!(names, vec!["ECG", "ABP"]);
}
#[test]
fn annotators_do_not_change_signal_output() {
    let store = demo_store();
    let plain = fetch(&store, "signal=0&signal=1&dt=2").unwrap();
    let annotated = fetch(&store, "signal=0&signal=1&dt=2&annotator=atr&annotator=qrs").unwrap();
    assert_eq!(plain["fetch"]["signal"], annotated["fetch"]["signal"]);
    let annotators = annotated["fetch"]["annotator"].as_array().unwrap();
    assert_eq!(annotators.len(), 2);
    assert_eq!(annotators[0]["name"], json!("atr"));
    // 250 Hz stream on a 500 tick/s clock
    assert_eq!(annotators[0]["annotation"][0]["t"], json!(20));
    assert_eq!(annotators[0]["annotation"][1]["t"], json!(600));
    assert_eq!(annotators[0]["annotation"][1]["a"], json!("V"));
    assert_eq!(annotators[0]["annotation"][1]["x"], json!("(VT"));
    assert_eq!(annotators[1]["annotation"][0]["t"], json!(100));
}
#[test]
fn missing_annotators_leave_an_empty_section() {
    let store = demo_store();
    let reply = fetch(&store, "annotator=nope").unwrap();
    assert_eq!(reply, json!({"fetch": {"annotator": []}}));
}
#[test]
fn window_past_the_end_is_truncated() {
    let store = demo_store();
    let reply = fetch(&store, "signal=0&t0=3.5&dt=2").unwrap();
    let block = &reply["fetch"]["signal"][0];
    assert_eq!(block["tf"], json!(2750));
    let samples = restore(&deltas(block));
    assert_eq!(samples.len(), 125);
    assert_eq!(samples.last(), Some(&1999));
    let beyond = fetch(&store, "signal=0&t0=60").unwrap();
    assert!(deltas(&beyond["fetch"]["signal"][0]).is_empty());
}
#[test]
fn zero_duration_gives_one_tick_of_samples() {
    let store = demo_store();
    let reply = fetch(&store, "signal=0&signal=1&t0=s10&dt=0").unwrap();
    let signal = &reply["fetch"]["signal"];
    assert_eq!(signal[1]["t0"], json!(20));
    assert_eq!(signal[1]["tf"], json!(21));
    assert_eq!(restore(&deltas(&signal[0])), vec![1010]);
    assert_eq!(restore(&deltas(&signal[1])), vec![20]);
}
#[test]
fn negative_times_are_taken_by_magnitude() {
    let store = demo_store();
    assert_eq!(
        fetch(&store, "signal=0&t0=-1&dt=-1"),
        fetch(&store, "signal=0&t0=1&dt=1")
    );
}
#[test]
fn handles_are_released_after_every_request() {
    let store = demo_store();
    fetch(&store, "signal=0&annotator=atr&annotator=missing");
    fetch(&store, "signal=0&t0=60");
    let params = QueryParams::parse("action=fetch&db=demo&record=absent&signal=0");
    assert_eq!(handle(&store, &params, &ServerConfig::default()), None);
    assert_eq!(store.open_handles(), 0);
}
#[test]
fn annotator_count_follows_configuration() {
    let store = demo_store();
    let config = ServerConfig {
        max_annotators: 1,
        ..ServerConfig::default()
    };
    let params =
        QueryParams::parse("action=fetch&db=demo&record=r1&annotator=qrs&annotator=atr");
    let reply = handle(&store, &params, &config).unwrap();
    let names: Vec<&str> = reply["fetch"]["annotator"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|b| b["name"].as_str())
        .collect();
    assert_eq!(names, vec!["qrs"]);
}
