//! Parser for record header (`.hea`) files.
//!
//! Record line: `name nsig [freq[/cfreq[(base)]] [nsamp [basetime [basedate]]]]`.
//! Signal lines: `file format[xspf][:skew][+offset] [gain[(baseline)][/units]
//! [adcres [adczero [initval [checksum [blocksize [desc...]]]]]]]`.
//! Lines starting with `#` are kept as notes.
use crate::fetch::{FetchError, RecordHeader, DEFAULT_FREQUENCY};
use crate::timefmt::ClockTime;
/// One signal line of a header.
#[derive(Clone, Debug, PartialEq)]
pub struct SignalSpec {
    pub file: String,
    pub format: u32,
    pub samples_per_frame: usize,
    pub byte_offset: u64,
    pub gain: f64,
    pub baseline: i32,
    pub units: Option<String>,
    pub adc_resolution: u32,
    pub adc_zero: i32,
    pub description: Option<String>,
}
#[derive(Clone, Debug, PartialEq)]
pub struct HeaderFile {
    pub record: String,
    pub header: RecordHeader,
    pub signals: Vec<SignalSpec>,
}
fn malformed(line: usize, reason: impl Into<String>) -> FetchError {
    FetchError::MalformedHeader {
        line,
        reason: reason.into(),
    }
}
fn default_resolution(format: u32) -> u32 {
    match format {
        212 => 12,
        80 => 8,
        24 => 24,
        32 => 32,
        _ => 16,
    }
}
/// Splits `text` at the first of `marker`, returning the head and the optional tail.
fn split_once_opt(text: &str, marker: char) -> (&str, Option<&str>) {
    match text.split_once(marker) {
        Some((head, tail)) => (head, Some(tail)),
        None => (text, None),
    }
}
fn parse_record_line(
    line_no: usize,
    tokens: &[&str],
) -> Result<(String, usize, RecordHeader), FetchError> {
    let name = tokens[0];
    if name.contains('/') {
        return Err(FetchError::Unsupported(format!(
            "multi-segment record {name}"
        )));
    }
    let nsig = match tokens.get(1) {
        Some(n) => n
            .parse::<usize>()
            .map_err(|_| malformed(line_no, format!("bad signal count {n:?}")))?,
        None => 0,
    };
    let mut header = RecordHeader::new(DEFAULT_FREQUENCY);
    if let Some(spec) = tokens.get(2) {
        let (freq, _) = split_once_opt(spec, '/');
        let freq: f64 = freq
            .parse()
            .map_err(|_| malformed(line_no, format!("bad frequency {spec:?}")))?;
        if freq > 0.0 {
            header.frame_hz = freq;
        }
    }
    if let Some(nsamp) = tokens.get(3) {
        let nsamp: u64 = nsamp
            .parse()
            .map_err(|_| malformed(line_no, format!("bad sample count {nsamp:?}")))?;
        header.length_frames = (nsamp > 0).then_some(nsamp);
    }
    if let Some(time) = tokens.get(4) {
        header.base_time = ClockTime::parse(time);
    }
    header.base_date = tokens.get(5).map(|d| d.to_string());
    Ok((name.to_string(), nsig, header))
}
fn parse_format(line_no: usize, spec: &str) -> Result<(u32, usize, u64), FetchError> {
    let (rest, offset) = split_once_opt(spec, '+');
    let (rest, _skew) = split_once_opt(rest, ':');
    let (format, spf) = split_once_opt(rest, 'x');
    let format = format
        .parse::<u32>()
        .map_err(|_| malformed(line_no, format!("bad format {spec:?}")))?;
    let spf = match spf {
        Some(n) => n
            .parse::<usize>()
            .map_err(|_| malformed(line_no, format!("bad samples per frame {spec:?}")))?
            .max(1),
        None => 1,
    };
    let offset = match offset {
        Some(n) => n
            .parse::<u64>()
            .map_err(|_| malformed(line_no, format!("bad byte offset {spec:?}")))?,
        None => 0,
    };
    Ok((format, spf, offset))
}
/// Parses `gain[(baseline)][/units]`.
fn parse_gain(
    line_no: usize,
    spec: &str,
) -> Result<(f64, Option<i32>, Option<String>), FetchError> {
    let (rest, units) = split_once_opt(spec, '/');
    let (gain, baseline) = split_once_opt(rest, '(');
    let gain = gain
        .parse::<f64>()
        .map_err(|_| malformed(line_no, format!("bad gain {spec:?}")))?;
    let baseline = match baseline {
        Some(b) => Some(
            b.trim_end_matches(')')
                .parse::<i32>()
                .map_err(|_| malformed(line_no, format!("bad baseline {spec:?}")))?,
        ),
        None => None,
    };
    let units = units.filter(|u| !u.is_empty()).map(str::to_string);
    Ok((gain, baseline, units))
}
fn parse_signal_line(line_no: usize, tokens: &[&str]) -> Result<SignalSpec, FetchError> {
    let file = tokens[0].to_string();
    let format_spec = tokens
        .get(1)
        .ok_or_else(|| malformed(line_no, "missing storage format"))?;
    let (format, samples_per_frame, byte_offset) = parse_format(line_no, format_spec)?;
    let (gain, baseline, units) = match tokens.get(2) {
        Some(spec) => parse_gain(line_no, spec)?,
        None => (0.0, None, None),
    };
    let int_field = |index: usize, what: &str| -> Result<Option<i64>, FetchError> {
        tokens
            .get(index)
            .map(|t| {
                t.parse::<i64>()
                    .map_err(|_| malformed(line_no, format!("bad {what} {t:?}")))
            })
            .transpose()
    };
    let out_of_range =
        |what: &str, value: i64| malformed(line_no, format!("{what} {value} out of range"));
    let adc_resolution = match int_field(3, "ADC resolution")?.filter(|r| *r > 0) {
        Some(r) => u32::try_from(r).map_err(|_| out_of_range("ADC resolution", r))?,
        None => default_resolution(format),
    };
    let adc_zero = match int_field(4, "ADC zero")? {
        Some(z) => i32::try_from(z).map_err(|_| out_of_range("ADC zero", z))?,
        None => 0,
    };
    let description = (tokens.len() > 8).then(|| tokens[8..].join(" "));
    Ok(SignalSpec {
        file,
        format,
        samples_per_frame,
        byte_offset,
        gain,
        baseline: baseline.unwrap_or(adc_zero),
        units,
        adc_resolution,
        adc_zero,
        description,
    })
}
pub fn parse_header(text: &str) -> Result<HeaderFile, FetchError> {
    let mut record: Option<(String, usize, RecordHeader)> = None;
    let mut notes = Vec::new();
    let mut signals = Vec::new();
    for (index, raw) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(note) = line.strip_prefix('#') {
            if record.is_some() {
                notes.push(note.trim().to_string());
            }
            continue;
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        match record.as_ref().map(|(_, nsig, _)| *nsig) {
            None => record = Some(parse_record_line(line_no, &tokens)?),
            Some(nsig) if signals.len() < nsig => {
                signals.push(parse_signal_line(line_no, &tokens)?);
            }
            Some(_) => log::debug!("ignoring extra header line {line_no}"),
        }
    }
    let (name, nsig, mut header) = record.ok_or_else(|| malformed(0, "missing record line"))?;
    if signals.len() < nsig {
        return Err(malformed(
            0,
            format!("expected {nsig} signal lines, found {}", signals.len()),
        ));
    }
    header.notes = notes;
    Ok(HeaderFile {
        record: name,
        header,
        signals,
    })
}
