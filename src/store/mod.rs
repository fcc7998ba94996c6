//! Record store backed by a directory tree of WFDB-style files.
//!
//! ```text
//! <root>/DBS                  name<TAB>description per database
//! <root>/<db>/RECORDS         one record name per line
//! <root>/<db>/ANNOTATORS      name<TAB>description per annotator
//! <root>/<db>/<record>.hea    header
//! <root>/<db>/<record>.<ann>  MIT-format annotations
//! ```
pub mod annotations;
pub mod calibration;
pub mod header;
pub mod signals;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use crate::fetch::{
    AnnotationSource, CatalogEntry, ChannelDescriptor, FetchError, RecordHeader, RecordSource,
    RecordStore,
};
pub use annotations::MitAnnotations;
pub use calibration::{CalibrationEntry, CalibrationTable};
pub use header::{parse_header, HeaderFile, SignalSpec};
pub use signals::{GroupMember, SampleDecoder, SampleFormat, SignalGroup};
/// Rejects names that could escape the database root.
pub fn check_component(value: &str) -> Result<(), FetchError> {
    let bad = value.is_empty()
        || value.starts_with('/')
        || value.contains('\\')
        || value.contains('\0')
        || value.split('/').any(|part| part == "..");
    if bad {
        return Err(FetchError::InvalidPath(value.to_string()));
    }
    Ok(())
}
/// Appends `.suffix` without touching dots already in the record name.
fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut name = base.as_os_str().to_os_string();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}
fn read_text(path: &Path) -> Result<String, FetchError> {
    fs::read_to_string(path).map_err(|e| FetchError::io(path, e))
}
/// Parses `name<TAB>description` lines; lines without a tab are skipped.
fn parse_catalog(text: &str) -> Vec<CatalogEntry> {
    text.lines()
        .filter_map(|line| line.split_once('\t'))
        .map(|(name, desc)| CatalogEntry::new(name.trim(), desc.trim()))
        .filter(|entry| !entry.name.is_empty())
        .collect()
}
pub struct DirectoryStore {
    root: PathBuf,
    calibration: CalibrationTable,
}
impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>, calibration: CalibrationTable) -> Self {
        Self {
            root: root.into(),
            calibration,
        }
    }
    pub fn root(&self) -> &Path {
        &self.root
    }
    fn database_dir(&self, db: &str) -> Result<PathBuf, FetchError> {
        check_component(db)?;
        Ok(self.root.join(db))
    }
    fn channels_for(&self, record: &str, specs: &[SignalSpec]) -> Vec<ChannelDescriptor> {
        specs
            .iter()
            .enumerate()
            .map(|(index, spec)| {
                let name = spec
                    .description
                    .clone()
                    .unwrap_or_else(|| format!("{record}, signal {index}"));
                let mut channel = ChannelDescriptor::new(index, name)
                    .with_samples_per_frame(spec.samples_per_frame)
                    .with_gain(spec.gain)
                    .with_baseline(spec.baseline);
                channel.units = spec.units.clone();
                channel.adc_resolution = spec.adc_resolution;
                channel.adc_zero = spec.adc_zero;
                channel.scale = self
                    .calibration
                    .lookup(&channel.name, channel.units.as_deref())
                    .map(|entry| entry.scale);
                channel
            })
            .collect()
    }
}
/// Opens one decoder per run of consecutive signals stored in the same file.
fn open_groups(dir: &Path, specs: &[SignalSpec]) -> Result<Vec<SignalGroup>, FetchError> {
    let mut groups: Vec<(String, SignalGroup)> = Vec::new();
    let mut frame_offset = 0;
    for spec in specs {
        let member = GroupMember {
            frame_offset,
            samples_per_frame: spec.samples_per_frame,
        };
        frame_offset += spec.samples_per_frame;
        if let Some((file, group)) = groups.last_mut() {
            if *file == spec.file {
                group.members.push(member);
                continue;
            }
        }
        check_component(&spec.file)?;
        let format = SampleFormat::from_code(spec.format)?;
        let path = dir.join(&spec.file);
        let decoder = SampleDecoder::open(&path, format, spec.byte_offset)?;
        groups.push((
            spec.file.clone(),
            SignalGroup {
                path,
                decoder,
                members: vec![member],
            },
        ));
    }
    Ok(groups.into_iter().map(|(_, group)| group).collect())
}
/// Frames in the first signal file, for headers that omit the length.
fn length_from_file(group: &SignalGroup, spec: &SignalSpec) -> Option<u64> {
    let bytes = fs::metadata(&group.path).ok()?.len();
    let format = SampleFormat::from_code(spec.format).ok()?;
    let samples = format.samples_in(bytes.saturating_sub(spec.byte_offset));
    let per_frame = group.samples_per_frame();
    (per_frame > 0).then(|| samples / per_frame)
}
impl RecordStore for DirectoryStore {
    fn databases(&self) -> Result<Vec<CatalogEntry>, FetchError> {
        Ok(parse_catalog(&read_text(&self.root.join("DBS"))?))
    }
    fn records(&self, db: &str) -> Result<Vec<String>, FetchError> {
        let text = read_text(&self.database_dir(db)?.join("RECORDS"))?;
        Ok(text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }
    fn annotators(&self, db: &str) -> Result<Vec<CatalogEntry>, FetchError> {
        Ok(parse_catalog(&read_text(
            &self.database_dir(db)?.join("ANNOTATORS"),
        )?))
    }
    fn open_record(&self, db: &str, record: &str) -> Result<Box<dyn RecordSource>, FetchError> {
        check_component(record)?;
        let base = self.database_dir(db)?.join(record);
        let header_path = with_suffix(&base, "hea");
        let text = fs::read_to_string(&header_path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => FetchError::RecordNotFound {
                db: db.to_string(),
                record: record.to_string(),
            },
            _ => FetchError::io(&header_path, e),
        })?;
        let parsed = parse_header(&text)?;
        let dir = header_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        let channels = self.channels_for(&parsed.record, &parsed.signals);
        let groups = open_groups(&dir, &parsed.signals)?;
        let mut header = parsed.header;
        if header.length_frames.is_none() {
            header.length_frames = groups
                .first()
                .zip(parsed.signals.first())
                .and_then(|(group, spec)| length_from_file(group, spec));
        }
        log::debug!(
            "opened {db}/{record}: {} channels in {} files, {:?} frames",
            channels.len(),
            groups.len(),
            header.length_frames
        );
        Ok(Box::new(DirectoryRecord {
            name: format!("{db}/{record}"),
            base,
            header,
            channels,
            groups,
            position: 0,
        }))
    }
}
/// An open record; its signal files close when it is dropped.
pub struct DirectoryRecord {
    name: String,
    /// `<root>/<db>/<record>` without extension.
    base: PathBuf,
    header: RecordHeader,
    channels: Vec<ChannelDescriptor>,
    groups: Vec<SignalGroup>,
    position: u64,
}
impl RecordSource for DirectoryRecord {
    fn header(&self) -> &RecordHeader {
        &self.header
    }
    fn channels(&self) -> &[ChannelDescriptor] {
        &self.channels
    }
    fn seek(&mut self, frame: u64) -> Result<(), FetchError> {
        if matches!(self.header.length_frames, Some(len) if frame > len) {
            return Err(FetchError::SeekPastEnd { frame });
        }
        for group in &mut self.groups {
            group.seek_frame(frame)?;
        }
        self.position = frame;
        Ok(())
    }
    fn read_frame(&mut self, frame: &mut [i32]) -> Result<bool, FetchError> {
        if matches!(self.header.length_frames, Some(len) if self.position >= len) {
            return Ok(false);
        }
        for group in &mut self.groups {
            if !group.read_into(frame)? {
                return Ok(false);
            }
        }
        self.position += 1;
        Ok(true)
    }
    fn open_annotator(&self, name: &str) -> Result<Box<dyn AnnotationSource>, FetchError> {
        if name.is_empty() || name.contains('/') {
            return Err(FetchError::InvalidPath(name.to_string()));
        }
        check_component(name)?;
        let path = with_suffix(&self.base, name);
        if !path.is_file() {
            return Err(FetchError::AnnotatorNotFound {
                name: name.to_string(),
            });
        }
        Ok(Box::new(MitAnnotations::open(&path, self.header.frame_hz)?))
    }
}
impl Drop for DirectoryRecord {
    fn drop(&mut self) {
        log::trace!("closing record {} ({} files)", self.name, self.groups.len());
    }
}
