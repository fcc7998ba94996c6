//! Reader for MIT-format annotation files.
//!
//! Each record is a little-endian 16-bit word holding a 6-bit code and a
//! 10-bit value. Codes above the standard range are pseudo-codes that adjust
//! the time or the fields of the surrounding annotation.
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use crate::fetch::{AnnotationEvent, AnnotationSource, FetchError};
const SKIP: u8 = 59;
const NUM: u8 = 60;
const SUB: u8 = 61;
const CHN: u8 = 62;
const AUX: u8 = 63;
/// Code of the comment annotation that may carry the time resolution.
const NOTE: u8 = 22;
const RESOLUTION_PREFIX: &str = "## time resolution: ";
fn split_word(word: u16) -> (u8, u16) {
    ((word >> 10) as u8, word & 0x03ff)
}
fn sign_extend_10(value: u16) -> i32 {
    (i32::from(value) << 22) >> 22
}
/// Stream over one annotation file.
pub struct MitAnnotations<R> {
    path: PathBuf,
    reader: R,
    frequency: f64,
    time: i64,
    number: i32,
    channel: i32,
    lookahead: Option<u16>,
    /// Event read ahead by `seek` or by the resolution check.
    pending: Option<AnnotationEvent>,
    /// Failure hit while completing the last event, reported on the next read.
    deferred: Option<FetchError>,
    finished: bool,
}
impl MitAnnotations<BufReader<File>> {
    pub fn open(path: &Path, default_frequency: f64) -> Result<Self, FetchError> {
        let file = File::open(path).map_err(|e| FetchError::io(path, e))?;
        Self::new(path, BufReader::new(file), default_frequency)
    }
}
impl<R: Read + Seek> MitAnnotations<R> {
    pub fn new(path: &Path, reader: R, default_frequency: f64) -> Result<Self, FetchError> {
        let mut stream = Self {
            path: path.to_path_buf(),
            reader,
            frequency: default_frequency,
            time: 0,
            number: 0,
            channel: 0,
            lookahead: None,
            pending: None,
            deferred: None,
            finished: false,
        };
        stream.read_resolution()?;
        Ok(stream)
    }
    fn io_error(&self, err: io::Error) -> FetchError {
        FetchError::io(&self.path, err)
    }
    /// Consumes a leading resolution note, if present.
    fn read_resolution(&mut self) -> Result<(), FetchError> {
        let Some(first) = self.read_event()? else {
            return Ok(());
        };
        let resolution = (first.time == 0 && first.code == NOTE)
            .then(|| first.aux.as_deref().and_then(parse_resolution))
            .flatten();
        match resolution {
            Some(frequency) => {
                log::debug!("{}: time resolution {frequency} Hz", self.path.display());
                self.frequency = frequency;
            }
            None => self.pending = Some(first),
        }
        Ok(())
    }
    fn rewind(&mut self) -> Result<(), FetchError> {
        self.reader
            .seek(SeekFrom::Start(0))
            .map_err(|e| self.io_error(e))?;
        self.time = 0;
        self.number = 0;
        self.channel = 0;
        self.lookahead = None;
        self.pending = None;
        self.deferred = None;
        self.finished = false;
        self.read_resolution()
    }
    fn next_word(&mut self) -> Result<Option<u16>, FetchError> {
        if let Some(word) = self.lookahead.take() {
            return Ok(Some(word));
        }
        let mut bytes = [0u8; 2];
        match self.reader.read_exact(&mut bytes) {
            Ok(()) => Ok(Some(u16::from_le_bytes(bytes))),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(self.io_error(e)),
        }
    }
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), FetchError> {
        self.reader.read_exact(buf).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                FetchError::MalformedAnnotations(format!(
                    "{}: truncated pseudo-annotation",
                    self.path.display()
                ))
            } else {
                self.io_error(e)
            }
        })
    }
    /// Reads a PDP-11 long: high 16-bit word first, each word little-endian.
    fn read_skip(&mut self) -> Result<i64, FetchError> {
        let mut b = [0u8; 4];
        self.read_exact(&mut b)?;
        let high = u16::from_le_bytes([b[0], b[1]]) as u32;
        let low = u16::from_le_bytes([b[2], b[3]]) as u32;
        Ok(i64::from(((high << 16) | low) as i32))
    }
    fn read_aux(&mut self, len: u16) -> Result<Vec<u8>, FetchError> {
        let padded = (len as usize + 1) & !1;
        let mut bytes = vec![0u8; padded];
        self.read_exact(&mut bytes)?;
        bytes.truncate(len as usize);
        let mut aux = Vec::with_capacity(bytes.len() + 1);
        aux.push(len.min(255) as u8);
        aux.extend_from_slice(&bytes);
        Ok(aux)
    }
    fn read_event(&mut self) -> Result<Option<AnnotationEvent>, FetchError> {
        if let Some(err) = self.deferred.take() {
            return Err(err);
        }
        if self.finished {
            return Ok(None);
        }
        loop {
            let Some(word) = self.next_word()? else {
                self.finished = true;
                return Ok(None);
            };
            let (code, value) = split_word(word);
            match code {
                0 if value == 0 => {
                    self.finished = true;
                    return Ok(None);
                }
                SKIP => {
                    let skip = self.read_skip()?;
                    self.time = (self.time + skip).max(0);
                }
                NUM => self.number = sign_extend_10(value),
                CHN => self.channel = sign_extend_10(value),
                SUB => {}
                AUX => {
                    self.read_aux(value)?;
                }
                _ => {
                    self.time += i64::from(value);
                    let event = self.read_modifiers(code)?;
                    return Ok(Some(event));
                }
            }
        }
    }
    /// Applies the pseudo-annotations that follow an annotation word.
    ///
    /// A truncated aux string ends the stream: the annotation is returned
    /// without it and the error is deferred to the next read.
    fn read_modifiers(&mut self, code: u8) -> Result<AnnotationEvent, FetchError> {
        let mut event = AnnotationEvent::new(self.time as u64, code);
        let mut subtype = 0;
        let mut aux = None;
        while let Some(word) = self.next_word()? {
            let (next_code, value) = split_word(word);
            match next_code {
                NUM => self.number = sign_extend_10(value),
                SUB => subtype = sign_extend_10(value),
                CHN => self.channel = sign_extend_10(value),
                AUX => match self.read_aux(value) {
                    Ok(bytes) => aux = Some(bytes),
                    Err(err) => {
                        self.deferred = Some(err);
                        self.finished = true;
                        break;
                    }
                },
                _ => {
                    self.lookahead = Some(word);
                    break;
                }
            }
        }
        event.subtype = subtype;
        event.number = self.number;
        event.channel = self.channel;
        event.aux = aux;
        Ok(event)
    }
}
fn parse_resolution(aux: &[u8]) -> Option<f64> {
    let (&len, rest) = aux.split_first()?;
    let text = std::str::from_utf8(&rest[..rest.len().min(len as usize)]).ok()?;
    let frequency: f64 = text.strip_prefix(RESOLUTION_PREFIX)?.trim().parse().ok()?;
    (frequency > 0.0 && frequency.is_finite()).then_some(frequency)
}
impl<R: Read + Seek> AnnotationSource for MitAnnotations<R> {
    fn frequency(&self) -> f64 {
        self.frequency
    }
    fn seek(&mut self, time: u64) -> Result<(), FetchError> {
        self.rewind()?;
        while let Some(event) = self.next_event()? {
            if event.time >= time {
                self.pending = Some(event);
                break;
            }
        }
        Ok(())
    }
    fn next_event(&mut self) -> Result<Option<AnnotationEvent>, FetchError> {
        match self.pending.take() {
            Some(event) => Ok(Some(event)),
            None => self.read_event(),
        }
    }
}
impl<R> Drop for MitAnnotations<R> {
    fn drop(&mut self) {
        log::trace!("closing annotation file {}", self.path.display());
    }
}
