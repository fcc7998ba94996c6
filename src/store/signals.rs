use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use crate::fetch::{FetchError, INVALID_SAMPLE};
/// On-disk sample encodings understood by the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleFormat {
    /// 16-bit little-endian two's complement.
    Fmt16,
    /// 16-bit big-endian two's complement.
    Fmt61,
    /// 8-bit offset binary.
    Fmt80,
    /// Pairs of 12-bit samples packed into 3 bytes.
    Fmt212,
    /// 24-bit little-endian two's complement.
    Fmt24,
    /// 32-bit little-endian two's complement.
    Fmt32,
}
impl SampleFormat {
    pub fn from_code(code: u32) -> Result<Self, FetchError> {
        match code {
            16 => Ok(Self::Fmt16),
            61 => Ok(Self::Fmt61),
            80 => Ok(Self::Fmt80),
            212 => Ok(Self::Fmt212),
            24 => Ok(Self::Fmt24),
            32 => Ok(Self::Fmt32),
            other => Err(FetchError::Unsupported(format!("storage format {other}"))),
        }
    }
    /// Byte position of sample `index` relative to the start of the sample data.
    fn byte_position(self, index: u64) -> u64 {
        match self {
            Self::Fmt16 | Self::Fmt61 => index * 2,
            Self::Fmt80 => index,
            Self::Fmt212 => (index / 2) * 3,
            Self::Fmt24 => index * 3,
            Self::Fmt32 => index * 4,
        }
    }
    /// Whole samples stored in `bytes` bytes.
    pub fn samples_in(self, bytes: u64) -> u64 {
        match self {
            Self::Fmt16 | Self::Fmt61 => bytes / 2,
            Self::Fmt80 => bytes,
            Self::Fmt212 => (bytes / 3) * 2 + u64::from(bytes % 3 == 2),
            Self::Fmt24 => bytes / 3,
            Self::Fmt32 => bytes / 4,
        }
    }
}
fn sign_extend(value: u32, bits: u32) -> i32 {
    let shift = 32 - bits;
    ((value << shift) as i32) >> shift
}
/// Sequential reader over one signal file.
pub struct SampleDecoder<R> {
    reader: R,
    format: SampleFormat,
    byte_offset: u64,
    pending: Option<i32>,
}
/// Reads `buf` completely, or reports a clean end of data with `Ok(false)`.
fn fill(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<bool> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(err) => Err(err),
    }
}
impl SampleDecoder<BufReader<File>> {
    pub fn open(path: &Path, format: SampleFormat, byte_offset: u64) -> Result<Self, FetchError> {
        let file = File::open(path).map_err(|e| FetchError::io(path, e))?;
        let mut decoder = Self::new(BufReader::new(file), format, byte_offset);
        decoder
            .seek_sample(0)
            .map_err(|e| FetchError::io(path, e))?;
        Ok(decoder)
    }
}
impl<R: Read + Seek> SampleDecoder<R> {
    pub fn new(reader: R, format: SampleFormat, byte_offset: u64) -> Self {
        Self {
            reader,
            format,
            byte_offset,
            pending: None,
        }
    }
    pub fn seek_sample(&mut self, index: u64) -> io::Result<()> {
        self.pending = None;
        let position = self.byte_offset + self.format.byte_position(index);
        self.reader.seek(SeekFrom::Start(position))?;
        if self.format == SampleFormat::Fmt212 && index % 2 == 1 {
            self.next_sample()?;
        }
        Ok(())
    }
    pub fn next_sample(&mut self) -> io::Result<Option<i32>> {
        if let Some(sample) = self.pending.take() {
            return Ok(Some(sample));
        }
        let sample = match self.format {
            SampleFormat::Fmt16 => {
                let mut b = [0u8; 2];
                if !fill(&mut self.reader, &mut b)? {
                    return Ok(None);
                }
                i32::from(i16::from_le_bytes(b))
            }
            SampleFormat::Fmt61 => {
                let mut b = [0u8; 2];
                if !fill(&mut self.reader, &mut b)? {
                    return Ok(None);
                }
                i32::from(i16::from_be_bytes(b))
            }
            SampleFormat::Fmt80 => {
                let mut b = [0u8; 1];
                if !fill(&mut self.reader, &mut b)? {
                    return Ok(None);
                }
                match i32::from(b[0]) - 128 {
                    -128 => INVALID_SAMPLE,
                    v => v,
                }
            }
            SampleFormat::Fmt212 => {
                let mut b = [0u8; 3];
                if !fill(&mut self.reader, &mut b)? {
                    return Ok(None);
                }
                let first = u32::from(b[0]) | (u32::from(b[1] & 0x0f) << 8);
                let second = u32::from(b[2]) | (u32::from(b[1] & 0xf0) << 4);
                let unpack = |v: u32| match sign_extend(v, 12) {
                    -2048 => INVALID_SAMPLE,
                    s => s,
                };
                self.pending = Some(unpack(second));
                unpack(first)
            }
            SampleFormat::Fmt24 => {
                let mut b = [0u8; 3];
                if !fill(&mut self.reader, &mut b)? {
                    return Ok(None);
                }
                let raw = u32::from(b[0]) | (u32::from(b[1]) << 8) | (u32::from(b[2]) << 16);
                sign_extend(raw, 24)
            }
            SampleFormat::Fmt32 => {
                let mut b = [0u8; 4];
                if !fill(&mut self.reader, &mut b)? {
                    return Ok(None);
                }
                i32::from_le_bytes(b)
            }
        };
        Ok(Some(sample))
    }
}
/// One channel's place inside its file's share of a frame.
#[derive(Clone, Copy, Debug)]
pub struct GroupMember {
    /// Position of the channel's first slot in the record frame.
    pub frame_offset: usize,
    pub samples_per_frame: usize,
}
/// Channels that are interleaved in the same signal file.
pub struct SignalGroup {
    pub path: PathBuf,
    pub decoder: SampleDecoder<BufReader<File>>,
    pub members: Vec<GroupMember>,
}
impl SignalGroup {
    /// Samples this file contributes to each frame.
    pub fn samples_per_frame(&self) -> u64 {
        self.members.iter().map(|m| m.samples_per_frame as u64).sum()
    }
    pub fn seek_frame(&mut self, frame: u64) -> Result<(), FetchError> {
        let index = frame * self.samples_per_frame();
        self.decoder
            .seek_sample(index)
            .map_err(|e| FetchError::io(&self.path, e))
    }
    /// Reads this file's part of one frame into `frame`. `Ok(false)` at end of data.
    pub fn read_into(&mut self, frame: &mut [i32]) -> Result<bool, FetchError> {
        for member in &self.members {
            for k in 0..member.samples_per_frame {
                match self.decoder.next_sample() {
                    Ok(Some(sample)) => frame[member.frame_offset + k] = sample,
                    Ok(None) => return Ok(false),
                    Err(e) => return Err(FetchError::io(&self.path, e)),
                }
            }
        }
        Ok(true)
    }
}
