use std::path::PathBuf;
use thiserror::Error;
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("record {db}/{record} not found")]
    RecordNotFound { db: String, record: String },
    #[error("annotator {name} not available for this record")]
    AnnotatorNotFound { name: String },
    #[error("malformed header line {line}: {reason}")]
    MalformedHeader { line: usize, reason: String },
    #[error("malformed annotation stream: {0}")]
    MalformedAnnotations(String),
    #[error("unsupported storage: {0}")]
    Unsupported(String),
    #[error("rejected path component {0:?}")]
    InvalidPath(String),
    #[error("seek to frame {frame} is past the end of the record")]
    SeekPastEnd { frame: u64 },
}
impl FetchError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FetchError::Io {
            path: path.into(),
            source,
        }
    }
}
