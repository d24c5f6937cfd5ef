use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("missing required input: {0}")]
    MissingInput(&'static str),

    #[error("corpus shape mismatch: {0}")]
    CorpusShape(String),

    #[error("could not parse {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("checkpoint {} could not be read", path.display())]
    CheckpointRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("checkpoint {} could not be written", path.display())]
    CheckpointWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("checkpoint serialization failed")]
    CheckpointFormat(#[from] serde_json::Error),

    #[error("resume column {column} out of range for checkpoint with {available} saved samples")]
    ResumeColumn { column: usize, available: usize },

    #[error("invalid sampling weights for document {doc}")]
    InvalidWeights { doc: usize },

    #[error("merge inputs overlap on key `{key}` at {slots} slot(s); inputs must cover disjoint iteration ranges")]
    MergeOverlap { key: &'static str, slots: usize },

    #[error("lot {lot} failed {attempts} time(s), giving up")]
    LotFailed { lot: usize, attempts: usize },
}
