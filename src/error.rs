use std::path::PathBuf;

/// error type for treepack operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid selection: {0}")]
    InvalidSelection(String),

    #[error("invalid import settings: {0}")]
    InvalidSettings(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("invalid filter rule '{rule}': {message}")]
    InvalidFilter { rule: String, message: String },

    #[error("export failed at {path}: {message}")]
    Export { path: String, message: String },

    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("malformed package: {0}")]
    ImportStructural(String),

    #[error("property '{name}' at {path}: {message}")]
    ImportProperty {
        path: String,
        name: String,
        message: String,
    },

    #[error("id conflict: node {id} already exists at {existing_path}, incoming at {incoming_path}")]
    IdConflict {
        id: String,
        existing_path: String,
        incoming_path: String,
    },

    #[error("corrupt binary segment {segment}: checksum mismatch")]
    CorruptSegment { segment: u64 },

    #[error("unsupported package format version {0}")]
    UnsupportedVersion(u8),

    #[error("node at {0} is checked in and auto-checkout is disabled")]
    CheckedIn(String),

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cbor serialization error: {0}")]
    CborEncode(#[from] ciborium::ser::Error<std::io::Error>),

    #[error("cbor deserialization error: {0}")]
    CborDecode(#[from] ciborium::de::Error<std::io::Error>),

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("config serialization error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// helper to wrap io errors with path context
pub trait IoResultExt<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|source| Error::Io {
            path: path.into(),
            source,
        })
    }
}
