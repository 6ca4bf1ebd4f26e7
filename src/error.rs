//! Error types for tgconv

use std::path::PathBuf;

/// Result type alias for tgconv operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during session conversion
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error while reading or writing session files
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// SQLite error from the relational session store
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The tdata folder path does not exist
    #[error("tdata folder not found: {path}")]
    FolderNotFound { path: PathBuf },

    /// Required file is missing from the tdata folder
    #[error("required file not found: {file} in {folder}")]
    FileNotFound { file: String, folder: PathBuf },

    /// Buffer ended before a field could be read in full
    #[error("truncated data at offset {offset}")]
    TruncatedData { offset: u64 },

    /// Invalid UTF-16 string data
    #[error("invalid UTF-16 string data")]
    InvalidUtf16,

    /// Invalid data format or structure
    #[error("invalid data format: {message}")]
    InvalidFormat { message: String },

    /// The stored schema version is outside the range this codec understands
    #[error("unsupported schema version: {version}")]
    UnsupportedSchemaVersion { version: u32 },

    /// The session store holds zero or more than one session row
    #[error("expected exactly one session row, found {count}")]
    MissingSessionRow { count: usize },

    /// A canonical-session invariant was violated
    #[error("malformed session: {message}")]
    MalformedSession { message: String },

    /// Decryption checksum mismatch - almost always a wrong or missing
    /// passcode, or a corrupted salt/container
    #[error("integrity check failed: wrong passcode or corrupted data")]
    IntegrityCheckFailed,

    /// The tdata container holds keys for several data centers with none
    /// marked current
    #[error("multiple data center entries with no marked-current one")]
    AmbiguousDataCenter,

    /// The target needs api_id/api_hash and neither the source session nor an
    /// override supplied them
    #[error("api_id/api_hash required but not supplied by the source session or an override")]
    MissingApiCredentials,

    /// No accounts found in tdata
    #[error("no accounts found in tdata")]
    NoAccounts,
}

impl Error {
    /// Create an invalid format error with a message
    pub fn invalid_format(msg: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: msg.into(),
        }
    }

    /// Create a malformed session error with a message
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedSession {
            message: msg.into(),
        }
    }
}
