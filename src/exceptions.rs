//! Error types for titlekit

use std::fmt;

use crate::es::constants::{
    ERR_ALLOCATION, ERR_BUILD_TAG, ERR_CORRUPT_CONTENT_MAP, ERR_FORGE_EXHAUSTED, ERR_INVALID,
    FS_ENOENT,
};

/// Main error type for titlekit operations
#[derive(Debug)]
pub enum TitleError {
    /// Title manager call failed; the code is the manager's own
    Manager(i32),

    /// Buffer for a manager or storage read could not be reserved
    Allocation { requested: usize },

    /// `content.map` length is not a whole number of records
    CorruptContentMap { len: usize },

    /// Build tag size, magic or format version mismatch
    InvalidBuildTag(String),

    /// Every value of the 16-bit search field was tried without a hit
    ForgeExhausted,

    /// Leading signature tag is not one the platform defines
    UnknownSignatureType(u32),

    /// Buffer too short or otherwise inconsistent with its layout
    Malformed(String),

    /// Ticket asks for a common key that is not part of the cached pair
    UnsupportedCommonKey(u8),

    /// Storage error
    IoError(std::io::Error),

    /// JSON serialization error
    JsonError(serde_json::Error),

    /// Generic error with message
    Generic(String),
}

impl TitleError {
    /// Negative platform-style code for this error.
    ///
    /// Manager codes are passed through untouched; everything else maps to a
    /// fixed sentinel so callers can tell the failure classes apart.
    pub fn code(&self) -> i32 {
        match self {
            TitleError::Manager(code) => *code,
            TitleError::Allocation { .. } => ERR_ALLOCATION,
            TitleError::CorruptContentMap { .. } => ERR_CORRUPT_CONTENT_MAP,
            TitleError::InvalidBuildTag(_) => ERR_BUILD_TAG,
            TitleError::ForgeExhausted => ERR_FORGE_EXHAUSTED,
            TitleError::UnknownSignatureType(_)
            | TitleError::Malformed(_)
            | TitleError::UnsupportedCommonKey(_) => ERR_INVALID,
            TitleError::IoError(err) if err.kind() == std::io::ErrorKind::NotFound => FS_ENOENT,
            TitleError::IoError(_) | TitleError::JsonError(_) | TitleError::Generic(_) => -1,
        }
    }
}

impl fmt::Display for TitleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TitleError::Manager(code) => write!(f, "Title manager error: {code}"),
            TitleError::Allocation { requested } => {
                write!(f, "Allocation of {requested} bytes failed")
            }
            TitleError::CorruptContentMap { len } => {
                write!(f, "Corrupt shared content map ({len} bytes)")
            }
            TitleError::InvalidBuildTag(msg) => write!(f, "Invalid build tag: {msg}"),
            TitleError::ForgeExhausted => write!(f, "Forging exhausted the search space"),
            TitleError::UnknownSignatureType(tag) => {
                write!(f, "Unknown signature type: 0x{tag:08x}")
            }
            TitleError::Malformed(msg) => write!(f, "Malformed data: {msg}"),
            TitleError::UnsupportedCommonKey(index) => {
                write!(f, "Unsupported common key index: {index}")
            }
            TitleError::IoError(err) => write!(f, "IO error: {err}"),
            TitleError::JsonError(err) => write!(f, "JSON error: {err}"),
            TitleError::Generic(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for TitleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TitleError::IoError(err) => Some(err),
            TitleError::JsonError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for TitleError {
    fn from(err: std::io::Error) -> Self {
        TitleError::IoError(err)
    }
}

impl From<serde_json::Error> for TitleError {
    fn from(err: serde_json::Error) -> Self {
        TitleError::JsonError(err)
    }
}

impl From<anyhow::Error> for TitleError {
    fn from(err: anyhow::Error) -> Self {
        TitleError::Generic(format!("{err:#}"))
    }
}

/// Result type for titlekit operations
pub type Result<T> = std::result::Result<T, TitleError>;
