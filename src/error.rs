//! Error types for compress-rs
//!
//! This module defines all error types that can occur while compressing or
//! decompressing, plus the numeric status codes the engines report.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Status codes reported by a single engine step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ReturnCode {
    Ok = 0,
    StreamEnd = 1,
    NeedDict = 2,
    ErrNo = -1,
    StreamError = -2,
    DataError = -3,
    MemError = -4,
    BufError = -5,
    VersionError = -6,
}

impl ReturnCode {
    pub fn from_i32(code: i32) -> Option<Self> {
        match code {
            0 => Some(ReturnCode::Ok),
            1 => Some(ReturnCode::StreamEnd),
            2 => Some(ReturnCode::NeedDict),
            -1 => Some(ReturnCode::ErrNo),
            -2 => Some(ReturnCode::StreamError),
            -3 => Some(ReturnCode::DataError),
            -4 => Some(ReturnCode::MemError),
            -5 => Some(ReturnCode::BufError),
            -6 => Some(ReturnCode::VersionError),
            _ => None,
        }
    }

    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Canonical message for the code.
    pub fn message(self) -> &'static str {
        match self {
            ReturnCode::NeedDict => "need dictionary",
            ReturnCode::StreamEnd => "stream end",
            ReturnCode::Ok => "",
            ReturnCode::ErrNo => "file error",
            ReturnCode::StreamError => "stream error",
            ReturnCode::DataError => "data error",
            ReturnCode::MemError => "insufficient memory",
            ReturnCode::BufError => "buffer error",
            ReturnCode::VersionError => "incompatible version",
        }
    }
}

/// Main error type for compress-rs
#[derive(Error, Debug)]
pub enum CompressError {
    /// Codec options rejected at construction
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// A step of the compressor or decompressor failed
    #[error("{message}")]
    Algorithm { code: ReturnCode, message: String },

    /// Not a GZIP stream, or one this codec cannot read
    #[error("{0}")]
    Format(String),

    /// CRC-32 in the trailer disagrees with the decompressed data
    #[error("checksum does not match: trailer {expected:#010x}, computed {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    /// ISIZE in the trailer disagrees with the decompressed length
    #[error("size of decompressed data not correct: trailer {expected}, computed {actual}")]
    SizeMismatch { expected: u32, actual: u64 },

    /// push called on an engine that already finished or failed
    #[error("can not call after ended")]
    UseAfterFinish,

    /// File open failed
    #[error("cannot open file '{path}': {source}")]
    FileOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// File read failed
    #[error("cannot read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// File write failed
    #[error("cannot write file '{path}': {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// IO error with context
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl CompressError {
    /// Nearest status code for this error.
    pub fn code(&self) -> ReturnCode {
        match self {
            CompressError::Configuration(_) => ReturnCode::StreamError,
            CompressError::Algorithm { code, .. } => *code,
            CompressError::Format(_) => ReturnCode::DataError,
            CompressError::ChecksumMismatch { .. } => ReturnCode::DataError,
            CompressError::SizeMismatch { .. } => ReturnCode::DataError,
            CompressError::UseAfterFinish => ReturnCode::StreamError,
            CompressError::FileOpen { .. } => ReturnCode::ErrNo,
            CompressError::FileRead { .. } => ReturnCode::ErrNo,
            CompressError::FileWrite { .. } => ReturnCode::ErrNo,
            CompressError::Io(_) => ReturnCode::ErrNo,
        }
    }

    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        CompressError::Configuration(msg.into())
    }

    /// Create an algorithm error; an empty message falls back to the code's text
    pub fn algorithm(code: ReturnCode, msg: impl Into<String>) -> Self {
        let msg = msg.into();
        let message = if msg.is_empty() {
            code.message().to_string()
        } else {
            msg
        };
        CompressError::Algorithm { code, message }
    }

    /// Create a format error
    pub fn format(msg: impl Into<String>) -> Self {
        CompressError::Format(msg.into())
    }

    /// Create a file open error
    pub fn file_open(path: impl Into<PathBuf>, source: io::Error) -> Self {
        CompressError::FileOpen {
            path: path.into(),
            source,
        }
    }

    /// Create a file read error
    pub fn file_read(path: impl Into<PathBuf>, source: io::Error) -> Self {
        CompressError::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Create a file write error
    pub fn file_write(path: impl Into<PathBuf>, source: io::Error) -> Self {
        CompressError::FileWrite {
            path: path.into(),
            source,
        }
    }
}

/// Result type for compress-rs operations
pub type Result<T> = std::result::Result<T, CompressError>;

/// Compression level (0-9)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum CompressionLevel {
    NoCompression = 0,
    Level1 = 1,
    Level2 = 2,
    Level3 = 3,
    Level4 = 4,
    Level5 = 5,
    #[default]
    Level6 = 6,
    Level7 = 7,
    Level8 = 8,
    Level9 = 9,
}

impl CompressionLevel {
    /// Fastest preset
    pub const FASTEST: CompressionLevel = CompressionLevel::Level1;
    /// Maximum-compression preset
    pub const BEST: CompressionLevel = CompressionLevel::Level9;

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(level: u8) -> Option<Self> {
        match level {
            0 => Some(CompressionLevel::NoCompression),
            1 => Some(CompressionLevel::Level1),
            2 => Some(CompressionLevel::Level2),
            3 => Some(CompressionLevel::Level3),
            4 => Some(CompressionLevel::Level4),
            5 => Some(CompressionLevel::Level5),
            6 => Some(CompressionLevel::Level6),
            7 => Some(CompressionLevel::Level7),
            8 => Some(CompressionLevel::Level8),
            9 => Some(CompressionLevel::Level9),
            _ => None,
        }
    }
}

impl TryFrom<i32> for CompressionLevel {
    type Error = CompressError;

    /// `-1` selects the default level, like the classic API.
    fn try_from(level: i32) -> Result<Self> {
        if level == -1 {
            return Ok(CompressionLevel::default());
        }
        u8::try_from(level)
            .ok()
            .and_then(CompressionLevel::from_u8)
            .ok_or_else(|| {
                CompressError::configuration(format!("compression level must be 0-9, got {level}"))
            })
    }
}
