//! Error types for the `unflv` crate.
//!
//! This module defines [`UnflvError`], the unified error type returned by all
//! fallible operations in the crate. Truncated containers are deliberately
//! absent: a short trailing tag ends iteration and the extraction still
//! succeeds with whatever was written.

use std::{io::Error as IoError, path::PathBuf};

use thiserror::Error;

/// The unified error type for all `unflv` operations.
///
/// Every fatal variant aborts the extraction. The partially written output
/// file, if one was created, is removed before the error reaches the caller.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum UnflvError {
    /// The container file could not be opened.
    #[error("Failed to open FLV file at {path}: {reason}")]
    FileOpen {
        /// Path that was passed to [`crate::FlvFile::open`].
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The container signature or header is invalid.
    #[error("Malformed FLV container: {0}")]
    MalformedContainer(String),

    /// The first audio tag uses a codec that cannot be extracted losslessly.
    #[error("Unable to extract audio ({0} is unsupported)")]
    UnsupportedCodec(String),

    /// An AAC AudioSpecificConfig field is out of range.
    #[error("Invalid AAC configuration: {0}")]
    InvalidAacConfig(&'static str),

    /// Raw AAC data arrived before the AudioSpecificConfig.
    #[error("AAC data chunk arrived before the AudioSpecificConfig header")]
    AacDataBeforeConfig,

    /// The container holds no audio tags.
    #[error("No audio stream found in file")]
    NoAudioStream,

    /// The operation was cancelled via a [`CancellationToken`](crate::CancellationToken).
    #[error("Operation cancelled")]
    Cancelled,

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),
}
