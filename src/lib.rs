//! # unflv
//!
//! Unpack FLV downloads: extract the audio track of a Flash Video container
//! losslessly, without decoding.
//!
//! `unflv` walks the tag structure of an FLV file and writes the audio
//! stream out in a standalone format:
//!
//! - **AAC** becomes an ADTS elementary stream (`.aac`), with a 7-byte
//!   header synthesised in front of every raw access unit.
//! - **MP3** frames are written back to back (`.mp3`). Variable-bitrate
//!   streams detected early enough get a Xing header with a seek table so
//!   players report the right duration.
//!
//! ## Quick Start
//!
//! ### Extract Audio
//!
//! ```no_run
//! use unflv::FlvFile;
//!
//! let report = FlvFile::open("download.flv").unwrap().extract_audio("download").unwrap();
//! println!("wrote {} ({})", report.output_path.display(), report.format);
//! ```
//!
//! ### Inspect a Container
//!
//! ```no_run
//! use unflv::FlvProbe;
//!
//! let info = FlvProbe::probe("download.flv").unwrap();
//! println!("{info}");
//! ```
//!
//! ### Progress and Cancellation
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use unflv::{CancellationToken, ExtractOptions, FlvFile, ProgressCallback, ProgressInfo};
//!
//! struct Print;
//! impl ProgressCallback for Print {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!("{}%", info.percentage);
//!     }
//! }
//!
//! let token = CancellationToken::new();
//! let options = ExtractOptions::new()
//!     .with_progress(Arc::new(Print))
//!     .with_cancellation(token.clone());
//! let report = FlvFile::open("download.flv")
//!     .unwrap()
//!     .extract_audio_with_options("download", &options)
//!     .unwrap();
//! ```
//!
//! ## Features
//!
//! - **Lossless** - audio bytes are copied, never re-encoded
//! - **Truncation tolerant** - a cut-off download still yields every complete
//!   tag
//! - **Clean failure** - partial output is removed on any error
//! - **Progress & cancellation** - integer-percentage callbacks and a
//!   cooperative `CancellationToken`
//! - **Probing** - lightweight `FlvProbe` for tag counts and codec detection
//! - **Building blocks** - `TagReader`, `AacExtractor` and `Mp3Extractor`
//!   work over any `Read`/`Write` + `Seek` value

pub mod aac;
pub mod audio;
pub mod bits;
pub mod config;
pub mod error;
pub mod flv;
pub mod mp3;
mod output;
pub mod probe;
pub mod progress;
pub mod unflv;

pub use aac::{AacExtractor, AudioSpecificConfig};
pub use audio::{AudioExtractor, AudioFormat, ExtractionWarning};
pub use bits::BitCursor;
pub use config::ExtractOptions;
pub use error::UnflvError;
pub use flv::{FlvHeader, SoundFormat, Tag, TagHeader, TagReader, TagType};
pub use mp3::{ChannelMode, Mp3Extractor, Mp3Frame, MpegVersion};
pub use probe::{ContainerInfo, FlvProbe};
pub use progress::{CancellationToken, ProgressCallback, ProgressInfo};
pub use unflv::{ExtractionReport, FlvFile};
