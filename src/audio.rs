//! Audio output formats and the extractor that produces them.
//!
//! The codec nibble of the first audio tag picks one [`AudioExtractor`]
//! variant for the whole extraction. Both variants take the same input, a
//! tag payload without its media info byte plus the tag timestamp, and both
//! are finalised exactly once.

use std::ffi::OsString;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};

use crate::aac::AacExtractor;
use crate::error::UnflvError;
use crate::flv::{SOUND_FORMAT_AAC, SOUND_FORMAT_MP3, SOUND_FORMAT_MP3_8K, SoundFormat};
use crate::mp3::Mp3Extractor;

/// Audio output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    /// Raw AAC in ADTS framing.
    Aac,
    /// MPEG audio Layer III.
    Mp3,
}

impl Display for AudioFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            AudioFormat::Aac => write!(f, "AAC"),
            AudioFormat::Mp3 => write!(f, "MP3"),
        }
    }
}

impl AudioFormat {
    /// Map an FLV sound format to the output it can be extracted to.
    ///
    /// # Errors
    ///
    /// Returns [`UnflvError::UnsupportedCodec`] for every codec other than
    /// AAC and MP3.
    pub fn from_sound_format(format: SoundFormat) -> Result<Self, UnflvError> {
        match format.0 {
            SOUND_FORMAT_MP3 | SOUND_FORMAT_MP3_8K => Ok(AudioFormat::Mp3),
            SOUND_FORMAT_AAC => Ok(AudioFormat::Aac),
            _ => Err(UnflvError::UnsupportedCodec(format.name())),
        }
    }

    /// File extension, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Aac => "aac",
            AudioFormat::Mp3 => "mp3",
        }
    }

    /// `prefix` with this format's extension appended.
    ///
    /// The extension is appended rather than substituted, so dots already in
    /// the prefix survive: `song.v2` becomes `song.v2.mp3`.
    pub fn output_path<P: AsRef<Path>>(&self, prefix: P) -> PathBuf {
        let mut path = OsString::from(prefix.as_ref().as_os_str());
        path.push(".");
        path.push(self.extension());
        PathBuf::from(path)
    }
}

/// A non-fatal problem noticed during extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExtractionWarning {
    /// The MP3 stream changed bitrate after audio had already been written,
    /// so the output has no Xing header.
    VbrHeaderTooLate,
}

impl Display for ExtractionWarning {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ExtractionWarning::VbrHeaderTooLate => {
                write!(f, "Detected VBR too late, cannot add VBR header")
            }
        }
    }
}

/// The extractor selected for a stream.
pub enum AudioExtractor<W: Write + Seek> {
    /// ADTS output.
    Aac(AacExtractor<W>),
    /// MP3 output.
    Mp3(Mp3Extractor<W>),
}

impl<W: Write + Seek> AudioExtractor<W> {
    /// Create the extractor for `format` writing into `writer`.
    pub fn new(format: AudioFormat, writer: W) -> Self {
        match format {
            AudioFormat::Aac => AudioExtractor::Aac(AacExtractor::new(writer)),
            AudioFormat::Mp3 => AudioExtractor::Mp3(Mp3Extractor::new(writer)),
        }
    }

    /// The format this extractor produces.
    pub fn format(&self) -> AudioFormat {
        match self {
            AudioExtractor::Aac(_) => AudioFormat::Aac,
            AudioExtractor::Mp3(_) => AudioFormat::Mp3,
        }
    }

    /// Consume one chunk.
    pub fn write_chunk(&mut self, chunk: &[u8], timestamp: u32) -> Result<(), UnflvError> {
        match self {
            AudioExtractor::Aac(extractor) => extractor.write_chunk(chunk, timestamp),
            AudioExtractor::Mp3(extractor) => extractor.write_chunk(chunk, timestamp),
        }
    }

    /// Finalise the output and hand back the writer and any warnings.
    pub fn finish(self) -> Result<(W, Vec<ExtractionWarning>), UnflvError> {
        match self {
            AudioExtractor::Aac(extractor) => extractor.finish(),
            AudioExtractor::Mp3(extractor) => extractor.finish(),
        }
    }
}
