//! Lightweight container probing.
//!
//! [`FlvProbe`] walks the tag structure of a container without decoding or
//! writing any audio. This is useful for checking what an extraction would
//! produce, or for quickly inspecting many files.
//!
//! For extraction, use [`FlvFile::open`](crate::FlvFile::open) instead.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs::File,
    io::{BufReader, Read, Seek},
    path::Path,
};

use crate::{
    audio::AudioFormat,
    error::UnflvError,
    flv::{SoundFormat, TagReader, TagType},
};

/// Summary of an FLV container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    /// Audio flag of the file header. Informational only.
    pub has_audio_flag: bool,
    /// Video flag of the file header. Informational only.
    pub has_video_flag: bool,
    /// Declared size of the file header.
    pub header_size: u32,
    /// Size of the container in bytes.
    pub file_size: u64,
    /// Number of audio tags.
    pub audio_tags: u64,
    /// Number of video tags.
    pub video_tags: u64,
    /// Number of script data tags.
    pub script_tags: u64,
    /// Number of tags of any other type.
    pub other_tags: u64,
    /// Codec nibble of the first non-empty audio tag.
    pub sound_format: Option<SoundFormat>,
    /// The format an extraction would write, if the codec is supported.
    pub audio_format: Option<AudioFormat>,
    /// Largest tag timestamp, in milliseconds.
    pub duration_ms: u32,
    /// Whether the container ends on an incomplete tag.
    pub truncated: bool,
}

impl ContainerInfo {
    /// Total number of complete tags.
    pub fn total_tags(&self) -> u64 {
        self.audio_tags + self.video_tags + self.script_tags + self.other_tags
    }
}

impl Display for ContainerInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        writeln!(f, "File size: {} bytes", self.file_size)?;
        writeln!(
            f,
            "Header: size={} audio={} video={}",
            self.header_size, self.has_audio_flag, self.has_video_flag
        )?;
        writeln!(
            f,
            "Tags: {} audio, {} video, {} script, {} other",
            self.audio_tags, self.video_tags, self.script_tags, self.other_tags
        )?;
        match (self.sound_format, self.audio_format) {
            (Some(_), Some(format)) => writeln!(f, "Audio: {format}")?,
            (Some(sound_format), None) => {
                writeln!(f, "Audio: {} (unsupported)", sound_format.name())?
            }
            (None, _) => writeln!(f, "Audio: none")?,
        }
        write!(f, "Duration: {} ms", self.duration_ms)?;
        if self.truncated {
            write!(f, " (truncated)")?;
        }
        Ok(())
    }
}

/// Lightweight container probe.
///
/// # Example
///
/// ```no_run
/// use unflv::FlvProbe;
///
/// let info = FlvProbe::probe("download.flv")?;
/// println!("{} audio tags, {} ms", info.audio_tags, info.duration_ms);
/// # Ok::<(), unflv::UnflvError>(())
/// ```
pub struct FlvProbe;

impl FlvProbe {
    /// Probe a container file.
    ///
    /// # Errors
    ///
    /// Returns [`UnflvError::FileOpen`] if the file cannot be opened and
    /// [`UnflvError::MalformedContainer`] if its header is invalid.
    pub fn probe<P: AsRef<Path>>(path: P) -> Result<ContainerInfo, UnflvError> {
        let (reader, length) = open_source(path.as_ref())?;
        Self::probe_reader(reader, length)
    }

    /// Probe an already-open source of `length` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`UnflvError::MalformedContainer`] if the header is invalid
    /// and [`UnflvError::IoError`] if reading fails.
    pub fn probe_reader<R: Read + Seek>(reader: R, length: u64) -> Result<ContainerInfo, UnflvError> {
        let mut tags = TagReader::new(reader, length)?;
        let header = tags.header();

        let mut info = ContainerInfo {
            has_audio_flag: header.has_audio(),
            has_video_flag: header.has_video(),
            header_size: header.header_size,
            file_size: length,
            audio_tags: 0,
            video_tags: 0,
            script_tags: 0,
            other_tags: 0,
            sound_format: None,
            audio_format: None,
            duration_ms: 0,
            truncated: false,
        };

        while let Some(tag) = tags.next_tag()? {
            info.duration_ms = info.duration_ms.max(tag.header.timestamp);
            match tag.header.tag_type {
                TagType::Audio => {
                    info.audio_tags += 1;
                    if info.sound_format.is_none() {
                        if let Some(&media_info) = tag.payload.first() {
                            let sound_format = SoundFormat::from_media_info(media_info);
                            info.sound_format = Some(sound_format);
                            info.audio_format = AudioFormat::from_sound_format(sound_format).ok();
                        }
                    }
                }
                TagType::Video => info.video_tags += 1,
                TagType::ScriptData => info.script_tags += 1,
                TagType::Other(_) => info.other_tags += 1,
            }
        }
        info.truncated = tags.is_truncated();

        Ok(info)
    }

    /// Codec of the first non-empty audio tag, reading no further than that
    /// tag.
    ///
    /// Returns `Ok(None)` if the container has no audio. Cheaper than
    /// [`probe`](FlvProbe::probe) when only the output format is needed.
    ///
    /// # Errors
    ///
    /// Same as [`probe`](FlvProbe::probe).
    pub fn sound_format<P: AsRef<Path>>(path: P) -> Result<Option<SoundFormat>, UnflvError> {
        let (reader, length) = open_source(path.as_ref())?;
        Self::sound_format_reader(reader, length)
    }

    /// [`sound_format`](FlvProbe::sound_format) over an already-open source.
    ///
    /// # Errors
    ///
    /// Same as [`probe_reader`](FlvProbe::probe_reader).
    pub fn sound_format_reader<R: Read + Seek>(
        reader: R,
        length: u64,
    ) -> Result<Option<SoundFormat>, UnflvError> {
        let mut tags = TagReader::new(reader, length)?;
        while let Some(tag) = tags.next_tag()? {
            if tag.header.tag_type != TagType::Audio {
                continue;
            }
            if let Some(&media_info) = tag.payload.first() {
                return Ok(Some(SoundFormat::from_media_info(media_info)));
            }
        }
        Ok(None)
    }

    /// Probe several files.
    ///
    /// Files that cannot be probed produce an `Err` entry rather than
    /// aborting the batch.
    pub fn probe_many<P: AsRef<Path>>(paths: &[P]) -> Vec<Result<ContainerInfo, UnflvError>> {
        paths.iter().map(|path| Self::probe(path)).collect()
    }
}

fn open_source(path: &Path) -> Result<(BufReader<File>, u64), UnflvError> {
    let file_open_error = |error: std::io::Error| UnflvError::FileOpen {
        path: path.to_path_buf(),
        reason: error.to_string(),
    };
    let file = File::open(path).map_err(file_open_error)?;
    let length = file.metadata().map_err(file_open_error)?.len();
    Ok((BufReader::new(file), length))
}
