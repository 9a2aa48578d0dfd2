//! Core [`FlvFile`] implementation.
//!
//! `FlvFile` is the main entry point for the crate. It owns the container
//! source for the duration of one extraction, walks its tags, creates the
//! matching [`AudioExtractor`] on the first audio tag and finalises it when
//! the stream ends.

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    fs::File,
    io::{BufReader, Read, Seek},
    path::{Path, PathBuf},
};

use crate::{
    audio::{AudioExtractor, AudioFormat, ExtractionWarning},
    config::ExtractOptions,
    error::UnflvError,
    flv::{SoundFormat, Tag, TagReader, TagType},
    output::OutputFile,
    progress::ProgressTracker,
};

/// Outcome of a successful extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionReport {
    /// Path of the written audio file (the prefix plus `.aac` or `.mp3`).
    pub output_path: PathBuf,
    /// Format of the written audio.
    pub format: AudioFormat,
    /// Number of audio tags routed to the extractor.
    pub audio_chunks: u64,
    /// Timestamp of the last audio tag, in milliseconds.
    pub last_timestamp: u32,
    /// Whether the container ended on an incomplete tag.
    pub truncated: bool,
    /// Non-fatal problems, in the order they were noticed.
    pub warnings: Vec<ExtractionWarning>,
}

/// An FLV container opened for audio extraction.
///
/// Created via [`FlvFile::open`] or [`FlvFile::from_reader`]. Extraction
/// consumes the value: each container is demuxed exactly once.
///
/// # Example
///
/// ```no_run
/// use unflv::{FlvFile, UnflvError};
///
/// let report = FlvFile::open("download.flv")?.extract_audio("download")?;
/// println!("{} -> {}", report.format, report.output_path.display());
/// for warning in &report.warnings {
///     eprintln!("warning: {warning}");
/// }
/// # Ok::<(), UnflvError>(())
/// ```
pub struct FlvFile<R = BufReader<File>> {
    reader: R,
    length: u64,
    path: Option<PathBuf>,
}

impl<R> Debug for FlvFile<R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("FlvFile")
            .field("length", &self.length)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl FlvFile {
    /// Open a container file.
    ///
    /// # Errors
    ///
    /// Returns [`UnflvError::FileOpen`] if the file cannot be opened or its
    /// size cannot be read.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, UnflvError> {
        let path = path.as_ref();
        log::debug!("Opening FLV file: {}", path.display());

        let file_open_error = |error: std::io::Error| UnflvError::FileOpen {
            path: path.to_path_buf(),
            reason: error.to_string(),
        };
        let file = File::open(path).map_err(file_open_error)?;
        let length = file.metadata().map_err(file_open_error)?.len();

        Ok(Self {
            reader: BufReader::new(file),
            length,
            path: Some(path.to_path_buf()),
        })
    }
}

impl<R: Read + Seek> FlvFile<R> {
    /// Wrap an already-open source of `length` bytes.
    pub fn from_reader(reader: R, length: u64) -> Self {
        Self {
            reader,
            length,
            path: None,
        }
    }

    /// Size of the container in bytes.
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Extract the audio track next to `output_prefix`.
    ///
    /// The extension is chosen from the codec: `.aac` for AAC and `.mp3`
    /// for MP3. An existing file at that path is replaced.
    ///
    /// # Errors
    ///
    /// See [`extract_audio_with_options`](FlvFile::extract_audio_with_options).
    pub fn extract_audio<P: AsRef<Path>>(
        self,
        output_prefix: P,
    ) -> Result<ExtractionReport, UnflvError> {
        self.extract_audio_with_options(output_prefix, &ExtractOptions::new())
    }

    /// Extract the audio track with progress reporting and cancellation.
    ///
    /// A trailing tag that does not fit in the file ends the extraction
    /// normally; [`ExtractionReport::truncated`] records it. On any error the
    /// partially written output file is removed.
    ///
    /// # Errors
    ///
    /// - [`UnflvError::MalformedContainer`] for a bad signature or header.
    /// - [`UnflvError::UnsupportedCodec`] if the audio is neither AAC nor MP3.
    /// - [`UnflvError::InvalidAacConfig`] or [`UnflvError::AacDataBeforeConfig`]
    ///   for a broken AAC stream.
    /// - [`UnflvError::NoAudioStream`] if no audio tag was found.
    /// - [`UnflvError::Cancelled`] if the token in `options` was cancelled.
    /// - [`UnflvError::IoError`] if reading or writing fails.
    pub fn extract_audio_with_options<P: AsRef<Path>>(
        self,
        output_prefix: P,
        options: &ExtractOptions,
    ) -> Result<ExtractionReport, UnflvError> {
        let mut tags = TagReader::new(self.reader, self.length)?;
        let mut tracker = ProgressTracker::new(options.progress.clone(), tags.length());
        let mut session = AudioSession::new(output_prefix.as_ref());

        let outcome = session.route_tags(&mut tags, options, &mut tracker);
        session.finish(outcome, tags.is_truncated())
    }
}

/// State of one extraction: the lazily created extractor and its counters.
struct AudioSession {
    output_prefix: PathBuf,
    extractor: Option<AudioExtractor<OutputFile>>,
    audio_chunks: u64,
    last_timestamp: u32,
}

impl AudioSession {
    fn new(output_prefix: &Path) -> Self {
        Self {
            output_prefix: output_prefix.to_path_buf(),
            extractor: None,
            audio_chunks: 0,
            last_timestamp: 0,
        }
    }

    fn route_tags<R: Read + Seek>(
        &mut self,
        tags: &mut TagReader<R>,
        options: &ExtractOptions,
        tracker: &mut ProgressTracker,
    ) -> Result<(), UnflvError> {
        loop {
            if options.is_cancelled() {
                return Err(UnflvError::Cancelled);
            }
            let Some(tag) = tags.next_tag()? else {
                return Ok(());
            };
            if tag.header.tag_type == TagType::Audio {
                self.route_audio(&tag)?;
            }
            tracker.update(tags.position());
        }
    }

    fn route_audio(&mut self, tag: &Tag) -> Result<(), UnflvError> {
        let Some((&media_info, chunk)) = tag.payload.split_first() else {
            return Ok(());
        };

        if self.extractor.is_none() {
            self.extractor = Some(self.create_extractor(media_info)?);
        }
        if let Some(extractor) = self.extractor.as_mut() {
            extractor.write_chunk(chunk, tag.header.timestamp)?;
        }

        self.audio_chunks += 1;
        self.last_timestamp = tag.header.timestamp;
        Ok(())
    }

    fn create_extractor(&self, media_info: u8) -> Result<AudioExtractor<OutputFile>, UnflvError> {
        let format = AudioFormat::from_sound_format(SoundFormat::from_media_info(media_info))?;
        let path = format.output_path(&self.output_prefix);
        log::debug!("Extracting {format} audio to {}", path.display());
        let output = OutputFile::create(&path)?;
        Ok(AudioExtractor::new(format, output))
    }

    /// Finalise the extractor exactly once and keep or discard its output.
    fn finish(
        self,
        outcome: Result<(), UnflvError>,
        truncated: bool,
    ) -> Result<ExtractionReport, UnflvError> {
        let finished = self.extractor.map(|extractor| {
            let format = extractor.format();
            extractor
                .finish()
                .map(|(output, warnings)| (format, output, warnings))
        });

        match (outcome, finished) {
            (Ok(()), Some(Ok((format, output, warnings)))) => {
                let output_path = output.persist()?;
                log::info!(
                    "Extracted {} {format} chunks to {}",
                    self.audio_chunks,
                    output_path.display()
                );
                Ok(ExtractionReport {
                    output_path,
                    format,
                    audio_chunks: self.audio_chunks,
                    last_timestamp: self.last_timestamp,
                    truncated,
                    warnings,
                })
            }
            (Ok(()), Some(Err(error))) => Err(error),
            (Ok(()), None) => Err(UnflvError::NoAudioStream),
            (Err(error), Some(Ok(_discarded))) => Err(error),
            (Err(error), Some(Err(finish_error))) => {
                log::warn!("Finalising audio after a failed extraction also failed: {finish_error}");
                Err(error)
            }
            (Err(error), None) => Err(error),
        }
    }
}
