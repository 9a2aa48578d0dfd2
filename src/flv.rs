//! FLV container parsing.
//!
//! An FLV file starts with a 9-byte header:
//! - Signature: `"FLV"` plus version `1` (4 bytes)
//! - Flags: audio/video presence (1 byte)
//! - Header size (4 bytes, big-endian)
//!
//! The header is followed by a 4-byte previous-tag-size (always zero) and a
//! sequence of tags. Each tag has an 11-byte header, `data_size` bytes of
//! payload and a trailing 4-byte previous-tag-size.
//!
//! [`TagReader`] walks that structure over any `Read + Seek` source and
//! treats a short trailing tag as the end of the stream rather than an error.

use std::io::{Read, Seek, SeekFrom};

use byteorder::{BigEndian, ReadBytesExt};

use crate::error::UnflvError;

/// FLV signature including the version byte: `"FLV\x01"`.
pub const FLV_SIGNATURE: u32 = 0x464C_5601;

/// Size of the fixed file header.
pub const FLV_HEADER_SIZE: u32 = 9;

/// Flag indicating audio is present.
pub const FLV_FLAG_AUDIO: u8 = 0x04;

/// Flag indicating video is present.
pub const FLV_FLAG_VIDEO: u8 = 0x01;

/// Audio tag type.
pub const TAG_TYPE_AUDIO: u8 = 8;

/// Video tag type.
pub const TAG_TYPE_VIDEO: u8 = 9;

/// Script data tag type.
pub const TAG_TYPE_SCRIPT_DATA: u8 = 18;

/// FLV tag header size.
pub const TAG_HEADER_SIZE: u64 = 11;

/// Size of the previous-tag-size field that follows every tag.
const PREVIOUS_TAG_SIZE: u64 = 4;

/// FLV file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlvHeader {
    /// Raw flags byte.
    pub flags: u8,
    /// Offset of the first previous-tag-size field.
    pub header_size: u32,
}

impl FlvHeader {
    /// Whether the flags announce an audio stream.
    pub fn has_audio(&self) -> bool {
        self.flags & FLV_FLAG_AUDIO != 0
    }

    /// Whether the flags announce a video stream.
    pub fn has_video(&self) -> bool {
        self.flags & FLV_FLAG_VIDEO != 0
    }

    /// Parse the 9-byte header.
    ///
    /// `file_length` bounds the declared header size.
    pub fn parse<R: Read>(reader: &mut R, file_length: u64) -> Result<Self, UnflvError> {
        if file_length < u64::from(FLV_HEADER_SIZE) {
            return Err(UnflvError::MalformedContainer(format!(
                "file is {file_length} bytes, shorter than the {FLV_HEADER_SIZE}-byte header"
            )));
        }

        let signature = reader.read_u32::<BigEndian>()?;
        if signature != FLV_SIGNATURE {
            return Err(UnflvError::MalformedContainer(format!(
                "bad signature {:02X?}",
                signature.to_be_bytes()
            )));
        }

        let flags = reader.read_u8()?;
        let header_size = reader.read_u32::<BigEndian>()?;

        if header_size < FLV_HEADER_SIZE || u64::from(header_size) > file_length {
            return Err(UnflvError::MalformedContainer(format!(
                "header size {header_size} is outside the file (length {file_length})"
            )));
        }

        Ok(Self { flags, header_size })
    }
}

/// Kind of an FLV tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagType {
    /// Audio data.
    Audio,
    /// Video data.
    Video,
    /// Script data (metadata).
    ScriptData,
    /// Any other type byte. Read and skipped.
    Other(u8),
}

impl TagType {
    /// Classify a raw type byte.
    pub fn from_u8(value: u8) -> Self {
        match value {
            TAG_TYPE_AUDIO => Self::Audio,
            TAG_TYPE_VIDEO => Self::Video,
            TAG_TYPE_SCRIPT_DATA => Self::ScriptData,
            other => Self::Other(other),
        }
    }
}

/// FLV tag header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagHeader {
    /// Tag type.
    pub tag_type: TagType,
    /// Payload size, not counting the header.
    pub data_size: u32,
    /// Timestamp in milliseconds, extended byte already folded in.
    pub timestamp: u32,
}

impl TagHeader {
    /// Parse an 11-byte tag header.
    pub fn parse<R: Read>(reader: &mut R) -> Result<Self, UnflvError> {
        let tag_type = TagType::from_u8(reader.read_u8()?);
        let data_size = reader.read_u24::<BigEndian>()?;
        let timestamp_low = reader.read_u24::<BigEndian>()?;
        let timestamp_extended = reader.read_u8()?;
        let _stream_id = reader.read_u24::<BigEndian>()?;

        Ok(Self {
            tag_type,
            data_size,
            timestamp: timestamp_low | (u32::from(timestamp_extended) << 24),
        })
    }
}

/// A complete tag: header and payload.
#[derive(Debug, Clone)]
pub struct Tag {
    /// Tag header.
    pub header: TagHeader,
    /// Payload bytes. Empty for zero-sized tags.
    pub payload: Vec<u8>,
}

/// Sequential reader over the tags of an FLV container.
///
/// # Example
///
/// ```no_run
/// use std::fs::File;
/// use std::io::BufReader;
///
/// use unflv::{TagReader, TagType};
///
/// let file = File::open("download.flv")?;
/// let length = file.metadata()?.len();
/// let mut tags = TagReader::new(BufReader::new(file), length)?;
/// while let Some(tag) = tags.next_tag()? {
///     if tag.header.tag_type == TagType::Audio {
///         println!("audio tag at {} ms", tag.header.timestamp);
///     }
/// }
/// # Ok::<(), unflv::UnflvError>(())
/// ```
pub struct TagReader<R> {
    reader: R,
    header: FlvHeader,
    position: u64,
    length: u64,
    finished: bool,
    truncated: bool,
}

impl<R: Read + Seek> TagReader<R> {
    /// Validate the file header and position the reader on the first tag.
    ///
    /// `length` is the total size of the source in bytes.
    ///
    /// # Errors
    ///
    /// Returns [`UnflvError::MalformedContainer`] if the signature or header
    /// size is invalid.
    pub fn new(mut reader: R, length: u64) -> Result<Self, UnflvError> {
        reader.seek(SeekFrom::Start(0))?;
        let header = FlvHeader::parse(&mut reader, length)?;
        let position = u64::from(header.header_size);
        reader.seek(SeekFrom::Start(position))?;

        let mut tags = Self {
            reader,
            header,
            position,
            length,
            finished: false,
            truncated: false,
        };

        if tags.remaining() < PREVIOUS_TAG_SIZE {
            tags.finished = true;
            tags.truncated = tags.remaining() > 0;
        } else {
            tags.skip_previous_tag_size()?;
        }

        log::debug!(
            "FLV header: flags={:#04x} header_size={} length={}",
            header.flags,
            header.header_size,
            length
        );

        Ok(tags)
    }

    /// Read the next tag.
    ///
    /// Returns `Ok(None)` once the stream ends, either cleanly or because the
    /// trailing bytes cannot hold a whole tag. A tag whose payload is
    /// complete but whose previous-tag-size is cut off is still returned; the
    /// following call then yields `None`.
    pub fn next_tag(&mut self) -> Result<Option<Tag>, UnflvError> {
        if self.finished {
            return Ok(None);
        }

        let remaining = self.remaining();
        if remaining < TAG_HEADER_SIZE {
            self.finished = true;
            self.truncated = remaining > 0;
            return Ok(None);
        }

        let header = TagHeader::parse(&mut self.reader)?;
        self.position += TAG_HEADER_SIZE;

        let data_size = u64::from(header.data_size);
        if self.remaining() < data_size {
            log::debug!(
                "tag at offset {} declares {} bytes but only {} remain",
                self.position - TAG_HEADER_SIZE,
                data_size,
                self.remaining()
            );
            self.finished = true;
            self.truncated = true;
            return Ok(None);
        }

        let mut payload = vec![0u8; header.data_size as usize];
        self.reader.read_exact(&mut payload)?;
        self.position += data_size;

        if self.remaining() < PREVIOUS_TAG_SIZE {
            self.finished = true;
            self.truncated = true;
        } else {
            self.skip_previous_tag_size()?;
        }

        Ok(Some(Tag { header, payload }))
    }

    /// The parsed file header.
    pub fn header(&self) -> FlvHeader {
        self.header
    }

    /// Bytes consumed so far, including the file header.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Total size of the source.
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Whether iteration ended on an incomplete trailing tag.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    fn remaining(&self) -> u64 {
        self.length.saturating_sub(self.position)
    }

    fn skip_previous_tag_size(&mut self) -> Result<(), UnflvError> {
        let _previous_tag_size = self.reader.read_u32::<BigEndian>()?;
        self.position += PREVIOUS_TAG_SIZE;
        Ok(())
    }
}

/// Sound format: ADPCM.
pub const SOUND_FORMAT_ADPCM: u8 = 1;
/// Sound format: MP3.
pub const SOUND_FORMAT_MP3: u8 = 2;
/// Sound format: Nellymoser 16kHz mono.
pub const SOUND_FORMAT_NELLYMOSER_16K: u8 = 4;
/// Sound format: Nellymoser 8kHz mono.
pub const SOUND_FORMAT_NELLYMOSER_8K: u8 = 5;
/// Sound format: Nellymoser.
pub const SOUND_FORMAT_NELLYMOSER: u8 = 6;
/// Sound format: AAC.
pub const SOUND_FORMAT_AAC: u8 = 10;
/// Sound format: MP3 8kHz.
pub const SOUND_FORMAT_MP3_8K: u8 = 14;

/// The codec nibble of an audio tag's first payload byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoundFormat(pub u8);

impl SoundFormat {
    /// Extract the codec nibble from an audio tag's media info byte.
    pub fn from_media_info(media_info: u8) -> Self {
        Self(media_info >> 4)
    }

    /// Human-readable codec name, as used in error messages.
    pub fn name(self) -> String {
        match self.0 {
            SOUND_FORMAT_ADPCM => "ADPCM".to_string(),
            SOUND_FORMAT_MP3 | SOUND_FORMAT_MP3_8K => "MP3".to_string(),
            SOUND_FORMAT_NELLYMOSER_16K | SOUND_FORMAT_NELLYMOSER_8K | SOUND_FORMAT_NELLYMOSER => {
                "Nellymoser".to_string()
            }
            SOUND_FORMAT_AAC => "AAC".to_string(),
            other => format!("format={other}"),
        }
    }
}
