//! AAC extraction to an ADTS elementary stream.
//!
//! FLV carries AAC as raw access units preceded by a one-off
//! AudioSpecificConfig packet. Standalone players need every frame to carry
//! its own configuration, so each raw unit is written behind a 7-byte ADTS
//! header built from the stored config.

use std::io::Write;

use crate::audio::ExtractionWarning;
use crate::bits::{BitCursor, u16_at};
use crate::error::UnflvError;

/// AAC packet type: sequence header (AudioSpecificConfig).
const AAC_PACKET_SEQUENCE_HEADER: u8 = 0;

/// Length of an ADTS header without CRC.
pub const ADTS_HEADER_SIZE: usize = 7;

/// Largest value the 13-bit ADTS frame length field can carry.
const ADTS_MAX_FRAME_LENGTH: usize = 0x1FFF;

/// The decoder configuration carried by an AAC sequence header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioSpecificConfig {
    /// Audio object type minus one (0 = Main, 1 = LC, 2 = SSR, 3 = LTP).
    pub profile: u8,
    /// Index into the MPEG-4 sampling frequency table.
    pub sample_rate_index: u8,
    /// MPEG-4 channel configuration.
    pub channel_config: u8,
}

impl AudioSpecificConfig {
    /// Unpack the first two bytes of an AudioSpecificConfig.
    ///
    /// # Errors
    ///
    /// Returns [`UnflvError::InvalidAacConfig`] if the profile is outside
    /// `0..=3`, the sample-rate index above 12 or the channel configuration
    /// above 6.
    pub fn parse(bytes: [u8; 2]) -> Result<Self, UnflvError> {
        Self::from_packed(u16::from_be_bytes(bytes))
    }

    /// Unpack an AudioSpecificConfig already read as a big-endian `u16`.
    ///
    /// # Errors
    ///
    /// See [`parse`](AudioSpecificConfig::parse).
    pub fn from_packed(packed: u16) -> Result<Self, UnflvError> {
        let mut cursor = BitCursor::left_aligned(u64::from(packed), 16);
        let object_type = cursor.read_bits(5);
        let sample_rate_index = cursor.read_bits(4);
        let channel_config = cursor.read_bits(4);

        let profile = match object_type.checked_sub(1) {
            Some(profile) if profile <= 3 => profile,
            _ => return Err(UnflvError::InvalidAacConfig("Unsupported AAC profile.")),
        };
        if sample_rate_index > 12 {
            return Err(UnflvError::InvalidAacConfig("Invalid AAC sample rate index."));
        }
        if channel_config > 6 {
            return Err(UnflvError::InvalidAacConfig(
                "Invalid AAC channel configuration.",
            ));
        }

        Ok(Self {
            profile: profile as u8,
            sample_rate_index: sample_rate_index as u8,
            channel_config: channel_config as u8,
        })
    }

    /// Build the ADTS header for a raw unit of `payload_len` bytes.
    pub fn adts_header(&self, payload_len: usize) -> [u8; ADTS_HEADER_SIZE] {
        let frame_length = ADTS_HEADER_SIZE + payload_len;
        if frame_length > ADTS_MAX_FRAME_LENGTH {
            log::warn!("AAC frame of {frame_length} bytes overflows the ADTS length field");
        }

        let mut cursor = BitCursor::new();
        cursor.write_bits(12, 0xFFF); // syncword
        cursor.write_bits(1, 0); // MPEG-4
        cursor.write_bits(2, 0); // layer
        cursor.write_bits(1, 1); // protection absent
        cursor.write_bits(2, u64::from(self.profile));
        cursor.write_bits(4, u64::from(self.sample_rate_index));
        cursor.write_bits(1, 0); // private
        cursor.write_bits(3, u64::from(self.channel_config));
        cursor.write_bits(1, 0); // original/copy
        cursor.write_bits(1, 0); // home
        cursor.write_bits(1, 0); // copyright id bit
        cursor.write_bits(1, 0); // copyright id start
        cursor.write_bits(13, frame_length as u64);
        cursor.write_bits(11, 0x7FF); // buffer fullness, VBR
        cursor.write_bits(2, 0); // one raw data block

        let bytes = cursor.to_be_bytes();
        let mut header = [0u8; ADTS_HEADER_SIZE];
        header.copy_from_slice(&bytes[1..]);
        header
    }
}

/// Writes FLV AAC chunks as an ADTS stream.
///
/// # Example
///
/// ```
/// use std::io::Cursor;
///
/// use unflv::AacExtractor;
///
/// let mut extractor = AacExtractor::new(Cursor::new(Vec::new()));
/// extractor.write_chunk(&[0, 0x12, 0x10], 0)?;
/// extractor.write_chunk(&[1, 0xDE, 0xAD], 23)?;
/// let (output, _warnings) = extractor.finish()?;
/// assert_eq!(output.get_ref().len(), 7 + 2);
/// # Ok::<(), unflv::UnflvError>(())
/// ```
pub struct AacExtractor<W: Write> {
    writer: W,
    config: Option<AudioSpecificConfig>,
    frames: u64,
}

impl<W: Write> AacExtractor<W> {
    /// Create an extractor writing into `writer`.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            config: None,
            frames: 0,
        }
    }

    /// The configuration in effect, once a sequence header has been seen.
    pub fn config(&self) -> Option<AudioSpecificConfig> {
        self.config
    }

    /// Consume one chunk (an audio tag payload without its media info byte).
    ///
    /// The first sequence header fixes the configuration for the rest of the
    /// stream; later ones are ignored.
    ///
    /// # Errors
    ///
    /// - [`UnflvError::InvalidAacConfig`] for an out-of-range sequence header.
    /// - [`UnflvError::AacDataBeforeConfig`] for raw data ahead of any header.
    /// - [`UnflvError::IoError`] if writing fails.
    pub fn write_chunk(&mut self, chunk: &[u8], timestamp: u32) -> Result<(), UnflvError> {
        let Some((&packet_type, body)) = chunk.split_first() else {
            return Ok(());
        };

        if packet_type == AAC_PACKET_SEQUENCE_HEADER {
            return self.read_config(chunk);
        }

        let config = self.config.ok_or(UnflvError::AacDataBeforeConfig)?;
        log::trace!("AAC frame: {} bytes at {timestamp} ms", body.len());
        self.writer.write_all(&config.adts_header(body.len()))?;
        self.writer.write_all(body)?;
        self.frames += 1;
        Ok(())
    }

    /// Flush the output and hand back the writer.
    pub fn finish(mut self) -> Result<(W, Vec<ExtractionWarning>), UnflvError> {
        self.writer.flush()?;
        log::debug!("AAC extraction finished after {} frames", self.frames);
        Ok((self.writer, Vec::new()))
    }

    fn read_config(&mut self, chunk: &[u8]) -> Result<(), UnflvError> {
        let Some(packed) = u16_at(chunk, 1) else {
            log::warn!("ignoring AAC sequence header of {} bytes", chunk.len());
            return Ok(());
        };

        if let Some(existing) = self.config {
            log::debug!("ignoring repeated AAC sequence header {packed:#06x}, keeping {existing:?}");
            return Ok(());
        }

        let config = AudioSpecificConfig::from_packed(packed)?;
        log::debug!("AAC config: {config:?}");
        self.config = Some(config);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::bits::be_bytes_u16;

    /// Pack an AudioSpecificConfig the way an encoder would.
    fn config_bytes(object_type: u64, sample_rate_index: u64, channels: u64) -> [u8; 2] {
        let mut cursor = BitCursor::new();
        cursor.write_bits(5, object_type);
        cursor.write_bits(4, sample_rate_index);
        cursor.write_bits(4, channels);
        cursor.write_bits(3, 0);
        be_bytes_u16(cursor.value() as u16)
    }

    #[test]
    fn parses_lc_stereo_44100() {
        let config = AudioSpecificConfig::parse([0x12, 0x10]).unwrap();
        assert_eq!(
            config,
            AudioSpecificConfig {
                profile: 1,
                sample_rate_index: 4,
                channel_config: 2,
            }
        );
    }

    #[test]
    fn profile_boundaries() {
        assert!(AudioSpecificConfig::parse(config_bytes(4, 4, 2)).is_ok());
        assert!(matches!(
            AudioSpecificConfig::parse(config_bytes(5, 4, 2)),
            Err(UnflvError::InvalidAacConfig("Unsupported AAC profile."))
        ));
        assert!(matches!(
            AudioSpecificConfig::parse(config_bytes(0, 4, 2)),
            Err(UnflvError::InvalidAacConfig("Unsupported AAC profile."))
        ));
    }

    #[test]
    fn rejects_bad_rate_and_channels() {
        assert!(AudioSpecificConfig::parse(config_bytes(2, 12, 2)).is_ok());
        assert!(matches!(
            AudioSpecificConfig::parse(config_bytes(2, 13, 2)),
            Err(UnflvError::InvalidAacConfig("Invalid AAC sample rate index."))
        ));
        assert!(AudioSpecificConfig::parse(config_bytes(2, 4, 6)).is_ok());
        assert!(matches!(
            AudioSpecificConfig::parse(config_bytes(2, 4, 7)),
            Err(UnflvError::InvalidAacConfig(
                "Invalid AAC channel configuration."
            ))
        ));
    }

    #[test]
    fn adts_header_fields() {
        let config = AudioSpecificConfig {
            profile: 1,
            sample_rate_index: 4,
            channel_config: 2,
        };
        let header = config.adts_header(100);

        assert_eq!(header[0], 0xFF);
        assert_eq!(header[1], 0xF1);
        assert_eq!(header[2] >> 6, 1);
        assert_eq!((header[2] >> 2) & 0x0F, 4);
        let channels = ((header[2] & 0x01) << 2) | (header[3] >> 6);
        assert_eq!(channels, 2);
        let frame_length = (usize::from(header[3] & 0x03) << 11)
            | (usize::from(header[4]) << 3)
            | usize::from(header[5] >> 5);
        assert_eq!(frame_length, 107);
        assert_eq!(header[5] & 0x1F, 0x1F);
        assert_eq!(header[6], 0xFC);
    }

    #[test]
    fn first_config_wins() {
        let mut extractor = AacExtractor::new(Cursor::new(Vec::new()));
        extractor.write_chunk(&[0, 0x12, 0x10], 0).unwrap();
        extractor.write_chunk(&[0, 0x11, 0x88], 0).unwrap();
        assert_eq!(extractor.config().unwrap().sample_rate_index, 4);
    }

    #[test]
    fn invalid_repeated_config_is_ignored() {
        let mut extractor = AacExtractor::new(Cursor::new(Vec::new()));
        extractor.write_chunk(&[0, 0x12, 0x10], 0).unwrap();
        extractor.write_chunk(&[1, 0xAA], 0).unwrap();
        // Object type 6 is out of range but arrives after the first header.
        extractor.write_chunk(&[0, 0x32, 0x10], 23).unwrap();
        extractor.write_chunk(&[1, 0xBB], 23).unwrap();

        assert_eq!(extractor.config().unwrap().profile, 1);
        let (output, _) = extractor.finish().unwrap();
        assert_eq!(output.into_inner().len(), 2 * (ADTS_HEADER_SIZE + 1));
    }

    #[test]
    fn short_and_empty_chunks_are_ignored() {
        let mut extractor = AacExtractor::new(Cursor::new(Vec::new()));
        extractor.write_chunk(&[], 0).unwrap();
        extractor.write_chunk(&[0, 0x12], 0).unwrap();
        assert!(extractor.config().is_none());
    }

    #[test]
    fn data_before_config_is_an_error() {
        let mut extractor = AacExtractor::new(Cursor::new(Vec::new()));
        let result = extractor.write_chunk(&[1, 2, 3], 0);
        assert!(matches!(result, Err(UnflvError::AacDataBeforeConfig)));
    }
}
