//! MP3 extraction with optional Xing VBR header synthesis.
//!
//! FLV MP3 tags hold whole MPEG audio frames, so the chunks can be written
//! back to back. The only work is deciding whether the result needs a Xing
//! header: players estimate duration and seek positions from the first
//! frame's bitrate, which is wrong for variable-bitrate streams.
//!
//! The extractor holds chunks in memory for the first 64 KiB of audio. If a
//! bitrate change shows up in that window, a placeholder frame is written at
//! offset 0 and replaced with the real header (frame count, byte count and
//! seek table) once the whole stream is known. A change seen after the
//! window closed can no longer be indexed and is reported as an
//! [`ExtractionWarning::VbrHeaderTooLate`].
//!
//! Frames are synchronised per chunk. A frame straddling two chunks is still
//! written but does not appear in the seek table.

use std::io::{Seek, SeekFrom, Write};

use crate::audio::ExtractionWarning;
use crate::bits::{BitCursor, be_bytes_u32, u32_at};
use crate::error::UnflvError;

/// Amount of audio held back while the stream could still turn out VBR.
pub const VBR_DETECTION_WINDOW: u64 = 64 * 1024;

/// `"Xing"` as a big-endian integer.
const XING_TAG: u32 = 0x5869_6E67;

/// Frames, bytes and TOC present.
const XING_FLAGS: u32 = 0x0000_0007;

/// Number of entries in the Xing seek table.
const XING_TOC_ENTRIES: usize = 100;

/// Bitrate used to size the synthetic header frame.
const XING_FRAME_BITRATE: u32 = 64_000;

/// Clears the protection, bitrate and padding fields of a frame header.
const HEADER_CLEAR_MASK: u32 = 0xFFFE_0DFF;

/// Protection bit set: no CRC follows the header.
const HEADER_NO_CRC: u32 = 0x0001_0000;

const MPEG1_BITRATES: [u32; 16] = [
    0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 0,
];
const MPEG2_BITRATES: [u32; 16] = [
    0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160, 0,
];
const MPEG1_SAMPLE_RATES: [u32; 3] = [44100, 48000, 32000];
const MPEG2_SAMPLE_RATES: [u32; 3] = [22050, 24000, 16000];
const MPEG25_SAMPLE_RATES: [u32; 3] = [11025, 12000, 8000];

/// MPEG audio version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegVersion {
    /// MPEG-1.
    Mpeg1,
    /// MPEG-2 (LSF).
    Mpeg2,
    /// MPEG-2.5.
    Mpeg25,
}

impl MpegVersion {
    fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            0 => Some(Self::Mpeg25),
            2 => Some(Self::Mpeg2),
            3 => Some(Self::Mpeg1),
            _ => None,
        }
    }

    fn bitrate_kbps(self, index: usize) -> u32 {
        match self {
            Self::Mpeg1 => MPEG1_BITRATES[index],
            Self::Mpeg2 | Self::Mpeg25 => MPEG2_BITRATES[index],
        }
    }

    fn sample_rate(self, index: usize) -> u32 {
        match self {
            Self::Mpeg1 => MPEG1_SAMPLE_RATES[index],
            Self::Mpeg2 => MPEG2_SAMPLE_RATES[index],
            Self::Mpeg25 => MPEG25_SAMPLE_RATES[index],
        }
    }

    /// Bitrate index that means 64 kbit/s in this version's table.
    fn index_64kbps(self) -> u32 {
        match self {
            Self::Mpeg1 => 5,
            Self::Mpeg2 | Self::Mpeg25 => 8,
        }
    }
}

/// Channel mode of an MPEG audio frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMode {
    /// Stereo.
    Stereo,
    /// Joint stereo.
    JointStereo,
    /// Dual channel.
    DualChannel,
    /// Single channel.
    Mono,
}

impl ChannelMode {
    fn from_bits(bits: u32) -> Self {
        match bits {
            0 => Self::Stereo,
            1 => Self::JointStereo,
            2 => Self::DualChannel,
            _ => Self::Mono,
        }
    }
}

/// A decoded Layer III frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mp3Frame {
    /// MPEG version.
    pub version: MpegVersion,
    /// Bitrate in bit/s.
    pub bitrate: u32,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Whether the frame carries a padding byte.
    pub padding: bool,
    /// Channel mode.
    pub channel_mode: ChannelMode,
    /// The raw 32-bit header.
    pub header: u32,
}

impl Mp3Frame {
    /// Decode the frame header at the start of `bytes`.
    ///
    /// Returns `None` if there is no sync word, the header uses a reserved
    /// or unsupported value, or the frame is not Layer III.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let header = u32_at(bytes, 0)?;
        let mut cursor = BitCursor::left_aligned(u64::from(header), 32);

        if cursor.read_bits(11) != 0x7FF {
            return None;
        }
        let version = MpegVersion::from_bits(cursor.read_bits(2))?;
        let layer = cursor.read_bits(2);
        let _protection = cursor.read_bits(1);
        let bitrate_index = cursor.read_bits(4) as usize;
        let sample_rate_index = cursor.read_bits(2) as usize;
        let padding = cursor.read_bits(1) == 1;
        let _private = cursor.read_bits(1);
        let channel_mode = ChannelMode::from_bits(cursor.read_bits(2));

        if layer != 1 || bitrate_index == 0 || bitrate_index == 15 || sample_rate_index == 3 {
            return None;
        }

        Some(Self {
            version,
            bitrate: version.bitrate_kbps(bitrate_index) * 1000,
            sample_rate: version.sample_rate(sample_rate_index),
            padding,
            channel_mode,
            header,
        })
    }

    /// Length of the frame in bytes, header included.
    pub fn length(&self) -> usize {
        frame_length(self.version, self.bitrate, self.sample_rate, self.padding)
    }

    /// Offset of the first byte after the header and side information, where
    /// a Xing tag would sit.
    pub fn data_offset(&self) -> usize {
        data_offset(self.version, self.channel_mode)
    }
}

fn frame_length(version: MpegVersion, bitrate: u32, sample_rate: u32, padding: bool) -> usize {
    let coefficient = match version {
        MpegVersion::Mpeg1 => 144,
        MpegVersion::Mpeg2 | MpegVersion::Mpeg25 => 72,
    };
    (coefficient * bitrate / sample_rate) as usize + usize::from(padding)
}

fn data_offset(version: MpegVersion, channel_mode: ChannelMode) -> usize {
    let side_info = match (version, channel_mode) {
        (MpegVersion::Mpeg1, ChannelMode::Mono) => 17,
        (MpegVersion::Mpeg1, _) => 32,
        (_, ChannelMode::Mono) => 9,
        _ => 17,
    };
    4 + side_info
}

/// Writes FLV MP3 chunks as an MP3 file, adding a Xing header when the
/// stream turns out to be VBR early enough.
///
/// The writer must be seekable because the header is patched in place by
/// [`finish`](Mp3Extractor::finish).
///
/// # Example
///
/// ```
/// use std::io::Cursor;
///
/// use unflv::Mp3Extractor;
///
/// let mut frame = vec![0u8; 417];
/// frame[..4].copy_from_slice(&[0xFF, 0xFB, 0x90, 0x00]);
///
/// let mut extractor = Mp3Extractor::new(Cursor::new(Vec::new()));
/// extractor.write_chunk(&frame, 0)?;
/// let (output, warnings) = extractor.finish()?;
/// assert_eq!(output.into_inner(), frame);
/// assert!(warnings.is_empty());
/// # Ok::<(), unflv::UnflvError>(())
/// ```
pub struct Mp3Extractor<W: Write + Seek> {
    writer: W,
    pending: Vec<Vec<u8>>,
    frame_offsets: Vec<u64>,
    total_length: u64,
    baseline: Option<Mp3Frame>,
    is_vbr: bool,
    delay_write: bool,
    has_vbr_header: bool,
    write_vbr_header: bool,
    warnings: Vec<ExtractionWarning>,
}

impl<W: Write + Seek> Mp3Extractor<W> {
    /// Create an extractor writing into `writer`.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            pending: Vec::new(),
            frame_offsets: Vec::new(),
            total_length: 0,
            baseline: None,
            is_vbr: false,
            delay_write: true,
            has_vbr_header: false,
            write_vbr_header: false,
            warnings: Vec::new(),
        }
    }

    /// Number of frames recorded so far.
    pub fn frame_count(&self) -> usize {
        self.frame_offsets.len()
    }

    /// Whether a bitrate change has been observed.
    pub fn is_vbr(&self) -> bool {
        self.is_vbr
    }

    /// Warnings collected so far.
    pub fn warnings(&self) -> &[ExtractionWarning] {
        &self.warnings
    }

    /// Consume one chunk (an audio tag payload without its media info byte).
    ///
    /// # Errors
    ///
    /// Returns [`UnflvError::IoError`] if writing fails.
    pub fn write_chunk(&mut self, chunk: &[u8], timestamp: u32) -> Result<(), UnflvError> {
        self.pending.push(chunk.to_vec());
        self.scan_frames(chunk, timestamp)?;

        if self.delay_write && self.total_length >= VBR_DETECTION_WINDOW {
            log::debug!("VBR detection window closed at {} bytes", self.total_length);
            self.delay_write = false;
        }

        if !self.delay_write {
            self.flush_pending()?;
        }
        Ok(())
    }

    /// Write any held-back audio, patch the Xing header if one was reserved,
    /// and hand back the writer with the collected warnings.
    ///
    /// # Errors
    ///
    /// Returns [`UnflvError::IoError`] if writing or seeking fails.
    pub fn finish(mut self) -> Result<(W, Vec<ExtractionWarning>), UnflvError> {
        self.flush_pending()?;

        if self.write_vbr_header {
            if let Some(baseline) = self.baseline {
                let header = self.vbr_header(&baseline);
                self.writer.seek(SeekFrom::Start(0))?;
                self.writer.write_all(&header)?;
                log::debug!(
                    "wrote Xing header: {} frames, {} bytes",
                    self.frame_offsets.len(),
                    self.total_length
                );
            }
        }

        self.writer.flush()?;
        Ok((self.writer, self.warnings))
    }

    fn scan_frames(&mut self, chunk: &[u8], timestamp: u32) -> Result<(), UnflvError> {
        let mut offset = 0usize;

        while chunk.len() - offset >= 4 {
            let Some(frame) = Mp3Frame::parse(&chunk[offset..]) else {
                break;
            };
            let length = frame.length();
            if length > chunk.len() - offset {
                break;
            }

            let is_vbr_header_frame =
                self.frame_offsets.is_empty() && has_xing_tag(chunk, offset + frame.data_offset());

            if is_vbr_header_frame {
                log::debug!("stream already carries a Xing header");
                self.delay_write = false;
                self.has_vbr_header = true;
            } else {
                self.observe_bitrate(frame, timestamp)?;
            }

            self.frame_offsets.push(self.total_length + offset as u64);
            offset += length;
        }

        self.total_length += chunk.len() as u64;
        Ok(())
    }

    fn observe_bitrate(&mut self, frame: Mp3Frame, timestamp: u32) -> Result<(), UnflvError> {
        let Some(baseline) = self.baseline else {
            log::debug!(
                "first MP3 frame: {:?} {} bit/s {} Hz {:?}",
                frame.version,
                frame.bitrate,
                frame.sample_rate,
                frame.channel_mode
            );
            self.baseline = Some(frame);
            return Ok(());
        };

        if self.is_vbr || frame.bitrate == baseline.bitrate {
            return Ok(());
        }
        self.is_vbr = true;

        if self.has_vbr_header {
            return Ok(());
        }

        if self.delay_write {
            log::debug!("bitrate changed at {timestamp} ms, reserving a Xing header");
            let placeholder = vec![0u8; xing_frame_length(&baseline)];
            self.writer.write_all(&placeholder)?;
            self.write_vbr_header = true;
            self.delay_write = false;
        } else {
            log::warn!("bitrate changed at {timestamp} ms after audio was already written");
            self.warnings.push(ExtractionWarning::VbrHeaderTooLate);
        }
        Ok(())
    }

    fn flush_pending(&mut self) -> Result<(), UnflvError> {
        for chunk in self.pending.drain(..) {
            self.writer.write_all(&chunk)?;
        }
        Ok(())
    }

    /// Build the final Xing frame from the baseline frame header.
    fn vbr_header(&self, baseline: &Mp3Frame) -> Vec<u8> {
        let mut buffer = vec![0u8; xing_frame_length(baseline)];
        let offset = baseline.data_offset();

        let header = (baseline.header & HEADER_CLEAR_MASK)
            | HEADER_NO_CRC
            | (baseline.version.index_64kbps() << 12);
        let frame_count = u32::try_from(self.frame_offsets.len()).unwrap_or(u32::MAX);
        let byte_count = u32::try_from(self.total_length).unwrap_or(u32::MAX);

        buffer[..4].copy_from_slice(&be_bytes_u32(header));
        buffer[offset..offset + 4].copy_from_slice(&be_bytes_u32(XING_TAG));
        buffer[offset + 4..offset + 8].copy_from_slice(&be_bytes_u32(XING_FLAGS));
        buffer[offset + 8..offset + 12].copy_from_slice(&be_bytes_u32(frame_count));
        buffer[offset + 12..offset + 16].copy_from_slice(&be_bytes_u32(byte_count));

        let toc = &mut buffer[offset + 16..offset + 16 + XING_TOC_ENTRIES];
        for (entry, slot) in toc.iter_mut().enumerate() {
            *slot = self.toc_entry(entry);
        }
        buffer
    }

    /// Byte position of the frame at `percent` of the stream, scaled to 0..=255.
    fn toc_entry(&self, percent: usize) -> u8 {
        if self.total_length == 0 {
            return 0;
        }
        let index = (percent as f64 / XING_TOC_ENTRIES as f64 * self.frame_offsets.len() as f64)
            as usize;
        let offset = self.frame_offsets.get(index).copied().unwrap_or(0);
        (offset as f64 / self.total_length as f64 * 256.0) as u8
    }
}

fn has_xing_tag(chunk: &[u8], offset: usize) -> bool {
    u32_at(chunk, offset) == Some(XING_TAG)
}

/// Size of one frame at 64 kbit/s, the slot the synthetic header occupies.
fn xing_frame_length(baseline: &Mp3Frame) -> usize {
    frame_length(
        baseline.version,
        XING_FRAME_BITRATE,
        baseline.sample_rate,
        false,
    )
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn parses_mpeg1_layer3_header() {
        let frame = Mp3Frame::parse(&[0xFF, 0xFB, 0x92, 0xC4]).unwrap();
        assert_eq!(frame.version, MpegVersion::Mpeg1);
        assert_eq!(frame.bitrate, 128_000);
        assert_eq!(frame.sample_rate, 44100);
        assert!(frame.padding);
        assert_eq!(frame.channel_mode, ChannelMode::Mono);
        assert_eq!(frame.length(), 418);
        assert_eq!(frame.data_offset(), 21);
    }

    #[test]
    fn parses_mpeg2_and_mpeg25() {
        let mpeg2 = Mp3Frame::parse(&[0xFF, 0xF3, 0x80, 0x00]).unwrap();
        assert_eq!(mpeg2.version, MpegVersion::Mpeg2);
        assert_eq!(mpeg2.bitrate, 64_000);
        assert_eq!(mpeg2.sample_rate, 22050);
        assert_eq!(mpeg2.length(), 208);
        assert_eq!(mpeg2.data_offset(), 21);

        let mpeg25 = Mp3Frame::parse(&[0xFF, 0xE3, 0x18, 0xC0]).unwrap();
        assert_eq!(mpeg25.version, MpegVersion::Mpeg25);
        assert_eq!(mpeg25.bitrate, 8_000);
        assert_eq!(mpeg25.sample_rate, 8000);
        assert_eq!(mpeg25.length(), 72);
    }

    #[test]
    fn rejects_invalid_headers() {
        // no sync
        assert!(Mp3Frame::parse(&[0xFF, 0x1B, 0x90, 0x00]).is_none());
        // reserved version
        assert!(Mp3Frame::parse(&[0xFF, 0xEB, 0x90, 0x00]).is_none());
        // layer II
        assert!(Mp3Frame::parse(&[0xFF, 0xFD, 0x90, 0x00]).is_none());
        // free and bad bitrate
        assert!(Mp3Frame::parse(&[0xFF, 0xFB, 0x00, 0x00]).is_none());
        assert!(Mp3Frame::parse(&[0xFF, 0xFB, 0xF0, 0x00]).is_none());
        // reserved sample rate
        assert!(Mp3Frame::parse(&[0xFF, 0xFB, 0x9C, 0x00]).is_none());
        // too short
        assert!(Mp3Frame::parse(&[0xFF, 0xFB, 0x90]).is_none());
    }

    #[test]
    fn frame_straddling_the_chunk_end_is_not_counted() {
        let mut chunk = vec![0u8; 417 + 100];
        chunk[..4].copy_from_slice(&[0xFF, 0xFB, 0x90, 0x00]);
        chunk[417..421].copy_from_slice(&[0xFF, 0xFB, 0x90, 0x00]);

        let mut extractor = Mp3Extractor::new(Cursor::new(Vec::new()));
        extractor.write_chunk(&chunk, 0).unwrap();
        assert_eq!(extractor.frame_count(), 1);

        let (output, _) = extractor.finish().unwrap();
        assert_eq!(output.into_inner(), chunk);
    }

    #[test]
    fn existing_xing_header_disables_synthesis() {
        let mut first = vec![0u8; 417];
        first[..4].copy_from_slice(&[0xFF, 0xFB, 0x90, 0x00]);
        first[36..40].copy_from_slice(b"Xing");
        let mut second = vec![0u8; 208];
        second[..4].copy_from_slice(&[0xFF, 0xFB, 0x50, 0x00]);

        let mut extractor = Mp3Extractor::new(Cursor::new(Vec::new()));
        extractor.write_chunk(&first, 0).unwrap();
        extractor.write_chunk(&second, 26).unwrap();
        extractor.write_chunk(&first, 52).unwrap();
        assert!(extractor.is_vbr());
        assert_eq!(extractor.frame_count(), 3);

        let (output, warnings) = extractor.finish().unwrap();
        let mut expected = first.clone();
        expected.extend_from_slice(&second);
        expected.extend_from_slice(&first);
        assert_eq!(output.into_inner(), expected);
        assert!(warnings.is_empty());
    }
}
