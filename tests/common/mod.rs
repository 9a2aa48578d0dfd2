//! Synthetic FLV fixtures shared by the integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

pub const TAG_AUDIO: u8 = 8;
pub const TAG_VIDEO: u8 = 9;
pub const TAG_SCRIPT: u8 = 18;

/// Media info byte for AAC, 44.1 kHz, 16-bit stereo.
pub const MEDIA_INFO_AAC: u8 = 0xAF;
/// Media info byte for MP3, 44.1 kHz, 16-bit stereo.
pub const MEDIA_INFO_MP3: u8 = 0x2F;

/// AudioSpecificConfig for AAC LC, 44.1 kHz, stereo.
pub const AAC_LC_44100_STEREO: [u8; 2] = [0x12, 0x10];

/// Incrementally builds an FLV file in memory.
pub struct FlvBuilder {
    bytes: Vec<u8>,
}

impl FlvBuilder {
    /// Start a file with the given header flags and the standard 9-byte
    /// header, followed by the zero previous-tag-size.
    pub fn new(flags: u8) -> Self {
        let mut bytes = b"FLV\x01".to_vec();
        bytes.push(flags);
        bytes.extend_from_slice(&9u32.to_be_bytes());
        bytes.extend_from_slice(&0u32.to_be_bytes());
        Self { bytes }
    }

    /// Append a complete tag.
    pub fn tag(mut self, tag_type: u8, timestamp: u32, payload: &[u8]) -> Self {
        let size = payload.len() as u32;
        self.bytes.push(tag_type);
        self.bytes.extend_from_slice(&size.to_be_bytes()[1..]);
        self.bytes.extend_from_slice(&timestamp.to_be_bytes()[1..]);
        self.bytes.push((timestamp >> 24) as u8);
        self.bytes.extend_from_slice(&[0, 0, 0]);
        self.bytes.extend_from_slice(payload);
        self.bytes.extend_from_slice(&(size + 11).to_be_bytes());
        self
    }

    pub fn audio(self, timestamp: u32, media_info: u8, chunk: &[u8]) -> Self {
        let mut payload = vec![media_info];
        payload.extend_from_slice(chunk);
        self.tag(TAG_AUDIO, timestamp, &payload)
    }

    pub fn aac_config(self, timestamp: u32, config: [u8; 2]) -> Self {
        self.audio(timestamp, MEDIA_INFO_AAC, &[0, config[0], config[1]])
    }

    pub fn aac_raw(self, timestamp: u32, data: &[u8]) -> Self {
        let mut chunk = vec![1];
        chunk.extend_from_slice(data);
        self.audio(timestamp, MEDIA_INFO_AAC, &chunk)
    }

    pub fn mp3(self, timestamp: u32, frames: &[u8]) -> Self {
        self.audio(timestamp, MEDIA_INFO_MP3, frames)
    }

    pub fn video(self, timestamp: u32, payload: &[u8]) -> Self {
        self.tag(TAG_VIDEO, timestamp, payload)
    }

    /// Append raw bytes, e.g. a cut-off tag.
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.bytes.extend_from_slice(bytes);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.bytes
    }
}

/// An MPEG-1 Layer III frame at 44.1 kHz, stereo, no CRC, no padding.
///
/// The body is filled with `fill` so frames of the same bitrate stay
/// distinguishable.
pub fn mpeg1_frame(bitrate_kbps: u32, fill: u8) -> Vec<u8> {
    let bitrate_index: u8 = match bitrate_kbps {
        32 => 1,
        64 => 5,
        96 => 7,
        128 => 9,
        192 => 11,
        320 => 14,
        other => panic!("unsupported test bitrate {other}"),
    };
    let length = (144 * bitrate_kbps * 1000 / 44100) as usize;
    let mut frame = vec![fill; length];
    frame[..4].copy_from_slice(&[0xFF, 0xFB, bitrate_index << 4, 0x00]);
    frame
}

/// Write `bytes` to `name` inside `directory`.
pub fn write_fixture(directory: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = directory.join(name);
    fs::write(&path, bytes).unwrap();
    path
}

/// Big-endian u32 at `offset`.
pub fn u32_at(bytes: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes(bytes[offset..offset + 4].try_into().unwrap())
}
