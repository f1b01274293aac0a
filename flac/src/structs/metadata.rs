//! Metadata block handling and the resumable header scan.
//!
//! The header section is `fLaC` followed by metadata blocks, each prefixed
//! by a 1-bit last-block flag, a 7-bit type and a 24-bit length. Blocks are
//! retained or skipped per a caller-configurable size limit for each type;
//! STREAMINFO is always parsed into fields and never stored raw.
//!
//! [`HeaderScan`] is an explicit state machine: it consumes whatever bytes
//! the caller has, remembers where it stopped (mid-block included), and
//! resumes on the next call. This keeps `read_header` usable with small
//! refill buffers.

use anyhow::{Result, bail};
use log::debug;

use crate::structs::stream_info::StreamInfo;
use crate::utils::bitstream_io::BsIoSliceReader;
use crate::utils::errors::HeaderError;

const MAGIC: u32 = 0x664C_6143; // "fLaC"

/// Metadata block types from the FLAC specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataType {
    StreamInfo,
    Padding,
    Application,
    SeekTable,
    VorbisComment,
    CueSheet,
    Picture,
    /// Reserved / not-yet-specified block types (7..=126).
    Unknown(u8),
}

impl Default for MetadataType {
    fn default() -> Self {
        Self::Padding
    }
}

impl MetadataType {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::StreamInfo,
            1 => Self::Padding,
            2 => Self::Application,
            3 => Self::SeekTable,
            4 => Self::VorbisComment,
            5 => Self::CueSheet,
            6 => Self::Picture,
            _ => Self::Unknown(code),
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            Self::StreamInfo => 0,
            Self::Padding => 1,
            Self::Application => 2,
            Self::SeekTable => 3,
            Self::VorbisComment => 4,
            Self::CueSheet => 5,
            Self::Picture => 6,
            Self::Unknown(code) => *code,
        }
    }

    fn limit_slot(&self) -> usize {
        match self.code() {
            code @ 0..=6 => code as usize,
            _ => 7,
        }
    }
}

/// One retained metadata block, raw body included.
#[derive(Debug, Clone)]
pub struct MetadataBlock {
    pub kind: MetadataType,
    pub length: u32,
    pub data: Vec<u8>,
}

/// Per-type retention limits in bytes; a block longer than its type's limit
/// is consumed but not stored. Limit 0 skips the type entirely.
#[derive(Debug, Clone)]
pub struct MetadataLimits {
    limits: [u32; 8],
}

impl Default for MetadataLimits {
    fn default() -> Self {
        // Conservative defaults for small-memory hosts: only Vorbis
        // comments are worth keeping around by default.
        Self {
            limits: [0, 0, 0, 0, 2048, 0, 0, 0],
        }
    }
}

impl MetadataLimits {
    pub fn limit(&self, kind: MetadataType) -> u32 {
        self.limits[kind.limit_slot()]
    }

    pub fn set_limit(&mut self, kind: MetadataType, max_bytes: u32) {
        self.limits[kind.limit_slot()] = max_bytes;
    }
}

/// Resumable header scan state.
///
/// `advance` returns the bytes consumed plus whether the header is complete;
/// an incomplete return means the caller should refill and call again.
#[derive(Debug, Default)]
pub struct HeaderScan {
    magic_seen: bool,
    first_block_seen: bool,
    last_block: bool,
    in_block: bool,
    block_kind: MetadataType,
    block_length: u32,
    bytes_read: u32,
    retain: bool,
    data: Vec<u8>,

    stream_info: Option<StreamInfo>,
    blocks: Vec<MetadataBlock>,
}

impl HeaderScan {
    /// Consumes header bytes from `input`. Returns `(bytes_consumed, done)`;
    /// when `done` is false the scan stopped for lack of input at a
    /// resumable boundary.
    pub fn advance(&mut self, input: &[u8], limits: &MetadataLimits) -> Result<(usize, bool)> {
        let mut pos = 0usize;

        if !self.magic_seen {
            if input.len() < 4 {
                return Ok((0, false));
            }

            let magic = u32::from_be_bytes([input[0], input[1], input[2], input[3]]);
            if magic != MAGIC {
                bail!(HeaderError::BadMagicNumber(magic));
            }

            self.magic_seen = true;
            pos = 4;
        }

        loop {
            if !self.in_block {
                if self.last_block {
                    if self.stream_info.is_none() {
                        bail!(HeaderError::MissingStreamInfo);
                    }
                    return Ok((pos, true));
                }

                if input.len() - pos < 4 {
                    return Ok((pos, false));
                }

                self.last_block = input[pos] & 0x80 != 0;
                self.block_kind = MetadataType::from_code(input[pos] & 0x7F);
                self.block_length = u32::from_be_bytes([
                    0,
                    input[pos + 1],
                    input[pos + 2],
                    input[pos + 3],
                ]);
                self.bytes_read = 0;
                self.data.clear();
                pos += 4;

                if !self.first_block_seen {
                    if self.block_kind != MetadataType::StreamInfo {
                        bail!(HeaderError::MissingStreamInfo);
                    }
                    self.first_block_seen = true;
                }

                self.retain = match self.block_kind {
                    MetadataType::StreamInfo => true,
                    kind => {
                        let keep = self.block_length <= limits.limit(kind);
                        if !keep {
                            debug!(
                                "Skipping {:?} metadata block of {} bytes (limit {})",
                                kind,
                                self.block_length,
                                limits.limit(kind)
                            );
                        }
                        keep
                    }
                };

                if self.retain {
                    self.data.reserve(self.block_length as usize);
                }

                self.in_block = true;
            }

            let wanted = (self.block_length - self.bytes_read) as usize;
            let take = wanted.min(input.len() - pos);

            if self.retain {
                self.data.extend_from_slice(&input[pos..pos + take]);
            }

            pos += take;
            self.bytes_read += take as u32;

            if self.bytes_read < self.block_length {
                return Ok((pos, false));
            }

            if self.block_kind == MetadataType::StreamInfo {
                let mut reader = BsIoSliceReader::from_slice(&self.data);
                self.stream_info = Some(StreamInfo::read(&mut reader)?);
                self.data.clear();
            } else if self.retain {
                self.blocks.push(MetadataBlock {
                    kind: self.block_kind,
                    length: self.block_length,
                    data: std::mem::take(&mut self.data),
                });
            }

            self.in_block = false;
        }
    }

    /// Hands the scan results to the decoder once `advance` reported done.
    pub fn into_results(self) -> (Option<StreamInfo>, Vec<MetadataBlock>) {
        (self.stream_info, self.blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block_header(last: bool, code: u8, length: u32) -> [u8; 4] {
        let bytes = length.to_be_bytes();
        [
            (last as u8) << 7 | code,
            bytes[1],
            bytes[2],
            bytes[3],
        ]
    }

    fn minimal_streaminfo() -> Vec<u8> {
        let mut body = vec![0u8; 34];
        body[0..2].copy_from_slice(&16u16.to_be_bytes());
        body[2..4].copy_from_slice(&16u16.to_be_bytes());
        // sample_rate 8000, mono, 8-bit, 16 samples
        let packed: u64 = (8000u64 << 44) | (0u64 << 41) | (7u64 << 36) | 16;
        body[10..18].copy_from_slice(&packed.to_be_bytes());
        body
    }

    #[test]
    fn type_codes_round_trip() {
        for code in 0..=126u8 {
            assert_eq!(MetadataType::from_code(code).code(), code);
        }
    }

    #[test]
    fn rejects_bad_magic() {
        let mut scan = HeaderScan::default();
        let err = scan
            .advance(b"RIFF....", &MetadataLimits::default())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HeaderError>(),
            Some(HeaderError::BadMagicNumber(_))
        ));
    }

    #[test]
    fn single_streaminfo_header() {
        let mut data = b"fLaC".to_vec();
        data.extend_from_slice(&block_header(true, 0, 34));
        data.extend_from_slice(&minimal_streaminfo());

        let mut scan = HeaderScan::default();
        let (consumed, done) = scan.advance(&data, &MetadataLimits::default()).unwrap();
        assert!(done);
        assert_eq!(consumed, data.len());

        let (stream_info, blocks) = scan.into_results();
        let si = stream_info.unwrap();
        assert_eq!(si.sample_rate, 8000);
        assert_eq!(si.channels, 1);
        assert!(blocks.is_empty());
    }

    #[test]
    fn resumes_across_single_byte_feeds() {
        let mut data = b"fLaC".to_vec();
        data.extend_from_slice(&block_header(false, 0, 34));
        data.extend_from_slice(&minimal_streaminfo());
        data.extend_from_slice(&block_header(true, 4, 6));
        data.extend_from_slice(b"tags!!");

        let mut limits = MetadataLimits::default();
        limits.set_limit(MetadataType::VorbisComment, 64);

        let mut scan = HeaderScan::default();
        let mut offset = 0usize;
        let mut done = false;

        for _round in 0..data.len() + 8 {
            // Feed whatever remains but at most 5 bytes at a time.
            let end = (offset + 5).min(data.len());
            let (consumed, finished) = scan.advance(&data[offset..end], &limits).unwrap();
            offset += consumed;
            if finished {
                done = true;
                break;
            }
        }
        assert!(done, "scan stalled at offset {offset}");

        assert_eq!(offset, data.len());
        let (stream_info, blocks) = scan.into_results();
        assert!(stream_info.is_some());
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].kind, MetadataType::VorbisComment);
        assert_eq!(blocks[0].data, b"tags!!");
    }

    #[test]
    fn oversized_block_is_skipped_not_stored() {
        let mut data = b"fLaC".to_vec();
        data.extend_from_slice(&block_header(false, 0, 34));
        data.extend_from_slice(&minimal_streaminfo());
        data.extend_from_slice(&block_header(true, 6, 100));
        data.extend_from_slice(&[0xAB; 100]);

        let mut scan = HeaderScan::default();
        let (consumed, done) = scan.advance(&data, &MetadataLimits::default()).unwrap();
        assert!(done);
        assert_eq!(consumed, data.len());

        let (_, blocks) = scan.into_results();
        assert!(blocks.is_empty());
    }

    #[test]
    fn first_block_must_be_streaminfo() {
        let mut data = b"fLaC".to_vec();
        data.extend_from_slice(&block_header(true, 1, 4));
        data.extend_from_slice(&[0; 4]);

        let mut scan = HeaderScan::default();
        let err = scan.advance(&data, &MetadataLimits::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HeaderError>(),
            Some(HeaderError::MissingStreamInfo)
        ));
    }
}
