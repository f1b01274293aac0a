//! Streaming FLAC decoding to PCM samples.
//!
//! The [`Decoder`] consumes a caller-owned byte buffer in two phases. First
//! `read_header` runs until the metadata section is complete, suspending
//! with [`HeaderStatus::NeedMoreData`] whenever the buffer runs dry; the
//! scan state persists across calls, so refills can be arbitrarily small.
//! Then `decode_frame` produces one frame of interleaved PCM per call.
//!
//! After every call, [`Decoder::bytes_consumed`] reports how far the input
//! advanced so the caller can compact its buffer. A frame decode that runs
//! out of input reports zero bytes consumed and fails with
//! [`FrameError::OutOfData`]: the caller refills and simply retries.

use std::io;

use anyhow::{Result, bail};

use crate::process::output;
use crate::structs::frame::FrameHeader;
use crate::structs::metadata::{HeaderScan, MetadataBlock, MetadataLimits, MetadataType};
use crate::structs::stream_info::StreamInfo;
use crate::structs::subframe::decode_subframe;
use crate::utils::bitstream_io::BsIoSliceReader;
use crate::utils::crc::{CRC_FRAME_ALG, CRC_FRAME_HEADER_ALG, Crc8, Crc16};
use crate::utils::errors::FrameError;

/// Outcome of a `read_header` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderStatus {
    /// STREAMINFO and all metadata blocks are in; frames may be decoded.
    Done,
    /// The buffer ran out at a resumable boundary; refill and call again.
    NeedMoreData,
}

/// Outcome of a successful `decode_frame` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// One frame was decoded and packed into the output buffer.
    Frame { samples_per_channel: usize },
    /// The input was exhausted at a frame boundary.
    EndOfStream,
}

/// Streaming FLAC decoder.
///
/// ```rust,no_run
/// use flac::process::decode::{Decoder, FrameStatus, HeaderStatus};
///
/// let data = std::fs::read("stream.flac")?;
/// let mut decoder = Decoder::default();
///
/// // Single-shot feeding: the whole file is in memory.
/// assert_eq!(decoder.read_header(&data)?, HeaderStatus::Done);
/// let mut offset = decoder.bytes_consumed();
///
/// let mut pcm = vec![0u8; decoder.output_buffer_size_bytes()];
/// loop {
///     match decoder.decode_frame(&data[offset..], &mut pcm)? {
///         FrameStatus::Frame { samples_per_channel } => {
///             offset += decoder.bytes_consumed();
///             // use &pcm[..] here
///             let _ = samples_per_channel;
///         }
///         FrameStatus::EndOfStream => break,
///     }
/// }
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Debug)]
pub struct Decoder {
    limits: MetadataLimits,
    crc_check_enabled: bool,
    output_32bit_samples: bool,

    header_scan: Option<HeaderScan>,
    stream_info: Option<StreamInfo>,
    metadata: Vec<MetadataBlock>,

    /// Planar decode workspace, `max_block_size * channels` entries,
    /// allocated once when the header completes.
    block_samples: Vec<i32>,
    bytes_consumed: usize,

    crc8: Crc8,
    crc16: Crc16,
}

impl Default for Decoder {
    fn default() -> Self {
        Self {
            limits: MetadataLimits::default(),
            crc_check_enabled: true,
            output_32bit_samples: false,
            header_scan: Some(HeaderScan::default()),
            stream_info: None,
            metadata: Vec::new(),
            block_samples: Vec::new(),
            bytes_consumed: 0,
            crc8: Crc8::new(&CRC_FRAME_HEADER_ALG),
            crc16: Crc16::new(&CRC_FRAME_ALG),
        }
    }
}

impl Decoder {
    /// Feeds header bytes. Returns [`HeaderStatus::Done`] once STREAMINFO
    /// and every metadata block have been read; call `bytes_consumed`
    /// afterwards to learn how much of `input` was used.
    pub fn read_header(&mut self, input: &[u8]) -> Result<HeaderStatus> {
        self.bytes_consumed = 0;

        let Some(mut scan) = self.header_scan.take() else {
            return Ok(HeaderStatus::Done);
        };

        match scan.advance(input, &self.limits) {
            Ok((consumed, true)) => {
                self.bytes_consumed = consumed;

                let (stream_info, metadata) = scan.into_results();
                let stream_info =
                    stream_info.expect("header scan completed without STREAMINFO");

                self.block_samples = vec![
                    0i32;
                    usize::from(stream_info.max_block_size)
                        * usize::from(stream_info.channels)
                ];
                self.stream_info = Some(stream_info);
                self.metadata = metadata;

                Ok(HeaderStatus::Done)
            }
            Ok((consumed, false)) => {
                self.bytes_consumed = consumed;
                self.header_scan = Some(scan);
                Ok(HeaderStatus::NeedMoreData)
            }
            Err(e) => {
                self.header_scan = Some(scan);
                Err(e)
            }
        }
    }

    /// Decodes the next frame from `input`, packing interleaved PCM into
    /// `output`.
    ///
    /// On [`FrameError::OutOfData`] no input counts as consumed, so the
    /// caller may refill and retry the same frame. A CRC-16 mismatch
    /// consumes the whole frame, leaving the caller free to continue with
    /// the next one.
    pub fn decode_frame(&mut self, input: &[u8], output: &mut [u8]) -> Result<FrameStatus> {
        self.bytes_consumed = 0;

        let Some(stream_info) = self.stream_info.clone() else {
            bail!("decode_frame called before the header was read");
        };

        if input.is_empty() {
            return Ok(FrameStatus::EndOfStream);
        }

        let mut reader = BsIoSliceReader::from_slice(input);

        match self.decode_frame_inner(&mut reader, &stream_info, output) {
            Ok(samples_per_channel) => {
                self.bytes_consumed = reader.byte_position()? as usize;
                Ok(FrameStatus::Frame { samples_per_channel })
            }
            Err(e) => {
                if is_unexpected_eof(&e) {
                    bail!(FrameError::OutOfData);
                }

                if !matches!(
                    e.downcast_ref::<FrameError>(),
                    Some(FrameError::SyncNotFound)
                ) {
                    self.bytes_consumed = reader.byte_position().unwrap_or(0) as usize;
                }

                Err(e)
            }
        }
    }

    fn decode_frame_inner(
        &mut self,
        reader: &mut BsIoSliceReader,
        stream_info: &StreamInfo,
        output: &mut [u8],
    ) -> Result<usize> {
        let header_crc = self.crc_check_enabled.then_some(&self.crc8);
        let header = FrameHeader::read(reader, stream_info, header_crc)?;

        // The workspace is sized from STREAMINFO; a frame claiming more
        // would write out of bounds.
        if header.block_size > u32::from(stream_info.max_block_size) {
            bail!(FrameError::BlockSizeOutOfRange {
                block_size: header.block_size,
                max: u32::from(stream_info.max_block_size),
            });
        }

        let block_size = header.block_size as usize;
        let channels = header.channels() as usize;
        let depth = header.sample_depth;

        let needed = block_size * channels * self.output_bytes_per_sample_inner(depth);
        if output.len() < needed {
            bail!(
                "output buffer too small: {} bytes, frame needs {needed}",
                output.len()
            );
        }

        let samples = &mut self.block_samples[..block_size * channels];

        match header.channel_assignment {
            0..=7 => {
                for channel in samples.chunks_exact_mut(block_size) {
                    decode_subframe(reader, channel, depth)?;
                }
            }
            assignment => {
                // Stereo decorrelation: the side channel carries one extra
                // bit of depth.
                let depth0 = depth + u32::from(assignment == 9);
                let depth1 = depth + u32::from(assignment != 9);

                let (first, second) = samples.split_at_mut(block_size);
                decode_subframe(reader, first, depth0)?;
                decode_subframe(reader, second, depth1)?;

                match assignment {
                    8 => {
                        // LEFT/SIDE: right = left - side.
                        for i in 0..block_size {
                            samples[block_size + i] =
                                samples[i].wrapping_sub(samples[block_size + i]);
                        }
                    }
                    9 => {
                        // SIDE/RIGHT: left = side + right.
                        for i in 0..block_size {
                            samples[i] = samples[i].wrapping_add(samples[block_size + i]);
                        }
                    }
                    _ => {
                        // MID/SIDE: the arithmetic shift form keeps odd
                        // side values exact.
                        for i in 0..block_size {
                            let side = samples[block_size + i];
                            let right = samples[i].wrapping_sub(side >> 1);
                            samples[block_size + i] = right;
                            samples[i] = right.wrapping_add(side);
                        }
                    }
                }
            }
        }

        reader.align_to_byte();
        let frame_end = reader.byte_position()?;
        let crc_read = reader.get_n::<u16>(16)?;

        if self.crc_check_enabled {
            let calculated = reader.crc16_span(&self.crc16, header.start_offset, frame_end)?;
            if calculated != crc_read {
                bail!(FrameError::FrameCrcMismatch {
                    calculated,
                    read: crc_read,
                });
            }
        }

        if self.output_32bit_samples {
            output::pack_32bit(samples, block_size, channels, depth, output);
        } else {
            output::pack_native(samples, block_size, channels, depth, output);
        }

        Ok(block_size)
    }

    /// Whole input bytes consumed by the last `read_header` or
    /// `decode_frame` call.
    pub fn bytes_consumed(&self) -> usize {
        self.bytes_consumed
    }

    /// Parsed STREAMINFO, available once `read_header` reports `Done`.
    pub fn stream_info(&self) -> Option<&StreamInfo> {
        self.stream_info.as_ref()
    }

    /// All metadata blocks retained under the configured size limits.
    pub fn metadata_blocks(&self) -> &[MetadataBlock] {
        &self.metadata
    }

    /// First retained metadata block of the given kind.
    pub fn metadata_block(&self, kind: MetadataType) -> Option<&MetadataBlock> {
        self.metadata.iter().find(|block| block.kind == kind)
    }

    /// Sets the retention limit for one metadata kind. Only meaningful
    /// before `read_header` completes.
    pub fn set_max_metadata_size(&mut self, kind: MetadataType, max_bytes: u32) {
        self.limits.set_limit(kind, max_bytes);
    }

    pub fn max_metadata_size(&self, kind: MetadataType) -> u32 {
        self.limits.limit(kind)
    }

    /// Enables or disables both the header CRC-8 and the frame CRC-16
    /// checks.
    pub fn set_crc_check_enabled(&mut self, enabled: bool) {
        self.crc_check_enabled = enabled;
    }

    pub fn crc_check_enabled(&self) -> bool {
        self.crc_check_enabled
    }

    /// Switches the packer to 4-byte MSB-aligned output for every depth.
    pub fn set_output_32bit_samples(&mut self, enabled: bool) {
        self.output_32bit_samples = enabled;
    }

    pub fn output_32bit_samples(&self) -> bool {
        self.output_32bit_samples
    }

    /// Bytes per packed sample under the current output mode; 0 before the
    /// header is complete.
    pub fn output_bytes_per_sample(&self) -> usize {
        self.stream_info
            .as_ref()
            .map_or(0, |si| self.output_bytes_per_sample_inner(u32::from(si.sample_depth)))
    }

    fn output_bytes_per_sample_inner(&self, depth: u32) -> usize {
        if self.output_32bit_samples {
            4
        } else {
            depth.div_ceil(8) as usize
        }
    }

    /// Output buffer capacity needed for the largest frame, in samples.
    pub fn output_buffer_size(&self) -> usize {
        self.stream_info.as_ref().map_or(0, |si| {
            usize::from(si.max_block_size) * usize::from(si.channels)
        })
    }

    /// Output buffer capacity needed for the largest frame, in bytes.
    pub fn output_buffer_size_bytes(&self) -> usize {
        self.output_buffer_size() * self.output_bytes_per_sample()
    }
}

fn is_unexpected_eof(e: &anyhow::Error) -> bool {
    e.downcast_ref::<io::Error>()
        .is_some_and(|io_err| io_err.kind() == io::ErrorKind::UnexpectedEof)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_before_header_is_rejected() {
        let mut decoder = Decoder::default();
        let mut out = [0u8; 16];
        assert!(decoder.decode_frame(&[0xFF, 0xF8], &mut out).is_err());
    }

    #[test]
    fn empty_input_is_end_of_stream() {
        let mut decoder = Decoder::default();
        let mut header = b"fLaC".to_vec();
        header.extend_from_slice(&[0x80, 0, 0, 34]);
        let mut body = vec![0u8; 34];
        body[0..2].copy_from_slice(&16u16.to_be_bytes());
        body[2..4].copy_from_slice(&16u16.to_be_bytes());
        let packed: u64 = (8000u64 << 44) | (7u64 << 36) | 16;
        body[10..18].copy_from_slice(&packed.to_be_bytes());
        header.extend_from_slice(&body);

        assert_eq!(decoder.read_header(&header).unwrap(), HeaderStatus::Done);
        assert_eq!(decoder.bytes_consumed(), header.len());

        let mut out = [0u8; 16];
        assert_eq!(
            decoder.decode_frame(&[], &mut out).unwrap(),
            FrameStatus::EndOfStream
        );
        assert_eq!(decoder.bytes_consumed(), 0);
    }
}
