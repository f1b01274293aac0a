//! Streaming decoder for FLAC (Free Lossless Audio Codec) bitstreams.
//!
//! ## Technical Overview
//!
//! Parser and decoder for the streamable subset of the FLAC format as
//! specified by RFC 9639.
//!
//! ### Bitstream Organization
//!
//! **Header section**: the `fLaC` marker followed by metadata blocks, the
//! mandatory STREAMINFO first.
//! **Audio section**: frames located by a 14-bit sync pattern, each holding
//! one subframe per channel plus CRC-8 (header) and CRC-16 (frame) checks.
//!
//! ### Streaming Model
//!
//! The decoder never owns the input. Callers feed whatever bytes they have;
//! header parsing suspends and resumes at metadata-block granularity, and a
//! frame decode that runs out of input consumes nothing so the caller can
//! refill and retry. This keeps peak memory at one decode workspace plus
//! whatever metadata the caller chooses to retain.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use flac::process::decode::{Decoder, FrameStatus, HeaderStatus};
//!
//! let data = std::fs::read("track.flac")?;
//! let mut decoder = Decoder::default();
//!
//! assert_eq!(decoder.read_header(&data)?, HeaderStatus::Done);
//! let mut offset = decoder.bytes_consumed();
//!
//! let info = decoder.stream_info().unwrap().clone();
//! println!("{} Hz, {} ch, {} bit", info.sample_rate, info.channels, info.sample_depth);
//!
//! let mut pcm = vec![0u8; decoder.output_buffer_size_bytes()];
//! while let FrameStatus::Frame { samples_per_channel } =
//!     decoder.decode_frame(&data[offset..], &mut pcm)?
//! {
//!     offset += decoder.bytes_consumed();
//!     let _ = &pcm[..samples_per_channel * info.channels as usize * 2];
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```

/// Decoding functionality.
///
/// 1. **Decoding** ([`process::decode`]): the streaming [`Decoder`]
///    (header scan, frame decode, channel decorrelation, CRC validation).
///
/// 2. **Output packing** ([`process::output`]): planar workspace samples to
///    interleaved little-endian PCM bytes.
///
/// [`Decoder`]: process::decode::Decoder
pub mod process;

/// Data structures representing FLAC format components.
///
/// - **STREAMINFO** ([`structs::stream_info`]): stream-wide parameters
/// - **Metadata** ([`structs::metadata`]): block types, retention limits,
///   resumable header scan
/// - **Frames** ([`structs::frame`]): sync search and frame headers
/// - **Subframes** ([`structs::subframe`]): per-channel sample decoding
pub mod structs;

/// Utility functions and supporting infrastructure.
///
/// - **Bitstream I/O** ([`utils::bitstream_io`]): bit-level reads, Rice
///   codes, CRC spans
/// - **CRC Validation** ([`utils::crc`]): table-driven CRC-8 / CRC-16
/// - **Linear Prediction** ([`utils::lpc`]): restoration kernels and
///   overflow analysis
/// - **Error Handling** ([`utils::errors`]): error types
pub mod utils;
