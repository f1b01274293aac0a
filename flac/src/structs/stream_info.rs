//! STREAMINFO, the mandatory first metadata block.
//!
//! Every stream-wide parameter the frame decoder validates against lives
//! here: block size bounds, sample rate, channel count, bit depth, the total
//! sample count and the MD5 signature of the unencoded audio.

use anyhow::{Result, bail};

use crate::utils::bitstream_io::BsIoSliceReader;
use crate::utils::errors::HeaderError;

/// Parsed STREAMINFO fields.
///
/// The MD5 signature is exposed as-is; validating decoded audio against it
/// is the caller's business.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    pub min_block_size: u16,
    pub max_block_size: u16,
    pub sample_rate: u32,
    pub channels: u8,
    pub sample_depth: u8,
    pub total_samples: u64,
    pub md5_signature: [u8; 16],
}

impl StreamInfo {
    /// Parses the 34-byte STREAMINFO block body.
    ///
    /// Big-endian bit fields, in order: min/max block size (16 each),
    /// min/max frame size (24 each, discarded), sample rate (20),
    /// channels - 1 (3), sample depth - 1 (5), total samples (36),
    /// MD5 signature (128).
    pub fn read(reader: &mut BsIoSliceReader) -> Result<Self> {
        let min_block_size = reader.get_n::<u16>(16)?;
        let max_block_size = reader.get_n::<u16>(16)?;

        // Min/max frame sizes are hints only; nothing downstream uses them.
        reader.get_n::<u32>(24)?;
        reader.get_n::<u32>(24)?;

        let sample_rate = reader.get_n::<u32>(20)?;
        let channels = reader.get_n::<u8>(3)? + 1;
        let sample_depth = reader.get_n::<u8>(5)? + 1;
        let total_samples = reader.get_n::<u64>(36)?;

        let mut md5_signature = [0u8; 16];
        reader.get_bytes(&mut md5_signature)?;

        let si = Self {
            min_block_size,
            max_block_size,
            sample_rate,
            channels,
            sample_depth,
            total_samples,
            md5_signature,
        };

        si.validate()?;

        Ok(si)
    }

    fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            bail!(HeaderError::ZeroSampleRate);
        }

        if self.min_block_size < 16 || self.min_block_size > self.max_block_size {
            bail!(HeaderError::BlockSizeBounds {
                min: self.min_block_size,
                max: self.max_block_size,
            });
        }

        Ok(())
    }
}
