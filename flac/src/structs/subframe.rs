//! Subframe decoding: one channel's worth of samples per frame.
//!
//! A subframe starts with a padding bit, a 6-bit type code and a wasted-bits
//! flag. The four subframe kinds share a shape: optional warm-up samples,
//! Rice-partitioned residuals, then prediction restoration. Constant and
//! verbatim subframes skip prediction entirely.

use anyhow::{Result, bail};
use log::warn;

use crate::utils::bitstream_io::BsIoSliceReader;
use crate::utils::errors::SubframeError;
use crate::utils::lpc;

/// Maximum LPC order representable by the 6-bit type codes 32..=63.
pub const MAX_LPC_ORDER: usize = 32;

/// Subframe kinds, tagged with the prediction order where one exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubframeKind {
    Constant,
    Verbatim,
    Fixed(u8),
    Lpc(u8),
}

impl SubframeKind {
    /// Maps the 6-bit type code; everything outside
    /// {0, 1, 8..=12, 32..=63} is reserved.
    pub fn from_type_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(Self::Constant),
            1 => Ok(Self::Verbatim),
            8..=12 => Ok(Self::Fixed(code - 8)),
            32..=63 => Ok(Self::Lpc(code - 31)),
            _ => bail!(SubframeError::ReservedSubframeType(code)),
        }
    }
}

/// Decodes one subframe into `buffer` (one channel, `block_size` samples).
///
/// `sample_depth` is the container depth for this channel, already widened
/// by one bit when the channel carries a side signal.
pub fn decode_subframe(
    reader: &mut BsIoSliceReader,
    buffer: &mut [i32],
    sample_depth: u32,
) -> Result<()> {
    // Padding bit; not validated.
    reader.get()?;

    let kind = SubframeKind::from_type_code(reader.get_n::<u8>(6)?)?;

    let wasted_bits = if reader.get()? {
        1 + reader.get_unary()?
    } else {
        0
    };

    if wasted_bits >= sample_depth {
        bail!(SubframeError::WastedBitsTooLarge {
            wasted: wasted_bits,
            depth: sample_depth,
        });
    }

    let depth = sample_depth - wasted_bits;

    match kind {
        SubframeKind::Constant => {
            let value = read_sample(reader, depth)?;
            buffer.fill(value);
        }
        SubframeKind::Verbatim => {
            for sample in buffer.iter_mut() {
                *sample = read_sample(reader, depth)?;
            }
        }
        SubframeKind::Fixed(order) => decode_fixed(reader, buffer, order, depth)?,
        SubframeKind::Lpc(order) => decode_lpc(reader, buffer, order, depth)?,
    }

    if wasted_bits > 0 {
        for sample in buffer.iter_mut() {
            *sample = sample.wrapping_shl(wasted_bits);
        }
    }

    Ok(())
}

/// Signed sample read; widths above 32 bits (side channel at 32-bit depth)
/// go through `i64` and truncate into the workspace.
#[inline(always)]
fn read_sample(reader: &mut BsIoSliceReader, bits: u32) -> Result<i32> {
    if bits <= 32 {
        Ok(reader.get_s::<i32>(bits)?)
    } else {
        Ok(reader.get_s64(bits)? as i32)
    }
}

fn decode_fixed(
    reader: &mut BsIoSliceReader,
    buffer: &mut [i32],
    order: u8,
    sample_depth: u32,
) -> Result<()> {
    if order > 4 {
        bail!(SubframeError::BadFixedPredictionOrder(order));
    }

    for sample in buffer.iter_mut().take(order as usize) {
        *sample = read_sample(reader, sample_depth)?;
    }

    decode_residuals(reader, buffer, u32::from(order))?;

    lpc::restore(
        buffer,
        lpc::FIXED_COEFFICIENTS[order as usize],
        0,
        sample_depth,
    );

    Ok(())
}

fn decode_lpc(
    reader: &mut BsIoSliceReader,
    buffer: &mut [i32],
    order: u8,
    sample_depth: u32,
) -> Result<()> {
    let order = order as usize;

    for sample in buffer.iter_mut().take(order) {
        *sample = read_sample(reader, sample_depth)?;
    }

    let precision = reader.get_n::<u32>(4)? + 1;
    let shift = reader.get_s::<i32>(5)?;
    let shift = if shift < 0 {
        warn!("Negative predictor shift {shift}, treating as 0");
        0
    } else {
        shift as u32
    };

    // Coefficients arrive newest-sample first but the kernel wants the
    // multiplier for the oldest window sample in slot 0, so store reversed.
    let mut coefs = [0i32; MAX_LPC_ORDER];
    for i in (0..order).rev() {
        coefs[i] = reader.get_s(precision)?;
    }

    decode_residuals(reader, buffer, order as u32)?;

    lpc::restore(buffer, &coefs[..order], shift, sample_depth);

    Ok(())
}

/// Decodes the Rice-partitioned residual section into
/// `buffer[warm_up..block_size]`.
fn decode_residuals(reader: &mut BsIoSliceReader, buffer: &mut [i32], warm_up: u32) -> Result<()> {
    let block_size = buffer.len() as u32;

    let method = reader.get_n::<u8>(2)?;
    if method >= 2 {
        bail!(SubframeError::ReservedResidualCodingMethod(method));
    }

    let (param_bits, escape_param) = if method == 0 { (4, 0xF) } else { (5, 0x1F) };

    let partition_order = reader.get_n::<u32>(4)?;
    let partitions = 1u32 << partition_order;

    if block_size % partitions != 0 {
        bail!(SubframeError::BlockSizeNotDivisibleByRicePartitions {
            block_size,
            partitions,
        });
    }

    let partition_len = block_size >> partition_order;
    if partition_len < warm_up {
        bail!(SubframeError::PartitionShorterThanWarmUp {
            partition_len,
            warm_up,
        });
    }

    let mut index = warm_up as usize;

    for partition in 0..partitions {
        let count = if partition == 0 {
            (partition_len - warm_up) as usize
        } else {
            partition_len as usize
        };

        let param: u32 = reader.get_n(param_bits)?;

        if param < escape_param {
            for _ in 0..count {
                buffer[index] = reader.get_rice(param)?;
                index += 1;
            }
        } else {
            // Escaped partition: raw samples of a fixed width, or silence
            // when the width is zero.
            let bits = reader.get_n::<u32>(5)?;
            if bits == 0 {
                buffer[index..index + count].fill(0);
                index += count;
            } else {
                for _ in 0..count {
                    buffer[index] = reader.get_s::<i32>(bits)?;
                    index += 1;
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitstream_io::{BigEndian, BitWrite, BitWriter};

    fn finish(mut w: BitWriter<Vec<u8>, BigEndian>) -> Vec<u8> {
        w.byte_align().unwrap();
        w.into_writer()
    }

    fn put(w: &mut BitWriter<Vec<u8>, BigEndian>, bits: u32, value: u32) {
        w.write_var::<u32>(bits, value).unwrap();
    }

    fn put_signed(w: &mut BitWriter<Vec<u8>, BigEndian>, bits: u32, value: i32) {
        let mask = if bits == 32 {
            u32::MAX
        } else {
            (1u32 << bits) - 1
        };
        put(w, bits, (value as u32) & mask);
    }

    /// Writes one Rice-coded value: zigzag fold, unary quotient, remainder.
    fn put_rice(w: &mut BitWriter<Vec<u8>, BigEndian>, param: u32, value: i32) {
        let folded = ((value << 1) ^ (value >> 31)) as u32;
        let quotient = folded >> param;
        for _ in 0..quotient {
            w.write_bit(false).unwrap();
        }
        w.write_bit(true).unwrap();
        put(w, param, folded & ((1 << param) - 1));
    }

    #[test]
    fn type_code_mapping() {
        assert_eq!(
            SubframeKind::from_type_code(0).unwrap(),
            SubframeKind::Constant
        );
        assert_eq!(
            SubframeKind::from_type_code(12).unwrap(),
            SubframeKind::Fixed(4)
        );
        assert_eq!(
            SubframeKind::from_type_code(32).unwrap(),
            SubframeKind::Lpc(1)
        );
        assert_eq!(
            SubframeKind::from_type_code(63).unwrap(),
            SubframeKind::Lpc(32)
        );

        for reserved in [2u8, 7, 13, 31] {
            let err = SubframeKind::from_type_code(reserved).unwrap_err();
            assert!(matches!(
                err.downcast_ref::<SubframeError>(),
                Some(SubframeError::ReservedSubframeType(_))
            ));
        }
    }

    #[test]
    fn constant_subframe_fills_channel() {
        let mut w = BitWriter::endian(Vec::new(), BigEndian);
        put(&mut w, 1, 0); // padding
        put(&mut w, 6, 0); // constant
        put(&mut w, 1, 0); // no wasted bits
        put_signed(&mut w, 16, -1234);
        let data = finish(w);

        let mut buffer = [0i32; 8];
        let mut reader = BsIoSliceReader::from_slice(&data);
        decode_subframe(&mut reader, &mut buffer, 16).unwrap();
        assert_eq!(buffer, [-1234; 8]);
    }

    #[test]
    fn verbatim_subframe_with_wasted_bits() {
        let mut w = BitWriter::endian(Vec::new(), BigEndian);
        put(&mut w, 1, 0);
        put(&mut w, 6, 1); // verbatim
        put(&mut w, 1, 1); // wasted bits follow
        put(&mut w, 1, 1); // unary 0 -> k = 1
        for value in [5i32, -5, 100, -100] {
            put_signed(&mut w, 15, value); // effective depth 16 - 1
        }
        let data = finish(w);

        let mut buffer = [0i32; 4];
        let mut reader = BsIoSliceReader::from_slice(&data);
        decode_subframe(&mut reader, &mut buffer, 16).unwrap();
        assert_eq!(buffer, [10, -10, 200, -200]);
    }

    #[test]
    fn fixed_order_one_subframe() {
        let mut w = BitWriter::endian(Vec::new(), BigEndian);
        put(&mut w, 1, 0);
        put(&mut w, 6, 9); // fixed, order 1
        put(&mut w, 1, 0);
        put_signed(&mut w, 16, 1000); // warm-up
        put(&mut w, 2, 0); // rice method 0
        put(&mut w, 4, 0); // partition order 0
        put(&mut w, 4, 3); // rice parameter
        for residual in [1i32, -2, 3] {
            put_rice(&mut w, 3, residual);
        }
        let data = finish(w);

        let mut buffer = [0i32; 4];
        let mut reader = BsIoSliceReader::from_slice(&data);
        decode_subframe(&mut reader, &mut buffer, 16).unwrap();
        assert_eq!(buffer, [1000, 1001, 999, 1002]);
    }

    #[test]
    fn lpc_subframe_restores_prediction() {
        // Order-1 LPC with coefficient 2 and shift 1: prediction is
        // previous_sample * 2 >> 1 = previous_sample.
        let mut w = BitWriter::endian(Vec::new(), BigEndian);
        put(&mut w, 1, 0);
        put(&mut w, 6, 32); // lpc, order 1
        put(&mut w, 1, 0);
        put_signed(&mut w, 16, 100); // warm-up
        put(&mut w, 4, 3); // precision - 1 -> 4 bits
        put_signed(&mut w, 5, 1); // shift
        put_signed(&mut w, 4, 2); // coefficient
        put(&mut w, 2, 0);
        put(&mut w, 4, 0);
        put(&mut w, 4, 2); // rice parameter
        for residual in [10i32, -10, 0] {
            put_rice(&mut w, 2, residual);
        }
        let data = finish(w);

        let mut buffer = [0i32; 4];
        let mut reader = BsIoSliceReader::from_slice(&data);
        decode_subframe(&mut reader, &mut buffer, 16).unwrap();
        assert_eq!(buffer, [100, 110, 100, 100]);
    }

    #[test]
    fn escaped_partition_zero_width_is_silence() {
        let mut w = BitWriter::endian(Vec::new(), BigEndian);
        put(&mut w, 1, 0);
        put(&mut w, 6, 8); // fixed, order 0
        put(&mut w, 1, 0);
        put(&mut w, 2, 0); // rice method 0
        put(&mut w, 4, 1); // partition order 1 -> two partitions
        put(&mut w, 4, 0xF); // escape
        put(&mut w, 5, 0); // zero-width partition
        put(&mut w, 4, 0xF); // escape
        put(&mut w, 5, 6); // 6-bit raw samples
        for value in [-20i32, 19] {
            put_signed(&mut w, 6, value);
        }
        let data = finish(w);

        let mut buffer = [99i32; 4];
        let mut reader = BsIoSliceReader::from_slice(&data);
        decode_subframe(&mut reader, &mut buffer, 16).unwrap();
        assert_eq!(buffer, [0, 0, -20, 19]);
    }

    #[test]
    fn indivisible_partitioning_rejected() {
        let mut w = BitWriter::endian(Vec::new(), BigEndian);
        put(&mut w, 1, 0);
        put(&mut w, 6, 8); // fixed, order 0
        put(&mut w, 1, 0);
        put(&mut w, 2, 0);
        put(&mut w, 4, 2); // four partitions over six samples
        let data = finish(w);

        let mut buffer = [0i32; 6];
        let mut reader = BsIoSliceReader::from_slice(&data);
        let err = decode_subframe(&mut reader, &mut buffer, 16).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SubframeError>(),
            Some(SubframeError::BlockSizeNotDivisibleByRicePartitions { .. })
        ));
    }

    #[test]
    fn reserved_residual_method_rejected() {
        let mut w = BitWriter::endian(Vec::new(), BigEndian);
        put(&mut w, 1, 0);
        put(&mut w, 6, 8);
        put(&mut w, 1, 0);
        put(&mut w, 2, 2); // reserved coding method
        let data = finish(w);

        let mut buffer = [0i32; 4];
        let mut reader = BsIoSliceReader::from_slice(&data);
        let err = decode_subframe(&mut reader, &mut buffer, 16).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SubframeError>(),
            Some(SubframeError::ReservedResidualCodingMethod(2))
        ));
    }
}
