//! Bitstream I/O utilities for FLAC parsing.
//!
//! Wraps a big-endian [`bitstream_io::BitReader`] over a byte slice and adds
//! the operations the decoder needs: unsigned/signed reads of 1..=32 bits
//! (plus the 33-bit reads required by side channels at 32-bit depth),
//! Rice-coded signed integers, byte alignment, and CRC computation over a
//! byte span of the underlying buffer.

use std::io;
use std::io::SeekFrom;

use bitstream_io::{BigEndian, BitRead, BitReader, SignedInteger, UnsignedInteger};

use crate::utils::crc::{Crc8, Crc16};

const SPAN_BUF_SIZE: usize = 256;

#[derive(Debug)]
pub struct BitstreamIoReader<R: io::Read + io::Seek> {
    bs: BitReader<R, BigEndian>,
    len: u64,
}

pub type BsIoSliceReader<'a> = BitstreamIoReader<io::Cursor<&'a [u8]>>;

impl<R> BitstreamIoReader<R>
where
    R: io::Read + io::Seek,
{
    pub fn new(read: R, len_bytes: u64) -> Self {
        Self {
            bs: BitReader::new(read),
            len: len_bytes << 3,
        }
    }

    #[inline(always)]
    pub fn get(&mut self) -> io::Result<bool> {
        self.bs.read_bit()
    }

    #[inline(always)]
    pub fn get_n<I: UnsignedInteger>(&mut self, n: u32) -> io::Result<I> {
        self.bs.read_unsigned_var(n)
    }

    #[inline(always)]
    pub fn get_s<S: SignedInteger>(&mut self, n: u32) -> io::Result<S> {
        self.bs.read_signed_var(n)
    }

    /// Signed read widened through `i64`, for widths up to 33 bits.
    ///
    /// A side-channel subframe at 32-bit depth carries 33-bit samples; the
    /// decoder truncates the result into its 32-bit workspace.
    #[inline(always)]
    pub fn get_s64(&mut self, n: u32) -> io::Result<i64> {
        self.bs.read_signed_var(n)
    }

    /// Counts zero bits up to and including the terminating one bit.
    #[inline(always)]
    pub fn get_unary(&mut self) -> io::Result<u32> {
        self.bs.read_unary::<1>()
    }

    /// Reads one Rice-coded signed integer with the given parameter.
    ///
    /// Unary quotient, `param` binary bits, then zigzag unfolding. The
    /// quotient scan runs on whole bit-buffer words inside `bitstream_io`,
    /// not bit by bit.
    #[inline(always)]
    pub fn get_rice(&mut self, param: u32) -> io::Result<i32> {
        let quotient = self.get_unary()?;
        let remainder: u32 = if param > 0 { self.get_n(param)? } else { 0 };

        let value = quotient.wrapping_shl(param) | remainder;
        Ok(((value >> 1) as i32) ^ -((value & 1) as i32))
    }

    #[inline(always)]
    pub fn get_bytes(&mut self, buf: &mut [u8]) -> io::Result<()> {
        self.bs.read_bytes(buf)
    }

    /// Reads one byte; the cursor must sit on a byte boundary.
    #[inline(always)]
    pub fn get_aligned_byte(&mut self) -> io::Result<u8> {
        debug_assert!(self.position().is_ok_and(|pos| pos & 7 == 0));

        self.bs.read_var(8)
    }

    /// Discards up to 7 bits so the cursor lands on a byte boundary.
    #[inline(always)]
    pub fn align_to_byte(&mut self) {
        self.bs.byte_align();
    }

    #[inline(always)]
    pub fn available(&mut self) -> io::Result<u64> {
        self.bs.position_in_bits().map(|pos| self.len - pos)
    }

    #[inline(always)]
    pub fn position(&mut self) -> io::Result<u64> {
        self.bs.position_in_bits()
    }

    /// Byte offset of the cursor within the underlying buffer, rounded down.
    #[inline(always)]
    pub fn byte_position(&mut self) -> io::Result<u64> {
        self.bs.position_in_bits().map(|pos| pos >> 3)
    }

    /// CRC-8 over the byte span `[start, end)` of the underlying buffer.
    /// The cursor is restored afterwards.
    pub fn crc8_span(&mut self, crc: &Crc8, start: u64, end: u64) -> io::Result<u8> {
        let position = self.position()?;

        if start > end || end << 3 > self.len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "crc8_span: out of bounds bytes",
            ));
        }

        self.bs.seek_bits(SeekFrom::Start(start << 3))?;

        let mut checksum = crc.init;
        let mut remaining = (end - start) as usize;
        let mut buf = [0u8; SPAN_BUF_SIZE];

        while remaining > 0 {
            let take = remaining.min(SPAN_BUF_SIZE);
            self.bs.read_bytes(&mut buf[..take])?;
            checksum = crc.update(checksum, &buf[..take]);
            remaining -= take;
        }

        self.bs.seek_bits(SeekFrom::Start(position))?;

        Ok(checksum)
    }

    /// CRC-16 over the byte span `[start, end)` of the underlying buffer.
    /// The cursor is restored afterwards.
    pub fn crc16_span(&mut self, crc: &Crc16, start: u64, end: u64) -> io::Result<u16> {
        let position = self.position()?;

        if start > end || end << 3 > self.len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "crc16_span: out of bounds bytes",
            ));
        }

        self.bs.seek_bits(SeekFrom::Start(start << 3))?;

        let mut checksum = crc.init;
        let mut remaining = (end - start) as usize;
        let mut buf = [0u8; SPAN_BUF_SIZE];

        while remaining > 0 {
            let take = remaining.min(SPAN_BUF_SIZE);
            self.bs.read_bytes(&mut buf[..take])?;
            checksum = crc.update(checksum, &buf[..take]);
            remaining -= take;
        }

        self.bs.seek_bits(SeekFrom::Start(position))?;

        Ok(checksum)
    }
}

impl<'a> BsIoSliceReader<'a> {
    pub fn from_slice(buf: &'a [u8]) -> Self {
        let len = buf.len() as u64;
        let read = io::Cursor::new(buf);

        Self::new(read, len)
    }
}

impl Default for BsIoSliceReader<'_> {
    fn default() -> Self {
        Self::from_slice(&[])
    }
}
