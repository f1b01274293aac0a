use std::io::{self, BufWriter, Seek, SeekFrom, Write};

/// RIFF/WAVE writer for interleaved little-endian PCM.
///
/// Chunk sizes are patched in `finish`, so the target must be seekable.
pub struct WavWriter<W: Write + Seek> {
    writer: BufWriter<W>,
    riff_size_position: u64,
    data_size_position: u64,
    data_written: u64,
    sample_rate: u32,
    channels: u32,
    bits_per_sample: u32,
}

impl<W: Write + Seek> WavWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
            riff_size_position: 0,
            data_size_position: 0,
            data_written: 0,
            sample_rate: 44_100,
            channels: 2,
            bits_per_sample: 16,
        }
    }

    /// Configure audio format parameters
    pub fn configure_audio_format(
        &mut self,
        sample_rate: u32,
        channels: u32,
        bits_per_sample: u32,
    ) -> io::Result<()> {
        if self.data_written > 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "Cannot change format after writing data",
            ));
        }

        self.sample_rate = sample_rate;
        self.channels = channels;
        self.bits_per_sample = bits_per_sample;
        Ok(())
    }

    /// Write the RIFF/WAVE header
    pub fn write_header(&mut self) -> io::Result<()> {
        self.writer.write_all(b"RIFF")?;
        self.riff_size_position = self.writer.stream_position()?;
        self.writer.write_all(&0u32.to_le_bytes())?; // patched in finish
        self.writer.write_all(b"WAVE")?;

        self.writer.write_all(b"fmt ")?;
        self.writer.write_all(&16u32.to_le_bytes())?;
        self.writer.write_all(&1u16.to_le_bytes())?; // PCM
        self.writer
            .write_all(&(self.channels as u16).to_le_bytes())?;
        self.writer.write_all(&self.sample_rate.to_le_bytes())?;

        let byte_rate = self.sample_rate * self.channels * (self.bits_per_sample / 8);
        self.writer.write_all(&byte_rate.to_le_bytes())?;

        let block_align = self.channels * (self.bits_per_sample / 8);
        self.writer.write_all(&(block_align as u16).to_le_bytes())?;
        self.writer
            .write_all(&(self.bits_per_sample as u16).to_le_bytes())?;

        self.writer.write_all(b"data")?;
        self.data_size_position = self.writer.stream_position()?;
        self.writer.write_all(&0u32.to_le_bytes())?; // patched in finish

        Ok(())
    }

    /// Write pre-packed interleaved PCM bytes
    pub fn write_pcm(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.writer.write_all(bytes)?;
        self.data_written += bytes.len() as u64;
        Ok(())
    }

    /// Finish writing and patch the chunk sizes
    pub fn finish(&mut self) -> io::Result<()> {
        self.writer.flush()?;

        let end = self.writer.stream_position()?;

        self.writer.seek(SeekFrom::Start(self.riff_size_position))?;
        self.writer
            .write_all(&((end - 8) as u32).to_le_bytes())?;

        self.writer.seek(SeekFrom::Start(self.data_size_position))?;
        self.writer
            .write_all(&(self.data_written as u32).to_le_bytes())?;

        self.writer.seek(SeekFrom::Start(end))?;
        self.writer.flush()?;

        Ok(())
    }

    /// Get the underlying writer
    pub fn into_inner(self) -> io::Result<W> {
        self.writer.into_inner().map_err(|e| e.into_error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_wav_header_write() -> io::Result<()> {
        let mut writer = WavWriter::new(Cursor::new(Vec::new()));

        writer.configure_audio_format(48000, 2, 24)?;
        writer.write_header()?;
        writer.finish()?;

        let buffer = writer.into_inner()?.into_inner();

        assert_eq!(&buffer[0..4], b"RIFF");
        assert_eq!(&buffer[8..12], b"WAVE");
        assert_eq!(&buffer[12..16], b"fmt ");
        assert_eq!(&buffer[36..40], b"data");
        // Empty data chunk, RIFF size covers the remaining 36 bytes.
        assert_eq!(buffer[4..8], 36u32.to_le_bytes());
        assert_eq!(buffer[40..44], 0u32.to_le_bytes());

        // fmt fields: PCM, stereo, 48 kHz, 24-bit.
        assert_eq!(buffer[20..22], 1u16.to_le_bytes());
        assert_eq!(buffer[22..24], 2u16.to_le_bytes());
        assert_eq!(buffer[24..28], 48000u32.to_le_bytes());
        assert_eq!(buffer[34..36], 24u16.to_le_bytes());

        Ok(())
    }

    #[test]
    fn test_wav_data_sizes_patched() -> io::Result<()> {
        let mut writer = WavWriter::new(Cursor::new(Vec::new()));

        writer.configure_audio_format(8000, 1, 16)?;
        writer.write_header()?;
        writer.write_pcm(&[1, 2, 3, 4, 5, 6])?;
        writer.finish()?;

        let buffer = writer.into_inner()?.into_inner();

        assert_eq!(buffer.len(), 50);
        assert_eq!(buffer[4..8], 42u32.to_le_bytes());
        assert_eq!(buffer[40..44], 6u32.to_le_bytes());
        assert_eq!(&buffer[44..], &[1, 2, 3, 4, 5, 6]);

        Ok(())
    }
}
