use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{info, warn};

use flac::process::decode::{Decoder, FrameStatus, HeaderStatus};
use flac::utils::errors::FrameError;

use super::command::{AudioFormat, DecodeArgs};
use crate::input::InputReader;
use crate::wav::WavWriter;

const CHUNK_SIZE: usize = 64 * 1024;

enum AudioWriter {
    Wav(WavWriter<File>),
    Pcm(BufWriter<File>),
}

impl AudioWriter {
    fn create(path: PathBuf, format: AudioFormat, decoder: &Decoder) -> Result<Self> {
        let file = File::create(&path)
            .with_context(|| format!("creating output file {}", path.display()))?;

        match format {
            AudioFormat::Wav => {
                let info = decoder.stream_info().unwrap();
                let mut wav = WavWriter::new(file);
                wav.configure_audio_format(
                    info.sample_rate,
                    u32::from(info.channels),
                    decoder.output_bytes_per_sample() as u32 * 8,
                )?;
                wav.write_header()?;
                Ok(AudioWriter::Wav(wav))
            }
            AudioFormat::Pcm => Ok(AudioWriter::Pcm(BufWriter::new(file))),
        }
    }

    fn write_pcm(&mut self, bytes: &[u8]) -> Result<()> {
        match self {
            AudioWriter::Wav(wav) => wav.write_pcm(bytes)?,
            AudioWriter::Pcm(pcm) => pcm.write_all(bytes)?,
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        match self {
            AudioWriter::Wav(wav) => wav.finish()?,
            AudioWriter::Pcm(pcm) => pcm.flush()?,
        }
        Ok(())
    }
}

pub fn cmd_decode(args: &DecodeArgs, multi: Option<&MultiProgress>) -> Result<()> {
    info!("Decoding FLAC stream: {}", args.input.display());

    let mut input_reader = InputReader::new(&args.input)?;
    let mut decoder = Decoder::default();

    if args.no_crc_check {
        decoder.set_crc_check_enabled(false);
    }
    if args.bits32 {
        decoder.set_output_32bit_samples(true);
    }

    let mut buf: Vec<u8> = Vec::new();
    let mut chunk = vec![0u8; CHUNK_SIZE];

    // Header phase: feed until the metadata section completes.
    loop {
        let status = decoder.read_header(&buf)?;
        buf.drain(..decoder.bytes_consumed());

        match status {
            HeaderStatus::Done => break,
            HeaderStatus::NeedMoreData => {
                let n = input_reader.read_chunk(&mut chunk)?;
                if n == 0 {
                    bail!("input ended before the FLAC header completed");
                }
                buf.extend_from_slice(&chunk[..n]);
            }
        }
    }

    let stream_info = decoder.stream_info().unwrap().clone();
    info!(
        "{} Hz, {} channel(s), {} bit, {} total samples",
        stream_info.sample_rate,
        stream_info.channels,
        stream_info.sample_depth,
        stream_info.total_samples
    );

    let path = output_path(args);
    let mut writer = AudioWriter::create(path, args.format, &decoder)?;

    let pb = multi.map(|multi| {
        let pb = if stream_info.total_samples > 0 {
            let pb = multi.add(ProgressBar::new(stream_info.total_samples));
            pb.set_style(
                ProgressStyle::with_template(
                    "{bar:40.green} {pos}/{len} samples ({percent}%)",
                )
                .unwrap(),
            );
            pb
        } else {
            multi.add(ProgressBar::new_spinner())
        };
        pb.set_message("Decoding...");
        pb
    });

    let mut pcm = vec![0u8; decoder.output_buffer_size_bytes()];
    let bytes_per_sample = decoder.output_bytes_per_sample();
    let channels = usize::from(stream_info.channels);

    let mut eof = false;
    let mut frames = 0usize;
    let mut samples = 0u64;

    loop {
        match decoder.decode_frame(&buf, &mut pcm) {
            Ok(FrameStatus::Frame { samples_per_channel }) => {
                writer.write_pcm(&pcm[..samples_per_channel * channels * bytes_per_sample])?;
                buf.drain(..decoder.bytes_consumed());

                frames += 1;
                samples += samples_per_channel as u64;
                if let Some(pb) = &pb {
                    pb.set_position(samples);
                }
            }
            Ok(FrameStatus::EndOfStream) => {
                if eof {
                    break;
                }
                refill(&mut input_reader, &mut buf, &mut chunk, &mut eof)?;
            }
            Err(e) => match e.downcast_ref::<FrameError>() {
                // Both leave zero bytes consumed, so a refill and retry
                // resumes at the same frame boundary.
                Some(FrameError::OutOfData | FrameError::SyncNotFound) if !eof => {
                    refill(&mut input_reader, &mut buf, &mut chunk, &mut eof)?;
                }
                Some(FrameError::SyncNotFound) if eof => {
                    warn!("{} trailing byte(s) after the last frame", buf.len());
                    break;
                }
                _ => return Err(e).with_context(|| format!("decoding frame {frames}")),
            },
        }
    }

    writer.finish()?;

    if let Some(pb) = &pb {
        pb.finish_and_clear();
    }

    let duration = samples as f64 / f64::from(stream_info.sample_rate);
    info!("Decoded {frames} frames, {samples} samples ({duration:.2} s)");

    Ok(())
}

fn refill(
    input_reader: &mut InputReader,
    buf: &mut Vec<u8>,
    chunk: &mut [u8],
    eof: &mut bool,
) -> Result<()> {
    let n = input_reader.read_chunk(chunk)?;
    if n == 0 {
        *eof = true;
        if !buf.is_empty() {
            bail!("stream truncated in the middle of a frame");
        }
    } else {
        buf.extend_from_slice(&chunk[..n]);
    }
    Ok(())
}

fn output_path(args: &DecodeArgs) -> PathBuf {
    if let Some(path) = &args.output_path {
        return path.clone();
    }

    let extension = match args.format {
        AudioFormat::Wav => "wav",
        AudioFormat::Pcm => "pcm",
    };

    if args.input.as_os_str() == "-" {
        return PathBuf::from(format!("out.{extension}"));
    }

    let mut path = args.input.clone();
    path.set_extension(extension);
    path
}
