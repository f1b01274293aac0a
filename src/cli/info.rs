use anyhow::{Result, bail};

use flac::process::decode::{Decoder, HeaderStatus};
use flac::structs::metadata::MetadataType;

use super::command::InfoArgs;
use crate::input::InputReader;

const CHUNK_SIZE: usize = 64 * 1024;

/// Kinds with a configurable retention limit; `info` retains everything so
/// the inventory is complete.
const INVENTORY_KINDS: [MetadataType; 7] = [
    MetadataType::Padding,
    MetadataType::Application,
    MetadataType::SeekTable,
    MetadataType::VorbisComment,
    MetadataType::CueSheet,
    MetadataType::Picture,
    MetadataType::Unknown(127),
];

pub fn cmd_info(args: &InfoArgs) -> Result<()> {
    log::info!("Analyzing FLAC stream: {}", args.input.display());

    let mut input_reader = InputReader::new(&args.input)?;
    let mut decoder = Decoder::default();

    for kind in INVENTORY_KINDS {
        decoder.set_max_metadata_size(kind, u32::MAX);
    }

    let mut buf: Vec<u8> = Vec::new();
    let mut chunk = vec![0u8; CHUNK_SIZE];

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

    let info = decoder.stream_info().unwrap();

    println!();
    println!("FLAC Stream Information");
    println!("=======================");
    println!();
    println!("  Sample rate               {} Hz", info.sample_rate);
    println!("  Channels                  {}", info.channels);
    println!("  Bits per sample           {}", info.sample_depth);
    println!(
        "  Block size                {}..{} samples",
        info.min_block_size, info.max_block_size
    );

    if info.total_samples > 0 {
        let duration = info.total_samples as f64 / f64::from(info.sample_rate);
        println!("  Total samples             {}", info.total_samples);
        println!("  Duration                  {}", time_str(duration));
    } else {
        println!("  Total samples             unknown");
    }

    let md5 = info
        .md5_signature
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<String>();
    println!("  MD5 signature             {md5}");
    println!();

    println!("Metadata Blocks");
    println!("  STREAMINFO                34 bytes");
    for block in decoder.metadata_blocks() {
        println!(
            "  {:<25} {} bytes",
            format!("{:?}", block.kind).to_uppercase(),
            block.length
        );
    }
    println!();

    Ok(())
}

fn time_str(seconds: f64) -> String {
    let total = seconds as u64;
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    let frac = ((seconds - total as f64) * 1000.0) as u64;
    format!("{h}:{m:02}:{s:02}.{frac:03}")
}
