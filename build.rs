use anyhow::Result;
use chrono::TimeZone;
use std::env;
use std::fs;

fn main() -> Result<()> {
    // Reproducible build timestamp: honor SOURCE_DATE_EPOCH when set.
    let now = match env::var("SOURCE_DATE_EPOCH") {
        Ok(val) => chrono::Utc
            .timestamp_opt(val.parse::<i64>()?, 0)
            .single()
            .unwrap_or_else(chrono::Utc::now),
        Err(_) => chrono::Utc::now(),
    };

    println!(
        "cargo:rustc-env=BUILD_TIMESTAMP={}",
        now.format("%Y-%m-%d %H:%M:%S UTC")
    );

    // Surface the decoder library version in `--version` output.
    let flac_version =
        read_flac_version().unwrap_or_else(|_| "unknown".to_string());
    println!("cargo:rustc-env=FLAC_VERSION={flac_version}");

    println!("cargo:rerun-if-changed=flac/Cargo.toml");

    Ok(())
}

fn read_flac_version() -> Result<String> {
    let toml_content = fs::read_to_string("flac/Cargo.toml")?;

    for line in toml_content.lines() {
        let line = line.trim();
        if line.starts_with("version") && line.contains('=') {
            if let Some(equals_pos) = line.find('=') {
                let version = line[equals_pos + 1..].trim().trim_matches('"');
                return Ok(version.to_string());
            }
        }
    }

    anyhow::bail!("could not find version in flac/Cargo.toml");
}
