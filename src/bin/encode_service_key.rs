//! Encodes a service-account key file for `FIREBASE_SERVICE_KEY`.
//!
//! # Usage
//!
//! ```bash
//! encode-service-key ./firebase-admin-key.json
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use clap::Parser;

#[derive(Parser)]
#[command(name = "encode-service-key")]
#[command(version, about = "Print a service-account JSON file as base64 for the env file")]
struct Cli {
    /// Path to the service-account JSON file
    path: PathBuf,

    /// Print only the encoded value
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let raw = std::fs::read_to_string(&cli.path).with_context(|| format!("reading {}", cli.path.display()))?;
    let encoded = encode(&raw).with_context(|| format!("{} is not valid JSON", cli.path.display()))?;

    if cli.quiet {
        println!("{encoded}");
    } else {
        println!("\nCopy this value into FIREBASE_SERVICE_KEY in your .env file:\n");
        println!("{encoded}\n");
    }
    Ok(())
}

/// Re-serializes compactly, then base64-encodes.
fn encode(raw: &str) -> Result<String, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(raw)?;
    Ok(STANDARD.encode(serde_json::to_string(&value)?))
}
