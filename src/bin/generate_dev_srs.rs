//! Generate a development SRS file (NOT FOR PRODUCTION)

use anyhow::{Context, Result};
use std::path::PathBuf;
use tinykzg::Srs;
use tracing::info;

const DEFAULT_SIZE: usize = 1 << 14;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()))
        .with_target(false)
        .compact()
        .init();

    let args: Vec<String> = std::env::args().collect();

    // --size 4096 or --size=4096
    let size = if let Some(pos) = args.iter().position(|s| s == "--size") {
        args.get(pos + 1)
            .context("--size needs a value")?
            .parse()
            .context("--size must be a number")?
    } else if let Some(arg) = args.iter().find(|s| s.starts_with("--size=")) {
        arg.trim_start_matches("--size=")
            .parse()
            .context("--size must be a number")?
    } else {
        DEFAULT_SIZE
    };

    let output = args
        .iter()
        .position(|s| s == "--output")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("srs.bin"));

    println!("WARNING: generating a DEVELOPMENT SRS (fixed public seed).");
    println!("Anyone can forge proofs against it. Never deploy it.");

    let srs = Srs::new_dev(size)?;
    srs.save(&output)
        .with_context(|| format!("writing {}", output.display()))?;

    info!(size = srs.len(), path = %output.display(), "saved development SRS");
    println!("G1 digest: {}", hex::encode(srs.g1_digest()));
    println!("G2 digest: {}", hex::encode(srs.g2_digest()));
    Ok(())
}
