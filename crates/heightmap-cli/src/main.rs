//! Command-line driver for the six-stage heightmap generation pipeline.
//!
//! Loads a base config from TOML (if given), applies CLI overrides, runs
//! `heightmap_core::generate`, and writes the resulting heightfield as a
//! raw row-major float32 buffer alongside a JSON stats report.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use heightmap_core::GenerateParams;

#[derive(Parser, Debug)]
#[command(name = "heightmap-cli", about = "Generate a Cities: Skylines 2 heightmap")]
struct Args {
    /// Base TOML config; CLI flags below override individual fields.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output path for the raw float32 heightfield buffer.
    #[arg(short, long, default_value = "heightmap.f32")]
    output: PathBuf,

    /// Output path for the JSON stats report; "-" prints to stdout.
    #[arg(long, default_value = "-")]
    stats_output: String,

    #[arg(long)]
    resolution: Option<usize>,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(long)]
    target_buildable: Option<f32>,

    #[arg(long)]
    no_erosion: bool,

    #[arg(long)]
    no_verification: bool,

    #[arg(long)]
    ridges: bool,

    #[arg(long)]
    detail: bool,

    #[arg(long)]
    threads: Option<usize>,
}

fn load_params(args: &Args) -> Result<GenerateParams> {
    let mut params = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            toml::from_str(&text).with_context(|| format!("parsing config file {}", path.display()))?
        }
        None => GenerateParams::default(),
    };

    if let Some(resolution) = args.resolution {
        params.resolution = resolution;
    }
    if let Some(seed) = args.seed {
        params.seed = seed;
    }
    if let Some(target_buildable) = args.target_buildable {
        params.target_buildable = target_buildable;
    }
    if args.no_erosion {
        params.apply_erosion = false;
    }
    if args.no_verification {
        params.apply_verification = false;
    }
    if args.ridges {
        params.apply_ridges = true;
    }
    if args.detail {
        params.apply_detail = true;
    }
    if args.threads.is_some() {
        params.thread_count = args.threads;
    }

    Ok(params)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let params = load_params(&args)?;

    let (heightfield, stats) =
        heightmap_core::generate(&params).context("heightmap generation failed")?;

    let mut file = fs::File::create(&args.output)
        .with_context(|| format!("creating output file {}", args.output.display()))?;
    for value in &heightfield.data {
        file.write_all(&value.to_le_bytes())?;
    }

    let report = serde_json::to_string_pretty(&stats)?;
    if args.stats_output == "-" {
        println!("{report}");
    } else {
        fs::write(&args.stats_output, report)
            .with_context(|| format!("writing stats to {}", args.stats_output))?;
    }

    Ok(())
}
