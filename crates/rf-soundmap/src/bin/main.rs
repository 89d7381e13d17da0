//! soundmap: build the event → sound index from a soundbank dump
//!
//! Usage:
//!   soundmap <DUMP> <CONTAINERS> <METADATA> <OUTPUT> [--config sfx.toml] [--minify]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;

use rf_soundmap::{SoundMapConfig, SoundMapInputs, SoundMapPipeline};

#[derive(Parser)]
#[command(name = "soundmap", about = "Map soundbank events to the sounds they play")]
struct Cli {
    /// Soundbank object dump
    dump: PathBuf,

    /// Container info JSON (hashes, pack indices, offsets, lengths)
    containers: PathBuf,

    /// Event metadata JSON
    metadata: PathBuf,

    /// Where to write the index
    output: PathBuf,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Worker threads (0 = one per core)
    #[arg(short = 'j', long)]
    threads: Option<usize>,

    /// Maximum descent depth below an event
    #[arg(long)]
    max_depth: Option<usize>,

    /// Write the index without whitespace
    #[arg(long)]
    minify: bool,

    /// Record bank paths relative to this directory
    #[arg(long)]
    bank_root: Option<PathBuf>,

    /// Directory of loose <hash>.wem files
    #[arg(long)]
    loose_dir: Option<PathBuf>,

    /// Node table cache, read if present, written otherwise
    #[arg(long)]
    cache: Option<PathBuf>,
}

impl Cli {
    fn config(&self) -> Result<SoundMapConfig> {
        let mut config = match &self.config {
            Some(path) => SoundMapConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => SoundMapConfig::default(),
        };

        if let Some(threads) = self.threads {
            config = config.with_threads(threads);
        }
        if let Some(max_depth) = self.max_depth {
            config = config.with_max_depth(max_depth);
        }
        if self.minify {
            config = config.with_minify(true);
        }
        if let Some(root) = &self.bank_root {
            config = config.with_bank_root(root);
        }
        if let Some(dir) = &self.loose_dir {
            config = config.with_loose_dir(dir);
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = cli.config()?;
    let minify = config.minify;
    let pipeline = SoundMapPipeline::new(config).context("Invalid configuration")?;

    let inputs = SoundMapInputs {
        dump: cli.dump.clone(),
        containers: cli.containers.clone(),
        metadata: cli.metadata.clone(),
        cache: cli.cache.clone(),
    };
    let run = pipeline
        .run(&inputs)
        .with_context(|| format!("Failed to build index from {}", cli.dump.display()))?;

    run.write(&cli.output, minify)
        .with_context(|| format!("Failed to write {}", cli.output.display()))?;

    run.summary.log();
    println!("{}", run.summary);
    Ok(())
}
