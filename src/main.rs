use anyhow::{Context, Result};
use aspect_sampler::logging::init_logging;
use aspect_sampler::{
    BucketIndex, BucketSampler, FsMaterializer, InMemoryBucketIndex, SamplerConfig, SamplerEvent,
};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "aspect-sampler")]
#[command(about = "Aspect-ratio bucket sampler for fixed-size training batches", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Emit logs as JSON
    #[arg(long, global = true, env = "ASPECT_SAMPLER_JSON_LOGS")]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pull batches from a dataset and report what was drawn
    Run {
        /// Bucket index manifest (JSON or YAML)
        #[arg(short, long)]
        manifest: PathBuf,

        /// Sampler configuration file
        #[arg(short, long)]
        config: PathBuf,

        /// Stop after this many batches; defaults to one epoch
        #[arg(short, long)]
        batches: Option<usize>,

        /// Checkpoint file written when the run ends
        #[arg(long)]
        checkpoint: Option<PathBuf>,

        /// Restore from `--checkpoint` before pulling
        #[arg(long, requires = "checkpoint")]
        resume: bool,

        /// Sidecar caption extension, e.g. `txt`
        #[arg(long)]
        caption_extension: Option<String>,
    },

    /// Show dataset overview, bucket sizes and checkpointed progress
    Inspect {
        /// Bucket index manifest (JSON or YAML)
        #[arg(short, long)]
        manifest: PathBuf,

        /// Sampler configuration file
        #[arg(short, long)]
        config: PathBuf,

        /// Checkpoint to summarise against the manifest
        #[arg(long)]
        checkpoint: Option<PathBuf>,
    },

    /// Validate a sampler configuration file
    Validate {
        /// Configuration file to validate
        #[arg(short, long)]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet, cli.json_logs)?;

    match cli.command {
        Commands::Run {
            manifest,
            config,
            batches,
            checkpoint,
            resume,
            caption_extension,
        } => {
            run(
                &manifest,
                &config,
                batches,
                checkpoint.as_deref(),
                resume,
                caption_extension,
            )
            .await?;
        }

        Commands::Inspect {
            manifest,
            config,
            checkpoint,
        } => {
            inspect(&manifest, &config, checkpoint.as_deref())?;
        }

        Commands::Validate { file } => {
            validate_config(&file)?;
        }
    }

    Ok(())
}

fn load_sampler(
    manifest: &Path,
    config_path: &Path,
    caption_extension: Option<String>,
) -> Result<BucketSampler> {
    let config = SamplerConfig::from_file(config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;
    let index = InMemoryBucketIndex::from_manifest_file(manifest)
        .with_context(|| format!("Failed to load manifest from {}", manifest.display()))?;

    let mut materializer = FsMaterializer::new(index.id());
    if let Some(root) = index.instance_root() {
        materializer = materializer.with_root(root);
    }
    if let Some(extension) = caption_extension {
        materializer = materializer.with_caption_extension(extension);
    }

    BucketSampler::new(config, Arc::new(index), Arc::new(materializer))
        .context("Failed to create sampler")
}

async fn run(
    manifest: &Path,
    config_path: &Path,
    batches: Option<usize>,
    checkpoint: Option<&Path>,
    resume: bool,
    caption_extension: Option<String>,
) -> Result<()> {
    let mut sampler = load_sampler(manifest, config_path, caption_extension)?;
    info!("Dataset overview:\n{}", sampler.overview());

    let address = checkpoint.map(|path| path.to_string_lossy().into_owned());
    if resume {
        if let Some(address) = &address {
            if Path::new(address).exists() {
                sampler
                    .restore(address)
                    .with_context(|| format!("Failed to restore from {}", address))?;
            } else {
                warn!("No checkpoint at {}; starting fresh", address);
            }
        }
    }

    let limit = batches.unwrap_or_else(|| sampler.len());
    let mut pulled = 0;
    while pulled < limit {
        match sampler.next_batch().await? {
            SamplerEvent::Batch(batch) => {
                pulled += 1;
                println!(
                    "epoch {} batch {} bucket {}: {} samples ({} backfilled)",
                    batch.epoch,
                    pulled,
                    batch.bucket,
                    batch.len(),
                    batch.backfilled()
                );
            }
            SamplerEvent::DatasetExhausted { sampler_id, epoch } => {
                info!("Dataset '{}' exhausted; now on epoch {}", sampler_id, epoch);
                if batches.is_none() {
                    break;
                }
            }
        }
    }

    sampler.log_state();
    if let Some(address) = &address {
        sampler
            .save(address)
            .with_context(|| format!("Failed to save checkpoint to {}", address))?;
    }
    Ok(())
}

fn inspect(manifest: &Path, config_path: &Path, checkpoint: Option<&Path>) -> Result<()> {
    let mut sampler = load_sampler(manifest, config_path, None)?;
    println!("{}", sampler.overview());
    println!("- Estimated batches per epoch: {}", sampler.len());

    match checkpoint {
        Some(path) => {
            let address = path.to_string_lossy();
            sampler
                .restore(&address)
                .with_context(|| format!("Failed to restore from {}", address))?;
            println!();
            println!("{}", sampler.statistics());
        }
        None => {
            println!();
            for bucket in sampler.statistics().active_buckets {
                println!("  {}", bucket);
            }
        }
    }
    Ok(())
}

fn validate_config(config_path: &Path) -> Result<()> {
    info!("Validating configuration file: {}", config_path.display());

    let config = SamplerConfig::from_file(config_path)
        .context("Failed to load configuration file")?;

    info!("Configuration is valid");
    info!("  - Dataset: {}", config.id);
    info!("  - Batch size: {}", config.batch_size);
    info!("  - Output mode: {:?}", config.output_mode);
    if let Some(conditioning) = config.conditioning()? {
        info!("  - Conditioning: {}", conditioning);
    }
    Ok(())
}
