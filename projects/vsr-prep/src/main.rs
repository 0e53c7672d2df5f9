mod checkpoint;
mod cli;
mod rename;
mod sync_check;
mod video;

use anyhow::Result;
use checkpoint::{adapt_checkpoint, AdaptOptions};
use cli::{Args, Commands};
use rename::rename_frames;
use sync_check::{check_all_pairs, SyncCheckConfig};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Load environment variables from .env if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse_args();

    match args.command {
        Commands::SyncCheck {
            hr_dir,
            lr_dir,
            output_dir,
            backend,
            jpeg_quality,
        } => {
            let report = check_all_pairs(&SyncCheckConfig {
                hr_dir,
                lr_dir,
                output_dir,
                backend,
                jpeg_quality,
            })?;
            tracing::info!(
                "Wrote {} comparison images, skipped {} samples and {} pairs",
                report.written_images(),
                report.skipped_samples(),
                report.skipped_pairs()
            );
        }
        Commands::RenameFrames { dir, dry_run } => {
            let summary = rename_frames(&dir, dry_run)?;
            tracing::info!(
                "Renamed {}, skipped {} (target exists), ignored {}{}",
                summary.renamed,
                summary.skipped,
                summary.ignored,
                if dry_run { " [dry run]" } else { "" }
            );
        }
        Commands::AdaptCheckpoint {
            input,
            output,
            exclude,
            params_key,
        } => {
            let options = AdaptOptions {
                exclude,
                params_key,
            };
            let summary = adapt_checkpoint(&input, &output, &options)?;
            if !summary.was_wrapped {
                tracing::info!(
                    "Input had no '{}' wrapper; all parameters were taken",
                    options.params_key
                );
            }
            if summary.dropped.is_empty() {
                tracing::warn!("No parameter matched the exclusion list; output equals input");
            }
        }
    }

    Ok(())
}
