//! Index command: build when missing or stale, or rebuild on request.

use anyhow::{Context, Result};
use std::time::Instant;

use super::cache_from_settings;
use crate::config::Settings;
use crate::indexing::{BuildProgress, IndexStatus};

fn report(progress: BuildProgress) {
    match progress {
        BuildProgress::Chunked { documents, chunks } => {
            eprintln!("Chunked {documents} documents into {chunks} chunks");
        }
        BuildProgress::Embedding { current, total } => {
            eprintln!("Embedded {current}/{total} chunks");
        }
    }
}

pub fn run(config: &Settings, force: bool) -> Result<()> {
    let cache = cache_from_settings(config)?;
    let start = Instant::now();

    let handle = if force {
        eprintln!("Rebuilding index at {}", cache.location().root().display());
        cache
            .force_rebuild_with_progress(report)
            .context("Forced rebuild failed")?
    } else {
        cache
            .open_with_progress(report)
            .context("Failed to open index")?
    };

    let index = handle.index();
    match handle.status() {
        IndexStatus::Fresh => println!("Index is up to date."),
        IndexStatus::Rebuilt => {
            let elapsed = start.elapsed().as_secs_f64();
            println!("Indexed {} chunks in {elapsed:.1}s.", index.len());
        }
        IndexStatus::Degraded { reason } => {
            eprintln!("Warning: rebuild failed, previous index kept: {reason}");
        }
    }
    println!("  Build:     {}", index.build_id());
    println!("  Model:     {} ({} dims)", index.model_name(), index.dimension());
    println!("  Chunks:    {}", index.len());
    println!("  Location:  {}", cache.location().root().display());

    if handle.is_degraded() {
        std::process::exit(2);
    }
    Ok(())
}
