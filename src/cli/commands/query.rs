//! Query command: top-k retrieval from the command line.

use anyhow::{Context, Result};

use super::cache_from_settings;
use crate::config::Settings;
use crate::retrieve::RetrievalService;
use crate::utils::preview;

const PREVIEW_CHARS: usize = 160;

pub fn run(config: &Settings, text: &str, k: Option<usize>, json: bool) -> Result<()> {
    let cache = cache_from_settings(config)?;
    let handle = cache.open().context("Failed to open index")?;
    if handle.is_degraded() {
        eprintln!("Warning: serving a stale index ({})", handle.status());
    }

    let service = RetrievalService::new(handle, cache.embedder().clone());
    let k = k.unwrap_or(config.retrieval.default_k);
    let hits = service.query(text, k)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }

    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (rank, hit) in hits.iter().enumerate() {
        let title = hit.meta.title();
        println!(
            "{}. [{:.3}] {} ({}){}",
            rank + 1,
            hit.score,
            hit.source_id,
            hit.kind,
            if title.is_empty() {
                String::new()
            } else {
                format!(" {title}")
            }
        );
        let snippet = preview(&hit.content, PREVIEW_CHARS).replace('\n', " ");
        println!("   {snippet}");
    }
    Ok(())
}
