//! Status command: freshness of the on-disk index.

use anyhow::Result;
use serde::Serialize;

use super::cache_from_settings;
use crate::config::Settings;
use crate::indexing::Freshness;
use crate::storage::ManifestStore;

#[derive(Serialize)]
struct StatusReport {
    location: String,
    state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    build_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    built_at: Option<String>,
    /// Digest of the fingerprint the manifest vouches for.
    #[serde(skip_serializing_if = "Option::is_none")]
    fingerprint: Option<String>,
    files: usize,
    locked: bool,
}

pub fn run(config: &Settings, json: bool) -> Result<()> {
    let cache = cache_from_settings(config)?;
    let location = cache.location();
    let manifest = ManifestStore::new(location).load();

    let (state, reason) = match cache.freshness() {
        Freshness::Fresh => ("fresh", None),
        Freshness::Missing => ("missing", None),
        Freshness::Stale(reason) => ("stale", Some(reason.to_string())),
    };

    let report = StatusReport {
        location: location.root().display().to_string(),
        state,
        reason,
        build_id: manifest.as_ref().map(|m| m.build_id.clone()),
        built_at: manifest.as_ref().and_then(|m| {
            chrono::DateTime::from_timestamp(m.built_at as i64, 0).map(|t| t.to_rfc3339())
        }),
        fingerprint: manifest.as_ref().map(|m| m.fingerprint.digest()),
        files: manifest.as_ref().map_or(0, |m| m.fingerprint.files.len()),
        locked: location.lock_path().exists(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Index:     {}", report.location);
    match &report.reason {
        Some(reason) => println!("State:     {} ({reason})", report.state),
        None => println!("State:     {}", report.state),
    }
    if let Some(build_id) = &report.build_id {
        println!("Build:     {build_id}");
    }
    if let Some(built_at) = &report.built_at {
        println!("Built at:  {built_at}");
    }
    if let Some(fingerprint) = &report.fingerprint {
        println!("Digest:    {fingerprint}");
    }
    println!("Sources:   {}", report.files);
    if report.locked {
        println!("A build lock is present.");
    }
    Ok(())
}
