//! Corpus fingerprints and the persisted manifest.
//!
//! The manifest is the freshness oracle: an index is valid only while the
//! fingerprint recomputed from the current inputs equals the one saved with
//! the last successful build.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use super::atomic::write_atomic;
use super::error::IndexResult;
use super::location::IndexLocation;
use crate::documents::{ChunkingConfig, ChunkingStrategy, SourceError};

/// Current manifest schema version.
pub const MANIFEST_VERSION: u32 = 1;

/// Block size used when hashing source files.
const HASH_BLOCK_SIZE: usize = 64 * 1024;

/// Everything a built index depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub model_name: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    #[serde(default)]
    pub strategy: ChunkingStrategy,
    /// Source path -> hex SHA-256 of its contents.
    pub files: BTreeMap<String, String>,
}

/// Compute the fingerprint for a set of source files and build settings.
pub fn compute_fingerprint(
    files: &[PathBuf],
    model_name: &str,
    chunking: &ChunkingConfig,
) -> Result<Fingerprint, SourceError> {
    let mut hashes = BTreeMap::new();
    for path in files {
        hashes.insert(path.to_string_lossy().into_owned(), hash_file(path)?);
    }

    Ok(Fingerprint {
        model_name: model_name.to_string(),
        chunk_size: chunking.chunk_size,
        chunk_overlap: chunking.chunk_overlap,
        strategy: chunking.strategy,
        files: hashes,
    })
}

/// Hex SHA-256 of a file, read in fixed-size blocks.
pub fn hash_file(path: &Path) -> Result<String, SourceError> {
    let unavailable = |e| SourceError::Unavailable {
        path: path.to_path_buf(),
        source: e,
    };

    let mut file = File::open(path).map_err(unavailable)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HASH_BLOCK_SIZE];

    loop {
        let n = file.read(&mut buffer).map_err(unavailable)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

impl Fingerprint {
    /// Single hex digest over all fields.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.model_name.as_bytes());
        hasher.update([0]);
        hasher.update((self.chunk_size as u64).to_le_bytes());
        hasher.update((self.chunk_overlap as u64).to_le_bytes());
        hasher.update(self.strategy.as_str().as_bytes());
        hasher.update([0]);
        for (path, hash) in &self.files {
            hasher.update(path.as_bytes());
            hasher.update([0]);
            hasher.update(hash.as_bytes());
            hasher.update([0]);
        }
        format!("{:x}", hasher.finalize())
    }

    /// What changed going from `previous` to `self`.
    pub fn diff(&self, previous: &Fingerprint) -> FingerprintDiff {
        let mut diff = FingerprintDiff::default();

        if self.model_name != previous.model_name {
            diff.settings.push(format!(
                "model {} -> {}",
                previous.model_name, self.model_name
            ));
        }
        if self.chunk_size != previous.chunk_size {
            diff.settings.push(format!(
                "chunk_size {} -> {}",
                previous.chunk_size, self.chunk_size
            ));
        }
        if self.chunk_overlap != previous.chunk_overlap {
            diff.settings.push(format!(
                "chunk_overlap {} -> {}",
                previous.chunk_overlap, self.chunk_overlap
            ));
        }
        if self.strategy != previous.strategy {
            diff.settings.push(format!(
                "strategy {} -> {}",
                previous.strategy.as_str(),
                self.strategy.as_str()
            ));
        }

        for (path, hash) in &self.files {
            match previous.files.get(path) {
                None => diff.added.push(path.clone()),
                Some(old) if old != hash => diff.modified.push(path.clone()),
                Some(_) => {}
            }
        }
        diff.removed = previous
            .files
            .keys()
            .filter(|path| !self.files.contains_key(*path))
            .cloned()
            .collect();

        diff
    }
}

/// Differences between two fingerprints, for logs and status output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FingerprintDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub modified: Vec<String>,
    /// Human-readable build setting changes.
    pub settings: Vec<String>,
}

impl FingerprintDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.modified.is_empty()
            && self.settings.is_empty()
    }
}

impl fmt::Display for FingerprintDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if !self.modified.is_empty() {
            parts.push(format!("{} modified", self.modified.len()));
        }
        if !self.added.is_empty() {
            parts.push(format!("{} added", self.added.len()));
        }
        if !self.removed.is_empty() {
            parts.push(format!("{} removed", self.removed.len()));
        }
        parts.extend(self.settings.iter().cloned());

        if parts.is_empty() {
            f.write_str("no changes")
        } else {
            f.write_str(&parts.join(", "))
        }
    }
}

/// Persisted record of the last successful build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    #[serde(flatten)]
    pub fingerprint: Fingerprint,
    /// Build id embedded in the artifacts this manifest vouches for.
    pub build_id: String,
    /// UTC seconds.
    pub built_at: u64,
}

impl Manifest {
    pub fn new(fingerprint: Fingerprint, build_id: impl Into<String>) -> Self {
        Self {
            version: MANIFEST_VERSION,
            fingerprint,
            build_id: build_id.into(),
            built_at: crate::utils::get_utc_timestamp(),
        }
    }
}

/// Reads and writes `manifest.json` for one index location.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    path: PathBuf,
}

impl ManifestStore {
    pub fn new(location: &IndexLocation) -> Self {
        Self {
            path: location.manifest_path(),
        }
    }

    /// Read the saved manifest.
    ///
    /// Missing, unreadable or unparsable manifests all read as `None`.
    pub fn load(&self) -> Option<Manifest> {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(target: "manifest", "no manifest at {}", self.path.display());
                return None;
            }
            Err(e) => {
                tracing::warn!(target: "manifest", "cannot read {}: {e}", self.path.display());
                return None;
            }
        };

        match serde_json::from_slice::<Manifest>(&data) {
            Ok(manifest) => Some(manifest),
            Err(e) => {
                tracing::warn!(
                    target: "manifest",
                    "ignoring corrupt manifest {}: {e}",
                    self.path.display()
                );
                None
            }
        }
    }

    /// Atomically write the manifest.
    pub fn save(&self, manifest: &Manifest) -> IndexResult<()> {
        let json = serde_json::to_vec_pretty(manifest)?;
        write_atomic(&self.path, &json)?;
        tracing::debug!(
            target: "manifest",
            "saved manifest for build {} ({} files)",
            manifest.build_id,
            manifest.fingerprint.files.len()
        );
        Ok(())
    }

    /// Remove the manifest so the location reads as stale.
    pub fn invalidate(&self) -> IndexResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// True only when the saved manifest has the current schema and every
    /// fingerprint field is equal.
    pub fn matches(current: &Fingerprint, saved: &Manifest) -> bool {
        saved.version == MANIFEST_VERSION && saved.fingerprint == *current
    }
}
