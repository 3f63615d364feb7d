//! The index façade: guarantees a valid, loaded index or a clear failure.
//!
//! `open` recomputes the corpus fingerprint and compares it with the saved
//! manifest. A fresh location is loaded without locking; anything else is
//! rebuilt under the advisory build lock. When a rebuild fails, a previous
//! self-consistent index is served in degraded mode.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::builder::{BuildProgress, IndexBuilder};
use crate::config::Settings;
use crate::documents::{DocumentSource, JsonFeedSource};
use crate::semantic::EmbeddingProvider;
use crate::storage::{
    Fingerprint, FingerprintDiff, IndexError, IndexGuard, IndexLocation, IndexResult,
    MANIFEST_VERSION, ManifestStore, SearchIndex, compute_fingerprint,
};

/// How the current handle came to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexStatus {
    /// Loaded from disk; manifest matched.
    Fresh,
    /// Built by this process.
    Rebuilt,
    /// Serving an older index because the rebuild failed.
    Degraded { reason: String },
}

impl fmt::Display for IndexStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexStatus::Fresh => f.write_str("fresh"),
            IndexStatus::Rebuilt => f.write_str("rebuilt"),
            IndexStatus::Degraded { reason } => write!(f, "degraded ({reason})"),
        }
    }
}

/// Shared, read-only view of a loaded index.
///
/// Handles stay valid after a later rebuild replaces the cached one.
#[derive(Debug, Clone)]
pub struct IndexHandle {
    index: Arc<SearchIndex>,
    status: IndexStatus,
}

impl IndexHandle {
    fn new(index: SearchIndex, status: IndexStatus) -> Self {
        Self {
            index: Arc::new(index),
            status,
        }
    }

    pub fn index(&self) -> &SearchIndex {
        &self.index
    }

    pub fn status(&self) -> &IndexStatus {
        &self.status
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self.status, IndexStatus::Degraded { .. })
    }

    pub fn build_id(&self) -> String {
        self.index.build_id()
    }
}

/// Why a location needs a rebuild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaleReason {
    /// Artifacts exist but no readable manifest vouches for them.
    NoManifest,
    /// A manifest exists but an artifact is missing.
    MissingArtifacts,
    VersionMismatch { found: u32 },
    /// Sources or build settings changed.
    Changed(FingerprintDiff),
    /// The manifest vouches for a different build than the one on disk.
    BuildMismatch { manifest: String, artifacts: String },
    DimensionMismatch { index: usize, provider: usize },
    CorruptArtifacts(String),
    /// The fingerprint could not be computed.
    SourceUnavailable(String),
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaleReason::NoManifest => f.write_str("artifacts without a manifest"),
            StaleReason::MissingArtifacts => f.write_str("manifest without artifacts"),
            StaleReason::VersionMismatch { found } => {
                write!(f, "manifest version {found}, expected {MANIFEST_VERSION}")
            }
            StaleReason::Changed(diff) => write!(f, "inputs changed: {diff}"),
            StaleReason::BuildMismatch {
                manifest,
                artifacts,
            } => write!(f, "manifest build {manifest} but artifacts from {artifacts}"),
            StaleReason::DimensionMismatch { index, provider } => {
                write!(f, "index dimension {index}, provider dimension {provider}")
            }
            StaleReason::CorruptArtifacts(reason) => write!(f, "unreadable artifacts: {reason}"),
            StaleReason::SourceUnavailable(reason) => write!(f, "sources unavailable: {reason}"),
        }
    }
}

/// Result of [`IndexCache::freshness`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    /// Nothing has been built at the location yet.
    Missing,
    Stale(StaleReason),
}

enum Evaluation {
    Fresh(SearchIndex),
    Missing,
    Stale(StaleReason),
}

pub struct IndexCache {
    location: IndexLocation,
    source: Arc<dyn DocumentSource>,
    builder: IndexBuilder,
    guard: IndexGuard,
    manifests: ManifestStore,
    handle: Mutex<Option<IndexHandle>>,
}

impl IndexCache {
    pub fn new(
        location: IndexLocation,
        source: Arc<dyn DocumentSource>,
        builder: IndexBuilder,
        lock_stale_after: Duration,
    ) -> Self {
        Self {
            guard: IndexGuard::new(&location, lock_stale_after),
            manifests: ManifestStore::new(&location),
            location,
            source,
            builder,
            handle: Mutex::new(None),
        }
    }

    /// Wire a cache from settings: JSON feeds, configured chunking and index path.
    pub fn from_settings(
        settings: &Settings,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> IndexResult<Self> {
        settings.validate()?;

        let source = JsonFeedSource::new(&settings.base_dir(), &settings.feeds);
        let builder = IndexBuilder::new(embedder, settings.chunking.clone())?;

        Ok(Self::new(
            IndexLocation::new(settings.index_dir()),
            Arc::new(source),
            builder,
            Duration::from_secs(settings.index.lock_stale_after_secs),
        ))
    }

    pub fn location(&self) -> &IndexLocation {
        &self.location
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        self.builder.embedder()
    }

    /// The handle loaded by an earlier `open`, if any.
    pub fn current(&self) -> Option<IndexHandle> {
        self.handle.lock().clone()
    }

    /// Fingerprint of the current sources and build settings.
    pub fn fingerprint(&self) -> IndexResult<Fingerprint> {
        let files = self.source.files();
        Ok(compute_fingerprint(
            &files,
            self.builder.embedder().model_name(),
            self.builder.chunking(),
        )?)
    }

    /// Report whether the on-disk index is usable, without building.
    pub fn freshness(&self) -> Freshness {
        let fingerprint = match self.fingerprint() {
            Ok(fingerprint) => fingerprint,
            Err(e) => return Freshness::Stale(StaleReason::SourceUnavailable(e.to_string())),
        };

        match self.evaluate(&fingerprint) {
            Evaluation::Fresh(_) => Freshness::Fresh,
            Evaluation::Missing => Freshness::Missing,
            Evaluation::Stale(reason) => Freshness::Stale(reason),
        }
    }

    /// Return a loaded index, building it first if needed.
    ///
    /// After the first success the same handle is returned without
    /// revalidation.
    pub fn open(&self) -> IndexResult<IndexHandle> {
        self.open_with_progress(|_| {})
    }

    /// Like [`open`](Self::open), reporting build progress if a build runs.
    pub fn open_with_progress<F>(&self, mut on_progress: F) -> IndexResult<IndexHandle>
    where
        F: FnMut(BuildProgress),
    {
        let mut slot = self.handle.lock();
        if let Some(handle) = slot.as_ref() {
            return Ok(handle.clone());
        }

        let handle = self.open_uncached(&mut on_progress)?;
        *slot = Some(handle.clone());
        Ok(handle)
    }

    /// Rebuild unconditionally.
    ///
    /// On failure the cached handle is left as it was.
    pub fn force_rebuild(&self) -> IndexResult<IndexHandle> {
        self.force_rebuild_with_progress(|_| {})
    }

    pub fn force_rebuild_with_progress<F>(&self, mut on_progress: F) -> IndexResult<IndexHandle>
    where
        F: FnMut(BuildProgress),
    {
        let mut slot = self.handle.lock();

        let handle = self
            .fingerprint()
            .and_then(|fingerprint| self.rebuild(fingerprint, false, &mut on_progress))
            .map_err(|e| {
                tracing::warn!(target: "cache", "forced rebuild failed: {e}");
                e.into_build_failed()
            })?;

        *slot = Some(handle.clone());
        Ok(handle)
    }

    fn open_uncached(
        &self,
        on_progress: &mut dyn FnMut(BuildProgress),
    ) -> IndexResult<IndexHandle> {
        let fingerprint = match self.fingerprint() {
            Ok(fingerprint) => fingerprint,
            Err(e) => return self.degrade(e),
        };

        match self.evaluate(&fingerprint) {
            Evaluation::Fresh(index) => {
                tracing::debug!(
                    target: "cache",
                    "index {} is fresh ({} chunks)",
                    index.build_id(),
                    index.len()
                );
                return Ok(IndexHandle::new(index, IndexStatus::Fresh));
            }
            Evaluation::Missing => tracing::info!(
                target: "cache",
                "no index at {}, building",
                self.location.root().display()
            ),
            Evaluation::Stale(reason) => {
                tracing::info!(target: "cache", "index is stale ({reason}), rebuilding")
            }
        }

        match self.rebuild(fingerprint, true, on_progress) {
            Ok(handle) => Ok(handle),
            Err(e) => self.degrade(e.into_build_failed()),
        }
    }

    /// Build under the guard, then load what was written.
    ///
    /// With `recheck`, freshness is evaluated again once the guard is held,
    /// since another builder may have finished while we waited.
    fn rebuild(
        &self,
        fingerprint: Fingerprint,
        recheck: bool,
        on_progress: &mut dyn FnMut(BuildProgress),
    ) -> IndexResult<IndexHandle> {
        let acquisition = self.guard.acquire()?;
        if !acquisition.is_acquired() {
            tracing::debug!(target: "cache", "building without the lock");
        }

        if recheck {
            if let Evaluation::Fresh(index) = self.evaluate(&fingerprint) {
                tracing::info!(
                    target: "cache",
                    "index {} was built by another process",
                    index.build_id()
                );
                return Ok(IndexHandle::new(index, IndexStatus::Fresh));
            }
        }

        let built = self.builder.build_at_with_progress(
            self.source.as_ref(),
            &self.location,
            fingerprint.clone(),
            on_progress,
        )?;
        drop(acquisition);

        let index = match SearchIndex::load(&self.location) {
            Ok(loaded) if loaded.build_id() == built.build_id() => loaded,
            _ => self.reconcile(built, &fingerprint),
        };

        Ok(IndexHandle::new(index, IndexStatus::Rebuilt))
    }

    /// Settle the location after another builder wrote over our build.
    ///
    /// A consistent pair on disk wins. Otherwise our manifest no longer
    /// describes the artifacts, so it is removed and the next open rebuilds.
    fn reconcile(&self, built: SearchIndex, fingerprint: &Fingerprint) -> SearchIndex {
        match self.evaluate(fingerprint) {
            Evaluation::Fresh(current) => {
                tracing::info!(
                    target: "cache",
                    "build {} was replaced by build {}, serving the latter",
                    built.build_id(),
                    current.build_id()
                );
                current
            }
            Evaluation::Missing => built,
            Evaluation::Stale(reason) => {
                tracing::warn!(
                    target: "cache",
                    "artifacts changed under build {} ({reason}), serving it from memory",
                    built.build_id()
                );
                let vouches_for_us = self
                    .manifests
                    .load()
                    .is_some_and(|manifest| manifest.build_id == built.build_id());
                if vouches_for_us {
                    if let Err(e) = self.manifests.invalidate() {
                        tracing::warn!(target: "cache", "failed to invalidate manifest: {e}");
                    }
                }
                built
            }
        }
    }

    fn evaluate(&self, current: &Fingerprint) -> Evaluation {
        let has_artifacts = self.location.has_artifacts();
        let Some(manifest) = self.manifests.load() else {
            return if has_artifacts {
                Evaluation::Stale(StaleReason::NoManifest)
            } else {
                Evaluation::Missing
            };
        };

        if !has_artifacts {
            return Evaluation::Stale(StaleReason::MissingArtifacts);
        }
        if manifest.version != MANIFEST_VERSION {
            return Evaluation::Stale(StaleReason::VersionMismatch {
                found: manifest.version,
            });
        }
        if !ManifestStore::matches(current, &manifest) {
            return Evaluation::Stale(StaleReason::Changed(current.diff(&manifest.fingerprint)));
        }

        let index = match SearchIndex::load(&self.location) {
            Ok(index) => index,
            Err(e) => return Evaluation::Stale(StaleReason::CorruptArtifacts(e.to_string())),
        };
        if index.build_id() != manifest.build_id {
            return Evaluation::Stale(StaleReason::BuildMismatch {
                manifest: manifest.build_id,
                artifacts: index.build_id(),
            });
        }
        let provider = self.builder.embedder().dimension();
        if index.dimension() != provider {
            return Evaluation::Stale(StaleReason::DimensionMismatch {
                index: index.dimension(),
                provider,
            });
        }

        Evaluation::Fresh(index)
    }

    /// Serve the previous index, or report that none is usable.
    fn degrade(&self, cause: IndexError) -> IndexResult<IndexHandle> {
        match self.load_previous() {
            Some(index) => {
                tracing::warn!(
                    target: "cache",
                    "serving previous index {} in degraded mode: {cause}",
                    index.build_id()
                );
                Ok(IndexHandle::new(
                    index,
                    IndexStatus::Degraded {
                        reason: cause.to_string(),
                    },
                ))
            }
            None => {
                tracing::error!(target: "cache", "no usable index: {cause}");
                Err(IndexError::IndexUnavailable {
                    cause: Box::new(cause),
                })
            }
        }
    }

    fn load_previous(&self) -> Option<SearchIndex> {
        let index = match SearchIndex::load(&self.location) {
            Ok(index) => index,
            Err(e) => {
                tracing::debug!(
                    target: "cache",
                    "no previous index at {}: {e}",
                    self.location.root().display()
                );
                return None;
            }
        };

        let provider = self.builder.embedder().dimension();
        if index.dimension() != provider {
            tracing::warn!(
                target: "cache",
                "previous index has dimension {}, provider has {provider}",
                index.dimension()
            );
            return None;
        }
        Some(index)
    }
}
