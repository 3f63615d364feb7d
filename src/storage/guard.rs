//! Advisory build lock.
//!
//! A `build.lock` marker says "a build is in progress here". The lock only
//! avoids duplicate work; correctness comes from atomic artifact writes and
//! idempotent rebuilds, so a contended acquisition still proceeds.

use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use super::error::IndexResult;
use super::location::IndexLocation;
use crate::utils::get_utc_timestamp;

/// Wait before rechecking a held lock.
pub const CONTENTION_BACKOFF: Duration = Duration::from_millis(500);

#[derive(Debug, Serialize, Deserialize)]
struct LockMarker {
    token: String,
    pid: u32,
    created_at: u64,
}

/// Outcome of [`IndexGuard::acquire`].
#[derive(Debug)]
pub enum Acquisition {
    /// This caller owns the marker until the token is dropped.
    Acquired(LockToken),
    /// Someone else still holds the marker after the backoff.
    Contended,
}

impl Acquisition {
    pub fn is_acquired(&self) -> bool {
        matches!(self, Acquisition::Acquired(_))
    }
}

/// Proof of lock ownership. Dropping it removes the marker if it is still ours.
#[derive(Debug)]
pub struct LockToken {
    path: PathBuf,
    token: String,
}

impl LockToken {
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for LockToken {
    fn drop(&mut self) {
        let owned = read_marker(&self.path).is_some_and(|marker| marker.token == self.token);
        if !owned {
            tracing::warn!(
                target: "guard",
                "build lock {} no longer carries our token, leaving it",
                self.path.display()
            );
            return;
        }

        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(target: "guard", "released build lock"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(target: "guard", "failed to remove build lock: {e}"),
        }
    }
}

fn read_marker(path: &Path) -> Option<LockMarker> {
    let data = std::fs::read(path).ok()?;
    serde_json::from_slice(&data).ok()
}

#[derive(Debug, Clone)]
pub struct IndexGuard {
    lock_path: PathBuf,
    stale_after: Duration,
}

impl IndexGuard {
    /// `stale_after` is the age at which a leftover marker counts as orphaned.
    pub fn new(location: &IndexLocation, stale_after: Duration) -> Self {
        Self {
            lock_path: location.lock_path(),
            stale_after,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.lock_path.exists()
    }

    /// Try to take the build lock, waiting once for a current holder.
    pub fn acquire(&self) -> IndexResult<Acquisition> {
        self.heal_orphan();
        if let Some(token) = self.try_create()? {
            return Ok(Acquisition::Acquired(token));
        }

        tracing::info!(
            target: "guard",
            "build lock held at {}, rechecking in {CONTENTION_BACKOFF:?}",
            self.lock_path.display()
        );
        std::thread::sleep(CONTENTION_BACKOFF);

        self.heal_orphan();
        if let Some(token) = self.try_create()? {
            return Ok(Acquisition::Acquired(token));
        }

        tracing::warn!(
            target: "guard",
            "build lock still held at {}, proceeding without it",
            self.lock_path.display()
        );
        Ok(Acquisition::Contended)
    }

    fn try_create(&self) -> IndexResult<Option<LockToken>> {
        if let Some(parent) = self.lock_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.lock_path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let marker = LockMarker {
            token: uuid::Uuid::new_v4().to_string(),
            pid: std::process::id(),
            created_at: get_utc_timestamp(),
        };

        let written = serde_json::to_vec(&marker)
            .map_err(std::io::Error::from)
            .and_then(|body| file.write_all(&body))
            .and_then(|()| file.sync_all());
        if let Err(e) = written {
            let _ = std::fs::remove_file(&self.lock_path);
            return Err(e.into());
        }

        tracing::debug!(target: "guard", "acquired build lock (pid {})", marker.pid);
        Ok(Some(LockToken {
            path: self.lock_path.clone(),
            token: marker.token,
        }))
    }

    /// Remove a marker older than `stale_after`.
    ///
    /// Age comes from the marker body, or the file mtime while the body is
    /// unreadable (a holder may still be writing it).
    fn heal_orphan(&self) {
        let Some(age) = self.marker_age() else {
            return;
        };
        if age < self.stale_after {
            return;
        }

        tracing::warn!(
            target: "guard",
            "removing orphaned build lock {} (age {}s)",
            self.lock_path.display(),
            age.as_secs()
        );
        if let Err(e) = std::fs::remove_file(&self.lock_path) {
            if e.kind() != ErrorKind::NotFound {
                tracing::warn!(target: "guard", "failed to remove orphaned lock: {e}");
            }
        }
    }

    fn marker_age(&self) -> Option<Duration> {
        if let Some(marker) = read_marker(&self.lock_path) {
            let now = get_utc_timestamp();
            return Some(Duration::from_secs(now.saturating_sub(marker.created_at)));
        }

        let modified = std::fs::metadata(&self.lock_path).ok()?.modified().ok()?;
        Some(
            SystemTime::now()
                .duration_since(modified)
                .unwrap_or(Duration::ZERO),
        )
    }
}
