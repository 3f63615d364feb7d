//! Durable state of an index location: artifacts, manifest and build lock.

pub mod atomic;
pub mod error;
pub mod guard;
pub mod index;
pub mod location;
pub mod manifest;

pub use error::{IndexError, IndexResult};
pub use guard::{Acquisition, CONTENTION_BACKOFF, IndexGuard, LockToken};
pub use index::SearchIndex;
pub use location::IndexLocation;
pub use manifest::{
    Fingerprint, FingerprintDiff, MANIFEST_VERSION, Manifest, ManifestStore, compute_fingerprint,
    hash_file,
};
