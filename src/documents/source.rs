//! Raw document sources feeding the index builder.
//!
//! A source exposes the files its records come from (inputs to the corpus
//! fingerprint) and the records themselves.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::config::FeedConfig;
use super::types::{DocumentKind, RawRecord};

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Source file unavailable: {path}: {source}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed source file {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Provider of raw corpus records.
pub trait DocumentSource: Send + Sync {
    /// Files whose contents determine the records, in a stable order.
    fn files(&self) -> Vec<PathBuf>;

    /// Read every record from the source.
    fn records(&self) -> Result<Vec<RawRecord>, SourceError>;
}

/// In-memory source, handy for embedding the library in other services.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    files: Vec<PathBuf>,
    records: Vec<RawRecord>,
}

impl StaticSource {
    pub fn new(files: Vec<PathBuf>, records: Vec<RawRecord>) -> Self {
        Self { files, records }
    }
}

impl DocumentSource for StaticSource {
    fn files(&self) -> Vec<PathBuf> {
        self.files.clone()
    }

    fn records(&self) -> Result<Vec<RawRecord>, SourceError> {
        Ok(self.records.clone())
    }
}

/// Source backed by the JSON files written by the notice crawler.
///
/// Each feed carries an explicit kind tag; the file holds either a JSON
/// array of items or a single item.
#[derive(Debug, Clone)]
pub struct JsonFeedSource {
    feeds: Vec<FeedConfig>,
}

impl JsonFeedSource {
    /// Create a source, resolving relative feed paths against `base_dir`.
    pub fn new(base_dir: &Path, feeds: &[FeedConfig]) -> Self {
        let feeds = feeds
            .iter()
            .map(|feed| {
                let path = if feed.path.is_absolute() {
                    feed.path.clone()
                } else {
                    base_dir.join(&feed.path)
                };
                FeedConfig::new(path, feed.kind)
            })
            .collect();
        Self { feeds }
    }

    fn read_feed(feed: &FeedConfig) -> Result<Vec<RawRecord>, SourceError> {
        let data = std::fs::read_to_string(&feed.path).map_err(|e| SourceError::Unavailable {
            path: feed.path.clone(),
            source: e,
        })?;
        let malformed = |e| SourceError::Malformed {
            path: feed.path.clone(),
            source: e,
        };

        let records = match feed.kind {
            DocumentKind::Notice => serde_json::from_str::<OneOrMany<NoticeItem>>(&data)
                .map_err(malformed)?
                .into_vec()
                .into_iter()
                .enumerate()
                .map(|(i, item)| item.into_record(&feed.path, i))
                .collect(),
            DocumentKind::Detail => serde_json::from_str::<OneOrMany<DetailItem>>(&data)
                .map_err(malformed)?
                .into_vec()
                .into_iter()
                .enumerate()
                .map(|(i, item)| item.into_record(&feed.path, i))
                .collect(),
        };

        Ok(records)
    }
}

impl DocumentSource for JsonFeedSource {
    fn files(&self) -> Vec<PathBuf> {
        self.feeds.iter().map(|feed| feed.path.clone()).collect()
    }

    fn records(&self) -> Result<Vec<RawRecord>, SourceError> {
        let mut records = Vec::new();
        for feed in &self.feeds {
            let feed_records = Self::read_feed(feed)?;
            tracing::debug!(
                target: "builder",
                "read {} {} records from {}",
                feed_records.len(),
                feed.kind,
                feed.path.display()
            );
            records.extend(feed_records);
        }
        Ok(records)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

/// Fallback citation id for items without a source or url.
fn positional_id(path: &Path, index: usize) -> String {
    format!("{}#{index}", path.display())
}

#[derive(Deserialize)]
struct NoticeItem {
    #[serde(default, alias = "id")]
    source: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    author: String,
    #[serde(default)]
    date: String,
    #[serde(default)]
    content: String,
}

impl NoticeItem {
    fn into_record(self, path: &Path, index: usize) -> RawRecord {
        let source_id = if self.source.trim().is_empty() {
            positional_id(path, index)
        } else {
            self.source
        };
        RawRecord::new(source_id, DocumentKind::Notice, self.content)
            .with_meta("title", self.title)
            .with_meta("author", self.author)
            .with_meta("date", self.date)
    }
}

#[derive(Deserialize)]
struct DetailItem {
    #[serde(default)]
    category: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    description: String,
}

impl DetailItem {
    fn into_record(self, path: &Path, index: usize) -> RawRecord {
        let source_id = if self.url.trim().is_empty() {
            positional_id(path, index)
        } else {
            self.url.clone()
        };
        RawRecord::new(source_id, DocumentKind::Detail, self.description)
            .with_meta("category", self.category)
            .with_meta("title", self.title)
            .with_meta("url", self.url)
    }
}
