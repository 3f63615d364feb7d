//! Core types for corpus records, typed documents and chunks.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;

/// Label placed before a notice title in the embedded text.
const NOTICE_TITLE_LABEL: &str = "[제목]";

/// Unique identifier for a document chunk within one index build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkId(NonZeroU32);

impl ChunkId {
    /// Create a ChunkId from a u32, returning None if zero.
    pub fn from_u32(value: u32) -> Option<Self> {
        NonZeroU32::new(value).map(Self)
    }

    /// Get the inner value as u32.
    pub fn get(&self) -> u32 {
        self.0.get()
    }
}

/// Kind tag attached to every source feed and carried by each record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// Crawled board notice (title, author, date, body).
    Notice,
    /// Service description page (category, title, url, description).
    Detail,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Notice => "notice",
            DocumentKind::Detail => "detail",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "notice" => Ok(DocumentKind::Notice),
            "detail" => Ok(DocumentKind::Detail),
            other => Err(format!("unknown document kind '{other}'")),
        }
    }
}

/// A corpus record as yielded by a document source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Identifier used for citations (usually the page URL).
    pub source_id: String,
    pub kind: DocumentKind,
    /// Raw body text.
    pub text: String,
    /// Free-form metadata such as title, author, date, category, url.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl RawRecord {
    pub fn new(source_id: impl Into<String>, kind: DocumentKind, text: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            kind,
            text: text.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// Attach a metadata entry (builder style).
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    fn meta(&self, key: &str) -> String {
        self.metadata.get(key).cloned().unwrap_or_default()
    }
}

/// Kind-specific metadata kept with every chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DocumentMeta {
    Notice {
        title: String,
        author: String,
        date: String,
    },
    Detail {
        category: String,
        title: String,
        url: String,
    },
}

impl DocumentMeta {
    pub fn kind(&self) -> DocumentKind {
        match self {
            DocumentMeta::Notice { .. } => DocumentKind::Notice,
            DocumentMeta::Detail { .. } => DocumentKind::Detail,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            DocumentMeta::Notice { title, .. } | DocumentMeta::Detail { title, .. } => title,
        }
    }
}

/// A normalized document, ready for chunking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub source_id: String,
    pub text: String,
    pub meta: DocumentMeta,
}

impl Document {
    /// Normalize a raw record according to its kind tag.
    ///
    /// Notices get their title prepended so the title is searchable;
    /// details embed the description as-is.
    pub fn from_raw(record: RawRecord) -> Self {
        match record.kind {
            DocumentKind::Notice => {
                let title = record.meta("title");
                let text = if title.trim().is_empty() {
                    record.text.clone()
                } else {
                    format!("{NOTICE_TITLE_LABEL} {title}\n\n{}", record.text)
                };
                Self {
                    meta: DocumentMeta::Notice {
                        title,
                        author: record.meta("author"),
                        date: record.meta("date"),
                    },
                    source_id: record.source_id,
                    text,
                }
            }
            DocumentKind::Detail => Self {
                meta: DocumentMeta::Detail {
                    category: record.meta("category"),
                    title: record.meta("title"),
                    url: record.meta("url"),
                },
                source_id: record.source_id,
                text: record.text,
            },
        }
    }

    pub fn kind(&self) -> DocumentKind {
        self.meta.kind()
    }
}

/// A chunk of a document with metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: ChunkId,

    /// Source identifier of the originating document.
    pub source_id: String,

    /// Order of this chunk within its document (0-based).
    pub position: u32,

    /// The actual text content of this chunk.
    pub content: String,

    pub meta: DocumentMeta,
}

impl DocumentChunk {
    pub fn kind(&self) -> DocumentKind {
        self.meta.kind()
    }

    /// Get the length of the content in characters.
    pub fn char_count(&self) -> usize {
        self.content.chars().count()
    }
}
