//! Per-column value index with lexical similarity search.
//!
//! Each `(table, column)` pair owns a collection named `<table>_<column>`.
//! Entries pair a searchable document (a description such as
//! "insurance payment", or the raw value itself) with the database value it
//! stands for (`POJISTNE`).
//!
//! Similarity is the cosine of character-trigram count vectors, in `[0, 1]`.
//! It converts to a distance `d = 1 - s` and a confidence `1 / (1 + d)`, so an
//! exact match has confidence 1.0 and an unrelated one 0.5.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{Resolution, ResolveRequest, ResolverResult, SemanticResolver};
use crate::config::{ResolverSettings, SettingsError};

/// Errors raised while building, loading or saving a value index.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Invalid column reference (expected table.column): {0}")]
    InvalidColumn(String),

    #[error("Configuration error: {0}")]
    Config(#[from] SettingsError),

    #[error("No value index path configured")]
    NoIndexPath,
}

pub type IndexResult<T> = Result<T, IndexError>;

/// One searchable document and the database value it maps to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub document: String,
    pub db_value: String,
}

impl IndexEntry {
    pub fn new(document: impl Into<String>, db_value: impl Into<String>) -> Self {
        Self {
            document: document.into(),
            db_value: db_value.into(),
        }
    }

    /// An entry whose document is the value itself.
    pub fn raw(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            document: value.clone(),
            db_value: value,
        }
    }
}

/// A query hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredEntry<'a> {
    pub entry: &'a IndexEntry,
    pub similarity: f64,
}

impl ScoredEntry<'_> {
    pub fn distance(&self) -> f64 {
        1.0 - self.similarity
    }

    pub fn confidence(&self) -> f64 {
        1.0 / (1.0 + self.distance())
    }
}

/// Collections of searchable values, keyed by `<table>_<column>`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValueIndex {
    collections: BTreeMap<String, Vec<IndexEntry>>,
}

impl ValueIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collection_name(table: &str, column: &str) -> String {
        format!("{}_{}", table, column)
    }

    /// Replace the collection for `(table, column)`.
    pub fn insert(&mut self, table: &str, column: &str, entries: Vec<IndexEntry>) {
        self.collections
            .insert(Self::collection_name(table, column), entries);
    }

    pub fn collection(&self, table: &str, column: &str) -> Option<&[IndexEntry]> {
        self.collections
            .get(&Self::collection_name(table, column))
            .map(Vec::as_slice)
    }

    pub fn collection_names(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }

    /// The `limit` most similar entries, best first; ties keep insertion order.
    ///
    /// `None` when the column has no collection.
    pub fn query(
        &self,
        table: &str,
        column: &str,
        phrase: &str,
        limit: usize,
    ) -> Option<Vec<ScoredEntry<'_>>> {
        let entries = self.collection(table, column)?;
        let wanted = Trigrams::of(phrase);
        let mut hits: Vec<ScoredEntry<'_>> = entries
            .iter()
            .map(|entry| ScoredEntry {
                entry,
                similarity: wanted.cosine(&Trigrams::of(&entry.document)),
            })
            .collect();
        hits.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        hits.truncate(limit);
        Some(hits)
    }

    pub fn from_json(json: &str) -> IndexResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> IndexResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> IndexResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> IndexResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

// =============================================================================
// Similarity
// =============================================================================

/// Trigram cosine similarity of two phrases, in `[0, 1]`.
pub fn similarity(a: &str, b: &str) -> f64 {
    Trigrams::of(a).cosine(&Trigrams::of(b))
}

struct Trigrams {
    counts: HashMap<[char; 3], u32>,
    norm: f64,
}

impl Trigrams {
    fn of(text: &str) -> Self {
        let normalized = text
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();

        let mut counts = HashMap::new();
        if !normalized.is_empty() {
            let padded: Vec<char> = format!("  {} ", normalized).chars().collect();
            for window in padded.windows(3) {
                *counts.entry([window[0], window[1], window[2]]).or_insert(0) += 1;
            }
        }

        let norm = counts
            .values()
            .map(|&count| f64::from(count).powi(2))
            .sum::<f64>()
            .sqrt();
        Self { counts, norm }
    }

    fn cosine(&self, other: &Trigrams) -> f64 {
        if self.norm == 0.0 || other.norm == 0.0 {
            return 0.0;
        }
        let dot: f64 = self
            .counts
            .iter()
            .filter_map(|(gram, &count)| {
                other
                    .counts
                    .get(gram)
                    .map(|&o| f64::from(count) * f64::from(o))
            })
            .sum();
        (dot / (self.norm * other.norm)).min(1.0)
    }
}

// =============================================================================
// Resolver
// =============================================================================

/// [`SemanticResolver`] over a [`ValueIndex`].
///
/// The best candidate is always accepted. Further candidates are accepted
/// only for set-compatible operators and only when their confidence exceeds
/// the acceptance threshold; duplicate values are dropped.
#[derive(Debug, Clone)]
pub struct IndexResolver {
    index: ValueIndex,
    acceptance_threshold: f64,
    max_candidates: usize,
}

impl IndexResolver {
    pub fn new(index: ValueIndex) -> Self {
        Self::with_settings(index, &ResolverSettings::default())
    }

    pub fn with_settings(index: ValueIndex, settings: &ResolverSettings) -> Self {
        Self {
            index,
            acceptance_threshold: settings.acceptance_threshold,
            max_candidates: settings.max_candidates.max(1),
        }
    }

    /// Load the index named by `settings.index_path`.
    pub fn from_settings(settings: &ResolverSettings) -> IndexResult<Self> {
        let path = settings
            .resolved_index_path()?
            .ok_or(IndexError::NoIndexPath)?;
        let index = ValueIndex::load(&path)?;
        tracing::debug!(path = %path.display(), collections = index.len(), "loaded value index");
        Ok(Self::with_settings(index, settings))
    }

    pub fn acceptance_threshold(mut self, threshold: f64) -> Self {
        self.acceptance_threshold = threshold;
        self
    }

    pub fn max_candidates(mut self, max: usize) -> Self {
        self.max_candidates = max.max(1);
        self
    }

    pub fn index(&self) -> &ValueIndex {
        &self.index
    }
}

impl SemanticResolver for IndexResolver {
    fn resolve(&self, request: &ResolveRequest<'_>) -> ResolverResult<Resolution> {
        let Some(hits) = self.index.query(
            request.table,
            request.column,
            request.phrase,
            self.max_candidates,
        ) else {
            tracing::trace!(
                collection = %ValueIndex::collection_name(request.table, request.column),
                "no value collection"
            );
            return Ok(Resolution::NoMatch);
        };

        let mut hits = hits.into_iter().filter(|hit| hit.similarity > 0.0);
        let Some(best) = hits.next() else {
            return Ok(Resolution::NoMatch);
        };

        let confidence = best.confidence();
        let mut values = vec![best.entry.db_value.clone()];
        if request.allows_multiple {
            for hit in hits {
                if hit.confidence() > self.acceptance_threshold
                    && !values.contains(&hit.entry.db_value)
                {
                    values.push(hit.entry.db_value.clone());
                }
            }
        }

        Ok(Resolution::Match { values, confidence })
    }
}
