//! Semantic value resolution.
//!
//! A `SEMANTIC` node carries a free-text phrase ("female", "rich district")
//! whose concrete database value is unknown until compile time. A
//! [`SemanticResolver`] maps `(table, column, phrase, operator)` to concrete
//! values:
//!
//! - one best match plus its confidence
//! - several deduplicated candidates, only when the operator accepts a set
//! - no match, when no index exists for the column or nothing scores above zero
//!
//! Resolution failures are never fatal to compilation: the renderer falls back
//! to quoting the phrase verbatim.

mod builder;
mod index;

pub use builder::{IndexBuilder, ValueMappings};
pub use index::{similarity, IndexEntry, IndexError, IndexResolver, IndexResult, ScoredEntry, ValueIndex};

use std::collections::HashMap;
use std::sync::Arc;

/// A lookup issued by the expression renderer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolveRequest<'a> {
    pub table: &'a str,
    pub column: &'a str,
    pub phrase: &'a str,
    /// Operator of the enclosing comparison, empty outside one.
    pub operator: &'a str,
    /// Whether the operator accepts a list of values (`IN`, `=`, ...).
    pub allows_multiple: bool,
}

/// Outcome of a lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Concrete values, best first. More than one only when `allows_multiple` was set.
    Match { values: Vec<String>, confidence: f64 },
    NoMatch,
}

impl Resolution {
    pub fn single(value: impl Into<String>, confidence: f64) -> Self {
        Resolution::Match {
            values: vec![value.into()],
            confidence,
        }
    }
}

/// Errors a resolver backend may report. The compiler treats them as no match.
#[derive(Debug, thiserror::Error)]
pub enum ResolverError {
    #[error("Value index error: {0}")]
    Index(#[from] IndexError),

    #[error("Resolver unavailable: {0}")]
    Unavailable(String),
}

pub type ResolverResult<T> = Result<T, ResolverError>;

/// Maps free-text phrases to concrete database values.
///
/// Calls are synchronous; a backend needing bounded latency enforces its own
/// timeout and reports [`ResolverError::Unavailable`].
pub trait SemanticResolver {
    fn resolve(&self, request: &ResolveRequest<'_>) -> ResolverResult<Resolution>;
}

impl<R: SemanticResolver + ?Sized> SemanticResolver for &R {
    fn resolve(&self, request: &ResolveRequest<'_>) -> ResolverResult<Resolution> {
        (**self).resolve(request)
    }
}

impl<R: SemanticResolver + ?Sized> SemanticResolver for Box<R> {
    fn resolve(&self, request: &ResolveRequest<'_>) -> ResolverResult<Resolution> {
        (**self).resolve(request)
    }
}

impl<R: SemanticResolver + ?Sized> SemanticResolver for Arc<R> {
    fn resolve(&self, request: &ResolveRequest<'_>) -> ResolverResult<Resolution> {
        (**self).resolve(request)
    }
}

/// Resolver that never matches; every phrase is quoted verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopResolver;

impl SemanticResolver for NoopResolver {
    fn resolve(&self, _request: &ResolveRequest<'_>) -> ResolverResult<Resolution> {
        Ok(Resolution::NoMatch)
    }
}

/// Resolver backed by a fixed `(table, column, phrase)` → values table.
///
/// Phrases match case-insensitively. Useful for tests and for pinning known
/// translations in front of a similarity backend.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    entries: HashMap<(String, String, String), Vec<String>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_match(mut self, table: &str, column: &str, phrase: &str, values: &[&str]) -> Self {
        self.insert(table, column, phrase, values.iter().map(|v| v.to_string()).collect());
        self
    }

    pub fn insert(&mut self, table: &str, column: &str, phrase: &str, values: Vec<String>) {
        self.entries.insert(Self::key(table, column, phrase), values);
    }

    fn key(table: &str, column: &str, phrase: &str) -> (String, String, String) {
        (
            table.to_string(),
            column.to_string(),
            phrase.trim().to_lowercase(),
        )
    }
}

impl SemanticResolver for StaticResolver {
    fn resolve(&self, request: &ResolveRequest<'_>) -> ResolverResult<Resolution> {
        let key = Self::key(request.table, request.column, request.phrase);
        match self.entries.get(&key) {
            Some(values) if !values.is_empty() => {
                let take = if request.allows_multiple { values.len() } else { 1 };
                Ok(Resolution::Match {
                    values: values.iter().take(take).cloned().collect(),
                    confidence: 1.0,
                })
            }
            _ => Ok(Resolution::NoMatch),
        }
    }
}

/// Case-insensitive membership test for set-compatible operators.
pub fn is_set_compatible(operator: &str, set_operators: &[String]) -> bool {
    let normalized = operator.split_whitespace().collect::<Vec<_>>().join(" ");
    set_operators
        .iter()
        .any(|candidate| candidate.eq_ignore_ascii_case(&normalized))
}
