//! The doc iterator contract shared by leaf and composite iterators
//!
//! An iterator is in exactly one of three states: pre-first (`value()` is
//! `DocId::INVALID`), positioned at a document, or exhausted (`value()` is
//! `DocId::EOF`). Once exhausted it stays exhausted.

use crate::doc::DocId;
use crate::error::Result;

/// Lazily evaluated iterator over an ascending doc id set
pub trait DocIterator {
    /// Current document, `DocId::INVALID` before the first advance,
    /// `DocId::EOF` after exhaustion
    fn value(&self) -> DocId;

    /// Advance to the next document; `false` once exhausted
    fn next(&mut self) -> Result<bool>;

    /// Position at the smallest document `>= target`, or `DocId::EOF`.
    /// A seek to a target at or before the current position may return the
    /// current position unchanged; callers must not rely on rewinding.
    fn seek(&mut self, target: DocId) -> Result<DocId>;

    /// Estimate of the number of documents left to produce
    fn cost(&self) -> u64;

    /// Value bytes attached to the current document; empty when the
    /// iterator carries no payload, for mask columns and after exhaustion
    fn payload(&self) -> &[u8] {
        &[]
    }

    /// Whether `score` produces a meaningful value
    fn has_score(&self) -> bool {
        false
    }

    /// Score contribution of the current document
    fn score(&mut self) -> f32 {
        0.0
    }
}

/// Iterator over the empty doc set; born exhausted
#[derive(Clone, Copy, Debug, Default)]
pub struct EmptyIterator;

impl DocIterator for EmptyIterator {
    fn value(&self) -> DocId {
        DocId::EOF
    }

    fn next(&mut self) -> Result<bool> {
        Ok(false)
    }

    fn seek(&mut self, _target: DocId) -> Result<DocId> {
        Ok(DocId::EOF)
    }

    fn cost(&self) -> u64 {
        0
    }
}
