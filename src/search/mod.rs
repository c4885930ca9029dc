//! Doc-iterator algebra
//!
//! Composite iterators own their children as boxed trait objects; virtual
//! dispatch is only crossed at tree boundaries. All composites keep the
//! three-state iterator contract of [`DocIterator`].

mod conjunction;
mod disjunction;
mod doc_iterator;
mod existence;
mod score;

pub use conjunction::{make_conjunction, Conjunction};
pub use disjunction::{make_disjunction, Disjunction};
pub use doc_iterator::{DocIterator, EmptyIterator};
pub use existence::{column_existence, column_prefix_existence, ColumnExistenceIterator};
pub use score::{MaxMerger, ScoreMerger, SumMerger};

#[cfg(test)]
pub(crate) mod tests {
    use crate::doc::DocId;
    use crate::error::Result;

    use super::DocIterator;

    /// Iterator over a fixed ascending doc list, for algebra tests
    pub(crate) struct VecIterator {
        docs: Vec<DocId>,
        /// Position of the current doc; `docs.len()` once exhausted
        idx: usize,
        doc: DocId,
        score: Option<f32>,
    }

    impl VecIterator {
        pub(crate) fn new(docs: &[u32]) -> Self {
            debug_assert!(docs.windows(2).all(|w| w[0] < w[1]));
            Self {
                docs: docs.iter().map(|&d| DocId::new(d)).collect(),
                idx: 0,
                doc: DocId::INVALID,
                score: None,
            }
        }

        pub(crate) fn with_score(mut self, score: f32) -> Self {
            self.score = Some(score);
            self
        }
    }

    impl DocIterator for VecIterator {
        fn value(&self) -> DocId {
            self.doc
        }

        fn next(&mut self) -> Result<bool> {
            if self.doc.is_eof() {
                return Ok(false);
            }
            let next_idx = if self.doc == DocId::INVALID {
                0
            } else {
                self.idx + 1
            };
            if next_idx >= self.docs.len() {
                self.doc = DocId::EOF;
                return Ok(false);
            }
            self.idx = next_idx;
            self.doc = self.docs[next_idx];
            Ok(true)
        }

        fn seek(&mut self, target: DocId) -> Result<DocId> {
            if self.doc.is_eof() {
                return Ok(DocId::EOF);
            }
            if self.doc != DocId::INVALID && target <= self.doc {
                return Ok(self.doc);
            }
            let idx = self.docs.partition_point(|&d| d < target);
            if idx >= self.docs.len() {
                self.doc = DocId::EOF;
                return Ok(DocId::EOF);
            }
            self.idx = idx;
            self.doc = self.docs[idx];
            Ok(self.doc)
        }

        fn cost(&self) -> u64 {
            self.docs.len() as u64
        }

        fn has_score(&self) -> bool {
            self.score.is_some()
        }

        fn score(&mut self) -> f32 {
            self.score.unwrap_or(0.0)
        }
    }
}
