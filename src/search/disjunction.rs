//! Disjunction of N doc iterators
//!
//! A min-heap ordered by `(doc, child index)` tracks the earliest document
//! each child is positioned at. All children positioned at the current
//! document are advanced together before the next document is produced, so
//! duplicates collapse.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::doc::DocId;
use crate::error::Result;

use super::doc_iterator::{DocIterator, EmptyIterator};
use super::score::{ScoreMerger, SumMerger};

/// Union of the children's doc id sets
pub struct Disjunction<'a, M: ScoreMerger = SumMerger> {
    itrs: Vec<Box<dyn DocIterator + 'a>>,
    /// Children currently positioned, keyed by `(doc, child index)`
    heap: BinaryHeap<Reverse<(DocId, usize)>>,
    merger: M,
    doc: DocId,
    cost: u64,
}

impl<'a, M: ScoreMerger> Disjunction<'a, M> {
    pub fn new(itrs: Vec<Box<dyn DocIterator + 'a>>, merger: M) -> Self {
        assert!(!itrs.is_empty());
        let cost = itrs.iter().map(|it| it.cost()).fold(0u64, u64::saturating_add);
        Self {
            heap: BinaryHeap::with_capacity(itrs.len()),
            itrs,
            merger,
            doc: DocId::INVALID,
            cost,
        }
    }

    pub fn size(&self) -> usize {
        self.itrs.len()
    }

    /// Advance all children parked at the current document
    fn pop_current(&mut self) -> Result<()> {
        while let Some(&Reverse((doc, idx))) = self.heap.peek() {
            if doc != self.doc {
                break;
            }
            self.heap.pop();
            if self.itrs[idx].next()? {
                self.heap.push(Reverse((self.itrs[idx].value(), idx)));
            }
        }
        Ok(())
    }

    fn settle(&mut self) -> DocId {
        self.doc = match self.heap.peek() {
            Some(&Reverse((doc, _))) => doc,
            None => DocId::EOF,
        };
        self.doc
    }
}

impl<M: ScoreMerger> DocIterator for Disjunction<'_, M> {
    fn value(&self) -> DocId {
        self.doc
    }

    fn next(&mut self) -> Result<bool> {
        if self.doc.is_eof() {
            return Ok(false);
        }

        if self.doc == DocId::INVALID {
            for idx in 0..self.itrs.len() {
                if self.itrs[idx].next()? {
                    self.heap.push(Reverse((self.itrs[idx].value(), idx)));
                }
            }
        } else {
            self.pop_current()?;
        }

        Ok(!self.settle().is_eof())
    }

    fn seek(&mut self, target: DocId) -> Result<DocId> {
        if self.doc.is_eof() {
            return Ok(DocId::EOF);
        }
        if self.doc != DocId::INVALID && target <= self.doc {
            return Ok(self.doc);
        }

        if self.doc == DocId::INVALID {
            for idx in 0..self.itrs.len() {
                let doc = self.itrs[idx].seek(target)?;
                if !doc.is_eof() {
                    self.heap.push(Reverse((doc, idx)));
                }
            }
        } else {
            while let Some(&Reverse((doc, idx))) = self.heap.peek() {
                if doc >= target {
                    break;
                }
                self.heap.pop();
                let doc = self.itrs[idx].seek(target)?;
                if !doc.is_eof() {
                    self.heap.push(Reverse((doc, idx)));
                }
            }
        }

        Ok(self.settle())
    }

    fn cost(&self) -> u64 {
        self.cost
    }

    fn has_score(&self) -> bool {
        self.itrs.iter().any(|it| it.has_score())
    }

    fn score(&mut self) -> f32 {
        // sum contributions from exactly the children matching the current doc
        let doc = self.doc;
        if doc == DocId::INVALID || doc.is_eof() {
            return 0.0;
        }

        let mut acc = None;
        for it in &mut self.itrs {
            if it.value() == doc && it.has_score() {
                let next = it.score();
                match &mut acc {
                    None => acc = Some(next),
                    Some(acc) => self.merger.merge(acc, next),
                }
            }
        }
        acc.unwrap_or(0.0)
    }
}

/// Build a disjunction, collapsing the degenerate arities
pub fn make_disjunction<'a, M: ScoreMerger + 'a>(
    mut itrs: Vec<Box<dyn DocIterator + 'a>>,
    merger: M,
) -> Box<dyn DocIterator + 'a> {
    match itrs.len() {
        0 => Box::new(EmptyIterator),
        1 => itrs.pop().unwrap(),
        _ => Box::new(Disjunction::new(itrs, merger)),
    }
}
