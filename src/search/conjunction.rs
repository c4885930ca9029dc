//! Conjunction of N doc iterators
//!
//! Children are sorted ascending by cost at construction; the cheapest one
//! leads and the rest form the tail:
//!
//! ```text
//! c |  [0] <-- lead (the least cost iterator)
//! o |  [1]    |
//! s |  [2]    | tail (other iterators)
//! t |  ...    |
//!   V  [n] <-- end
//! ```
//!
//! Each advance of the lead is followed by a convergence pass that gallops
//! the tail forward, ratcheting the candidate monotonically until every
//! child agrees on one document.

use crate::doc::DocId;
use crate::error::Result;

use super::doc_iterator::{DocIterator, EmptyIterator};
use super::score::{ScoreMerger, SumMerger};

/// Intersection of the children's doc id sets
pub struct Conjunction<'a, M: ScoreMerger = SumMerger> {
    /// Children in ascending cost order; `[0]` is the lead
    itrs: Vec<Box<dyn DocIterator + 'a>>,
    /// Indices of children with a meaningful score
    scorers: Vec<usize>,
    merger: M,
    doc: DocId,
}

impl<'a, M: ScoreMerger> Conjunction<'a, M> {
    pub fn new(mut itrs: Vec<Box<dyn DocIterator + 'a>>, merger: M) -> Self {
        assert!(!itrs.is_empty());
        itrs.sort_by_key(|it| it.cost());
        let scorers: Vec<usize> = (0..itrs.len()).filter(|&i| itrs[i].has_score()).collect();
        Self {
            itrs,
            scorers,
            merger,
            doc: DocId::INVALID,
        }
    }

    pub fn size(&self) -> usize {
        self.itrs.len()
    }

    /// Drive the tail towards `target`; on a miss the lead re-seeks and the
    /// pass restarts from the new candidate
    fn converge(&mut self, mut target: DocId) -> Result<DocId> {
        debug_assert!(!target.is_eof());

        loop {
            let rest = self.seek_rest(target)?;
            if rest == target {
                return Ok(target);
            }
            target = self.itrs[0].seek(rest)?;
            if target.is_eof() {
                return Ok(DocId::EOF);
            }
        }
    }

    /// Seek every tail iterator to `target`; returns the first overshoot,
    /// or `target` itself when the whole tail matched
    fn seek_rest(&mut self, target: DocId) -> Result<DocId> {
        debug_assert!(!target.is_eof());

        for it in self.itrs.iter_mut().skip(1) {
            let doc = it.seek(target)?;
            if doc > target {
                return Ok(doc);
            }
        }
        Ok(target)
    }
}

impl<M: ScoreMerger> DocIterator for Conjunction<'_, M> {
    fn value(&self) -> DocId {
        self.doc
    }

    fn next(&mut self) -> Result<bool> {
        if !self.itrs[0].next()? {
            self.doc = DocId::EOF;
            return Ok(false);
        }
        let lead = self.itrs[0].value();
        self.doc = self.converge(lead)?;
        Ok(!self.doc.is_eof())
    }

    fn seek(&mut self, target: DocId) -> Result<DocId> {
        let lead = self.itrs[0].seek(target)?;
        if lead.is_eof() {
            self.doc = DocId::EOF;
            return Ok(DocId::EOF);
        }
        self.doc = self.converge(lead)?;
        Ok(self.doc)
    }

    fn cost(&self) -> u64 {
        self.itrs[0].cost()
    }

    fn has_score(&self) -> bool {
        !self.scorers.is_empty()
    }

    fn score(&mut self) -> f32 {
        // merge plan switched on the number of scoring children
        match self.scorers.len() {
            0 => 0.0,
            1 => self.itrs[self.scorers[0]].score(),
            2 => {
                let mut acc = self.itrs[self.scorers[0]].score();
                let next = self.itrs[self.scorers[1]].score();
                self.merger.merge(&mut acc, next);
                acc
            }
            _ => {
                let mut acc = self.itrs[self.scorers[0]].score();
                for i in 1..self.scorers.len() {
                    let next = self.itrs[self.scorers[i]].score();
                    self.merger.merge(&mut acc, next);
                }
                acc
            }
        }
    }
}

/// Build a conjunction, collapsing the degenerate arities
pub fn make_conjunction<'a, M: ScoreMerger + 'a>(
    mut itrs: Vec<Box<dyn DocIterator + 'a>>,
    merger: M,
) -> Box<dyn DocIterator + 'a> {
    match itrs.len() {
        // empty or unreachable search criteria
        0 => Box::new(EmptyIterator),
        1 => itrs.pop().unwrap(),
        _ => Box::new(Conjunction::new(itrs, merger)),
    }
}
