//! Score merging for composite iterators
//!
//! Children expose their score through a mutable handle; the parent folds
//! the contributions of matching children with a pluggable merger, sum by
//! default.

/// Combines a child score contribution into an accumulator
pub trait ScoreMerger {
    fn merge(&self, acc: &mut f32, next: f32);
}

/// Sums contributions; the default merger
#[derive(Clone, Copy, Debug, Default)]
pub struct SumMerger;

impl ScoreMerger for SumMerger {
    fn merge(&self, acc: &mut f32, next: f32) {
        *acc += next;
    }
}

/// Keeps the largest contribution
#[derive(Clone, Copy, Debug, Default)]
pub struct MaxMerger;

impl ScoreMerger for MaxMerger {
    fn merge(&self, acc: &mut f32, next: f32) {
        if next > *acc {
            *acc = next;
        }
    }
}
