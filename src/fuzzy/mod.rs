//! Fuzzy term matching via parametric Levenshtein automata
//!
//! The expensive part, the [`ParametricDescription`], is built once per
//! `(max_distance, with_transpositions)` pair and is serializable; per-query
//! work is limited to instantiating a word automaton or simulating the
//! description directly.

mod automaton;
mod parametric;

pub use automaton::{make_levenshtein_automaton, Automaton, StateId, Transition, INVALID_STATE};
pub use parametric::{
    edit_distance, edit_distance_bytes, ParametricDescription, INVALID_PARAMETRIC_STATE,
};
