//! Levenshtein automaton instantiation
//!
//! Materializes the parametric description against one target word into a
//! deterministic FSM over UTF-8 bytes. Arcs are byte-range labeled; final
//! states carry the edit distance as their weight; state 0 is the reserved
//! terminal sink with no outbound arcs. Codepoints outside the target's
//! alphabet share a single "rho" transition, expanded into per-length
//! continuation chains at the byte level.

use crate::error::{Error, Result};

use super::parametric::{ParametricDescription, INVALID_PARAMETRIC_STATE};

pub type StateId = u32;

/// Reserved terminal sink; stepping into it rejects the input
pub const INVALID_STATE: StateId = 0;

/// Builder sentinel for "state not created yet"
const NO_STATE: StateId = u32::MAX;

/// Byte-range labeled transition
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transition {
    pub min: u8,
    pub max: u8,
    pub to: StateId,
}

#[derive(Clone, Debug, Default)]
struct State {
    arcs: Vec<Transition>,
    final_weight: Option<u8>,
}

/// Sorted deterministic acceptor over UTF-8 bytes with edit-distance
/// weights on final states
#[derive(Clone, Debug)]
pub struct Automaton {
    states: Vec<State>,
    start: StateId,
}

impl Automaton {
    fn new() -> Self {
        Self {
            states: Vec::new(),
            start: INVALID_STATE,
        }
    }

    fn add_state(&mut self) -> StateId {
        let id = self.states.len() as StateId;
        self.states.push(State::default());
        id
    }

    fn set_start(&mut self, state: StateId) {
        self.start = state;
    }

    fn set_final(&mut self, state: StateId, weight: u8) {
        self.states[state as usize].final_weight = Some(weight);
    }

    /// Arcs into the sink are omitted; a missing arc already rejects
    fn add_arc(&mut self, from: StateId, min: u8, max: u8, to: StateId) {
        debug_assert!(min <= max);
        if to == INVALID_STATE {
            return;
        }
        self.states[from as usize].arcs.push(Transition { min, max, to });
    }

    pub fn start(&self) -> StateId {
        self.start
    }

    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    /// Final weight of `state`, if final
    pub fn final_weight(&self, state: StateId) -> Option<u8> {
        self.states[state as usize].final_weight
    }

    /// Follow the arc labeled `byte`; the sink when there is none
    pub fn step(&self, state: StateId, byte: u8) -> StateId {
        let arcs = &self.states[state as usize].arcs;
        let idx = arcs.partition_point(|t| t.max < byte);
        match arcs.get(idx) {
            Some(t) if t.min <= byte => t.to,
            _ => INVALID_STATE,
        }
    }

    /// Run the automaton over `input`; the accepted edit distance, or
    /// `None` when rejected
    pub fn accept(&self, input: &str) -> Option<u8> {
        let mut state = self.start;
        for &byte in input.as_bytes() {
            state = self.step(state, byte);
            if state == INVALID_STATE {
                return None;
            }
        }
        self.final_weight(state)
    }

    /// Byte-slice variant of [`accept`](Self::accept); non-UTF-8 input is
    /// rejected as an argument error
    pub fn accept_bytes(&self, input: &[u8]) -> Result<Option<u8>> {
        let input = std::str::from_utf8(input)
            .map_err(|_| Error::InvalidArgument("automaton input is not UTF-8".to_string()))?;
        Ok(self.accept(input))
    }

    /// Arcs sorted by label and pairwise disjoint in every state
    pub fn is_deterministic(&self) -> bool {
        self.states.iter().all(|state| {
            state
                .arcs
                .windows(2)
                .all(|w| w[0].min <= w[0].max && w[0].max < w[1].min)
        }) && self.states[INVALID_STATE as usize].arcs.is_empty()
    }
}

struct AlphabetEntry {
    utf8: [u8; 4],
    utf8_len: u8,
    /// Characteristic bitset over the target's characters; padded so any
    /// window read stays in bounds
    chi: Vec<u64>,
}

/// Distinct characters of the target plus the leading rho entry
fn make_alphabet(target: &str) -> (Vec<AlphabetEntry>, usize) {
    let chars: Vec<char> = target.chars().collect();
    let char_count = chars.len();

    let mut unique = chars.clone();
    unique.sort_unstable();
    unique.dedup();

    let words = char_count / 64 + 2;
    let mut alphabet = Vec::with_capacity(1 + unique.len());

    // rho: any character not in the target; its vector is all zeros
    alphabet.push(AlphabetEntry {
        utf8: [0; 4],
        utf8_len: 0,
        chi: vec![0; words],
    });

    for c in unique {
        let mut utf8 = [0u8; 4];
        let utf8_len = c.encode_utf8(&mut utf8).len() as u8;

        let mut chi = vec![0u64; words];
        for (i, &tc) in chars.iter().enumerate() {
            if tc == c {
                chi[i / 64] |= 1u64 << (i % 64);
            }
        }

        alphabet.push(AlphabetEntry {
            utf8,
            utf8_len,
            chi,
        });
    }

    (alphabet, char_count)
}

/// Characteristic bits at `offset`, masked to the window width
fn chi_bits(bits: &[u64], offset: usize, mask: u64) -> u64 {
    let word = offset / 64;
    let align = offset % 64;
    if align == 0 {
        bits[word] & mask
    } else {
        ((bits[word] >> align) | (bits[word + 1] << (64 - align))) & mask
    }
}

/// Byte-level arc emission for one automaton state.
///
/// Expands codepoint-labeled arcs into a byte trie and routes every other
/// well-formed sequence to `default_target` through shared continuation
/// chains (`chains[k]` consumes `k` continuation bytes).
struct Utf8ArcsBuilder {
    default_target: StateId,
    chains: [StateId; 4],
}

impl Utf8ArcsBuilder {
    fn new(default_target: StateId) -> Self {
        let mut chains = [NO_STATE; 4];
        chains[0] = default_target;
        Self {
            default_target,
            chains,
        }
    }

    fn chain(&mut self, a: &mut Automaton, k: usize) -> StateId {
        if self.chains[k] == NO_STATE {
            let prev = self.chain(a, k - 1);
            let state = a.add_state();
            a.add_arc(state, 0x80, 0xBF, prev);
            self.chains[k] = state;
        }
        self.chains[k]
    }

    fn emit(&mut self, a: &mut Automaton, from: StateId, arcs: &[(&[u8], StateId)]) {
        self.emit_node(a, from, arcs, true);
    }

    /// UTF-8 lead byte ranges and the continuation bytes each consumes
    const LEAD_SEGMENTS: [(u8, u8, usize); 4] =
        [(0x00, 0x7F, 0), (0xC2, 0xDF, 1), (0xE0, 0xEF, 2), (0xF0, 0xF4, 3)];

    fn emit_default(&mut self, a: &mut Automaton, node: StateId, lo: u16, hi: u16, root: bool, tail: usize) {
        if self.default_target == INVALID_STATE || lo > hi {
            return;
        }
        if root {
            for (seg_lo, seg_hi, continuations) in Self::LEAD_SEGMENTS {
                let l = lo.max(seg_lo as u16) as u8;
                let h = hi.min(seg_hi as u16) as u8;
                if l <= h {
                    let to = self.chain(a, continuations);
                    a.add_arc(node, l, h, to);
                }
            }
        } else {
            let l = lo.max(0x80) as u8;
            let h = hi.min(0xBF) as u8;
            if l <= h {
                let to = self.chain(a, tail);
                a.add_arc(node, l, h, to);
            }
        }
    }

    fn emit_node(&mut self, a: &mut Automaton, node: StateId, arcs: &[(&[u8], StateId)], root: bool) {
        // all suffixes at a non-root node share their length; the lead byte
        // determines it
        let tail = arcs.first().map_or(0, |(bytes, _)| bytes.len() - 1);
        let mut cursor: u16 = 0;
        let mut idx = 0;

        while idx < arcs.len() {
            let lead = arcs[idx].0[0];
            let mut end = idx + 1;
            while end < arcs.len() && arcs[end].0[0] == lead {
                end += 1;
            }

            if (lead as u16) > cursor {
                self.emit_default(a, node, cursor, lead as u16 - 1, root, tail);
            }

            if arcs[idx].0.len() == 1 {
                debug_assert_eq!(end, idx + 1);
                a.add_arc(node, lead, lead, arcs[idx].1);
            } else {
                let child = a.add_state();
                a.add_arc(node, lead, lead, child);
                let suffixes: Vec<(&[u8], StateId)> = arcs[idx..end]
                    .iter()
                    .map(|&(bytes, to)| (&bytes[1..], to))
                    .collect();
                self.emit_node(a, child, &suffixes, false);
            }

            cursor = lead as u16 + 1;
            idx = end;
        }

        self.emit_default(a, node, cursor, 255, root, tail);
    }
}

/// Build the automaton accepting every word within the description's edit
/// distance of `target`, optionally behind a literal `prefix`
pub fn make_levenshtein_automaton(
    description: &ParametricDescription,
    prefix: &str,
    target: &str,
) -> Automaton {
    let (alphabet, char_count) = make_alphabet(target);
    let num_offsets = 1 + char_count;
    let mask = (1u64 << description.chi_size()) - 1;

    // automaton state per (parametric state, window offset)
    let mut table = vec![NO_STATE; description.num_states() as usize * num_offsets];

    let mut a = Automaton::new();
    let invalid = a.add_state();
    debug_assert_eq!(invalid, INVALID_STATE);

    let mut start = a.add_state();
    a.set_start(start);

    // literal prefix chain
    for c in prefix.chars() {
        let mut buf = [0u8; 4];
        for &byte in c.encode_utf8(&mut buf).as_bytes() {
            let to = a.add_state();
            a.add_arc(start, byte, byte, to);
            start = to;
        }
    }

    let start_distance = description.distance_at(1, char_count as u32);
    if start_distance <= description.max_distance() {
        a.set_final(start, start_distance);
    }

    struct StackEntry {
        offset: usize,
        state: u32,
        from: StateId,
    }
    let mut stack = vec![StackEntry {
        offset: 0,
        state: 1,
        from: start,
    }];
    let mut arcs: Vec<(&[u8], StateId)> = Vec::with_capacity(alphabet.len());

    while let Some(entry) = stack.pop() {
        arcs.clear();
        let mut default_state = NO_STATE;

        for item in &alphabet {
            let chi = chi_bits(&item.chi, entry.offset, mask);
            let (next, shift) = description.transition(entry.state, chi);
            let offset = if next == INVALID_PARAMETRIC_STATE {
                0
            } else {
                shift as usize + entry.offset
            };
            debug_assert!(next as usize * num_offsets + offset < table.len());

            let slot = &mut table[next as usize * num_offsets + offset];
            if next == INVALID_PARAMETRIC_STATE {
                *slot = INVALID_STATE;
            } else if *slot == NO_STATE {
                *slot = a.add_state();
                let distance = description.distance_at(next, (char_count - offset) as u32);
                if distance <= description.max_distance() {
                    a.set_final(*slot, distance);
                }
                stack.push(StackEntry {
                    offset,
                    state: next,
                    from: *slot,
                });
            }
            let to = *slot;

            if chi != 0 && to != default_state {
                arcs.push((&item.utf8[..item.utf8_len as usize], to));
            } else {
                debug_assert!(default_state == NO_STATE || to == default_state);
                default_state = to;
            }
        }

        Utf8ArcsBuilder::new(default_state).emit(&mut a, entry.from, &arcs);
    }

    debug_assert!(a.is_deterministic());
    a
}
