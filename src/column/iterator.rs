//! Doc iterator over a single column
//!
//! Seeks binary-search the in-memory block index, materialize the target
//! block into per-iterator scratch and dispatch on its physical variant.
//! The materialized block is cached by its data file offset, so repeated
//! calls inside one block skip the read and decode entirely.

use crate::doc::DocId;
use crate::error::Result;
use crate::search::DocIterator;

use super::block::DecodedBlock;
use super::reader::{Column, ColumnHint};

/// Iterator over the keys and values of one column
pub struct ColumnIterator<'a> {
    column: &'a Column,
    hint: ColumnHint,
    /// Index of the materialized block; meaningful while `block` is set
    block_idx: usize,
    block: Option<DecodedBlock>,
    /// Position within the materialized block's present keys
    pos: u32,
    doc: DocId,
    /// Frame read scratch
    frame: Vec<u8>,
}

impl<'a> ColumnIterator<'a> {
    pub(crate) fn new(column: &'a Column, hint: ColumnHint) -> Self {
        Self {
            column,
            hint,
            block_idx: 0,
            block: None,
            pos: 0,
            doc: DocId::INVALID,
            frame: Vec::new(),
        }
    }

    pub fn hint(&self) -> ColumnHint {
        self.hint
    }

    /// Materialize block `idx`, reusing the cached block when it is the one
    /// already decoded
    fn load_block(&mut self, idx: usize) -> Result<()> {
        let entry = &self.column.meta().blocks[idx];
        if let Some(block) = &self.block {
            if block.data_offset == entry.data_offset {
                self.block_idx = idx;
                return Ok(());
            }
        }

        self.frame.resize(entry.size as usize, 0);
        self.column.data().read_at(entry.data_offset, &mut self.frame)?;
        let block = DecodedBlock::decode(
            &self.frame,
            entry,
            self.column.meta().block_count(idx),
            self.column.meta(),
            self.column.options(),
        )?;
        self.block = Some(block);
        self.block_idx = idx;
        Ok(())
    }

    fn exhaust(&mut self) -> DocId {
        self.doc = DocId::EOF;
        DocId::EOF
    }

    /// Position at `pos` within the materialized block
    fn position(&mut self, pos: u32) -> DocId {
        self.pos = pos;
        self.doc = self.block.as_ref().unwrap().doc_at(pos);
        self.doc
    }
}

impl DocIterator for ColumnIterator<'_> {
    fn value(&self) -> DocId {
        self.doc
    }

    fn next(&mut self) -> Result<bool> {
        if self.doc.is_eof() {
            return Ok(false);
        }

        if self.doc == DocId::INVALID {
            // pre-first
            if self.column.meta().blocks.is_empty() {
                self.exhaust();
                return Ok(false);
            }
            self.load_block(0)?;
            self.position(0);
            return Ok(true);
        }

        let count = self.block.as_ref().unwrap().count;
        if self.pos + 1 < count {
            self.position(self.pos + 1);
            return Ok(true);
        }

        let next_idx = self.block_idx + 1;
        if next_idx >= self.column.meta().blocks.len() {
            self.exhaust();
            return Ok(false);
        }
        self.load_block(next_idx)?;
        self.position(0);
        Ok(true)
    }

    fn seek(&mut self, target: DocId) -> Result<DocId> {
        if self.doc.is_eof() {
            return Ok(DocId::EOF);
        }
        // no rewind: a seek at or before the current position is a no-op
        if self.doc != DocId::INVALID && target <= self.doc {
            return Ok(self.doc);
        }

        let blocks = &self.column.meta().blocks;
        if blocks.is_empty() || target > self.column.meta().max_doc {
            return Ok(self.exhaust());
        }

        let mut idx = blocks
            .partition_point(|b| b.first_doc <= target)
            .saturating_sub(1);
        if self.block.is_some() && self.hint == ColumnHint::Consolidation {
            // streaming consumers never revisit earlier blocks
            idx = idx.max(self.block_idx);
        }

        loop {
            self.load_block(idx)?;
            if let Some(pos) = self.block.as_ref().unwrap().search(target) {
                return Ok(self.position(pos));
            }
            idx += 1;
            if idx >= blocks.len() {
                return Ok(self.exhaust());
            }
        }
    }

    fn cost(&self) -> u64 {
        self.column.meta().count
    }

    fn payload(&self) -> &[u8] {
        if self.doc == DocId::INVALID || self.doc.is_eof() {
            return &[];
        }
        self.block.as_ref().unwrap().payload_at(self.pos)
    }
}
