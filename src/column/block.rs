//! Materialized block state
//!
//! A block frame read from the data file is checksum-verified, decrypted,
//! decompressed and parsed into a `DecodedBlock` that supports positional
//! lookup. Decoded blocks live in per-iterator scratch, never on the shared
//! reader.

use crate::codec::{read_varint, read_varint_u32, xor64};
use crate::config::StoreOptions;
use crate::doc::DocId;
use crate::error::{Error, Result};

use super::meta::{BlockEntry, BlockVariant, ColumnMeta};

/// Frame tag bit: body is compressed
pub const FRAME_COMPRESSED: u8 = 0x01;

/// A block parsed into directly addressable form
#[derive(Debug)]
pub struct DecodedBlock {
    /// Data file offset of the source frame; the cache key
    pub data_offset: u64,
    pub first_doc: DocId,
    pub last_doc: DocId,
    pub count: u32,
    pub variant: BlockVariant,
    /// Present-key bitmap over the doc span; sparse variants only
    bitmap: Vec<u64>,
    /// Prefix popcounts per bitmap word; `ranks[w]` = set bits before word `w`
    ranks: Vec<u32>,
    /// Value boundaries; variable variants only, length `count + 1`
    offsets: Vec<u32>,
    /// Fixed variants only
    value_size: u32,
    payload: Vec<u8>,
}

impl DecodedBlock {
    /// Verify, decrypt, decompress and parse one block frame
    pub fn decode(
        frame: &[u8],
        entry: &BlockEntry,
        count: u32,
        column: &ColumnMeta,
        options: &StoreOptions,
    ) -> Result<Self> {
        if frame.len() < 9 {
            return Err(Error::Corruption("block frame too short".to_string()));
        }

        let (body_stored, trailer) = frame.split_at(frame.len() - 8);
        let stored = u64::from_le_bytes(trailer.try_into().unwrap());
        if xor64(body_stored) != stored {
            return Err(Error::Corruption(format!(
                "block checksum mismatch at offset {}",
                entry.data_offset
            )));
        }

        let tag = body_stored[0];
        let mut pos = 1;
        let compressed = tag & FRAME_COMPRESSED != 0;
        let uncompressed_len = if compressed {
            read_varint(body_stored, &mut pos)? as usize
        } else {
            0
        };

        let mut body = body_stored[pos..].to_vec();

        if column.encrypted {
            let cipher = options.cipher.as_ref().ok_or_else(|| {
                Error::Corruption("encrypted segment opened without a cipher".to_string())
            })?;
            cipher.decrypt(entry.data_offset, &mut body)?;
        }

        if compressed {
            let codec = options.compressions.resolve(column.compression)?;
            body = codec.decode(&body, uncompressed_len)?;
            if body.len() != uncompressed_len {
                return Err(Error::Corruption(
                    "decompressed block has unexpected size".to_string(),
                ));
            }
        }

        Self::parse(&body, entry, count)
    }

    fn parse(body: &[u8], entry: &BlockEntry, count: u32) -> Result<Self> {
        let variant = entry.variant;
        let first_doc = entry.first_doc;
        let mut pos = 0;

        let (span, bitmap) = if variant.is_sparse() {
            let span = read_varint_u32(body, &mut pos)?;
            if span < count {
                return Err(Error::Corruption("block span below key count".to_string()));
            }
            let words = (span as usize + 63) / 64;
            let mut bitmap = Vec::with_capacity(words);
            for _ in 0..words {
                let bytes: [u8; 8] = body
                    .get(pos..pos + 8)
                    .ok_or_else(|| Error::Corruption("truncated block bitmap".to_string()))?
                    .try_into()
                    .unwrap();
                bitmap.push(u64::from_le_bytes(bytes));
                pos += 8;
            }
            (span, bitmap)
        } else {
            (count, Vec::new())
        };

        let mut ranks = Vec::new();
        if !bitmap.is_empty() {
            ranks.reserve(bitmap.len() + 1);
            let mut acc = 0u32;
            ranks.push(0);
            for &word in &bitmap {
                acc += word.count_ones();
                ranks.push(acc);
            }
            if acc != count {
                return Err(Error::Corruption(format!(
                    "block bitmap has {acc} keys, index says {count}"
                )));
            }
        }

        let mut value_size = 0u32;
        let mut offsets = Vec::new();
        match variant {
            BlockVariant::DenseFixed | BlockVariant::SparseFixed => {
                value_size = read_varint_u32(body, &mut pos)?;
            }
            BlockVariant::DenseVariable | BlockVariant::SparseVariable => {
                offsets.reserve(count as usize + 1);
                let mut acc = 0u32;
                offsets.push(0);
                for _ in 0..count {
                    acc += read_varint_u32(body, &mut pos)?;
                    offsets.push(acc);
                }
            }
            BlockVariant::DenseMask | BlockVariant::SparseMask => {}
        }

        let payload = body[pos..].to_vec();
        let expected = match variant {
            BlockVariant::DenseFixed | BlockVariant::SparseFixed => {
                value_size as usize * count as usize
            }
            BlockVariant::DenseVariable | BlockVariant::SparseVariable => {
                *offsets.last().unwrap() as usize
            }
            _ => 0,
        };
        if payload.len() != expected {
            return Err(Error::Corruption(format!(
                "block payload is {} bytes, expected {expected}",
                payload.len()
            )));
        }

        let last_doc = if variant.is_sparse() {
            let mut last_bit = 0;
            for (w, &word) in bitmap.iter().enumerate().rev() {
                if word != 0 {
                    last_bit = w as u32 * 64 + 63 - word.leading_zeros();
                    break;
                }
            }
            DocId::new(first_doc.as_u32() + last_bit)
        } else {
            DocId::new(first_doc.as_u32() + count - 1)
        };
        if variant.is_sparse() && last_doc.as_u32() >= first_doc.as_u32() + span {
            return Err(Error::Corruption("block bitmap exceeds span".to_string()));
        }

        Ok(Self {
            data_offset: entry.data_offset,
            first_doc,
            last_doc,
            count,
            variant,
            bitmap,
            ranks,
            offsets,
            value_size,
            payload,
        })
    }

    /// Position of the first present key `>= target`, or `None` when the
    /// block has no such key
    pub fn search(&self, target: DocId) -> Option<u32> {
        if self.count == 0 || target > self.last_doc {
            return None;
        }
        if target <= self.first_doc {
            return Some(0);
        }

        if self.bitmap.is_empty() {
            // dense: every key in [first, first + count) is present
            Some(target.as_u32() - self.first_doc.as_u32())
        } else {
            let bit = target.as_u32() - self.first_doc.as_u32();
            let mut word_idx = (bit / 64) as usize;
            let mut word = self.bitmap[word_idx] & (u64::MAX << (bit % 64));
            loop {
                if word != 0 {
                    let found = word.trailing_zeros();
                    let below = self.bitmap[word_idx] & !(u64::MAX << found);
                    return Some(self.ranks[word_idx] + below.count_ones());
                }
                word_idx += 1;
                if word_idx >= self.bitmap.len() {
                    return None;
                }
                word = self.bitmap[word_idx];
            }
        }
    }

    /// Doc id at position `pos` among the block's present keys
    pub fn doc_at(&self, pos: u32) -> DocId {
        debug_assert!(pos < self.count);
        if self.bitmap.is_empty() {
            return DocId::new(self.first_doc.as_u32() + pos);
        }

        // select: find the word holding the pos-th set bit via the rank
        // table, then walk the word
        let word_idx = self.ranks.partition_point(|&r| r <= pos) - 1;
        let mut word = self.bitmap[word_idx];
        let mut remaining = pos - self.ranks[word_idx];
        while remaining > 0 {
            word &= word - 1; // clear lowest set bit
            remaining -= 1;
        }
        let bit = word_idx as u32 * 64 + word.trailing_zeros();
        DocId::new(self.first_doc.as_u32() + bit)
    }

    /// Value bytes at position `pos`; empty for mask blocks
    pub fn payload_at(&self, pos: u32) -> &[u8] {
        debug_assert!(pos < self.count);
        match self.variant {
            BlockVariant::DenseFixed | BlockVariant::SparseFixed => {
                let start = pos as usize * self.value_size as usize;
                &self.payload[start..start + self.value_size as usize]
            }
            BlockVariant::DenseVariable | BlockVariant::SparseVariable => {
                let start = self.offsets[pos as usize] as usize;
                let end = self.offsets[pos as usize + 1] as usize;
                &self.payload[start..end]
            }
            BlockVariant::DenseMask | BlockVariant::SparseMask => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sparse_block(docs: &[u32]) -> DecodedBlock {
        let first = docs[0];
        let last = *docs.last().unwrap();
        let span = last - first + 1;
        let words = (span as usize + 63) / 64;
        let mut bitmap = vec![0u64; words];
        for &d in docs {
            let bit = d - first;
            bitmap[(bit / 64) as usize] |= 1u64 << (bit % 64);
        }
        let mut ranks = vec![0u32];
        let mut acc = 0;
        for &w in &bitmap {
            acc += w.count_ones();
            ranks.push(acc);
        }
        DecodedBlock {
            data_offset: 0,
            first_doc: DocId::new(first),
            last_doc: DocId::new(last),
            count: docs.len() as u32,
            variant: BlockVariant::SparseMask,
            bitmap,
            ranks,
            offsets: Vec::new(),
            value_size: 0,
            payload: Vec::new(),
        }
    }

    #[test]
    fn test_sparse_search_and_select() {
        let docs = [5, 9, 70, 130, 200];
        let block = sparse_block(&docs);

        for (pos, &d) in docs.iter().enumerate() {
            assert_eq!(block.doc_at(pos as u32), DocId::new(d));
            assert_eq!(block.search(DocId::new(d)), Some(pos as u32));
        }

        assert_eq!(block.search(DocId::new(1)), Some(0));
        assert_eq!(block.search(DocId::new(6)), Some(1));
        assert_eq!(block.search(DocId::new(71)), Some(3));
        assert_eq!(block.search(DocId::new(201)), None);
    }

    #[test]
    fn test_dense_search() {
        let block = DecodedBlock {
            data_offset: 0,
            first_doc: DocId::new(10),
            last_doc: DocId::new(19),
            count: 10,
            variant: BlockVariant::DenseMask,
            bitmap: Vec::new(),
            ranks: Vec::new(),
            offsets: Vec::new(),
            value_size: 0,
            payload: Vec::new(),
        };

        assert_eq!(block.search(DocId::new(3)), Some(0));
        assert_eq!(block.search(DocId::new(15)), Some(5));
        assert_eq!(block.search(DocId::new(19)), Some(9));
        assert_eq!(block.search(DocId::new(20)), None);
        assert_eq!(block.doc_at(5), DocId::new(15));
        assert!(block.payload_at(5).is_empty());
    }
}
