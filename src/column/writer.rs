//! Column store write path
//!
//! Values arrive per column in strictly increasing doc order and buffer in a
//! current block. A full block is classified by density and value-size
//! regularity, encoded as the best fitting physical variant, compressed when
//! that pays off, optionally encrypted and appended to the data file. The
//! index file with all column headers is written last, so a failed write
//! leaves only orphan data bytes behind and never a readable segment.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::codec::{write_varint, xor64};
use crate::compression::COMPRESSION_NONE;
use crate::config::StoreOptions;
use crate::directory::{Directory, IndexOutput};
use crate::doc::DocId;
use crate::error::{Error, Result};

use super::block::FRAME_COMPRESSED;
use super::meta::{
    BlockEntry, BlockVariant, ColumnId, ColumnMeta, Footer, BLOCK_SIZE, DATA_EXTENSION,
    FORMAT_VERSION, INDEX_EXTENSION,
};

/// Handle to a column registered with a `ColumnStoreWriter`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColumnHandle(usize);

#[derive(Default)]
struct BlockBuffer {
    docs: Vec<DocId>,
    lens: Vec<u32>,
    payload: Vec<u8>,
}

impl BlockBuffer {
    fn clear(&mut self) {
        self.docs.clear();
        self.lens.clear();
        self.payload.clear();
    }
}

struct ColumnWriter {
    id: ColumnId,
    name: String,
    count: u64,
    min_doc: DocId,
    max_doc: DocId,
    blocks: Vec<BlockEntry>,
    buf: BlockBuffer,
}

/// Writer building one column store segment
pub struct ColumnStoreWriter<'d> {
    dir: &'d dyn Directory,
    segment: String,
    options: StoreOptions,
    data_out: Box<dyn IndexOutput>,
    columns: Vec<ColumnWriter>,
    by_name: HashMap<String, usize>,
}

impl<'d> ColumnStoreWriter<'d> {
    /// Start a new segment; creates the data file immediately
    pub fn new(dir: &'d dyn Directory, segment: &str, options: StoreOptions) -> Result<Self> {
        let data_out = dir.create_output(&format!("{segment}.{DATA_EXTENSION}"))?;
        Ok(Self {
            dir,
            segment: segment.to_string(),
            options,
            data_out,
            columns: Vec::new(),
            by_name: HashMap::new(),
        })
    }

    /// Get or create the column with the given name
    pub fn column(&mut self, name: &str) -> ColumnHandle {
        if let Some(&idx) = self.by_name.get(name) {
            return ColumnHandle(idx);
        }
        let idx = self.columns.len();
        self.columns.push(ColumnWriter {
            id: idx as ColumnId,
            name: name.to_string(),
            count: 0,
            min_doc: DocId::INVALID,
            max_doc: DocId::INVALID,
            blocks: Vec::new(),
            buf: BlockBuffer::default(),
        });
        self.by_name.insert(name.to_string(), idx);
        ColumnHandle(idx)
    }

    /// Append a value for `doc` to the column; keys must strictly increase
    pub fn write(&mut self, handle: ColumnHandle, doc: DocId, value: &[u8]) -> Result<()> {
        if doc > DocId::MAX_DOC {
            return Err(Error::CapacityExceeded(format!(
                "doc id {doc} beyond the 31-bit doc id space"
            )));
        }
        if !doc.is_valid() {
            return Err(Error::InvalidArgument(format!("doc id {doc} is reserved")));
        }

        let column = &mut self.columns[handle.0];
        if column.count > 0 && doc <= column.max_doc {
            return Err(Error::InvalidArgument(format!(
                "doc id {doc} does not increase over {}",
                column.max_doc
            )));
        }

        if column.count == 0 {
            column.min_doc = doc;
        }
        column.max_doc = doc;
        column.count += 1;

        column.buf.docs.push(doc);
        column.buf.lens.push(value.len() as u32);
        column.buf.payload.extend_from_slice(value);

        if column.buf.docs.len() as u32 == BLOCK_SIZE {
            flush_block(column, self.data_out.as_mut(), &self.options)?;
        }
        Ok(())
    }

    /// Flush remaining blocks, close the data file, then write the index
    /// file with every column header and the footer
    pub fn finish(mut self) -> Result<Vec<ColumnMeta>> {
        for column in &mut self.columns {
            if !column.buf.docs.is_empty() {
                flush_block(column, self.data_out.as_mut(), &self.options)?;
            }
        }
        self.data_out.close()?;

        let mut index = Vec::new();
        let mut offsets = Vec::with_capacity(self.columns.len());
        let mut metas = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            let meta = ColumnMeta {
                id: column.id,
                name: column.name.clone(),
                count: column.count,
                min_doc: if column.count == 0 {
                    DocId::INVALID
                } else {
                    column.min_doc
                },
                max_doc: if column.count == 0 {
                    DocId::INVALID
                } else {
                    column.max_doc
                },
                compression: self.options.config.compression,
                encrypted: self.options.encrypted(),
                blocks: column.blocks.clone(),
            };
            offsets.push(index.len() as u64);
            meta.write(&mut index);
            debug!(
                column = %meta.name,
                keys = meta.count,
                blocks = meta.blocks.len(),
                "column header written"
            );
            metas.push(meta);
        }

        Footer {
            version: FORMAT_VERSION,
            offsets,
        }
        .write(&mut index);

        // the index file lands last; everything before this point is
        // invisible to readers
        let mut index_out = self
            .dir
            .create_output(&format!("{}.{INDEX_EXTENSION}", self.segment))?;
        index_out.write_all(&index)?;
        index_out.close()?;

        info!(
            segment = %self.segment,
            columns = metas.len(),
            "column store committed"
        );
        Ok(metas)
    }
}

/// Classify a full or final block by density and value-size regularity
fn select_variant(count: u32, span: u32, payload_len: usize, fixed: bool) -> BlockVariant {
    debug_assert!(span >= count);
    if payload_len == 0 {
        if span == count {
            BlockVariant::DenseMask
        } else {
            BlockVariant::SparseMask
        }
    } else if span == count {
        if fixed {
            BlockVariant::DenseFixed
        } else {
            BlockVariant::DenseVariable
        }
    } else if fixed {
        BlockVariant::SparseFixed
    } else {
        BlockVariant::SparseVariable
    }
}

fn flush_block(
    column: &mut ColumnWriter,
    out: &mut dyn IndexOutput,
    options: &StoreOptions,
) -> Result<()> {
    let buf = &column.buf;
    debug_assert!(!buf.docs.is_empty());

    let count = buf.docs.len() as u32;
    let first = buf.docs[0];
    let last = *buf.docs.last().unwrap();
    let span = last.as_u32() - first.as_u32() + 1;
    let fixed = buf.lens.iter().all(|&l| l == buf.lens[0]);
    let variant = select_variant(count, span, buf.payload.len(), fixed);

    // logical body
    let mut body = Vec::with_capacity(buf.payload.len() + buf.docs.len());
    if variant.is_sparse() {
        write_varint(span as u64, &mut body);
        let words = (span as usize + 63) / 64;
        let mut bitmap = vec![0u64; words];
        for doc in &buf.docs {
            let bit = doc.as_u32() - first.as_u32();
            bitmap[(bit / 64) as usize] |= 1u64 << (bit % 64);
        }
        for word in bitmap {
            body.extend_from_slice(&word.to_le_bytes());
        }
    }
    match variant {
        BlockVariant::DenseFixed | BlockVariant::SparseFixed => {
            write_varint(buf.lens[0] as u64, &mut body);
        }
        BlockVariant::DenseVariable | BlockVariant::SparseVariable => {
            for &len in &buf.lens {
                write_varint(len as u64, &mut body);
            }
        }
        BlockVariant::DenseMask | BlockVariant::SparseMask => {}
    }
    if !variant.is_mask() {
        body.extend_from_slice(&buf.payload);
    }

    // compression pays only when it actually shrinks the body
    let uncompressed_len = body.len();
    let mut tag = 0u8;
    let mut stored = body;
    if options.config.compression != COMPRESSION_NONE && !stored.is_empty() {
        let codec = options.compressions.resolve(options.config.compression)?;
        let mut compressed = Vec::with_capacity(stored.len());
        codec.encode(&stored, &mut compressed);
        if compressed.len() < stored.len() {
            tag |= FRAME_COMPRESSED;
            stored = compressed;
        }
    }

    let data_offset = out.position();
    if let Some(cipher) = &options.cipher {
        cipher.encrypt(data_offset, &mut stored)?;
    }

    let mut frame = Vec::with_capacity(stored.len() + 16);
    frame.push(tag);
    if tag & FRAME_COMPRESSED != 0 {
        write_varint(uncompressed_len as u64, &mut frame);
    }
    frame.extend_from_slice(&stored);
    let checksum = xor64(&frame);
    frame.extend_from_slice(&checksum.to_le_bytes());

    out.write_all(&frame)?;

    column.blocks.push(BlockEntry {
        first_doc: first,
        data_offset,
        size: frame.len() as u32,
        variant,
        extra: 0,
    });
    column.buf.clear();
    Ok(())
}
