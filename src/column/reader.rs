//! Column store read path
//!
//! Opening a segment reads and validates the index file; column headers are
//! materialized lazily on first access and cached. The reader is immutable
//! after construction and can be shared across threads; block state lives in
//! per-iterator scratch.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::config::StoreOptions;
use crate::directory::{Directory, IndexInput};
use crate::error::Result;

use super::iterator::ColumnIterator;
use super::meta::{ColumnId, ColumnMeta, Footer, DATA_EXTENSION, INDEX_EXTENSION};

/// Access pattern hint for column iterators
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnHint {
    /// Random access lookups; seeks may go anywhere
    Normal,
    /// Streaming consumption, e.g. during consolidation; backwards seek is
    /// undefined
    Consolidation,
}

/// A single readable column
pub struct Column {
    meta: ColumnMeta,
    data: Arc<dyn IndexInput>,
    options: StoreOptions,
}

impl Column {
    pub fn meta(&self) -> &ColumnMeta {
        &self.meta
    }

    pub fn id(&self) -> ColumnId {
        self.meta.id
    }

    pub fn name(&self) -> &str {
        &self.meta.name
    }

    /// Total number of keys in the column
    pub fn count(&self) -> u64 {
        self.meta.count
    }

    pub(crate) fn data(&self) -> &dyn IndexInput {
        self.data.as_ref()
    }

    pub(crate) fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Create a doc iterator over the column
    pub fn iterator(&self, hint: ColumnHint) -> ColumnIterator<'_> {
        ColumnIterator::new(self, hint)
    }
}

/// Reader over one column store segment
pub struct ColumnStoreReader {
    index_bytes: Vec<u8>,
    data: Arc<dyn IndexInput>,
    options: StoreOptions,
    offsets: Vec<u64>,
    columns: RwLock<Vec<Option<Arc<Column>>>>,
    by_name: RwLock<Option<Arc<BTreeMap<String, usize>>>>,
}

impl ColumnStoreReader {
    /// Open a segment; refuses it entirely when the footer is corrupt
    pub fn open(dir: &dyn Directory, segment: &str, options: StoreOptions) -> Result<Self> {
        let index_input = dir.open_read(&format!("{segment}.{INDEX_EXTENSION}"))?;
        let index_bytes = index_input.read_all()?;
        let footer = Footer::read(&index_bytes)?;
        let data: Arc<dyn IndexInput> =
            Arc::from(dir.open_read(&format!("{segment}.{DATA_EXTENSION}"))?);

        debug!(
            segment,
            columns = footer.offsets.len(),
            "column store opened"
        );

        let column_count = footer.offsets.len();
        Ok(Self {
            index_bytes,
            data,
            options,
            offsets: footer.offsets,
            columns: RwLock::new(vec![None; column_count]),
            by_name: RwLock::new(None),
        })
    }

    pub fn column_count(&self) -> usize {
        self.offsets.len()
    }

    /// Column at ordinal `idx`, parsing its header on first access
    pub fn column_at(&self, idx: usize) -> Result<Arc<Column>> {
        if let Some(column) = &self.columns.read()[idx] {
            return Ok(Arc::clone(column));
        }

        let mut pos = self.offsets[idx] as usize;
        let meta = ColumnMeta::read(&self.index_bytes, &mut pos)?;
        let column = Arc::new(Column {
            meta,
            data: Arc::clone(&self.data),
            options: self.options.clone(),
        });

        let mut cache = self.columns.write();
        if let Some(existing) = &cache[idx] {
            return Ok(Arc::clone(existing));
        }
        cache[idx] = Some(Arc::clone(&column));
        Ok(column)
    }

    /// Look up a column by name; `None` when absent
    pub fn column(&self, name: &str) -> Result<Option<Arc<Column>>> {
        let names = self.name_index()?;
        match names.get(name) {
            Some(&idx) => Ok(Some(self.column_at(idx)?)),
            None => Ok(None),
        }
    }

    /// Look up a column by its stable id; `None` when absent
    pub fn column_by_id(&self, id: ColumnId) -> Result<Option<Arc<Column>>> {
        for idx in 0..self.column_count() {
            let column = self.column_at(idx)?;
            if column.id() == id {
                return Ok(Some(column));
            }
        }
        Ok(None)
    }

    /// Columns whose names start with `prefix`, in name order
    pub fn columns_by_prefix(&self, prefix: &str) -> Result<Vec<Arc<Column>>> {
        let names = self.name_index()?;
        let mut matches = Vec::new();
        for (name, &idx) in names.range(prefix.to_string()..) {
            if !name.starts_with(prefix) {
                break;
            }
            matches.push(self.column_at(idx)?);
        }
        Ok(matches)
    }

    /// Name-sorted column directory, built on first use
    fn name_index(&self) -> Result<Arc<BTreeMap<String, usize>>> {
        if let Some(names) = self.by_name.read().as_ref() {
            return Ok(Arc::clone(names));
        }

        let mut names = BTreeMap::new();
        for idx in 0..self.column_count() {
            let column = self.column_at(idx)?;
            names.insert(column.name().to_string(), idx);
        }
        let names = Arc::new(names);

        let mut cache = self.by_name.write();
        if let Some(existing) = cache.as_ref() {
            return Ok(Arc::clone(existing));
        }
        *cache = Some(Arc::clone(&names));
        Ok(names)
    }
}
