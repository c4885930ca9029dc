//! Block-compressed columnar store
//!
//! A segment's columns live in two files: a data file of back-to-back block
//! frames and an index file of column headers addressable from a footer.
//! Blocks auto-specialize per density and value-size distribution; readers
//! dispatch on the recorded variant per block.

mod block;
mod iterator;
mod meta;
mod reader;
mod writer;

pub use iterator::ColumnIterator;
pub use meta::{
    BlockEntry, BlockVariant, ColumnId, ColumnMeta, Footer, BLOCK_SIZE, DATA_EXTENSION,
    FORMAT_VERSION, INDEX_EXTENSION,
};
pub use reader::{Column, ColumnHint, ColumnStoreReader};
pub use writer::{ColumnHandle, ColumnStoreWriter};
