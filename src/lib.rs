//! Segment-level storage and query engine for an embeddable full-text
//! search library
//!
//! # Architecture
//!
//! - `column`: block-compressed columnar store, write and read paths
//! - `search`: lazily evaluated doc-iterator algebra over column data
//! - `fuzzy`: parametric Levenshtein descriptions and word automata
//! - `directory`: storage abstraction the segment files live in
//!
//! Segments are immutable once written; readers can be shared freely across
//! threads while iterators stay thread-local.

pub mod codec;
pub mod column;
pub mod compression;
pub mod config;
pub mod directory;
pub mod doc;
pub mod error;
pub mod fuzzy;
pub mod search;

pub use column::{ColumnHint, ColumnStoreReader, ColumnStoreWriter};
pub use config::{StoreConfig, StoreOptions};
pub use directory::{Directory, FsDirectory, MemDirectory};
pub use doc::DocId;
pub use error::{Error, Result};
pub use fuzzy::ParametricDescription;
pub use search::DocIterator;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
