//! Column existence and column prefix queries
//!
//! Existence wraps the column's own iterator, exposing its keys as the
//! matching doc set with the column size as cost. The prefix form unions
//! one existence iterator per column from a name-sorted directory slice.
//! Callers hold the column handles; iterators borrow from them.

use std::sync::Arc;

use crate::column::{Column, ColumnHint, ColumnIterator};
use crate::doc::DocId;
use crate::error::{Error, Result};

use super::disjunction::make_disjunction;
use super::doc_iterator::{DocIterator, EmptyIterator};
use super::score::SumMerger;

/// Matches every document that has a value in one column
pub struct ColumnExistenceIterator<'a> {
    it: ColumnIterator<'a>,
    cost: u64,
    boost: Option<f32>,
}

impl<'a> ColumnExistenceIterator<'a> {
    pub fn new(column: &'a Column, hint: ColumnHint) -> Self {
        Self {
            it: column.iterator(hint),
            cost: column.count(),
            boost: None,
        }
    }

    /// Attach a constant score to every match
    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = Some(boost);
        self
    }
}

impl DocIterator for ColumnExistenceIterator<'_> {
    fn value(&self) -> DocId {
        self.it.value()
    }

    fn next(&mut self) -> Result<bool> {
        self.it.next()
    }

    fn seek(&mut self, target: DocId) -> Result<DocId> {
        self.it.seek(target)
    }

    fn cost(&self) -> u64 {
        self.cost
    }

    fn payload(&self) -> &[u8] {
        self.it.payload()
    }

    fn has_score(&self) -> bool {
        self.boost.is_some()
    }

    fn score(&mut self) -> f32 {
        self.boost.unwrap_or(0.0)
    }
}

/// Iterator over documents carrying a value in the given column; an absent
/// column yields the empty iterator
pub fn column_existence(column: Option<&Column>, hint: ColumnHint) -> Box<dyn DocIterator + '_> {
    match column {
        None => Box::new(EmptyIterator),
        Some(column) => Box::new(ColumnExistenceIterator::new(column, hint)),
    }
}

/// Union of existence iterators over every column in `columns` whose name
/// starts with `prefix`; the prefix must be non-empty.
///
/// `columns` is typically the result of
/// [`ColumnStoreReader::columns_by_prefix`](crate::column::ColumnStoreReader::columns_by_prefix);
/// filtering here keeps the helper total over arbitrary slices.
pub fn column_prefix_existence<'a>(
    columns: &'a [Arc<Column>],
    prefix: &str,
    hint: ColumnHint,
) -> Result<Box<dyn DocIterator + 'a>> {
    if prefix.is_empty() {
        return Err(Error::InvalidArgument(
            "column prefix must not be empty".to_string(),
        ));
    }

    let itrs: Vec<Box<dyn DocIterator + 'a>> = columns
        .iter()
        .filter(|c| c.name().starts_with(prefix))
        .map(|c| {
            Box::new(ColumnExistenceIterator::new(c.as_ref(), hint)) as Box<dyn DocIterator + 'a>
        })
        .collect();

    Ok(make_disjunction(itrs, SumMerger))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::{ColumnStoreReader, ColumnStoreWriter};
    use crate::config::StoreOptions;
    use crate::directory::MemDirectory;

    fn build_segment(dir: &MemDirectory) -> ColumnStoreReader {
        let mut writer = ColumnStoreWriter::new(dir, "seg", StoreOptions::default()).unwrap();
        let title = writer.column("title");
        let tags_a = writer.column("tags.a");
        let tags_b = writer.column("tags.b");

        for d in [1u32, 3, 5] {
            writer.write(title, DocId::new(d), b"t").unwrap();
        }
        for d in [2u32, 3] {
            writer.write(tags_a, DocId::new(d), b"").unwrap();
        }
        for d in [4u32, 5] {
            writer.write(tags_b, DocId::new(d), b"").unwrap();
        }
        writer.finish().unwrap();

        ColumnStoreReader::open(dir, "seg", StoreOptions::default()).unwrap()
    }

    #[test]
    fn test_existence_matches_column_keys() {
        let dir = MemDirectory::new();
        let reader = build_segment(&dir);

        let column = reader.column("title").unwrap();
        let mut it = column_existence(column.as_deref(), ColumnHint::Normal);
        assert_eq!(it.cost(), 3);

        let mut docs = Vec::new();
        while it.next().unwrap() {
            docs.push(it.value().as_u32());
        }
        assert_eq!(docs, vec![1, 3, 5]);
    }

    #[test]
    fn test_absent_column_is_empty() {
        let dir = MemDirectory::new();
        let reader = build_segment(&dir);

        let column = reader.column("missing").unwrap();
        assert!(column.is_none());
        let mut it = column_existence(column.as_deref(), ColumnHint::Normal);
        assert!(!it.next().unwrap());
        assert_eq!(it.value(), DocId::EOF);
    }

    #[test]
    fn test_prefix_unions_matches() {
        let dir = MemDirectory::new();
        let reader = build_segment(&dir);

        let columns = reader.columns_by_prefix("tags.").unwrap();
        assert_eq!(columns.len(), 2);

        let mut it = column_prefix_existence(&columns, "tags.", ColumnHint::Normal).unwrap();
        let mut docs = Vec::new();
        while it.next().unwrap() {
            docs.push(it.value().as_u32());
        }
        assert_eq!(docs, vec![2, 3, 4, 5]);
    }

    #[test]
    fn test_empty_prefix_rejected() {
        let dir = MemDirectory::new();
        let reader = build_segment(&dir);
        let columns = reader.columns_by_prefix("tags.").unwrap();
        assert!(column_prefix_existence(&columns, "", ColumnHint::Normal).is_err());
    }

    #[test]
    fn test_boosted_existence_scores() {
        let dir = MemDirectory::new();
        let reader = build_segment(&dir);

        let column = reader.column("title").unwrap().unwrap();
        let mut it = ColumnExistenceIterator::new(&column, ColumnHint::Normal).with_boost(2.0);
        assert!(it.has_score());
        assert!(it.next().unwrap());
        assert_eq!(it.score(), 2.0);
    }
}
