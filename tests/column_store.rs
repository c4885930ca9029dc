//! Integration tests for the columnar store write/read round trip

use std::sync::Arc;

use nautex::column::{BlockVariant, ColumnStoreReader, ColumnStoreWriter};
use nautex::compression::{Cipher, Compression, CompressionRegistry};
use nautex::directory::{Directory, FsDirectory, MemDirectory};
use nautex::search::DocIterator;
use nautex::{DocId, Error, Result, StoreOptions};

fn write_column(dir: &dyn Directory, segment: &str, name: &str, rows: &[(u32, Vec<u8>)]) {
    let mut writer = ColumnStoreWriter::new(dir, segment, StoreOptions::default()).unwrap();
    let col = writer.column(name);
    for (doc, value) in rows {
        writer.write(col, DocId::new(*doc), value).unwrap();
    }
    writer.finish().unwrap();
}

fn open(dir: &dyn Directory, segment: &str) -> ColumnStoreReader {
    ColumnStoreReader::open(dir, segment, StoreOptions::default()).unwrap()
}

/// Dense-variable column across a mid-range gap: every inserted doc comes
/// back in order with its exact payload
#[test]
fn test_dense_variable_roundtrip_with_gap() {
    let rows: Vec<(u32, Vec<u8>)> = (1u32..=1500)
        .filter(|&d| d != 1025)
        .map(|d| {
            let v = d - 1;
            let value = if v % 2 == 0 {
                v.to_string()
            } else {
                format!("{v}id")
            };
            (d, value.into_bytes())
        })
        .collect();

    let dir = MemDirectory::new();
    write_column(&dir, "seg", "field", &rows);
    let reader = open(&dir, "seg");

    let column = reader.column("field").unwrap().unwrap();
    assert_eq!(column.count(), rows.len() as u64);

    let mut it = column.iterator(nautex::ColumnHint::Normal);
    assert_eq!(it.value(), DocId::INVALID);
    for (doc, value) in &rows {
        assert!(it.next().unwrap());
        assert_eq!(it.value(), DocId::new(*doc));
        assert_eq!(it.payload(), &value[..]);
    }
    assert!(!it.next().unwrap());
    assert_eq!(it.value(), DocId::EOF);

    // the gap lands right between blocks; seeking into it lands past it
    let mut it = column.iterator(nautex::ColumnHint::Normal);
    assert_eq!(it.seek(DocId::new(1025)).unwrap(), DocId::new(1026));
    assert_eq!(it.payload(), b"1025id");
    assert_eq!(it.seek(DocId::new(1501)).unwrap(), DocId::EOF);
    assert!(it.payload().is_empty());
}

/// Sparse mask column of odd docs: membership only, payload always empty
#[test]
fn test_sparse_mask_column() {
    let rows: Vec<(u32, Vec<u8>)> = (1u32..=1500)
        .filter(|&d| d % 2 == 1)
        .map(|d| (d, Vec::new()))
        .collect();

    let dir = MemDirectory::new();
    write_column(&dir, "seg", "mask", &rows);
    let reader = open(&dir, "seg");

    let column = reader.column("mask").unwrap().unwrap();
    assert_eq!(column.count(), 750);
    assert!(column
        .meta()
        .blocks
        .iter()
        .all(|b| b.variant == BlockVariant::SparseMask));

    let mut it = column.iterator(nautex::ColumnHint::Normal);
    let mut expected = 1u32;
    while it.next().unwrap() {
        assert_eq!(it.value(), DocId::new(expected));
        assert!(it.payload().is_empty());
        expected += 2;
    }
    assert_eq!(expected, 1501);

    let mut it = column.iterator(nautex::ColumnHint::Normal);
    assert_eq!(it.seek(DocId::new(1000)).unwrap(), DocId::new(1001));
}

/// Dense mask spanning a thousand blocks with one gap after the first block
#[test]
fn test_dense_mask_multiblock_with_gap() {
    const LAST: u32 = 1_050_627;

    let dir = MemDirectory::new();
    let mut writer = ColumnStoreWriter::new(&dir, "seg", StoreOptions::default()).unwrap();
    let col = writer.column("mask");
    for d in (1u32..=1024).chain(1026..=LAST) {
        writer.write(col, DocId::new(d), b"").unwrap();
    }
    writer.finish().unwrap();

    let reader = open(&dir, "seg");
    let column = reader.column("mask").unwrap().unwrap();
    assert_eq!(column.count(), 1024 + (LAST as u64 - 1025));
    assert!(column
        .meta()
        .blocks
        .iter()
        .all(|b| b.variant == BlockVariant::DenseMask));

    let mut it = column.iterator(nautex::ColumnHint::Normal);
    let mut expected = (1u32..=1024).chain(1026..=LAST);
    while it.next().unwrap() {
        assert_eq!(it.value().as_u32(), expected.next().unwrap());
    }
    assert_eq!(expected.next(), None);

    let mut it = column.iterator(nautex::ColumnHint::Normal);
    assert_eq!(it.seek(DocId::new(1025)).unwrap(), DocId::new(1026));
    assert_eq!(it.seek(DocId::new(LAST)).unwrap(), DocId::new(LAST));
    assert!(!it.next().unwrap());
    assert_eq!(it.value(), DocId::EOF);
}

#[test]
fn test_empty_column() {
    let dir = MemDirectory::new();
    let mut writer = ColumnStoreWriter::new(&dir, "seg", StoreOptions::default()).unwrap();
    writer.column("empty");
    writer.finish().unwrap();

    let reader = open(&dir, "seg");
    let column = reader.column("empty").unwrap().unwrap();
    assert_eq!(column.count(), 0);

    let mut it = column.iterator(nautex::ColumnHint::Normal);
    assert!(!it.next().unwrap());
    assert_eq!(it.value(), DocId::EOF);

    let mut it = column.iterator(nautex::ColumnHint::Normal);
    assert_eq!(it.seek(DocId::new(42)).unwrap(), DocId::EOF);
}

#[test]
fn test_missing_column_is_none() {
    let dir = MemDirectory::new();
    write_column(&dir, "seg", "present", &[(1, b"x".to_vec())]);
    let reader = open(&dir, "seg");
    assert!(reader.column("absent").unwrap().is_none());
    assert!(reader.column_by_id(999).unwrap().is_none());
}

/// All-empty values over a contiguous doc range collapse to a dense mask
#[test]
fn test_all_empty_values_stored_as_mask() {
    let rows: Vec<(u32, Vec<u8>)> = (1u32..=2048).map(|d| (d, Vec::new())).collect();
    let dir = MemDirectory::new();
    write_column(&dir, "seg", "mask", &rows);

    let reader = open(&dir, "seg");
    let column = reader.column("mask").unwrap().unwrap();
    assert!(column
        .meta()
        .blocks
        .iter()
        .all(|b| b.variant == BlockVariant::DenseMask));

    let mut it = column.iterator(nautex::ColumnHint::Normal);
    while it.next().unwrap() {
        assert!(it.payload().is_empty());
    }
}

/// Fixed-size values over a gappy doc set pick the sparse fixed layout
#[test]
fn test_sparse_fixed_layout() {
    let rows: Vec<(u32, Vec<u8>)> = (1u32..=600)
        .map(|d| (d * 3, (d as u64).to_le_bytes().to_vec()))
        .collect();
    let dir = MemDirectory::new();
    write_column(&dir, "seg", "fixed", &rows);

    let reader = open(&dir, "seg");
    let column = reader.column("fixed").unwrap().unwrap();
    assert!(column
        .meta()
        .blocks
        .iter()
        .all(|b| b.variant == BlockVariant::SparseFixed));

    let mut it = column.iterator(nautex::ColumnHint::Normal);
    for (doc, value) in &rows {
        assert!(it.next().unwrap());
        assert_eq!(it.value(), DocId::new(*doc));
        assert_eq!(it.payload(), &value[..]);
    }
    assert!(!it.next().unwrap());
}

/// seek(target) always lands at the smallest present key >= target and
/// repeating the same seek holds position
#[test]
fn test_seek_monotonicity() {
    let rows: Vec<(u32, Vec<u8>)> = (1u32..=5000)
        .filter(|d| d % 7 == 3)
        .map(|d| (d, d.to_string().into_bytes()))
        .collect();
    let present: Vec<u32> = rows.iter().map(|(d, _)| *d).collect();

    let dir = MemDirectory::new();
    write_column(&dir, "seg", "field", &rows);
    let reader = open(&dir, "seg");
    let column = reader.column("field").unwrap().unwrap();

    for target in [1u32, 2, 3, 17, 1024, 1025, 2500, 4999, 5000, 6000] {
        let mut it = column.iterator(nautex::ColumnHint::Normal);
        let got = it.seek(DocId::new(target)).unwrap();
        let expected = present
            .iter()
            .copied()
            .find(|&d| d >= target)
            .map(DocId::new)
            .unwrap_or(DocId::EOF);
        assert_eq!(got, expected, "seek({target})");
        assert_eq!(it.seek(DocId::new(target)).unwrap(), got, "re-seek({target})");
    }
}

#[test]
fn test_forward_seek_chain_on_one_iterator() {
    let rows: Vec<(u32, Vec<u8>)> = (1u32..=4000)
        .filter(|d| d % 3 == 0)
        .map(|d| (d, vec![(d % 251) as u8]))
        .collect();
    let dir = MemDirectory::new();
    write_column(&dir, "seg", "field", &rows);
    let reader = open(&dir, "seg");
    let column = reader.column("field").unwrap().unwrap();

    let mut it = column.iterator(nautex::ColumnHint::Consolidation);
    assert_eq!(it.hint(), nautex::ColumnHint::Consolidation);
    let mut target = 1u32;
    while target < 4000 {
        let got = it.seek(DocId::new(target)).unwrap();
        if got.is_eof() {
            break;
        }
        assert!(got.as_u32() >= target);
        assert_eq!(got.as_u32() % 3, 0);
        target = got.as_u32() + 100;
    }
}

// -- compression and encryption -------------------------------------------

/// Run-length codec; enough to exercise the compressed block path
struct Rle;

impl Compression for Rle {
    fn encode(&self, input: &[u8], output: &mut Vec<u8>) {
        let mut i = 0;
        while i < input.len() {
            let byte = input[i];
            let mut run = 1usize;
            while i + run < input.len() && input[i + run] == byte && run < 255 {
                run += 1;
            }
            output.push(run as u8);
            output.push(byte);
            i += run;
        }
    }

    fn decode(&self, input: &[u8], expected_len: usize) -> Result<Vec<u8>> {
        let mut output = Vec::with_capacity(expected_len);
        for pair in input.chunks(2) {
            if pair.len() != 2 {
                return Err(Error::Corruption("odd rle payload".to_string()));
            }
            output.extend(std::iter::repeat(pair[1]).take(pair[0] as usize));
        }
        if output.len() != expected_len {
            return Err(Error::Corruption("rle length mismatch".to_string()));
        }
        Ok(output)
    }
}

struct XorCipher {
    key: [u8; 16],
}

impl Cipher for XorCipher {
    fn encrypt(&self, block_offset: u64, data: &mut [u8]) -> Result<()> {
        for (i, byte) in data.iter_mut().enumerate() {
            *byte ^= self.key[(block_offset as usize + i) % self.key.len()];
        }
        Ok(())
    }

    fn decrypt(&self, block_offset: u64, data: &mut [u8]) -> Result<()> {
        self.encrypt(block_offset, data)
    }
}

fn compressed_options() -> StoreOptions {
    let mut registry = CompressionRegistry::new();
    registry.register(1, Arc::new(Rle)).unwrap();
    StoreOptions::default().with_compression(1, Arc::new(registry))
}

#[test]
fn test_compressed_roundtrip() {
    // long runs compress well; the stored form must round trip bit-exact
    let rows: Vec<(u32, Vec<u8>)> = (1u32..=3000)
        .map(|d| (d, vec![(d % 5) as u8; 64]))
        .collect();

    let dir = MemDirectory::new();
    let options = compressed_options();
    let mut writer = ColumnStoreWriter::new(&dir, "seg", options.clone()).unwrap();
    let col = writer.column("field");
    for (doc, value) in &rows {
        writer.write(col, DocId::new(*doc), value).unwrap();
    }
    writer.finish().unwrap();

    let reader = ColumnStoreReader::open(&dir, "seg", options).unwrap();
    let column = reader.column("field").unwrap().unwrap();
    assert_eq!(column.meta().compression, 1);

    let mut it = column.iterator(nautex::ColumnHint::Normal);
    for (doc, value) in &rows {
        assert!(it.next().unwrap());
        assert_eq!(it.value(), DocId::new(*doc));
        assert_eq!(it.payload(), &value[..]);
    }
}

#[test]
fn test_unresolvable_decoder_is_corruption() {
    let rows: Vec<(u32, Vec<u8>)> = (1u32..=2000)
        .map(|d| (d, vec![7u8; 64]))
        .collect();

    let dir = MemDirectory::new();
    let mut writer = ColumnStoreWriter::new(&dir, "seg", compressed_options()).unwrap();
    let col = writer.column("field");
    for (doc, value) in &rows {
        writer.write(col, DocId::new(*doc), value).unwrap();
    }
    writer.finish().unwrap();

    // reader without the codec registered: open succeeds, block reads fail
    let reader = ColumnStoreReader::open(&dir, "seg", StoreOptions::default()).unwrap();
    let column = reader.column("field").unwrap().unwrap();
    let mut it = column.iterator(nautex::ColumnHint::Normal);
    assert!(matches!(it.next(), Err(Error::Corruption(_))));
}

#[test]
fn test_encrypted_roundtrip() {
    let cipher = Arc::new(XorCipher {
        key: *b"0123456789abcdef",
    });
    let options = StoreOptions::default().with_cipher(cipher.clone());

    let rows: Vec<(u32, Vec<u8>)> = (1u32..=1500)
        .map(|d| (d * 2, d.to_string().into_bytes()))
        .collect();

    let dir = MemDirectory::new();
    let mut writer = ColumnStoreWriter::new(&dir, "seg", options.clone()).unwrap();
    let col = writer.column("secret");
    for (doc, value) in &rows {
        writer.write(col, DocId::new(*doc), value).unwrap();
    }
    writer.finish().unwrap();

    let reader = ColumnStoreReader::open(&dir, "seg", options).unwrap();
    let column = reader.column("secret").unwrap().unwrap();
    assert!(column.meta().encrypted);

    let mut it = column.iterator(nautex::ColumnHint::Normal);
    for (doc, value) in &rows {
        assert!(it.next().unwrap());
        assert_eq!(it.value(), DocId::new(*doc));
        assert_eq!(it.payload(), &value[..]);
    }

    // without the cipher the blocks are unreadable
    let reader = ColumnStoreReader::open(&dir, "seg", StoreOptions::default()).unwrap();
    let column = reader.column("secret").unwrap().unwrap();
    let mut it = column.iterator(nautex::ColumnHint::Normal);
    assert!(matches!(it.next(), Err(Error::Corruption(_))));
}

// -- corruption handling ---------------------------------------------------

#[test]
fn test_corrupt_data_block_detected() {
    let tmp = tempfile::TempDir::new().unwrap();
    let dir = FsDirectory::new(tmp.path()).unwrap();
    let rows: Vec<(u32, Vec<u8>)> = (1u32..=100).map(|d| (d, vec![d as u8; 32])).collect();
    write_column(&dir, "seg", "field", &rows);

    // flip a byte in the middle of the data file
    let path = tmp.path().join("seg.csd");
    let mut bytes = std::fs::read(&path).unwrap();
    let mid = bytes.len() / 2;
    bytes[mid] ^= 0x40;
    std::fs::write(&path, bytes).unwrap();

    let reader = open(&dir, "seg");
    let column = reader.column("field").unwrap().unwrap();
    let mut it = column.iterator(nautex::ColumnHint::Normal);
    assert!(matches!(it.next(), Err(Error::Corruption(_))));
}

#[test]
fn test_corrupt_footer_refuses_segment() {
    let tmp = tempfile::TempDir::new().unwrap();
    let dir = FsDirectory::new(tmp.path()).unwrap();
    write_column(&dir, "seg", "field", &[(1, b"v".to_vec())]);

    let path = tmp.path().join("seg.csi");
    let mut bytes = std::fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;
    std::fs::write(&path, bytes).unwrap();

    assert!(matches!(
        ColumnStoreReader::open(&dir, "seg", StoreOptions::default()),
        Err(Error::Corruption(_))
    ));
}

#[test]
fn test_multiple_columns_and_fs_roundtrip() {
    let tmp = tempfile::TempDir::new().unwrap();
    let dir = FsDirectory::new(tmp.path()).unwrap();

    let mut writer = ColumnStoreWriter::new(&dir, "seg", StoreOptions::default()).unwrap();
    let names: Vec<String> = (0..8).map(|i| format!("col_{i}")).collect();
    for (i, name) in names.iter().enumerate() {
        let col = writer.column(name);
        for d in 1u32..=(100 * (i as u32 + 1)) {
            writer
                .write(col, DocId::new(d), format!("{name}:{d}").as_bytes())
                .unwrap();
        }
    }
    let metas = writer.finish().unwrap();
    assert_eq!(metas.len(), 8);

    let reader = open(&dir, "seg");
    assert_eq!(reader.column_count(), 8);
    for (i, name) in names.iter().enumerate() {
        let column = reader.column(name).unwrap().unwrap();
        assert_eq!(column.count(), 100 * (i as u64 + 1));
        assert_eq!(column.id(), i as u64);

        let mut it = column.iterator(nautex::ColumnHint::Normal);
        assert!(it.next().unwrap());
        assert_eq!(it.payload(), format!("{name}:1").as_bytes());
    }

    // id lookup agrees with name lookup
    let by_id = reader.column_by_id(3).unwrap().unwrap();
    assert_eq!(by_id.name(), "col_3");
}
