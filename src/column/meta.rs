//! Column metadata and the index-file layout
//!
//! The index file is a sequence of column header records followed by a
//! footer. The footer carries the magic, format version, column count, one
//! absolute offset per column header and a checksum, so each header is
//! addressable without parsing its neighbours.

use crate::codec::{
    crc64, read_u16_le, read_u32_le, read_u64_le, read_varint, read_varint_u32, read_zigzag,
    write_u16_le, write_u32_le, write_u64_le, write_varint, write_zigzag,
};
use crate::doc::DocId;
use crate::error::{Error, Result};

/// Stable per-segment column identifier
pub type ColumnId = u64;

/// Number of keys per block; the unit of compression and variant selection
pub const BLOCK_SIZE: u32 = 1024;

/// Index file footer magic
pub const FOOTER_MAGIC: u32 = 0xC01D_C01D;

/// Current on-disk format version
pub const FORMAT_VERSION: u32 = 1;

/// Data file extension
pub const DATA_EXTENSION: &str = "csd";
/// Index file extension
pub const INDEX_EXTENSION: &str = "csi";

/// Physical layout of a single block, chosen at flush time from the block's
/// density and value-size distribution
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BlockVariant {
    /// Every key in the span present, all values the same length
    DenseFixed = 0,
    /// Every key present, varying value lengths
    DenseVariable = 1,
    /// Subset of keys present, all values the same length
    SparseFixed = 2,
    /// Subset of keys present, varying value lengths
    SparseVariable = 3,
    /// Every key present, zero-length values; membership only
    DenseMask = 4,
    /// Subset of keys present, zero-length values; membership only
    SparseMask = 5,
}

impl BlockVariant {
    pub fn from_tag(tag: u8) -> Result<Self> {
        Ok(match tag {
            0 => Self::DenseFixed,
            1 => Self::DenseVariable,
            2 => Self::SparseFixed,
            3 => Self::SparseVariable,
            4 => Self::DenseMask,
            5 => Self::SparseMask,
            _ => return Err(Error::Corruption(format!("unknown block variant {tag}"))),
        })
    }

    pub fn is_sparse(self) -> bool {
        matches!(
            self,
            Self::SparseFixed | Self::SparseVariable | Self::SparseMask
        )
    }

    pub fn is_mask(self) -> bool {
        matches!(self, Self::DenseMask | Self::SparseMask)
    }

    pub fn is_fixed(self) -> bool {
        matches!(self, Self::DenseFixed | Self::SparseFixed)
    }
}

/// Entry in a column's block index
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockEntry {
    /// First present key in the block
    pub first_doc: DocId,
    /// Absolute offset of the block frame in the data file
    pub data_offset: u64,
    /// Frame size in bytes, checksum trailer included
    pub size: u32,
    pub variant: BlockVariant,
    /// Reserved compact parameter byte
    pub extra: u8,
}

/// Per-column header persisted in the index file
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnMeta {
    pub id: ColumnId,
    pub name: String,
    /// Total number of live keys
    pub count: u64,
    pub min_doc: DocId,
    pub max_doc: DocId,
    /// Registered compression id; 0 = none
    pub compression: u16,
    pub encrypted: bool,
    pub blocks: Vec<BlockEntry>,
}

impl ColumnMeta {
    /// Number of keys stored in block `idx`.
    ///
    /// Every block except the last holds exactly `BLOCK_SIZE` keys; the
    /// count is derived rather than persisted.
    pub fn block_count(&self, idx: usize) -> u32 {
        debug_assert!(idx < self.blocks.len());
        if idx + 1 < self.blocks.len() {
            BLOCK_SIZE
        } else {
            (self.count - BLOCK_SIZE as u64 * (self.blocks.len() as u64 - 1)) as u32
        }
    }

    /// Serialize the header record, trailer checksum included
    pub fn write(&self, output: &mut Vec<u8>) {
        let start = output.len();

        write_u64_le(self.id, output);
        write_varint(self.name.len() as u64, output);
        output.extend_from_slice(self.name.as_bytes());
        write_varint(self.count, output);
        write_varint(self.min_doc.as_u32() as u64, output);
        write_varint(self.max_doc.as_u32() as u64, output);
        write_u16_le(self.compression, output);
        output.push(self.encrypted as u8);
        write_varint(self.blocks.len() as u64, output);

        let mut last_key = 0u32;
        let mut last_offset = 0i64;
        for block in &self.blocks {
            write_varint((block.first_doc.as_u32() - last_key) as u64, output);
            write_zigzag(block.data_offset as i64 - last_offset, output);
            write_varint(block.size as u64, output);
            output.push(block.variant as u8);
            output.push(block.extra);
            last_key = block.first_doc.as_u32();
            last_offset = block.data_offset as i64;
        }

        let crc = crc64(&output[start..]);
        write_u64_le(crc, output);
    }

    /// Parse a header record starting at `*pos`, verifying its trailer
    pub fn read(input: &[u8], pos: &mut usize) -> Result<Self> {
        let start = *pos;

        let id = read_u64_le(input, pos)?;
        let name_len = read_varint(input, pos)? as usize;
        let name_bytes = input
            .get(*pos..*pos + name_len)
            .ok_or_else(|| Error::Corruption("truncated column name".to_string()))?;
        let name = std::str::from_utf8(name_bytes)
            .map_err(|_| Error::Corruption("column name is not UTF-8".to_string()))?
            .to_string();
        *pos += name_len;

        let count = read_varint(input, pos)?;
        let min_doc = DocId::new(read_varint_u32(input, pos)?);
        let max_doc = DocId::new(read_varint_u32(input, pos)?);
        let compression = read_u16_le(input, pos)?;
        let encrypted = match input.get(*pos).copied() {
            Some(0) => false,
            Some(1) => true,
            _ => return Err(Error::Corruption("bad encryption flag".to_string())),
        };
        *pos += 1;

        let block_count = read_varint(input, pos)? as usize;
        let mut blocks = Vec::with_capacity(block_count);
        let mut last_key = 0u32;
        let mut last_offset = 0i64;
        for _ in 0..block_count {
            let first_doc = last_key + read_varint_u32(input, pos)?;
            let data_offset = last_offset + read_zigzag(input, pos)?;
            if data_offset < 0 {
                return Err(Error::Corruption("negative block offset".to_string()));
            }
            let size = read_varint_u32(input, pos)?;
            let variant = BlockVariant::from_tag(
                input
                    .get(*pos)
                    .copied()
                    .ok_or_else(|| Error::Corruption("truncated block entry".to_string()))?,
            )?;
            *pos += 1;
            let extra = input
                .get(*pos)
                .copied()
                .ok_or_else(|| Error::Corruption("truncated block entry".to_string()))?;
            *pos += 1;

            blocks.push(BlockEntry {
                first_doc: DocId::new(first_doc),
                data_offset: data_offset as u64,
                size,
                variant,
                extra,
            });
            last_key = first_doc;
            last_offset = data_offset;
        }

        let expected = crc64(&input[start..*pos]);
        let stored = read_u64_le(input, pos)?;
        if expected != stored {
            return Err(Error::Corruption(format!(
                "column header checksum mismatch for '{name}'"
            )));
        }

        Ok(Self {
            id,
            name,
            count,
            min_doc,
            max_doc,
            compression,
            encrypted,
            blocks,
        })
    }
}

/// Index file footer: magic, version, per-column header offsets, checksum
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Footer {
    pub version: u32,
    pub offsets: Vec<u64>,
}

impl Footer {
    pub fn write(&self, output: &mut Vec<u8>) {
        let start = output.len();
        write_u32_le(FOOTER_MAGIC, output);
        write_u32_le(self.version, output);
        write_u32_le(self.offsets.len() as u32, output);
        for &offset in &self.offsets {
            write_u64_le(offset, output);
        }
        let crc = crc64(&output[start..]);
        write_u64_le(crc, output);
    }

    fn size_for(columns: usize) -> usize {
        4 + 4 + 4 + 8 * columns + 8
    }

    /// Locate and parse the footer at the tail of the index file.
    ///
    /// The footer length depends on the column count it itself carries, so
    /// candidate counts are probed from the tail; a candidate only parses
    /// when the magic, the embedded count and the checksum all agree.
    pub fn read(index: &[u8]) -> Result<Self> {
        for columns in 0.. {
            let size = Self::size_for(columns);
            if size > index.len() {
                break;
            }
            let start = index.len() - size;
            let mut pos = start;
            if read_u32_le(index, &mut pos)? != FOOTER_MAGIC {
                continue;
            }
            let version = read_u32_le(index, &mut pos)?;
            let stored_columns = read_u32_le(index, &mut pos)? as usize;
            if stored_columns != columns {
                continue;
            }

            let expected = crc64(&index[start..index.len() - 8]);
            let mut crc_pos = index.len() - 8;
            if read_u64_le(index, &mut crc_pos)? != expected {
                // either corruption or a false probe hit; keep probing
                continue;
            }
            if version != FORMAT_VERSION {
                return Err(Error::Corruption(format!(
                    "unsupported format version {version}"
                )));
            }

            let mut offsets = Vec::with_capacity(columns);
            for _ in 0..columns {
                offsets.push(read_u64_le(index, &mut pos)?);
            }
            return Ok(Self { version, offsets });
        }

        Err(Error::Corruption("index footer not found".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_meta() -> ColumnMeta {
        ColumnMeta {
            id: 3,
            name: "title".to_string(),
            count: 2048,
            min_doc: DocId::new(1),
            max_doc: DocId::new(5000),
            compression: 0,
            encrypted: false,
            blocks: vec![
                BlockEntry {
                    first_doc: DocId::new(1),
                    data_offset: 0,
                    size: 900,
                    variant: BlockVariant::DenseVariable,
                    extra: 0,
                },
                BlockEntry {
                    first_doc: DocId::new(2100),
                    data_offset: 908,
                    size: 512,
                    variant: BlockVariant::SparseFixed,
                    extra: 0,
                },
            ],
        }
    }

    #[test]
    fn test_header_roundtrip() {
        let meta = sample_meta();
        let mut buf = Vec::new();
        meta.write(&mut buf);

        let mut pos = 0;
        let parsed = ColumnMeta::read(&buf, &mut pos).unwrap();
        assert_eq!(parsed, meta);
        assert_eq!(pos, buf.len());
    }

    #[test]
    fn test_header_checksum_detects_corruption() {
        let meta = sample_meta();
        let mut buf = Vec::new();
        meta.write(&mut buf);
        buf[3] ^= 0x01;

        let mut pos = 0;
        assert!(ColumnMeta::read(&buf, &mut pos).is_err());
    }

    #[test]
    fn test_block_count_derivation() {
        let meta = sample_meta();
        assert_eq!(meta.block_count(0), BLOCK_SIZE);
        assert_eq!(meta.block_count(1), 1024);
    }

    #[test]
    fn test_footer_roundtrip() {
        let footer = Footer {
            version: FORMAT_VERSION,
            offsets: vec![0, 117, 4099],
        };
        let mut buf = vec![0xAA; 64]; // header bytes before the footer
        footer.write(&mut buf);

        let parsed = Footer::read(&buf).unwrap();
        assert_eq!(parsed, footer);
    }

    #[test]
    fn test_footer_roundtrip_no_columns() {
        let footer = Footer {
            version: FORMAT_VERSION,
            offsets: vec![],
        };
        let mut buf = Vec::new();
        footer.write(&mut buf);
        assert_eq!(Footer::read(&buf).unwrap(), footer);
    }

    #[test]
    fn test_footer_rejects_bad_magic() {
        let mut buf = vec![0u8; 28];
        buf[0] = 0x42;
        assert!(Footer::read(&buf).is_err());
    }

    #[test]
    fn test_footer_rejects_bad_version() {
        let footer = Footer {
            version: FORMAT_VERSION + 1,
            offsets: vec![],
        };
        let mut buf = Vec::new();
        footer.write(&mut buf);
        assert!(Footer::read(&buf).is_err());
    }

    #[test]
    fn test_variant_tags() {
        for tag in 0..6u8 {
            let variant = BlockVariant::from_tag(tag).unwrap();
            assert_eq!(variant as u8, tag);
        }
        assert!(BlockVariant::from_tag(6).is_err());
    }
}
