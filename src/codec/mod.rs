//! Low-level byte stream primitives shared by the on-disk formats

pub mod checksum;
pub mod varint;

pub use checksum::{crc64, xor64};
pub use varint::{
    read_u16_le, read_u32_le, read_u64_le, read_varint, read_varint_u32, read_zigzag,
    write_u16_le, write_u32_le, write_u64_le, write_varint, write_zigzag,
};
