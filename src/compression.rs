//! Compression and encryption hooks for block payloads
//!
//! Back-ends are external collaborators; the store only needs a pair of pure
//! functions per registered id. The catalogue is built explicitly by the
//! application and passed in through `StoreOptions` — there is no implicit
//! process-wide registration. Id 0 is reserved for uncompressed storage.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};

/// Registered id meaning "no compression"
pub const COMPRESSION_NONE: u16 = 0;

/// A block payload compressor
pub trait Compression: Send + Sync {
    /// Compress `input`, appending to `output`
    fn encode(&self, input: &[u8], output: &mut Vec<u8>);

    /// Decompress `input`; `expected_len` is the exact uncompressed size
    fn decode(&self, input: &[u8], expected_len: usize) -> Result<Vec<u8>>;
}

/// Length-preserving block cipher applied after compression
pub trait Cipher: Send + Sync {
    fn encrypt(&self, block_offset: u64, data: &mut [u8]) -> Result<()>;
    fn decrypt(&self, block_offset: u64, data: &mut [u8]) -> Result<()>;
}

/// Explicit catalogue of compression back-ends keyed by id
#[derive(Default, Clone)]
pub struct CompressionRegistry {
    by_id: HashMap<u16, Arc<dyn Compression>>,
}

impl CompressionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a back-end; id 0 is reserved
    pub fn register(&mut self, id: u16, compression: Arc<dyn Compression>) -> Result<()> {
        if id == COMPRESSION_NONE {
            return Err(Error::InvalidArgument(
                "compression id 0 is reserved".to_string(),
            ));
        }
        self.by_id.insert(id, compression);
        Ok(())
    }

    pub fn get(&self, id: u16) -> Option<Arc<dyn Compression>> {
        self.by_id.get(&id).cloned()
    }

    /// Resolve a decoder for data already on disk; unknown ids mean the
    /// segment cannot be read
    pub fn resolve(&self, id: u16) -> Result<Arc<dyn Compression>> {
        self.get(id)
            .ok_or_else(|| Error::Corruption(format!("unresolvable compression id {id}")))
    }
}
