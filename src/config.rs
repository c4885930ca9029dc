use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::compression::{Cipher, CompressionRegistry, COMPRESSION_NONE};

/// Serializable knobs for a column store segment
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Registered compression id applied to block payloads; 0 = none
    pub compression: u16,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            compression: COMPRESSION_NONE,
        }
    }
}

/// Runtime options shared by the writer and the reader of a segment
#[derive(Clone, Default)]
pub struct StoreOptions {
    pub config: StoreConfig,
    /// Catalogue of compression back-ends; decoders for every id used by a
    /// segment must be present to read it back
    pub compressions: Arc<CompressionRegistry>,
    /// Optional cipher; when set, block bodies are encrypted after
    /// compression and column headers carry the encrypted flag
    pub cipher: Option<Arc<dyn Cipher>>,
}

impl StoreOptions {
    pub fn with_compression(mut self, id: u16, registry: Arc<CompressionRegistry>) -> Self {
        self.config.compression = id;
        self.compressions = registry;
        self
    }

    pub fn with_cipher(mut self, cipher: Arc<dyn Cipher>) -> Self {
        self.cipher = Some(cipher);
        self
    }

    pub fn encrypted(&self) -> bool {
        self.cipher.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = StoreOptions::default();
        assert_eq!(options.config.compression, COMPRESSION_NONE);
        assert!(!options.encrypted());
    }
}
