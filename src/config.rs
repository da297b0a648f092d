//! Ambient configuration carried by the storage core.
//!
//! Grounded in `pstore.rs`'s `SharedPagedData` constants (`EP_SIZE`,
//! `stash.mem_limit`) and in the schema's own table-level tunables
//! (default replication factor, blob inlining limit). `serde` is already a
//! teacher dependency; reusing it here lets an out-of-scope collaborator
//! (the daemon) load this from its own config file without this crate
//! pulling in a second config-parsing crate.

use serde::{Deserialize, Serialize};

/// Tunable parameters for the storage core, independent of any one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Fixed page size in bytes. Must be a power of two, at least 4096.
    pub page_size: u32,
    /// Soft cap, in bytes, on the memory used by cached pages before eviction.
    pub cache_mem_limit: usize,
    /// Default replication factor assigned to a table that doesn't specify one.
    pub default_replication_factor: u8,
    /// Default byte threshold above which a blob column value is stored
    /// out-of-line rather than inlined in its row.
    pub default_blob_inline_limit: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            page_size: 8192,
            cache_mem_limit: 10 * 1024 * 1024,
            default_replication_factor: 1,
            default_blob_inline_limit: 256,
        }
    }
}

impl EngineConfig {
    /// `page_size` must be a power of two and at least 4096 bytes.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.page_size < 4096 || !self.page_size.is_power_of_two() {
            return Err(crate::error::CoreError::OutOfRange(format!(
                "page_size must be a power of two >= 4096, got {}",
                self.page_size
            )));
        }
        if self.default_replication_factor == 0 {
            return Err(crate::error::CoreError::OutOfRange(
                "default_replication_factor must be in 1..=255".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn non_power_of_two_page_size_rejected() {
        let cfg = EngineConfig {
            page_size: 5000,
            ..EngineConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
