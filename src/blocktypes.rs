//! Concrete block kinds layered on [`crate::block::BlockBase`].
//!
//! Grounded directly on `prinbee/block/block_secondary_index.{h,cpp}`: one
//! static [`Description`], one constructor taking the base block, and typed
//! getters/setters that all delegate to the [`Structure`] built over that
//! description.

use crate::block::{BlockBase, DbType};
use crate::error::Result;
use crate::fieldtype::{Description, FieldDescriptor as FD, FieldType};
use crate::structure::{Backing, Structure};
use std::sync::Arc;

/// The `dbtype_t` tag for a secondary-index header block.
pub const DBTYPE_SECONDARY_INDEX: DbType = DbType(u32::from_le_bytes(*b"BSII"));

fn secondary_index_description() -> Arc<Description> {
    Arc::new(Description::new_block(vec![
        FD::always("magic", FieldType::Magic),
        FD::always("structure_version", FieldType::StructureVersion),
        FD::always("id", FieldType::UInt32),
        FD::always("number_of_rows", FieldType::UInt64),
        FD::always("top_index", FieldType::Reference),
        FD::bits("bloom_filter_flags=algorithm:4/renewing", 32, 0, u32::MAX),
        FD::always("end", FieldType::End),
    ]))
}

/// A secondary-index header block: one per secondary index, pointing at
/// the root of that index's own block tree.
pub struct BlockSecondaryIndex {
    base: Arc<BlockBase>,
    structure: Structure,
}

impl BlockSecondaryIndex {
    /// Bind a typed view over `base`, which must already have its page
    /// attached (`BlockBase::attach`) and its kind set to
    /// [`DBTYPE_SECONDARY_INDEX`].
    pub fn new(base: Arc<BlockBase>) -> Self {
        let structure = Structure::new(secondary_index_description(), 1, Backing::Block(base.clone()));
        Self { base, structure }
    }

    pub fn get_id(&self) -> Result<u64> {
        self.structure.get_uinteger("id")
    }

    pub fn set_id(&self, value: u32) -> Result<()> {
        self.structure.set_uinteger("id", value as u64)
    }

    pub fn get_number_of_rows(&self) -> Result<u64> {
        self.structure.get_uinteger("number_of_rows")
    }

    pub fn set_number_of_rows(&self, value: u64) -> Result<()> {
        self.structure.set_uinteger("number_of_rows", value)
    }

    pub fn get_top_index(&self) -> Result<u64> {
        self.structure.get_uinteger("top_index")
    }

    pub fn set_top_index(&self, value: u64) -> Result<()> {
        self.structure.set_uinteger("top_index", value)
    }

    pub fn get_bloom_filter_algorithm(&self) -> Result<u64> {
        self.structure.get_uinteger("bloom_filter_flags.algorithm")
    }

    pub fn set_bloom_filter_algorithm(&self, value: u64) -> Result<()> {
        self.structure.set_uinteger("bloom_filter_flags.algorithm", value)
    }

    pub fn get_bloom_filter_renewing(&self) -> Result<bool> {
        Ok(self.structure.get_uinteger("bloom_filter_flags.renewing")? != 0)
    }

    pub fn set_bloom_filter_renewing(&self, value: bool) -> Result<()> {
        self.structure.set_uinteger("bloom_filter_flags.renewing", value as u64)
    }

    pub fn sync(&self, immediate: bool) {
        self.base.sync(immediate);
    }
}
