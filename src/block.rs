//! Base block contract: a typed view over exactly one page.
//!
//! Wraps a lower allocator ([`crate::dbfile::PageFile`]) behind a typed
//! handle, the way `BlockStg` wraps its own allocator. The allocation/
//! free-list logic lives in `dbfile.rs`; this module only implements the
//! once-per-page *view* contract: magic/type tag, structure version,
//! attach/detach of the backing page, and zero-on-type-change semantics.

use crate::dbfile::{PageData, PageFile, PageRef};
use crate::error::{CoreError, Result};
use std::sync::{Arc, Weak};

/// A block's 4-byte kind tag. The spec enumerates kinds loosely (free,
/// index-header, index-node, data, schema, secondary-index header, ...);
/// this crate keeps the list open via a raw `u32` wrapper rather than a
/// closed enum, since new block kinds are routinely added by block-variant
/// authors in `blocktypes.rs` without touching this module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DbType(pub u32);

impl DbType {
    pub const FREE: DbType = DbType(0);
}

/// Non-owning back-reference to whatever external collaborator owns this
/// block's page file. Resolves the block/table ownership cycle this way:
/// the table owns blocks by offset-keyed map, a block only borrows its
/// table via a weak reference, so a destroyed block never outlives (and
/// never keeps alive) its table.
pub trait TableHandle: Send + Sync {
    fn dbfile(&self) -> &PageFile;
}

/// A typed view over one page: magic tag, structure version, and payload
/// bytes, attached to a [`PageFile`] page.
pub struct BlockBase {
    table: parking_lot::Mutex<Option<Weak<dyn TableHandle>>>,
    static_size: u64,
    offset: PageRef,
    data: parking_lot::Mutex<Option<PageData>>,
    page_size: u32,
}

impl BlockBase {
    /// Construct a block bound to `offset`, whose description's static
    /// header occupies `static_size` bytes. Mirrors the original's
    /// protected constructor, which validates that `descriptions[0]` is
    /// `MAGIC` and `descriptions[1]` is `STRUCTURE_VERSION` — that check
    /// lives in [`crate::fieldtype::Description::new_block`], run by every
    /// caller before a `BlockBase` is built.
    pub fn new(static_size: u64, offset: PageRef, page_size: u32) -> Self {
        Self {
            table: parking_lot::Mutex::new(None),
            static_size,
            offset,
            data: parking_lot::Mutex::new(None),
            page_size,
        }
    }

    pub fn offset(&self) -> PageRef {
        self.offset
    }

    /// Attach this block to the table that owns its page file. May be
    /// called at most once; a second call is a programming error
    /// (`defined_twice` in the original).
    pub fn set_table(&self, table: Weak<dyn TableHandle>) {
        let mut slot = self.table.lock();
        assert!(slot.is_none(), "block::set_table() called twice (defined_twice)");
        *slot = Some(table);
    }

    fn with_table<R>(&self, f: impl FnOnce(&dyn TableHandle) -> R) -> R {
        let slot = self.table.lock();
        let weak = slot.as_ref().expect("block has no table attached");
        let strong = weak.upgrade().expect("block outlived its table");
        f(strong.as_ref())
    }

    /// Fault the page in (or attach an already-materialized page) so data
    /// accessors stop failing. Mirrors `set_data()` in the original.
    pub fn attach(&self) {
        let data = self.with_table(|t| t.dbfile().get_page(self.offset));
        *self.data.lock() = Some(data);
    }

    fn page_data(&self) -> Result<PageData> {
        self.data.lock().clone().ok_or_else(|| {
            CoreError::LogicError("block::data() called before set_data().".to_string())
        })
    }

    /// Read `buf.len()` bytes starting at within-page `offset`.
    pub fn read(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let page = self.page_data()?;
        let bytes = page.lock();
        let local = (offset % self.page_size as u64) as usize;
        buf.copy_from_slice(&bytes[local..local + buf.len()]);
        Ok(())
    }

    /// Write `buf` starting at within-page `offset`.
    pub fn write(&self, offset: u64, buf: &[u8]) -> Result<()> {
        let page = self.page_data()?;
        let mut bytes = page.lock();
        let local = (offset % self.page_size as u64) as usize;
        bytes[local..local + buf.len()].copy_from_slice(buf);
        Ok(())
    }

    /// The first four bytes of the block, reinterpreted as a `DbType`.
    pub fn get_dbtype(&self) -> Result<DbType> {
        let mut buf = [0u8; 4];
        self.read(0, &mut buf)?;
        Ok(DbType(u32::from_le_bytes(buf)))
    }

    /// Write the block's kind tag. Per the original: only re-zeroes the
    /// static header past the magic when the VALUE actually changes —
    /// calling this twice with the same type is a no-op, not a reset.
    pub fn set_dbtype(&self, kind: DbType) -> Result<()> {
        let current = self.get_dbtype().unwrap_or(DbType::FREE);
        let buf = kind.0.to_le_bytes();
        self.write(0, &buf)?;
        if current != kind {
            // type actually changed: rezero the static header past the magic
            let zero = vec![0u8; (self.static_size - 4) as usize];
            self.write(4, &zero)?;
        }
        Ok(())
    }

    /// Zero every byte past the static header. A programming error to call
    /// on a block whose structure has no dynamic region distinction to speak
    /// of (`static_size == 0` — "the structure ... cannot be dynamic").
    pub fn clear_block(&self) -> Result<()> {
        assert!(self.static_size > 0, "the structure of this block cannot be dynamic");
        let zero = vec![0u8; (self.page_size as u64 - self.static_size) as usize];
        self.write(self.static_size, &zero)
    }

    /// `base + (offset mod page_size)`, i.e. the within-page address a
    /// reference-typed field offset maps to for this block.
    pub fn data_offset(&self, offset: u64) -> u64 {
        offset % self.page_size as u64
    }

    /// Flush this block's page. `immediate` forces durability.
    pub fn sync(&self, immediate: bool) {
        self.with_table(|t| {
            t.dbfile().mark_dirty(self.offset);
            t.dbfile().sync(self.offset, immediate);
        });
    }
}

impl Drop for BlockBase {
    fn drop(&mut self) {
        if self.data.lock().is_some() {
            let slot = self.table.lock();
            match slot.as_ref().and_then(Weak::upgrade) {
                Some(table) => {
                    table
                        .dbfile()
                        .release(self.offset)
                        .expect("releasing a block's page on drop must not fail");
                }
                None => {
                    // Construction-order bug: a block with live data but no
                    // table to release it through. The original terminates
                    // the process here rather than leaking the refcount.
                    panic!("block dropped with attached data but no table reference");
                }
            }
        }
    }
}

/// Small helper trait used by [`crate::structure::Backing`] so the same
/// `BlockBase` reference can be shared between a `Structure` bound directly
/// to a block and the virtual-buffer segments that reference the same page.
pub type BlockHandle = Arc<BlockBase>;
