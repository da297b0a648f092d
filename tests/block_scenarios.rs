//! Integration coverage for the block + structure layers, built entirely
//! through the crate's public API (no internal helpers).

use std::sync::{Arc, Weak};
use tablecore::block::TableHandle;
use tablecore::dbfile::PageFile;
use tablecore::stg::MemStorage;
use tablecore::structure::Backing;
use tablecore::{BlockBase, DbType, Description, EngineConfig, FieldDescriptor as FD, FieldType, Structure};

struct OneFileTable {
    dbfile: PageFile,
}

impl TableHandle for OneFileTable {
    fn dbfile(&self) -> &PageFile {
        &self.dbfile
    }
}

fn test_page_file() -> PageFile {
    let config = EngineConfig { page_size: 4096, ..EngineConfig::default() };
    PageFile::open(Box::new(MemStorage::new()), &config).unwrap()
}

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

#[test]
fn scenario_secondary_index_block_round_trips_through_sync() {
    let table = Arc::new(OneFileTable {
        dbfile: test_page_file(),
    });
    let offset = table.dbfile.alloc_page();
    let description = secondary_index_description();
    let base = Arc::new(BlockBase::new(description.static_size(), offset, table.dbfile.page_size()));
    base.set_table(Arc::downgrade(&table) as Weak<dyn TableHandle>);
    base.attach();
    base.set_dbtype(DbType(0xB511)).unwrap();

    let structure = Structure::new(description.clone(), 1, Backing::Block(base.clone()));
    structure.set_uinteger("id", 7).unwrap();
    structure.set_uinteger("number_of_rows", 1000).unwrap();
    structure.set_uinteger("top_index", 0x4000).unwrap();
    structure.set_uinteger("bloom_filter_flags.algorithm", 3).unwrap();
    structure.set_uinteger("bloom_filter_flags.renewing", 1).unwrap();
    base.sync(true);
    drop(structure);
    drop(base);

    let base2 = Arc::new(BlockBase::new(description.static_size(), offset, table.dbfile.page_size()));
    base2.set_table(Arc::downgrade(&table) as Weak<dyn TableHandle>);
    base2.attach();
    let reread = Structure::new(description, 1, Backing::Block(base2));
    assert_eq!(reread.get_uinteger("id").unwrap(), 7);
    assert_eq!(reread.get_uinteger("number_of_rows").unwrap(), 1000);
    assert_eq!(reread.get_uinteger("top_index").unwrap(), 0x4000);
    assert_eq!(reread.get_uinteger("bloom_filter_flags.algorithm").unwrap(), 3);
    assert_eq!(reread.get_uinteger("bloom_filter_flags.renewing").unwrap(), 1);
}

#[test]
fn data_accessor_before_attach_is_a_logic_error() {
    let table = Arc::new(OneFileTable {
        dbfile: test_page_file(),
    });
    let offset = table.dbfile.alloc_page();
    let base = Arc::new(BlockBase::new(30, offset, table.dbfile.page_size()));
    base.set_table(Arc::downgrade(&table) as Weak<dyn TableHandle>);
    let mut buf = [0u8; 4];
    assert!(base.read(0, &mut buf).is_err());
}

#[test]
#[should_panic(expected = "defined_twice")]
fn set_table_twice_panics() {
    let table = Arc::new(OneFileTable {
        dbfile: test_page_file(),
    });
    let offset = table.dbfile.alloc_page();
    let base = BlockBase::new(30, offset, table.dbfile.page_size());
    base.set_table(Arc::downgrade(&table) as Weak<dyn TableHandle>);
    base.set_table(Arc::downgrade(&table) as Weak<dyn TableHandle>);
}

#[test]
fn get_static_size_stops_at_first_dynamic_field() {
    let description = secondary_index_description();
    // magic(4) + structure_version(2) + id(4) + number_of_rows(8) + top_index(8) + bloom_filter_flags(4)
    assert_eq!(description.static_size(), 30);
}
