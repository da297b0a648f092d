//! On-disk page file round-trip, using a real temp file rather than the
//! in-memory storage double.

use tablecore::dbfile::PageFile;
use tablecore::stg::SimpleFileStorage;
use tablecore::EngineConfig;

#[test]
fn pages_survive_a_reopen_of_the_same_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("table.dat");
    let path_str = path.to_str().unwrap().to_string();
    let config = EngineConfig { page_size: 4096, ..EngineConfig::default() };

    let offset = {
        let storage = SimpleFileStorage::new(&path_str).unwrap();
        let pf = PageFile::open(Box::new(storage), &config).unwrap();
        let offset = pf.alloc_page();
        let data = pf.get_page(offset);
        data.lock()[0..4].copy_from_slice(b"ABCD");
        pf.mark_dirty(offset);
        pf.sync(offset, true);
        pf.release(offset).unwrap();
        offset
    };

    let storage = SimpleFileStorage::new(&path_str).unwrap();
    let pf = PageFile::open(Box::new(storage), &config).unwrap();
    let data = pf.get_page(offset);
    assert_eq!(&data.lock()[0..4], b"ABCD");
    pf.release(offset).unwrap();
}
