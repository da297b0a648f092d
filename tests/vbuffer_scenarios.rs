//! Integration coverage for the virtual-buffer round-trip laws and boundary
//! behaviors.

use tablecore::VirtualBuffer;

#[test]
fn scenario_insert_hello_world() {
    let mut vb = VirtualBuffer::new();
    vb.pinsert(b"hello", 0).unwrap();
    vb.pinsert(b" world", 5).unwrap();
    assert_eq!(vb.size(), 11);
    let mut out = [0u8; 11];
    vb.pread(&mut out, 0, true).unwrap();
    assert_eq!(&out, b"hello world");
    assert!(vb.modified());
}

#[test]
fn pwrite_then_pread_matches_written_bytes() {
    let mut vb = VirtualBuffer::new();
    vb.pwrite(b"abcdefgh", 0, true).unwrap();
    let before_size = vb.size();
    vb.pwrite(b"XY", 2, true).unwrap();
    assert_eq!(vb.size(), before_size);
    let mut out = [0u8; 8];
    vb.pread(&mut out, 0, true).unwrap();
    assert_eq!(&out, b"abXYefgh");
}

#[test]
fn pwrite_past_end_with_growth_extends_buffer() {
    let mut vb = VirtualBuffer::new();
    vb.pwrite(b"abc", 0, true).unwrap();
    vb.pwrite(b"defgh", 3, true).unwrap();
    assert_eq!(vb.size(), 8);
    let mut out = [0u8; 8];
    vb.pread(&mut out, 0, true).unwrap();
    assert_eq!(&out, b"abcdefgh");
}

#[test]
fn pinsert_then_perase_restores_original_bytes() {
    let mut vb = VirtualBuffer::new();
    vb.pwrite(b"0123456789", 0, true).unwrap();
    let original_size = vb.size();
    vb.pinsert(b"XYZ", 4).unwrap();
    vb.perase(3, 4);
    assert_eq!(vb.size(), original_size);
    let mut out = vec![0u8; original_size as usize];
    vb.pread(&mut out, 0, true).unwrap();
    assert_eq!(out, b"0123456789");
    assert!(vb.modified());
}

#[test]
fn zero_length_operations_are_no_ops() {
    let mut vb = VirtualBuffer::new();
    vb.pwrite(b"abc", 0, true).unwrap();
    assert_eq!(vb.pread(&mut [], 0, true).unwrap(), 0);
    vb.pwrite(&[], 0, true).unwrap();
    assert_eq!(vb.perase(0, 0), 0);
    assert_eq!(vb.size(), 3);
}

#[test]
fn perase_past_end_returns_zero_and_leaves_buffer_unmodified() {
    let mut vb = VirtualBuffer::new();
    vb.pwrite(b"abc", 0, true).unwrap();
    assert_eq!(vb.perase(5, 10), 0);
    assert!(!vb.modified());
}

#[test]
fn perase_consuming_everything_leaves_empty_but_modified() {
    let mut vb = VirtualBuffer::new();
    vb.pwrite(b"abc", 0, true).unwrap();
    let removed = vb.perase(3, 0);
    assert_eq!(removed, 3);
    assert_eq!(vb.size(), 0);
    assert_eq!(vb.count_buffers(), 0);
    assert!(vb.modified());
}
