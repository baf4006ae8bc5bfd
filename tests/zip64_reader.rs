use std::fs::File;
use std::io::{Seek, Write};

use flux_zip::{Archive, ArchiveOptions};
use tempfile::tempdir;

// Hand-crafts a minimal ZIP64 archive with one entry: local header + data descriptor with
// 64-bit sizes, a central directory record carrying a ZIP64 extra field, a ZIP64 EOCD record
// and locator, and a classic EOCD with placeholder sentinels. Then opens it through `Archive`.

#[test]
fn read_zip64_crafted() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("zip64_test.zip");
    let mut f = File::create(&path).unwrap();

    f.write_all(&[0x50, 0x4b, 0x03, 0x04]).unwrap(); // local file header signature
    f.write_all(&[20, 0]).unwrap(); // version needed
    f.write_all(&[8, 0]).unwrap(); // flags: data descriptor
    f.write_all(&[0, 0]).unwrap(); // compression method: store
    f.write_all(&[0, 0, 0, 0]).unwrap(); // mod time/date
    f.write_all(&0u32.to_le_bytes()).unwrap(); // crc placeholder
    f.write_all(&0xFFFFFFFFu32.to_le_bytes()).unwrap(); // compressed size placeholder
    f.write_all(&0xFFFFFFFFu32.to_le_bytes()).unwrap(); // uncompressed size placeholder
    f.write_all(&(5u16).to_le_bytes()).unwrap(); // name length
    f.write_all(&0u16.to_le_bytes()).unwrap(); // extra length
    f.write_all(b"a.txt").unwrap();

    let data = b"hello";
    let local_header_offset = 0u64;
    let data_offset = f.stream_position().unwrap();
    f.write_all(data).unwrap();

    let crc = crc32fast::hash(data);
    f.write_all(&[0x50, 0x4b, 0x07, 0x08]).unwrap(); // data descriptor signature
    f.write_all(&crc.to_le_bytes()).unwrap();
    f.write_all(&(data.len() as u64).to_le_bytes()).unwrap(); // compressed size (64-bit)
    f.write_all(&(data.len() as u64).to_le_bytes()).unwrap(); // uncompressed size (64-bit)
    let _ = data_offset;

    let cd_start = f.stream_position().unwrap();

    f.write_all(&[0x50, 0x4b, 0x01, 0x02]).unwrap(); // central directory signature
    f.write_all(&[20, 0]).unwrap(); // version made by
    f.write_all(&[20, 0]).unwrap(); // version needed
    f.write_all(&[8, 0]).unwrap(); // flags
    f.write_all(&[0, 0]).unwrap(); // compression method
    f.write_all(&[0, 0, 0, 0]).unwrap(); // mod time/date
    f.write_all(&crc.to_le_bytes()).unwrap();
    f.write_all(&0xFFFFFFFFu32.to_le_bytes()).unwrap(); // compressed size sentinel
    f.write_all(&0xFFFFFFFFu32.to_le_bytes()).unwrap(); // uncompressed size sentinel
    f.write_all(&(5u16).to_le_bytes()).unwrap(); // name len
    f.write_all(&(28u16).to_le_bytes()).unwrap(); // extra len: header(4) + data(24)
    f.write_all(&0u16.to_le_bytes()).unwrap(); // comment len
    f.write_all(&0u16.to_le_bytes()).unwrap(); // disk start
    f.write_all(&0u16.to_le_bytes()).unwrap(); // internal attrs
    f.write_all(&0u32.to_le_bytes()).unwrap(); // external attrs
    f.write_all(&0xFFFFFFFFu32.to_le_bytes()).unwrap(); // local header offset sentinel
    f.write_all(b"a.txt").unwrap();
    f.write_all(&0x0001u16.to_le_bytes()).unwrap(); // extra tag: ZIP64
    f.write_all(&(24u16).to_le_bytes()).unwrap(); // extra data length
    f.write_all(&(data.len() as u64).to_le_bytes()).unwrap(); // uncompressed size
    f.write_all(&(data.len() as u64).to_le_bytes()).unwrap(); // compressed size
    f.write_all(&local_header_offset.to_le_bytes()).unwrap(); // local header offset

    let cd_end = f.stream_position().unwrap();
    let cd_size = cd_end - cd_start;

    let zip64_eocd_start = f.stream_position().unwrap();
    f.write_all(&[0x50, 0x4b, 0x06, 0x06]).unwrap(); // ZIP64 EOCD signature
    f.write_all(&(44u64).to_le_bytes()).unwrap(); // record size, not counting sig+size field
    f.write_all(&[20, 0]).unwrap(); // version made by
    f.write_all(&[20, 0]).unwrap(); // version needed
    f.write_all(&0u32.to_le_bytes()).unwrap(); // disk number
    f.write_all(&0u32.to_le_bytes()).unwrap(); // disk with central directory start
    f.write_all(&(1u64).to_le_bytes()).unwrap(); // entries on this disk
    f.write_all(&(1u64).to_le_bytes()).unwrap(); // total entries
    f.write_all(&cd_size.to_le_bytes()).unwrap();
    f.write_all(&cd_start.to_le_bytes()).unwrap();

    f.write_all(&[0x50, 0x4b, 0x06, 0x07]).unwrap(); // ZIP64 EOCD locator signature
    f.write_all(&0u32.to_le_bytes()).unwrap(); // disk with ZIP64 EOCD
    f.write_all(&zip64_eocd_start.to_le_bytes()).unwrap();
    f.write_all(&1u32.to_le_bytes()).unwrap(); // total disks

    f.write_all(&[0x50, 0x4b, 0x05, 0x06]).unwrap(); // classic EOCD signature
    f.write_all(&0u16.to_le_bytes()).unwrap(); // disk number
    f.write_all(&0u16.to_le_bytes()).unwrap(); // disk with central directory
    f.write_all(&0xFFFFu16.to_le_bytes()).unwrap(); // entries on disk sentinel
    f.write_all(&0xFFFFu16.to_le_bytes()).unwrap(); // total entries sentinel
    f.write_all(&0xFFFFFFFFu32.to_le_bytes()).unwrap(); // cd size sentinel
    f.write_all(&0xFFFFFFFFu32.to_le_bytes()).unwrap(); // cd offset sentinel
    f.write_all(&0u16.to_le_bytes()).unwrap(); // comment len

    f.flush().unwrap();

    let archive = Archive::open_file(&path, ArchiveOptions::default()).expect("should open crafted zip64");
    assert!(archive.is_zip64());
    assert_eq!(archive.total_entries(), 1);
    let entry = archive.find("a.txt").unwrap().expect("entry present");
    assert_eq!(entry.name(), "a.txt");
    assert_eq!(entry.uncompressed_size(), data.len() as u64);

    let registry = flux_zip::CompressionRegistry::with_defaults();
    let read_back = entry.read_all(&registry, 1024).unwrap();
    assert_eq!(read_back, data);
}
