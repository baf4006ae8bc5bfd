use std::fs::File;
use std::io::Write;
use std::process::Command;

use flux_zip::{ArchiveWriter, CompressionRegistry, DataReaderEntrySource, EntrySource, EntrySourceOptions, WriteArchiveOptions};
use tempfile::tempdir;

// Writes an archive with the library, then calls `unzip -t` against it to verify compatibility
// with a real-world extractor. Skips itself if `unzip` isn't on the system.

#[test]
fn unzip_compatibility() {
    let check = Command::new("unzip").arg("-v").output();
    if check.is_err() {
        eprintln!("skipping test: `unzip` not found");
        return;
    }

    let dir = tempdir().unwrap();
    let zip_path = dir.path().join("compat.zip");

    let mut remaining = vec![
        DataReaderEntrySource::from_bytes(EntrySourceOptions::new("hello.txt"), b"hello from test".to_vec()).unwrap(),
        DataReaderEntrySource::from_bytes(EntrySourceOptions::new("big.bin"), vec![0u8; 1024 * 1024]).unwrap(),
    ];
    remaining.reverse();
    let mut writer = ArchiveWriter::new(
        move || Ok(remaining.pop().map(|e| Box::new(e) as Box<dyn EntrySource>)),
        CompressionRegistry::with_defaults(),
        WriteArchiveOptions::default(),
    );
    let mut file = File::create(&zip_path).unwrap();
    while let Some(chunk) = writer.next_chunk().unwrap() {
        file.write_all(&chunk).unwrap();
    }
    drop(file);

    let output = Command::new("unzip").arg("-t").arg(&zip_path).output().expect("failed to run unzip");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(output.status.success(), "unzip reported failure: {stdout} {stderr}");
}
