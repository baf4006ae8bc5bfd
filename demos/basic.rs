//! Basic usage example for flux-zip

use std::fs::File;
use std::io::Write;

use flux_zip::{
    Archive, ArchiveOptions, ArchiveWriter, CompressionRegistry, DataReaderEntrySource, EntrySource, EntrySourceOptions,
    WriteArchiveOptions,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== flux-zip Basic Example ===\n");

    println!("Creating test.zip...");
    let mut remaining = vec![
        DataReaderEntrySource::from_bytes(EntrySourceOptions::new("hello.txt"), b"Hello, flux-zip!".to_vec())?,
        DataReaderEntrySource::from_bytes(
            EntrySourceOptions::new("folder/nested.txt"),
            b"This is a nested file.".to_vec(),
        )?,
        DataReaderEntrySource::from_bytes(EntrySourceOptions::new("data.txt"), b"Line 1\nLine 2\nLine 3\n".to_vec())?,
    ];
    remaining.reverse();
    let mut writer = ArchiveWriter::new(
        move || Ok(remaining.pop().map(|e| Box::new(e) as Box<dyn EntrySource>)),
        CompressionRegistry::with_defaults(),
        WriteArchiveOptions::default(),
    );
    let mut file = File::create("test.zip")?;
    while let Some(chunk) = writer.next_chunk()? {
        file.write_all(&chunk)?;
    }
    println!("created test.zip\n");

    println!("Reading test.zip...");
    let archive = Archive::open_file("test.zip", ArchiveOptions::default())?;
    let registry = CompressionRegistry::with_defaults();

    println!("Entries in ZIP:");
    for entry in archive.entries() {
        let entry = entry?;
        println!("  - {} ({} bytes)", entry.name(), entry.uncompressed_size());
    }
    println!();

    println!("Reading hello.txt:");
    if let Some(entry) = archive.find("hello.txt")? {
        let data = entry.read_all(&registry, 16 * 1024 * 1024)?;
        println!("  content: {}", String::from_utf8_lossy(&data));
    }
    println!();

    println!("Reading data.txt:");
    if let Some(entry) = archive.find("data.txt")? {
        let data = entry.read_all(&registry, 16 * 1024 * 1024)?;
        println!("  content:\n{}", String::from_utf8_lossy(&data));
    }

    println!("done");

    Ok(())
}
