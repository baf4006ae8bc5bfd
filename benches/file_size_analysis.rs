use flate2::Compression;
use flux_zip::{ArchiveWriter, CompressionRegistry, DataReaderEntrySource, EntrySource, EntrySourceOptions, WriteArchiveOptions};

fn generate_compressible_data(size: usize) -> Vec<u8> {
    let pattern = b"The quick brown fox jumps over the lazy dog. ";
    let mut data = Vec::with_capacity(size);
    while data.len() < size {
        data.extend_from_slice(pattern);
    }
    data.truncate(size);
    data
}

fn generate_random_data(size: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(size);
    let mut state = 0x12345678u32;
    for _ in 0..size {
        state = state.wrapping_mul(1103515245).wrapping_add(12345);
        data.push((state >> 16) as u8);
    }
    data
}

fn write_one_entry(data: &[u8], level: Compression) -> u64 {
    let mut opts = EntrySourceOptions::new("test.bin");
    opts.compression_level = level;
    let mut remaining = vec![DataReaderEntrySource::from_bytes(opts, data.to_vec()).unwrap()];
    let mut writer = ArchiveWriter::new(
        move || Ok(remaining.pop().map(|e| Box::new(e) as Box<dyn EntrySource>)),
        CompressionRegistry::with_defaults(),
        WriteArchiveOptions::default(),
    );
    let mut total = 0u64;
    while let Some(chunk) = writer.next_chunk().unwrap() {
        total += chunk.len() as u64;
    }
    total
}

fn test_compression(name: &str, data: &[u8], method_name: &str, level: Compression) {
    let compressed_size = write_one_entry(data, level);
    let original_size = data.len() as u64;
    let ratio = (compressed_size as f64 / original_size as f64) * 100.0;

    println!(
        "{:<20} | {:<15} | {:>12} | {:>12} | {:>8.2}%",
        name,
        method_name,
        format_bytes(original_size),
        format_bytes(compressed_size),
        ratio
    );
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.2} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

fn main() {
    println!("\n╔════════════════════════════════════════════════════════════════════════════╗");
    println!("║                    flux-zip File Size Analysis                               ║");
    println!("╚════════════════════════════════════════════════════════════════════════════╝\n");

    println!(
        "{:<20} | {:<15} | {:>12} | {:>12} | {:>8}",
        "Data Type", "Method", "Original", "Compressed", "Ratio"
    );
    println!("{:-<20}-+-{:-<15}-+-{:->12}-+-{:->12}-+-{:->8}", "", "", "", "", "");

    let compressible_1mb = generate_compressible_data(1024 * 1024);
    test_compression("Compressible 1MB", &compressible_1mb, "DEFLATE lvl 1", Compression::new(1));
    test_compression("Compressible 1MB", &compressible_1mb, "DEFLATE lvl 6", Compression::new(6));
    test_compression("Compressible 1MB", &compressible_1mb, "DEFLATE lvl 9", Compression::new(9));

    println!();

    let random_1mb = generate_random_data(1024 * 1024);
    test_compression("Random 1MB", &random_1mb, "DEFLATE lvl 6", Compression::new(6));
    test_compression("Random 1MB", &random_1mb, "DEFLATE lvl 9", Compression::new(9));

    println!();

    let compressible_10mb = generate_compressible_data(10 * 1024 * 1024);
    test_compression("Compressible 10MB", &compressible_10mb, "DEFLATE lvl 6", Compression::new(6));
    test_compression("Compressible 10MB", &compressible_10mb, "DEFLATE lvl 9", Compression::new(9));

    println!("\n");
}
