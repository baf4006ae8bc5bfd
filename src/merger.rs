//! Zero-recompression archive merge: plans a name-filtered, path-rewritten copy across one or
//! more input archives and hands the plan to an [`ArchiveWriter`] (§4.7).

use std::rc::Rc;

use crate::archive::Archive;
use crate::byte_source::ByteSource;
use crate::central_directory::EntryRecord;
use crate::compression::CompressionRegistry;
use crate::entry_reader::EntryReader;
use crate::entry_source::{ArchiveEntryEntrySource, EntrySource};
use crate::error::Result;
use crate::writer::{ArchiveWriter, WriteArchiveOptions};

/// One input archive plus how to select and rename its entries for the merged output.
pub struct MergeSource {
    archive: Rc<Archive>,
    base_path: Option<String>,
    destination_path: Option<String>,
    filter: Option<Box<dyn Fn(&str) -> bool>>,
}

impl MergeSource {
    pub fn new(archive: Rc<Archive>) -> Self {
        Self {
            archive,
            base_path: None,
            destination_path: None,
            filter: None,
        }
    }

    /// Only entries whose decoded name starts with `base_path` are copied, and `base_path` is
    /// stripped from the destination name.
    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = Some(base_path.into());
        self
    }

    /// Prefixes every copied entry's destination name with `destination_path`.
    pub fn with_destination_path(mut self, destination_path: impl Into<String>) -> Self {
        self.destination_path = Some(destination_path.into());
        self
    }

    /// An additional predicate over the (pre-strip) decoded name; entries for which it returns
    /// `false` are skipped. Composes with `base_path`, not a replacement for it.
    pub fn with_filter(mut self, filter: impl Fn(&str) -> bool + 'static) -> Self {
        self.filter = Some(Box::new(filter));
        self
    }

    fn matches(&self, name: &str) -> bool {
        if let Some(base) = &self.base_path {
            if !name.starts_with(base.as_str()) {
                return false;
            }
        }
        self.filter.as_ref().map(|f| f(name)).unwrap_or(true)
    }

    fn destination_name(&self, name: &str) -> String {
        let stripped = match &self.base_path {
            Some(base) => name.strip_prefix(base.as_str()).unwrap_or(name),
            None => name,
        };
        match &self.destination_path {
            Some(dest) => format!("{dest}{stripped}"),
            None => stripped.to_string(),
        }
    }
}

struct PlannedEntry {
    byte_source: Rc<dyn ByteSource>,
    record: EntryRecord,
    destination_name: String,
}

/// Merges entries from any number of [`MergeSource`]s into a single output archive, preserving
/// each source's entry order and the order sources were added, without deduplicating names
/// across sources (§4.7).
#[derive(Default)]
pub struct ArchiveMerger {
    sources: Vec<MergeSource>,
}

impl ArchiveMerger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_source(&mut self, source: MergeSource) -> &mut Self {
        self.sources.push(source);
        self
    }

    /// Scans every source's central directory to build the copy plan, then returns an
    /// [`ArchiveWriter`] whose entry factory streams each planned entry's payload through
    /// unchanged, with no recompression and no CRC recomputation.
    pub fn output_archive(&self, registry: CompressionRegistry, options: WriteArchiveOptions) -> Result<ArchiveWriter> {
        let mut planned = Vec::new();
        for source in &self.sources {
            for record in source.archive.raw_entries() {
                let record = record?;
                let name = record.decoded_name();
                if !source.matches(&name) {
                    continue;
                }
                let destination_name = source.destination_name(&name);
                planned.push(PlannedEntry {
                    byte_source: source.archive.source_handle(),
                    record,
                    destination_name,
                });
            }
        }

        let mut remaining = planned.into_iter();
        Ok(ArchiveWriter::new(
            move || match remaining.next() {
                Some(planned) => {
                    let reader = EntryReader::new(planned.byte_source, planned.record);
                    let source = ArchiveEntryEntrySource::new(planned.destination_name, &reader)?;
                    Ok(Some(Box::new(source) as Box<dyn EntrySource>))
                }
                None => Ok(None),
            },
            registry,
            options,
        ))
    }
}
