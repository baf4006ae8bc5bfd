//! Top-level read facade: resolves the central directory once, then hands out [`EntryReader`]s
//! either by streaming iteration or by name (§3, "Archive"; §4.1-§4.2).

use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

use crate::byte_source::{ByteSource, FileByteSource, MemoryByteSource};
use crate::central_directory::{locate, CentralDirectoryIterator, CentralDirectoryLocation};
use crate::constants::DEFAULT_CENTRAL_DIRECTORY_BUFFER_SIZE;
use crate::entry_reader::EntryReader;
use crate::error::Result;

/// Construction-time options (§6, "Archive" options).
#[derive(Debug, Clone, Copy)]
pub struct ArchiveOptions {
    /// Size, in bytes, of the sliding buffer the central-directory iterator refills from.
    pub central_directory_buffer_size: usize,
    /// Whether to eagerly build a name→position index during [`Archive::open`], trading an
    /// up-front full central-directory scan for O(1) [`Archive::find`] lookups afterward.
    pub create_entry_index: bool,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            central_directory_buffer_size: DEFAULT_CENTRAL_DIRECTORY_BUFFER_SIZE,
            create_entry_index: false,
        }
    }
}

/// A opened ZIP archive: a byte source plus its resolved central directory location, and
/// optionally a name→position index (§3).
pub struct Archive {
    source: Rc<dyn ByteSource>,
    location: CentralDirectoryLocation,
    options: ArchiveOptions,
    index: Option<HashMap<String, u64>>,
}

impl Archive {
    /// Opens an archive backed by an in-memory buffer.
    pub fn open_memory(data: impl Into<Arc<[u8]>>, options: ArchiveOptions) -> Result<Self> {
        Self::open_source(Rc::new(MemoryByteSource::new(data.into())), options)
    }

    /// Opens an archive backed by a file on disk.
    pub fn open_file(path: impl AsRef<Path>, options: ArchiveOptions) -> Result<Self> {
        Self::open_source(Rc::new(FileByteSource::open(path)?), options)
    }

    /// Opens an archive over an arbitrary [`ByteSource`], resolving its central directory
    /// location immediately and, if requested, building the name index.
    pub fn open_source(source: Rc<dyn ByteSource>, options: ArchiveOptions) -> Result<Self> {
        let location = locate(source.as_ref())?;
        let mut archive = Self {
            source,
            location,
            options,
            index: None,
        };
        if options.create_entry_index {
            archive.build_index()?;
        }
        Ok(archive)
    }

    fn build_index(&mut self) -> Result<()> {
        let mut index = HashMap::with_capacity(self.location.total_entries as usize);
        for record in self.iter_records() {
            let record = record?;
            index.insert(record.decoded_name(), record.position);
        }
        self.index = Some(index);
        Ok(())
    }

    /// The archive comment, decoded per §4.4 (EOCD comments have no UTF-8 flag of their own and
    /// are treated as CP437).
    pub fn comment(&self) -> String {
        crate::text::decode_name_or_comment(&self.location.comment, false, None)
    }

    pub fn total_entries(&self) -> u64 {
        self.location.total_entries
    }

    pub fn is_zip64(&self) -> bool {
        self.location.is_zip64
    }

    fn iter_records(&self) -> CentralDirectoryIterator {
        CentralDirectoryIterator::new(
            self.source.clone(),
            &self.location,
            self.options.central_directory_buffer_size,
        )
    }

    /// Exposes the raw, owned central-directory iterator (no borrow of `self` survives it),
    /// so a caller like [`crate::merger::ArchiveMerger`] can plan a copy across many archives
    /// without fighting the reader's lifetime (§4.7).
    pub fn raw_entries(&self) -> CentralDirectoryIterator {
        self.iter_records()
    }

    /// The underlying byte source, reference-counted so a planned raw copy can outlive any
    /// particular borrow of this `Archive`.
    pub fn source_handle(&self) -> Rc<dyn ByteSource> {
        self.source.clone()
    }

    /// Lazily iterates every entry in central-directory order, never materializing the whole
    /// directory at once (§4.2).
    pub fn entries(&self) -> impl Iterator<Item = Result<EntryReader>> + '_ {
        let source = self.source.clone();
        self.iter_records()
            .map(move |record| record.map(|record| EntryReader::new(source.clone(), record)))
    }

    /// Looks up an entry by its decoded name.
    ///
    /// With [`ArchiveOptions::create_entry_index`] set this is an O(1) hash lookup against the
    /// index built at [`Archive::open_source`] time; otherwise it's a linear scan that stops at
    /// the first match, per §3/§4.2.
    pub fn find(&self, name: &str) -> Result<Option<EntryReader>> {
        if let Some(index) = &self.index {
            return Ok(match index.get(name) {
                Some(&position) => self.entry_at(position)?,
                None => None,
            });
        }
        for record in self.iter_records() {
            let record = record?;
            if record.decoded_name() == name {
                return Ok(Some(EntryReader::new(self.source.clone(), record)));
            }
        }
        Ok(None)
    }

    fn entry_at(&self, position: u64) -> Result<Option<EntryReader>> {
        // The index only stores `position`; re-scanning from that offset with a remaining count
        // of one re-decodes the single entry without another full linear pass.
        let single = CentralDirectoryLocation {
            cd_offset: position,
            cd_size: self.location.cd_offset + self.location.cd_size - position,
            total_entries: 1,
            comment: Vec::new(),
            is_zip64: self.location.is_zip64,
        };
        let mut it = CentralDirectoryIterator::new(
            self.source.clone(),
            &single,
            self.options.central_directory_buffer_size,
        );
        match it.next() {
            Some(record) => Ok(Some(EntryReader::new(self.source.clone(), record?))),
            None => Ok(None),
        }
    }
}
