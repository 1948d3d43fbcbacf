use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use anyhow::{Result, bail};

use crate::io::{HttpRangeReader, LocalFileReader, ReadAt};

use super::parser::ZipParser;
use super::stream::EntryReader;
use super::structures::{ArchiveEntry, CompressionMethod};

/// An open archive: its parsed central directory plus the source its
/// entry data is read from.
///
/// Read-only once built. Every entry stream reads positionally from the
/// shared source, so one `ZipArchive` may serve many streams at once.
pub struct ZipArchive {
    parser: ZipParser<dyn ReadAt>,
    entries: Vec<ArchiveEntry>,
    /// ASCII-lowercased name -> index of the first record with that name
    caseless: HashMap<String, usize>,
    modified: Option<SystemTime>,
}

impl fmt::Debug for ZipArchive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZipArchive")
            .field("size", &self.parser.reader().size())
            .field("entries", &self.entries.len())
            .field("modified", &self.modified)
            .finish_non_exhaustive()
    }
}

impl ZipArchive {
    /// Read the central directory of the archive behind `reader`.
    pub async fn open(reader: Arc<dyn ReadAt>) -> Result<Self> {
        let modified = reader.modified();
        let parser = ZipParser::new(reader);
        let entries = parser.read_central_directory().await?;

        let mut caseless = HashMap::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            caseless
                .entry(entry.name.to_ascii_lowercase())
                .or_insert(index);
        }

        Ok(Self {
            parser,
            entries,
            caseless,
            modified,
        })
    }

    pub async fn open_local(path: &Path) -> Result<Self> {
        Self::open(Arc::new(LocalFileReader::new(path)?)).await
    }

    pub async fn open_remote(url: &str) -> Result<Self> {
        Self::open(Arc::new(HttpRangeReader::new(url.to_string()).await?)).await
    }

    /// Entries in central directory order.
    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Modification time of the archive source when it was opened.
    pub fn modified(&self) -> Option<SystemTime> {
        self.modified
    }

    /// Look up an entry ignoring ASCII case.
    pub fn find_caseless(&self, name: &str) -> Option<&ArchiveEntry> {
        self.caseless
            .get(&name.to_ascii_lowercase())
            .map(|&index| &self.entries[index])
    }

    /// Whether [`ZipArchive::open_entry`] accepts `entry`: not encrypted and
    /// stored or deflated.
    pub fn can_open(&self, entry: &ArchiveEntry) -> bool {
        !entry.is_encrypted() && !matches!(entry.compression_method, CompressionMethod::Unknown(_))
    }

    /// Open a decompressing reader over one entry's data.
    pub async fn open_entry<'a>(&'a self, entry: &'a ArchiveEntry) -> Result<EntryReader<'a>> {
        if entry.is_encrypted() {
            bail!("{} is encrypted", entry.name);
        }
        if let CompressionMethod::Unknown(method) = entry.compression_method {
            bail!(
                "Unsupported compression method {} for {} (only STORED and DEFLATE are supported)",
                method,
                entry.name
            );
        }

        let data_offset = self.parser.data_offset(entry).await?;
        Ok(EntryReader::new(
            self.parser.reader().as_ref(),
            entry,
            data_offset,
        ))
    }
}
