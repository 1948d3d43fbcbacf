use super::ReadAt;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use std::time::SystemTime;

#[cfg(not(any(unix, windows)))]
compile_error!("LocalFileReader needs positional file reads, available on unix and windows only");

/// Local archive reader built on positional reads.
///
/// `pread`-style access keeps no cursor, so concurrent entry streams over
/// the same cached archive never interfere.
pub struct LocalFileReader {
    file: std::fs::File,
    size: u64,
    modified: Option<SystemTime>,
}

impl LocalFileReader {
    pub fn new(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Cannot open {}", path.display()))?;
        let metadata = file.metadata()?;
        if !metadata.is_file() {
            anyhow::bail!("{} is not a regular file", path.display());
        }
        Ok(Self {
            file,
            size: metadata.len(),
            modified: metadata.modified().ok(),
        })
    }
}

#[async_trait]
impl ReadAt for LocalFileReader {
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::FileExt;
            Ok(self.file.read_at(buf, offset)?)
        }

        #[cfg(windows)]
        {
            // seek_read moves the OS cursor, but every call passes its own offset
            use std::os::windows::fs::FileExt;
            Ok(self.file.seek_read(buf, offset)?)
        }
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn modified(&self) -> Option<SystemTime> {
        self.modified
    }
}
