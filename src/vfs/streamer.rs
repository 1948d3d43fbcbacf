use std::io;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::zip::ZipArchive;

use super::error::VfsError;

/// Decompressed bytes handed to the sink per write.
pub const DEFAULT_CHUNK_SIZE: usize = 32 * 1024;

/// Copies archive entries to an output sink in bounded chunks.
#[derive(Debug, Clone, Copy)]
pub struct EntryStreamer {
    chunk_size: usize,
}

impl Default for EntryStreamer {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl EntryStreamer {
    /// A zero chunk size is raised to one byte.
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Whether `name` names an entry, ignoring ASCII case, that
    /// [`EntryStreamer::stream`] can decode. Reads no data.
    pub fn exists(&self, archive: &ZipArchive, name: &str) -> bool {
        archive
            .find_caseless(name)
            .is_some_and(|entry| archive.can_open(entry))
    }

    /// Stream the decompressed bytes of `name` into `sink`.
    ///
    /// Returns the number of bytes written. On a sink failure the bytes
    /// already written stay written and the error carries their count.
    pub async fn stream<W>(
        &self,
        archive: &ZipArchive,
        name: &str,
        sink: &mut W,
    ) -> Result<u64, VfsError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let Some(entry) = archive.find_caseless(name) else {
            debug!(name, "no such entry");
            return Err(VfsError::EntryNotFound {
                name: name.to_string(),
            });
        };

        let decompress_error = |written: u64, source: anyhow::Error| VfsError::Decompress {
            name: entry.name.clone(),
            written,
            source,
        };

        let mut reader = archive
            .open_entry(entry)
            .await
            .map_err(|source| decompress_error(0, source))?;

        let mut buf = vec![0u8; self.chunk_size];
        let mut written = 0u64;
        loop {
            let n = reader
                .read_chunk(&mut buf)
                .await
                .map_err(|source| decompress_error(written, source))?;
            if n == 0 {
                break;
            }

            if let Err(source) = write_counted(sink, &buf[..n], &mut written).await {
                warn!(name = %entry.name, written, error = %source, "output closed while streaming");
                return Err(VfsError::StreamIo {
                    name: entry.name.clone(),
                    written,
                    source,
                });
            }
        }

        sink.flush().await.map_err(|source| VfsError::StreamIo {
            name: entry.name.clone(),
            written,
            source,
        })?;

        debug!(name = %entry.name, written, "streamed entry");
        Ok(written)
    }
}

/// Like `write_all`, but every byte the sink accepts is added to `written`,
/// including those of a chunk it only took part of before failing.
pub(crate) async fn write_counted<W>(
    sink: &mut W,
    mut buf: &[u8],
    written: &mut u64,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    while !buf.is_empty() {
        match sink.write(buf).await {
            Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
            Ok(n) => {
                *written += n as u64;
                buf = &buf[n..];
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok(())
}
