use anyhow::{Result, bail};
use flate2::{Decompress, FlushDecompress, Status};

use crate::io::ReadAt;

use super::structures::{ArchiveEntry, CompressionMethod};

/// Compressed bytes fetched per source read while inflating.
const INPUT_CHUNK: usize = 32 * 1024;

enum Codec {
    Stored,
    Deflate {
        inflater: Decompress,
        input: Vec<u8>,
        pos: usize,
        len: usize,
    },
}

/// Pull-based reader over one entry's decompressed bytes.
///
/// Reads the compressed data lazily and never holds more than one input
/// chunk plus the caller's output buffer in memory.
pub struct EntryReader<'a> {
    source: &'a dyn ReadAt,
    name: &'a str,
    codec: Codec,
    /// Next compressed byte to fetch
    offset: u64,
    /// Compressed bytes not yet fetched
    remaining_in: u64,
    expected_out: u64,
    produced: u64,
    finished: bool,
}

impl<'a> EntryReader<'a> {
    pub(super) fn new(source: &'a dyn ReadAt, entry: &'a ArchiveEntry, data_offset: u64) -> Self {
        let codec = match entry.compression_method {
            CompressionMethod::Deflate => Codec::Deflate {
                inflater: Decompress::new(false),
                input: vec![0u8; INPUT_CHUNK],
                pos: 0,
                len: 0,
            },
            _ => Codec::Stored,
        };

        Self {
            source,
            name: &entry.name,
            codec,
            offset: data_offset,
            remaining_in: entry.compressed_size,
            expected_out: entry.uncompressed_size,
            produced: 0,
            finished: false,
        }
    }

    /// Fill as much of `out` as one step allows.
    ///
    /// Returns `Ok(0)` once the entry is exhausted and its decompressed
    /// length matched the central directory.
    pub async fn read_chunk(&mut self, out: &mut [u8]) -> Result<usize> {
        if self.finished || out.is_empty() {
            return Ok(0);
        }

        let n = match &mut self.codec {
            Codec::Stored => {
                let n = out.len().min(self.remaining_in as usize);
                if n > 0 {
                    self.source.read_exact_at(self.offset, &mut out[..n]).await?;
                    self.offset += n as u64;
                    self.remaining_in -= n as u64;
                }
                n
            }
            Codec::Deflate {
                inflater,
                input,
                pos,
                len,
            } => loop {
                if *pos == *len && self.remaining_in > 0 {
                    let want = input.len().min(self.remaining_in as usize);
                    self.source
                        .read_exact_at(self.offset, &mut input[..want])
                        .await?;
                    self.offset += want as u64;
                    self.remaining_in -= want as u64;
                    *pos = 0;
                    *len = want;
                }

                let flush = if self.remaining_in == 0 {
                    FlushDecompress::Finish
                } else {
                    FlushDecompress::None
                };
                let before_in = inflater.total_in();
                let before_out = inflater.total_out();
                let status = inflater.decompress(&input[*pos..*len], out, flush)?;
                let consumed = (inflater.total_in() - before_in) as usize;
                let written = (inflater.total_out() - before_out) as usize;
                *pos += consumed;

                if status == Status::StreamEnd {
                    self.finished = true;
                    break written;
                }
                if written > 0 {
                    break written;
                }
                if consumed == 0 && *pos == *len && self.remaining_in == 0 {
                    bail!("Truncated DEFLATE data in {}", self.name);
                }
                if consumed == 0 && *pos < *len {
                    bail!("Corrupt DEFLATE data in {}", self.name);
                }
            },
        };

        self.produced += n as u64;
        if self.produced > self.expected_out {
            bail!(
                "{} decompressed past its declared size of {} bytes",
                self.name,
                self.expected_out
            );
        }
        if n == 0 || self.finished {
            self.finished = true;
            if self.produced != self.expected_out {
                bail!(
                    "{} decompressed to {} bytes, expected {}",
                    self.name,
                    self.produced,
                    self.expected_out
                );
            }
        }

        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use crate::io::MemoryReader;
    use crate::test_utils::{ZipBuilder, pseudo_random_bytes};
    use crate::zip::ZipArchive;
    use std::sync::Arc;

    async fn read_all(archive: &ZipArchive, name: &str, chunk: usize) -> anyhow::Result<Vec<u8>> {
        let entry = archive.find_caseless(name).unwrap();
        let mut reader = archive.open_entry(entry).await?;
        let mut out = Vec::new();
        let mut buf = vec![0u8; chunk];
        loop {
            let n = reader.read_chunk(&mut buf).await?;
            if n == 0 {
                return Ok(out);
            }
            out.extend_from_slice(&buf[..n]);
        }
    }

    #[tokio::test]
    async fn chunk_size_does_not_change_output() {
        let payload = pseudo_random_bytes(100_000, 7);
        let text = b"hello world ".repeat(9000);
        let data = ZipBuilder::new()
            .stored("raw.bin", &payload)
            .deflated("rand.bin", &payload)
            .deflated("text.txt", &text)
            .finish();
        let archive = ZipArchive::open(Arc::new(MemoryReader::new(data))).await.unwrap();

        for chunk in [1, 7, 4096, 32 * 1024, 200_000] {
            assert_eq!(read_all(&archive, "raw.bin", chunk).await.unwrap(), payload);
            assert_eq!(read_all(&archive, "rand.bin", chunk).await.unwrap(), payload);
            assert_eq!(read_all(&archive, "text.txt", chunk).await.unwrap(), text);
        }
    }

    #[tokio::test]
    async fn empty_entries() {
        let data = ZipBuilder::new()
            .stored("empty", b"")
            .deflated("empty.z", b"")
            .dir("d/")
            .finish();
        let archive = ZipArchive::open(Arc::new(MemoryReader::new(data))).await.unwrap();

        for name in ["empty", "empty.z", "d/"] {
            assert!(read_all(&archive, name, 16).await.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn detects_size_mismatch_and_truncation() {
        let data = ZipBuilder::new()
            .raw("short", 0, 0, b"abc".to_vec(), 10)
            .raw("broken.z", 8, 0, vec![0xff; 16], 100)
            .finish();
        let archive = ZipArchive::open(Arc::new(MemoryReader::new(data))).await.unwrap();

        assert!(read_all(&archive, "short", 2).await.is_err());
        assert!(read_all(&archive, "broken.z", 64).await.is_err());
    }
}
