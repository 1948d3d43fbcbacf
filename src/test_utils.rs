//! Fixture archives for tests.
//!
//! Only depends on `flate2`, `tokio` and std so integration tests can pull
//! it in with `#[path]`.

#![allow(dead_code)]

use flate2::Compression;
use flate2::write::DeflateEncoder;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

struct Record {
    name: String,
    method: u16,
    flags: u16,
    compressed: Vec<u8>,
    uncompressed_size: u32,
}

/// Builds a minimal single-disk ZIP archive in memory.
#[derive(Default)]
pub struct ZipBuilder {
    records: Vec<Record>,
    comment: Vec<u8>,
}

impl ZipBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stored(self, name: &str, data: &[u8]) -> Self {
        self.raw(name, 0, 0, data.to_vec(), data.len())
    }

    pub fn deflated(self, name: &str, data: &[u8]) -> Self {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        let compressed = encoder.finish().unwrap();
        self.raw(name, 8, 0, compressed, data.len())
    }

    pub fn dir(self, name: &str) -> Self {
        self.raw(name, 0, 0, Vec::new(), 0)
    }

    /// Adds a record with an arbitrary method and flag word.
    pub fn raw(
        mut self,
        name: &str,
        method: u16,
        flags: u16,
        compressed: Vec<u8>,
        uncompressed_size: usize,
    ) -> Self {
        self.records.push(Record {
            name: name.to_string(),
            method,
            flags,
            compressed,
            uncompressed_size: uncompressed_size as u32,
        });
        self
    }

    pub fn comment(mut self, comment: &[u8]) -> Self {
        self.comment = comment.to_vec();
        self
    }

    pub fn finish(self) -> Vec<u8> {
        let mut out = Vec::new();
        let mut offsets = Vec::with_capacity(self.records.len());

        for record in &self.records {
            offsets.push(out.len() as u32);
            out.extend_from_slice(b"PK\x03\x04");
            put_u16(&mut out, 20);
            put_u16(&mut out, record.flags);
            put_u16(&mut out, record.method);
            put_u16(&mut out, 0); // time
            put_u16(&mut out, 0x21); // date: 1980-01-01
            put_u32(&mut out, 0); // crc32
            put_u32(&mut out, record.compressed.len() as u32);
            put_u32(&mut out, record.uncompressed_size);
            put_u16(&mut out, record.name.len() as u16);
            put_u16(&mut out, 0);
            out.extend_from_slice(record.name.as_bytes());
            out.extend_from_slice(&record.compressed);
        }

        let cd_offset = out.len() as u32;
        for (record, offset) in self.records.iter().zip(&offsets) {
            out.extend_from_slice(b"PK\x01\x02");
            put_u16(&mut out, 20);
            put_u16(&mut out, 20);
            put_u16(&mut out, record.flags);
            put_u16(&mut out, record.method);
            put_u16(&mut out, 0);
            put_u16(&mut out, 0x21);
            put_u32(&mut out, 0);
            put_u32(&mut out, record.compressed.len() as u32);
            put_u32(&mut out, record.uncompressed_size);
            put_u16(&mut out, record.name.len() as u16);
            put_u16(&mut out, 0); // extra
            put_u16(&mut out, 0); // comment
            put_u16(&mut out, 0); // disk
            put_u16(&mut out, 0); // internal attrs
            put_u32(&mut out, 0); // external attrs
            put_u32(&mut out, *offset);
            out.extend_from_slice(record.name.as_bytes());
        }
        let cd_size = out.len() as u32 - cd_offset;

        out.extend_from_slice(b"PK\x05\x06");
        put_u16(&mut out, 0);
        put_u16(&mut out, 0);
        put_u16(&mut out, self.records.len() as u16);
        put_u16(&mut out, self.records.len() as u16);
        put_u32(&mut out, cd_size);
        put_u32(&mut out, cd_offset);
        put_u16(&mut out, self.comment.len() as u16);
        out.extend_from_slice(&self.comment);
        out
    }
}

fn put_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Deterministic, poorly compressible test payload.
pub fn pseudo_random_bytes(len: usize, seed: u32) -> Vec<u8> {
    let mut state = seed.max(1);
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state >> 24) as u8
        })
        .collect()
}

/// A throwaway HTTP/1.1 server publishing one file.
pub struct RangeServer {
    pub url: String,
    /// GET requests answered so far
    pub gets: Arc<AtomicUsize>,
}

impl RangeServer {
    /// Serve `data` at `/site.zip`. Without `ranges` the server ignores
    /// `Range` headers and never advertises `Accept-Ranges`.
    pub async fn start(data: Vec<u8>, ranges: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/site.zip", listener.local_addr().unwrap());
        let data = Arc::new(data);
        let gets = Arc::new(AtomicUsize::new(0));

        let counter = gets.clone();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                tokio::spawn(respond(socket, data.clone(), ranges, counter.clone()));
            }
        });
        Self { url, gets }
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }
}

async fn respond(mut socket: TcpStream, data: Arc<Vec<u8>>, ranges: bool, gets: Arc<AtomicUsize>) {
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => request.extend_from_slice(&buf[..n]),
        }
    }
    let request = String::from_utf8_lossy(&request).into_owned();
    let head = request.starts_with("HEAD ");
    if !head {
        gets.fetch_add(1, Ordering::SeqCst);
    }

    let range = request.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        name.trim()
            .eq_ignore_ascii_case("range")
            .then(|| value.trim().to_string())
    });
    let requested = range
        .as_deref()
        .and_then(|r| r.strip_prefix("bytes="))
        .and_then(|r| r.split_once('-'))
        .and_then(|(start, end)| Some((start.parse::<usize>().ok()?, end.parse::<usize>().ok()?)));

    let mut header = String::new();
    let body = match requested {
        Some((start, end)) if ranges && start < data.len() => {
            let end = end.min(data.len() - 1);
            header.push_str("HTTP/1.1 206 Partial Content\r\n");
            header.push_str(&format!("Content-Range: bytes {start}-{end}/{}\r\n", data.len()));
            &data[start..=end]
        }
        _ => {
            header.push_str("HTTP/1.1 200 OK\r\n");
            &data[..]
        }
    };
    if ranges {
        header.push_str("Accept-Ranges: bytes\r\n");
    }
    header.push_str(&format!("Content-Length: {}\r\nConnection: close\r\n\r\n", body.len()));

    let _ = socket.write_all(header.as_bytes()).await;
    if !head {
        let _ = socket.write_all(body).await;
    }
    let _ = socket.shutdown().await;
}
