//! # zipread
//!
//! Browse ZIP archives as an HTTP-addressable virtual filesystem.
//!
//! A request path such as `/files/site.zip/docs/` splits into an archive
//! (`/files/site.zip`) and an internal path (`/docs/`). Paths naming a file
//! stream that entry's decompressed bytes; directory paths are served by
//! their first existing index file, or rendered as an HTML listing rebuilt
//! from the archive's flat entry list.
//!
//! ## Features
//!
//! - Shared cache of open archives with single-flight opens per path
//! - Directory listings with synthetic directories for archives that
//!   record files only
//! - Ordered index-file fallbacks (`index.html`, `index.htm` by default)
//! - Caseless entry lookup and chunked streaming of STORED and DEFLATE data
//! - Local archives and remote archives read through HTTP Range requests
//! - ZIP64 archives
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use zipread::vfs::{ArchiveCache, HandlerConfig, Request, Status, ZipRead};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let handler = ZipRead::new(Arc::new(ArchiveCache::new()), HandlerConfig::default());
//!
//!     let request = Request {
//!         handler: "zipread",
//!         archive_path: "/srv/www/site.zip",
//!         path_info: "/docs/",
//!         uri: "/site.zip/docs/",
//!         header_only: false,
//!     };
//!     let mut body = Vec::new();
//!     let response = handler.handle(&request, &mut body).await;
//!     assert_eq!(response.status, Status::Ok);
//!     println!("{} ({} bytes)", response.content_type, body.len());
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod io;
pub mod vfs;
pub mod zip;

#[cfg(test)]
mod test_utils;

pub use cli::Cli;
pub use io::{HttpRangeReader, LocalFileReader, MemoryReader, ReadAt};
pub use vfs::{ArchiveCache, HandlerConfig, Request, Response, Status, ZipRead};
pub use zip::{ArchiveEntry, ZipArchive};
