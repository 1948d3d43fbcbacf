//! Archive-backed virtual filesystem.
//!
//! A request names an archive and a path inside it. [`resolve`] decides
//! whether that path is an entry to stream or a directory to list;
//! [`EntryStreamer`] copies entries out, [`list`] rebuilds directory views
//! from the flat entry list and [`ListingPage`] renders them. Opened
//! archives are shared through [`ArchiveCache`]. [`ZipRead`] wires all of
//! it to a dispatcher-facing [`Request`] / [`Response`] pair.

mod cache;
mod config;
mod error;
mod handler;
mod lister;
mod mime;
mod render;
mod resolver;
mod streamer;

pub use cache::{
    ArchiveCache, ArchiveOpener, CachePolicy, KeepForever, ModifiedSince, SourceOpener, is_remote,
};
pub use config::{DEFAULT_HANDLER_NAME, DEFAULT_INDEX_NAMES, HandlerConfig, IndexConfig};
pub use error::VfsError;
pub use handler::{Request, Response, Status, ZipRead};
pub use lister::{DirectoryView, ListingEntry, list, list_names, parent_of};
pub use mime::{ContentTypeResolver, DEFAULT_CONTENT_TYPE, ExtensionTypes};
pub use render::{ListingPage, find_path_info};
pub use resolver::{Resolution, resolve};
pub use streamer::{DEFAULT_CHUNK_SIZE, EntryStreamer};
