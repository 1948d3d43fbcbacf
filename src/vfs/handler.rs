use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use super::cache::ArchiveCache;
use super::config::HandlerConfig;
use super::error::VfsError;
use super::lister::list;
use super::mime::{ContentTypeResolver, DEFAULT_CONTENT_TYPE, ExtensionTypes};
use super::render::{ListingPage, find_path_info};
use super::resolver::{Resolution, resolve};
use super::streamer::{EntryStreamer, write_counted};

const LISTING_CONTENT_TYPE: &str = "text/html";

/// What the dispatcher knows about one request.
#[derive(Debug, Clone, Copy)]
pub struct Request<'a> {
    /// Handler the request was routed to
    pub handler: &'a str,
    /// Archive the request maps to
    pub archive_path: &'a str,
    /// Remainder of the request path after the archive, usually with a
    /// leading `/`
    pub path_info: &'a str,
    /// Original request URI, used to build listing links
    pub uri: &'a str,
    /// Resolve only; write no body
    pub header_only: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    NotFound,
    Declined,
}

#[derive(Debug)]
pub struct Response {
    pub status: Status,
    pub content_type: String,
    pub bytes_written: u64,
    /// Error behind a `NotFound`, or behind a body cut short after `Ok`
    pub failure: Option<VfsError>,
}

impl Response {
    fn new(status: Status, content_type: &str) -> Self {
        Self {
            status,
            content_type: content_type.to_string(),
            bytes_written: 0,
            failure: None,
        }
    }

    fn failed(status: Status, content_type: &str, err: VfsError) -> Self {
        Self {
            bytes_written: err.bytes_written(),
            failure: Some(err),
            ..Self::new(status, content_type)
        }
    }
}

/// Serves requests for archive contents.
///
/// Holds the shared archive cache; construct one per server and share it
/// between workers.
pub struct ZipRead<T = ExtensionTypes> {
    cache: Arc<ArchiveCache>,
    config: HandlerConfig,
    streamer: EntryStreamer,
    types: T,
}

impl ZipRead {
    pub fn new(cache: Arc<ArchiveCache>, config: HandlerConfig) -> Self {
        let streamer = EntryStreamer::new(config.chunk_size);
        Self {
            cache,
            config,
            streamer,
            types: ExtensionTypes::default(),
        }
    }
}

impl<T: ContentTypeResolver> ZipRead<T> {
    pub fn with_types<U: ContentTypeResolver>(self, types: U) -> ZipRead<U> {
        ZipRead {
            cache: self.cache,
            config: self.config,
            streamer: self.streamer,
            types,
        }
    }

    pub fn cache(&self) -> &Arc<ArchiveCache> {
        &self.cache
    }

    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }

    /// Serve `request`, writing any body to `sink`.
    pub async fn handle<W>(&self, request: &Request<'_>, sink: &mut W) -> Response
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        if request.handler != self.config.handler_name {
            return Response::new(Status::Declined, DEFAULT_CONTENT_TYPE);
        }

        let archive = match self.cache.open(request.archive_path).await {
            Ok(archive) => archive,
            Err(err) => return Response::failed(Status::NotFound, DEFAULT_CONTENT_TYPE, err),
        };

        let resolution = resolve(&archive, request.path_info, &self.config.index);
        debug!(
            archive = request.archive_path,
            path_info = request.path_info,
            ?resolution,
            "resolved request"
        );

        match resolution {
            Resolution::Concrete(name) => {
                let content_type = self
                    .types
                    .content_type(&name)
                    .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

                if request.header_only {
                    let status = if self.streamer.exists(&archive, &name) {
                        Status::Ok
                    } else {
                        Status::NotFound
                    };
                    return Response::new(status, &content_type);
                }

                match self.streamer.stream(&archive, &name, sink).await {
                    Ok(written) => Response {
                        bytes_written: written,
                        ..Response::new(Status::Ok, &content_type)
                    },
                    Err(err) => {
                        // Once the sink is in use the status is committed.
                        let status = match &err {
                            VfsError::StreamIo { .. } => Status::Ok,
                            err if err.bytes_written() > 0 => Status::Ok,
                            _ => Status::NotFound,
                        };
                        if !err.is_not_found() {
                            warn!(archive = request.archive_path, error = %err, "entry not served");
                        }
                        Response::failed(status, &content_type, err)
                    }
                }
            }
            Resolution::Listing(prefix) => {
                if request.header_only {
                    return Response::new(Status::Ok, LISTING_CONTENT_TYPE);
                }

                let view = list(&archive, &prefix);
                let page = ListingPage {
                    view: &view,
                    uri: request.uri,
                    path_info_offset: find_path_info(request.uri, request.path_info),
                }
                .to_string();

                let mut written = 0;
                let sent = match write_counted(sink, page.as_bytes(), &mut written).await {
                    Ok(()) => sink.flush().await,
                    Err(err) => Err(err),
                };
                match sent {
                    Ok(()) => Response {
                        bytes_written: written,
                        ..Response::new(Status::Ok, LISTING_CONTENT_TYPE)
                    },
                    Err(source) => {
                        warn!(archive = request.archive_path, prefix = %prefix, written, error = %source, "listing not sent");
                        let err = VfsError::StreamIo {
                            name: prefix,
                            written,
                            source,
                        };
                        Response::failed(Status::Ok, LISTING_CONTENT_TYPE, err)
                    }
                }
            }
        }
    }
}
