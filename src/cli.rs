use clap::Parser;

use crate::vfs::{DEFAULT_CHUNK_SIZE, DEFAULT_HANDLER_NAME, HandlerConfig, IndexConfig};

#[derive(Parser, Debug)]
#[command(name = "zipread")]
#[command(version)]
#[command(about = "Serve files and directory listings from inside ZIP archives", long_about = None)]
#[command(after_help = "Examples:\n  \
  zipread site.zip /docs/index.html       print one entry\n  \
  zipread site.zip /docs/                 index file of docs/, or its listing\n  \
  zipread -i home.htm -i index.html site.zip /   custom index candidates\n  \
  zipread https://example.com/site.zip /  list a remote archive")]
pub struct Cli {
    /// ZIP file path or HTTP URL
    #[arg(value_name = "ARCHIVE")]
    pub archive: String,

    /// Path inside the archive; a trailing '/' asks for a directory
    #[arg(value_name = "PATH", default_value = "/")]
    pub path: String,

    /// Index file tried for directory paths (repeatable, tried in order)
    #[arg(short = 'i', long = "index", value_name = "NAME")]
    pub index: Vec<String>,

    /// Bytes per write when streaming an entry
    #[arg(
        long,
        value_name = "BYTES",
        default_value_t = DEFAULT_CHUNK_SIZE,
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..)
    )]
    pub chunk_size: usize,

    /// Resolve only, like an HTTP HEAD request
    #[arg(long)]
    pub head: bool,

    /// Request URI used for listing links (default: ARCHIVE followed by PATH)
    #[arg(long, value_name = "URI")]
    pub uri: Option<String>,

    /// Reopen the archive when its modification time changes
    #[arg(long)]
    pub check_mtime: bool,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,
}

impl Cli {
    pub fn path_info(&self) -> String {
        if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        }
    }

    pub fn uri(&self) -> String {
        match &self.uri {
            Some(uri) => uri.clone(),
            None => format!("{}{}", self.archive.trim_end_matches('/'), self.path_info()),
        }
    }

    pub fn handler_config(&self) -> HandlerConfig {
        let index = if self.index.is_empty() {
            IndexConfig::default()
        } else {
            IndexConfig::new(self.index.iter().cloned())
        };
        HandlerConfig {
            handler_name: DEFAULT_HANDLER_NAME.to_string(),
            index,
            chunk_size: self.chunk_size,
        }
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet > 0
    }

    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }
}
