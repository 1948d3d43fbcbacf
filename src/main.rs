//! Main entry point for the zipread CLI application.
//!
//! Plays the part of a request dispatcher: maps the command line onto one
//! request against a local or remote archive and writes the response body
//! to stdout.

use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing_subscriber::EnvFilter;

use zipread::Cli;
use zipread::vfs::{ArchiveCache, DEFAULT_HANDLER_NAME, ModifiedSince, Request, Status, ZipRead};

/// Application entry point.
#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(&cli);

    let mut cache = ArchiveCache::new();
    if cli.check_mtime {
        cache = cache.with_policy(ModifiedSince);
    }
    let handler = ZipRead::new(Arc::new(cache), cli.handler_config());

    let path_info = cli.path_info();
    let uri = cli.uri();
    let request = Request {
        handler: DEFAULT_HANDLER_NAME,
        archive_path: &cli.archive,
        path_info: &path_info,
        uri: &uri,
        header_only: cli.head,
    };

    let mut stdout = tokio::io::stdout();
    let response = handler.handle(&request, &mut stdout).await;
    stdout.flush().await?;

    if !cli.is_quiet() {
        match response.status {
            Status::Ok => eprintln!(
                "200 OK  {}  {} bytes",
                response.content_type,
                response.bytes_written
            ),
            Status::NotFound => eprintln!("404 Not Found  {}", request.path_info),
            Status::Declined => eprintln!("declined"),
        }
    }
    if let Some(failure) = &response.failure {
        if !cli.is_very_quiet() {
            eprintln!("error: {failure}");
        }
    }

    Ok(match response.status {
        Status::Ok if response.failure.is_none() => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    })
}

/// Log to stderr; `RUST_LOG` overrides the level implied by `-q`.
fn init_logging(cli: &Cli) {
    let default_level = if cli.is_quiet() { "error" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
