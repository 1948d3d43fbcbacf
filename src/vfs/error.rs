use thiserror::Error;

/// Failures the engine distinguishes internally.
///
/// None of these cross the request boundary; [`crate::vfs::ZipRead`] maps
/// each of them onto a [`crate::vfs::Status`].
#[derive(Debug, Error)]
pub enum VfsError {
    /// Archive missing, unreadable or corrupt. Never cached.
    #[error("cannot open archive {path}: {source:#}")]
    ArchiveOpen {
        path: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("no entry named {name}")]
    EntryNotFound { name: String },

    /// The entry exists but its data could not be decoded.
    #[error("cannot read {name} after {written} bytes: {source:#}")]
    Decompress {
        name: String,
        written: u64,
        #[source]
        source: anyhow::Error,
    },

    /// The sink stopped accepting bytes.
    #[error("output failed for {name} after {written} bytes: {source}")]
    StreamIo {
        name: String,
        written: u64,
        #[source]
        source: std::io::Error,
    },
}

impl VfsError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            VfsError::ArchiveOpen { .. } | VfsError::EntryNotFound { .. }
        )
    }

    /// Body bytes already handed to the sink when the error happened.
    pub fn bytes_written(&self) -> u64 {
        match self {
            VfsError::Decompress { written, .. } | VfsError::StreamIo { written, .. } => *written,
            _ => 0,
        }
    }
}
