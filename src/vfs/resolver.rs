use crate::zip::ZipArchive;

use super::config::IndexConfig;

/// What a request path asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Stream this entry. Its existence is only checked when streaming.
    Concrete(String),
    /// Render the children of this prefix.
    Listing(String),
}

/// Resolve a request path inside `archive`.
///
/// `request_path` is the internal path as the dispatcher hands it over,
/// with or without its leading `/`. Directory-style paths are served by
/// their first existing index candidate and listed otherwise; the root is
/// always listed.
///
/// A candidate counts when the caseless directory lookup finds it and the
/// archive can decode it, so an unreadable index falls through to the next
/// one. No entry data is read.
pub fn resolve(archive: &ZipArchive, request_path: &str, index: &IndexConfig) -> Resolution {
    resolve_with(request_path, index, |name| {
        archive
            .find_caseless(name)
            .is_some_and(|entry| archive.can_open(entry))
    })
}

pub(crate) fn resolve_with<F>(request_path: &str, index: &IndexConfig, exists: F) -> Resolution
where
    F: Fn(&str) -> bool,
{
    let path = request_path.strip_prefix('/').unwrap_or(request_path);

    if path.is_empty() {
        return Resolution::Listing(String::new());
    }
    if !path.ends_with('/') {
        return Resolution::Concrete(path.to_string());
    }

    index
        .candidates()
        .into_iter()
        .map(|candidate| format!("{path}{candidate}"))
        .find(|name| exists(name.as_str()))
        .map(Resolution::Concrete)
        .unwrap_or_else(|| Resolution::Listing(path.to_string()))
}
