//! Directory views over an archive's flat entry list.
//!
//! Archives only record full entry names, and many omit directory records
//! entirely. The immediate children of a prefix are recovered by cutting
//! each matching name after its first `/` past the prefix, so
//! `a/b/x.txt` and `a/b/y.txt` both become the synthetic directory `b/`
//! under `a/`. Names are sorted before the cut, which keeps every name
//! collapsing to one child adjacent; keeping the first of each run removes
//! the duplicates.

use crate::zip::ZipArchive;

/// One immediate child of a listed prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    /// Full path inside the archive, without a trailing `/`
    pub name: String,
    /// Name relative to the listed prefix; directories keep their `/`
    pub display: String,
    pub is_dir: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryView {
    pub prefix: String,
    /// Prefix one level up; the root is its own parent
    pub parent: String,
    /// Strictly increasing by `display`
    pub entries: Vec<ListingEntry>,
}

/// List the immediate children of `prefix` in `archive`.
pub fn list(archive: &ZipArchive, prefix: &str) -> DirectoryView {
    list_names(archive.entries().iter().map(|e| e.name.as_str()), prefix)
}

/// List the immediate children of `prefix` among raw entry names.
///
/// Matching is a byte-exact prefix test with no case or separator
/// normalization.
pub fn list_names<'a, I>(names: I, prefix: &str) -> DirectoryView
where
    I: IntoIterator<Item = &'a str>,
{
    let mut matching: Vec<&str> = names
        .into_iter()
        .filter(|name| name.starts_with(prefix))
        .collect();
    // stable, so equal raw names keep their directory order
    matching.sort();

    let mut entries: Vec<ListingEntry> = Vec::new();
    for name in matching {
        let rest = &name[prefix.len()..];
        // the prefix's own directory record
        if rest.is_empty() {
            continue;
        }

        let (child, is_dir) = match child_end(rest) {
            Some(end) => (&rest[..end], true),
            None => (rest, false),
        };

        if entries.last().is_some_and(|last| last.display == child) {
            continue;
        }

        let bare = child.strip_suffix('/').unwrap_or(child);
        entries.push(ListingEntry {
            name: format!("{prefix}{bare}"),
            display: child.to_string(),
            is_dir,
        });
    }

    DirectoryView {
        prefix: prefix.to_string(),
        parent: parent_of(prefix).to_string(),
        entries,
    }
}

/// End (exclusive) of the first path segment of `rest` when a `/` follows
/// it. A `/` at offset 0 does not count.
fn child_end(rest: &str) -> Option<usize> {
    rest.bytes()
        .skip(1)
        .position(|b| b == b'/')
        .map(|i| i + 2)
}

/// `prefix` with its last segment removed: `a/b/` -> `a/`, `a/` -> ``.
pub fn parent_of(prefix: &str) -> &str {
    let trimmed = prefix.strip_suffix('/').unwrap_or(prefix);
    match trimmed.rfind('/') {
        Some(slash) => &prefix[..=slash],
        None => "",
    }
}
