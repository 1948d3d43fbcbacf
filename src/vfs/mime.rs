use std::collections::HashMap;

/// Content type used when the resolver has no answer.
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain";

/// Maps an entry name to a content type.
///
/// Stands in for the host server's own file-type lookup.
pub trait ContentTypeResolver: Send + Sync {
    fn content_type(&self, name: &str) -> Option<String>;
}

/// Guesses content types from the extension of the last path segment.
///
/// Extensions registered with [`ExtensionTypes::insert`] win over the
/// `new_mime_guess` database.
#[derive(Debug, Clone, Default)]
pub struct ExtensionTypes {
    overrides: HashMap<String, String>,
}

impl ExtensionTypes {
    pub fn insert(&mut self, extension: &str, content_type: &str) {
        self.overrides
            .insert(extension.to_ascii_lowercase(), content_type.to_string());
    }
}

impl ContentTypeResolver for ExtensionTypes {
    fn content_type(&self, name: &str) -> Option<String> {
        let leaf = name.rsplit('/').next().unwrap_or(name);
        let (_, extension) = leaf.rsplit_once('.')?;

        if let Some(content_type) = self.overrides.get(&extension.to_ascii_lowercase()) {
            return Some(content_type.clone());
        }
        new_mime_guess::from_path(leaf)
            .iter_raw()
            .next()
            .map(str::to_string)
    }
}
