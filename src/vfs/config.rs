use super::streamer::DEFAULT_CHUNK_SIZE;

/// Index files tried when none are configured.
pub const DEFAULT_INDEX_NAMES: [&str; 2] = ["index.html", "index.htm"];

/// Handler name requests must carry to be served.
pub const DEFAULT_HANDLER_NAME: &str = "zipread";

/// Ordered index-file fallbacks for one directory scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexConfig {
    names: Option<Vec<String>>,
}

impl IndexConfig {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: Some(names.into_iter().map(Into::into).collect()),
        }
    }

    /// A nested scope's own list wins; otherwise the enclosing scope's.
    pub fn merge(base: &IndexConfig, add: &IndexConfig) -> IndexConfig {
        if add.names.is_some() {
            add.clone()
        } else {
            base.clone()
        }
    }

    /// Candidates in the order they are tried.
    pub fn candidates(&self) -> Vec<&str> {
        match &self.names {
            Some(names) if !names.is_empty() => names.iter().map(String::as_str).collect(),
            _ => DEFAULT_INDEX_NAMES.to_vec(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HandlerConfig {
    pub handler_name: String,
    pub index: IndexConfig,
    pub chunk_size: usize,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            handler_name: DEFAULT_HANDLER_NAME.to_string(),
            index: IndexConfig::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}
