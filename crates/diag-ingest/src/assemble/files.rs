//! File registry keyed by content digest.

use std::sync::Arc;

use indexmap::IndexMap;
use serde::ser::{Serialize, Serializer};

use crate::hashing::source::{compute_content_hash, SourceProvider};
use crate::models::FileRecord;

/// Every registered path stays addressable; identical bytes are stored once
/// under their digest.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FileRegistry {
    paths: IndexMap<String, Option<String>>,
    contents: IndexMap<String, Arc<[u8]>>,
}

impl FileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `path` through `sources` and register it. Registering a path
    /// twice keeps the first result.
    pub fn register(&mut self, path: &str, sources: &dyn SourceProvider) {
        if self.paths.contains_key(path) {
            return;
        }
        let content = sources.read_source_file(path);
        self.register_content(path, content);
    }

    pub fn register_content(&mut self, path: &str, content: Option<Arc<[u8]>>) {
        if self.paths.contains_key(path) {
            return;
        }
        let digest = content.map(|bytes| {
            let digest = compute_content_hash(&bytes);
            self.contents.entry(digest.clone()).or_insert(bytes);
            digest
        });
        self.paths.insert(path.to_string(), digest);
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Registered paths in registration order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.paths.keys().map(String::as_str)
    }

    pub fn digest_of(&self, path: &str) -> Option<&str> {
        self.paths.get(path)?.as_deref()
    }

    pub fn content(&self, digest: &str) -> Option<&[u8]> {
        self.contents.get(digest).map(|bytes| &bytes[..])
    }

    /// Number of distinct contents behind the registered paths.
    pub fn unique_contents(&self) -> usize {
        self.contents.len()
    }

    /// Paths whose content could not be read.
    pub fn unreadable(&self) -> impl Iterator<Item = &str> {
        self.paths
            .iter()
            .filter(|(_, digest)| digest.is_none())
            .map(|(path, _)| path.as_str())
    }

    pub fn records(&self) -> Vec<FileRecord> {
        self.paths
            .iter()
            .map(|(path, digest)| FileRecord {
                path: path.clone(),
                content_hash: digest.clone(),
                content: digest
                    .as_ref()
                    .and_then(|d| self.contents.get(d))
                    .map(Arc::clone),
            })
            .collect()
    }
}

/// Serialized as the `path -> digest` mapping; contents stay out of band.
impl Serialize for FileRegistry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.paths.iter())
    }
}
