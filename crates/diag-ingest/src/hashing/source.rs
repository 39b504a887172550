//! Source text access for hashing.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tracing::warn;

/// Read-only view of the analyzed source tree. Implementations may serve
/// from disk, a cache, or a version-control blob store.
pub trait SourceProvider: Send + Sync {
    /// Text of 1-based `line` in `file_path`, without its line terminator.
    /// `None` when the file or the line does not exist.
    fn read_source_line(&self, file_path: &str, line: u32) -> Option<String>;

    /// Raw bytes of `file_path`, `None` when it cannot be read.
    fn read_source_file(&self, file_path: &str) -> Option<Arc<[u8]>>;
}

/// SHA-256 hex digest of a file's raw bytes.
pub fn compute_content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// A loaded file split into lines.
struct SourceFile {
    bytes: Arc<[u8]>,
    /// Byte offset where each line starts.
    line_starts: Vec<usize>,
}

impl SourceFile {
    fn new(bytes: Arc<[u8]>) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            bytes
                .iter()
                .enumerate()
                .filter(|(_, b)| **b == b'\n')
                .map(|(i, _)| i + 1)
                .filter(|&start| start < bytes.len()),
        );
        if bytes.is_empty() {
            line_starts.clear();
        }
        Self { bytes, line_starts }
    }

    fn line(&self, line: u32) -> Option<String> {
        let index = (line as usize).checked_sub(1)?;
        let start = *self.line_starts.get(index)?;
        let end = self
            .line_starts
            .get(index + 1)
            .copied()
            .unwrap_or(self.bytes.len());
        let raw = &self.bytes[start..end];
        let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        Some(String::from_utf8_lossy(raw).into_owned())
    }
}

/// Filesystem-backed provider with a per-instance cache. Relative bundle
/// paths are resolved against `root` when one is given. Contents, and read
/// failures, are cached for the provider's lifetime, so one instance serves
/// a single bundle.
pub struct FsSourceProvider {
    root: Option<PathBuf>,
    cache: Mutex<HashMap<String, Option<Arc<SourceFile>>>>,
}

impl FsSourceProvider {
    pub fn new(root: Option<PathBuf>) -> Self {
        Self {
            root,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn resolve(&self, file_path: &str) -> PathBuf {
        let path = Path::new(file_path);
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }

    fn load(&self, file_path: &str) -> Option<Arc<SourceFile>> {
        if let Some(cached) = self.cache.lock().get(file_path) {
            return cached.clone();
        }
        let resolved = self.resolve(file_path);
        let loaded = match std::fs::read(&resolved) {
            Ok(bytes) => Some(Arc::new(SourceFile::new(Arc::from(bytes)))),
            Err(e) => {
                warn!("source file {} unavailable: {e}", resolved.display());
                None
            }
        };
        self.cache
            .lock()
            .entry(file_path.to_string())
            .or_insert(loaded)
            .clone()
    }

    pub fn cached_files(&self) -> usize {
        self.cache.lock().len()
    }
}

impl SourceProvider for FsSourceProvider {
    fn read_source_line(&self, file_path: &str, line: u32) -> Option<String> {
        self.load(file_path)?.line(line)
    }

    fn read_source_file(&self, file_path: &str) -> Option<Arc<[u8]>> {
        self.load(file_path).map(|f| Arc::clone(&f.bytes))
    }
}

/// In-memory provider keyed by bundle path.
#[derive(Default)]
pub struct MemorySourceProvider {
    files: HashMap<String, Arc<SourceFile>>,
}

impl MemorySourceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, file_path: impl Into<String>, content: impl Into<Vec<u8>>) {
        let bytes: Arc<[u8]> = Arc::from(content.into());
        self.files
            .insert(file_path.into(), Arc::new(SourceFile::new(bytes)));
    }

    pub fn with_file(mut self, file_path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.insert(file_path, content);
        self
    }
}

impl SourceProvider for MemorySourceProvider {
    fn read_source_line(&self, file_path: &str, line: u32) -> Option<String> {
        self.files.get(file_path)?.line(line)
    }

    fn read_source_file(&self, file_path: &str) -> Option<Arc<[u8]>> {
        self.files.get(file_path).map(|f| Arc::clone(&f.bytes))
    }
}
