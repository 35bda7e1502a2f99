//! Compiled template cache.
//!
//! Templates are compiled at most once per file modification: the cache
//! keys on the template path and the compiler's pass pipeline, and keeps the
//! modification time the compiled text was produced from. The same file read
//! through the Pistachio and plain adapters is cached twice.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;

use tracing::debug;

use crate::compiler::Compiler;
use crate::error::RenderError;
use crate::stream::TemplateStream;

/// Template path plus the names of the passes that compiled it.
type CacheKey = (PathBuf, Vec<&'static str>);

#[derive(Debug)]
struct CacheEntry {
    modified: SystemTime,
    compiled: Arc<str>,
}

/// Thread-safe cache of compiled templates.
#[derive(Debug, Default)]
pub struct CompileCache {
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
    compilations: AtomicUsize,
}

impl CompileCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the compiled text of the template at `path`, compiling it
    /// when it is not cached or changed on disk since it was cached.
    pub fn load(&self, path: &Path, compiler: &Compiler) -> Result<Arc<str>, RenderError> {
        let key = (path.to_path_buf(), compiler.pass_names());
        let mut entries = self.lock();

        if let Some(entry) = entries.get(&key) {
            let modified = std::fs::metadata(path)?.modified().ok();
            if modified == Some(entry.modified) {
                return Ok(Arc::clone(&entry.compiled));
            }
            debug!("Template {} changed, recompiling", path.display());
        }

        let mut stream = TemplateStream::open(path, compiler)?;
        let mut compiled = String::with_capacity(stream.len() as usize);
        stream.read_to_string(&mut compiled)?;
        let compiled: Arc<str> = Arc::from(compiled);
        self.compilations.fetch_add(1, Ordering::Relaxed);
        debug!("Compiled template {}", path.display());

        // Without a modification time there is nothing to validate against.
        if let Some(modified) = stream.modified() {
            entries.insert(
                key,
                CacheEntry {
                    modified,
                    compiled: Arc::clone(&compiled),
                },
            );
        }
        Ok(compiled)
    }

    /// Number of compilations performed so far.
    pub fn compilations(&self) -> usize {
        self.compilations.load(Ordering::Relaxed)
    }

    /// Whether `path` is cached for any compiler.
    pub fn contains(&self, path: &Path) -> bool {
        self.lock().keys().any(|(cached, _)| cached == path)
    }

    /// Drops every compiled version of `path`.
    pub fn invalidate(&self, path: &Path) -> bool {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|(cached, _), _| cached != path);
        entries.len() != before
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
