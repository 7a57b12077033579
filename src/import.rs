//! The import dispatcher (C7): routes a source file to a pluggable importer by
//! its extension, and back the other way for `reimport`.
//!
//! No concrete importer ships in this crate — any asset pipeline (texture
//! cooking, shader compilation, whatever) is a collaborator implementing
//! [`FileImporter`]. What lives here is the table and the trait it dispatches
//! through.

use std::path::Path;
use std::sync::Arc;

use crate::error::Result;
use crate::format::record::FileRecord;
use crate::mount::MountId;

/// A pluggable content importer. Implementors translate a source asset (e.g. a
/// `.png` or `.wav`) into one or more packaged files by calling back into the
/// [`crate::Filesystem`] that invoked them.
pub trait FileImporter: Send + Sync {
    /// Imports `source_path` into `output_mount`/`output_dir`. Returns whether
    /// the import succeeded.
    fn import(&self, fs: &crate::Filesystem, source_path: &Path, output_mount: MountId, output_dir: &str) -> bool;

    /// Re-runs the import for a file that was already produced once, using its
    /// recorded `source_filename`.
    fn reimport(&self, fs: &crate::Filesystem, file: &FileRecord) -> bool;
}

/// Extension (dot-prefixed, e.g. `.png`) to importer table. Matching is
/// case-sensitive.
#[derive(Default)]
pub struct ImporterRegistry {
    by_ext: std::collections::HashMap<String, Arc<dyn FileImporter>>,
}

impl ImporterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `importer` to every extension in `exts`, overwriting any prior
    /// binding. Multiple extensions may share the same importer.
    pub fn set_importer(&mut self, exts: &[&str], importer: Arc<dyn FileImporter>) {
        for ext in exts {
            self.by_ext.insert(ext.to_string(), importer.clone());
        }
    }

    pub fn get_importer(&self, ext: &str) -> Option<Arc<dyn FileImporter>> {
        self.by_ext.get(ext).cloned()
    }
}

/// Extracts the dot-prefixed extension `import`/`reimport` dispatch on, e.g.
/// `"a/b.png"` -> `Some(".png")`. Returns `None` for an extensionless path.
pub fn dot_extension(path: &Path) -> Option<String> {
    path.extension().map(|ext| format!(".{}", ext.to_string_lossy()))
}

pub type ImportResult = Result<bool>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingImporter {
        imports: AtomicUsize,
        reimports: AtomicUsize,
    }

    impl FileImporter for CountingImporter {
        fn import(&self, _fs: &crate::Filesystem, _source_path: &Path, _output_mount: MountId, _output_dir: &str) -> bool {
            self.imports.fetch_add(1, Ordering::SeqCst);
            true
        }
        fn reimport(&self, _fs: &crate::Filesystem, _file: &FileRecord) -> bool {
            self.reimports.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    #[test]
    fn shared_importer_across_extensions() {
        let importer = Arc::new(CountingImporter { imports: AtomicUsize::new(0), reimports: AtomicUsize::new(0) });
        let mut registry = ImporterRegistry::new();
        registry.set_importer(&[".png", ".jpg"], importer.clone());

        assert!(registry.get_importer(".png").is_some());
        assert!(registry.get_importer(".jpg").is_some());
        assert!(registry.get_importer(".bmp").is_none());
    }

    #[test]
    fn extension_extraction() {
        assert_eq!(dot_extension(Path::new("a/b.png")), Some(".png".to_string()));
        assert_eq!(dot_extension(Path::new("a/b")), None);
    }
}
