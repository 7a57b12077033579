//! The filesystem facade (C6): the single public entry point that ties the
//! mount registry (C4), file index (C5), package format (C3), import
//! dispatcher (C7), and hot-reload channel (C8) together.
//!
//! Every operation here takes `&self` rather than `&mut self`. That is not
//! the obvious choice for a type whose whole job is to mutate an index and
//! write files, but it is forced by importers: an importer's `import`/
//! `reimport` callback receives `&Filesystem` and must be able to call
//! `write_file` back on it while the facade method that invoked the importer
//! is still on the stack. The mount registry, file index, watcher table and
//! importer table are therefore each wrapped in a `RefCell` — single-threaded
//! interior mutability. This type is not internally synchronized for
//! parallel callers: a `RefCell` panics on a conflicting borrow rather than
//! silently racing, which is the correct failure mode for a type that was
//! never meant to be shared across threads.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::constants::INVALID_FILE_ID;
use crate::error::{Result, VfsError};
use crate::format;
use crate::hotreload::HotReloadQueue;
use crate::import::{self, FileImporter, ImporterRegistry};
use crate::index::FileIndex;
use crate::mount::{Mount, MountId, MountRegistry};
use crate::stream::{self, Streamable};
use crate::watch::MountWatcher;

/// The virtual filesystem core. See the module docs for why every method
/// takes `&self`.
pub struct Filesystem {
    mounts: RefCell<MountRegistry>,
    index: RefCell<FileIndex>,
    watchers: RefCell<HashMap<MountId, MountWatcher>>,
    hot_reload: HotReloadQueue,
    importers: RefCell<ImporterRegistry>,
    #[allow(clippy::type_complexity)]
    reimport_callback: RefCell<Option<Box<dyn FnMut(u64)>>>,
}

impl Default for Filesystem {
    fn default() -> Self {
        Self::new()
    }
}

impl Filesystem {
    pub fn new() -> Self {
        Self {
            mounts: RefCell::new(MountRegistry::new()),
            index: RefCell::new(FileIndex::new()),
            watchers: RefCell::new(HashMap::new()),
            hot_reload: HotReloadQueue::new(),
            importers: RefCell::new(ImporterRegistry::new()),
            reimport_callback: RefCell::new(None),
        }
    }

    // ---------------------------------------------------------------- mounts

    /// Mounts `root` as a new content source, scans it for existing packages,
    /// and starts a filesystem watcher on it. Returns [`MountId::INVALID`] on
    /// failure (missing path, not a directory).
    pub fn mount_dir(&self, root: impl AsRef<Path>, allow_unmount: bool) -> MountId {
        self.mount_dir_detailed(root, allow_unmount).unwrap_or(MountId::INVALID)
    }

    pub fn mount_dir_detailed(&self, root: impl AsRef<Path>, allow_unmount: bool) -> Result<MountId> {
        let id = self.mounts.borrow_mut().mount_dir(root.as_ref(), allow_unmount)?;
        let mount = self.mounts.borrow().get(id).cloned().expect("mount was just inserted");

        let scanned = self.index.borrow_mut().scan_mount(&mount)?;
        tracing::debug!(mount_id = id.get(), root = %mount.root_dir_path.display(), scanned, "mounted directory");

        match MountWatcher::spawn(&mount.root_dir_path) {
            Ok(watcher) => {
                self.watchers.borrow_mut().insert(id, watcher);
            }
            Err(err) => {
                tracing::warn!(mount_id = id.get(), %err, "failed to start filesystem watcher; hot-reload disabled for this mount");
            }
        }

        Ok(id)
    }

    /// Unmounts `id` iff it was created with `allow_unmount = true`. On
    /// success, stops its watcher and drops every file it contributed to the
    /// index.
    pub fn unmount_dir(&self, id: MountId) -> bool {
        self.unmount_dir_detailed(id).is_ok()
    }

    pub fn unmount_dir_detailed(&self, id: MountId) -> Result<()> {
        self.mounts.borrow_mut().unmount_dir_detailed(id)?;
        self.index.borrow_mut().remove_mount(id);
        self.watchers.borrow_mut().remove(&id);
        Ok(())
    }

    pub fn get_mount_id(&self, path: impl AsRef<Path>) -> MountId {
        self.mounts.borrow().get_mount_id(path)
    }

    pub fn for_each_mount(&self, f: impl FnMut(&Mount)) {
        self.mounts.borrow().for_each_mount(f)
    }

    pub fn is_path_in_mount(&self, path: impl AsRef<Path>, id: MountId) -> bool {
        self.mounts.borrow().is_path_in_mount(path, id)
    }

    pub fn is_path_in_any_mount(&self, path: impl AsRef<Path>) -> bool {
        self.mounts.borrow().is_path_in_any_mount(path)
    }

    // ----------------------------------------------------------------- files

    /// Clones the record for `id` out of the index, if indexed. A clone
    /// rather than a borrow, since the index lives behind a `RefCell` and a
    /// `Ref<FileRecord>` would tie the caller to this call's borrow scope.
    pub fn get_file(&self, id: u64) -> Option<format::FileRecord> {
        self.index.borrow().get(id).cloned()
    }

    pub fn for_each_file(&self, f: impl FnMut(&format::FileRecord)) {
        self.index.borrow().for_each(f)
    }

    /// Stages `payload` through the `Streamable` codec, applies the
    /// compression policy, writes a single-file package to
    /// `mount_id`'s root, and registers the resulting record in the index.
    /// Fails (and leaves the index unchanged) if `mount_id` is unknown,
    /// `filename` is empty, `file_id` is [`crate::constants::INVALID_FILE_ID`],
    /// or any I/O step fails.
    pub fn write_file(
        &self,
        mount_id: MountId,
        filename: &str,
        file_id: u64,
        deps: &[u64],
        payload: &impl Streamable,
        compress: bool,
        source_filename: &str,
    ) -> bool {
        self.write_file_detailed(mount_id, filename, file_id, deps, payload, compress, source_filename).is_ok()
    }

    pub fn write_file_detailed(
        &self,
        mount_id: MountId,
        filename: &str,
        file_id: u64,
        deps: &[u64],
        payload: &impl Streamable,
        compress: bool,
        source_filename: &str,
    ) -> Result<()> {
        if filename.is_empty() {
            return Err(VfsError::InvalidArgument("filename must not be empty".into()));
        }
        if file_id == INVALID_FILE_ID {
            return Err(VfsError::InvalidArgument("file_id must not be 0".into()));
        }
        let mount = self.mounts.borrow().get(mount_id).cloned().ok_or_else(|| VfsError::unknown_mount(mount_id))?;

        let staged = stream::stage(payload);
        let dest_path = mount.root_dir_path.join(filename);
        let record = format::write_single(
            &dest_path,
            mount_id,
            file_id,
            filename,
            source_filename,
            deps,
            staged.as_slice(),
            compress,
        )?;

        tracing::debug!(
            mount_id = mount_id.get(),
            file_id,
            uncompressed = record.uncompressed_size,
            compressed = record.compressed_size,
            "wrote file"
        );
        self.index.borrow_mut().insert(record);
        Ok(())
    }

    /// Resolves `file_id`, opens its container, seeks to its data region,
    /// decompresses if necessary, and hydrates `out`.
    pub fn read_file(&self, file_id: u64, out: &mut impl Streamable) -> bool {
        self.read_file_detailed(file_id, out).is_ok()
    }

    pub fn read_file_detailed(&self, file_id: u64, out: &mut impl Streamable) -> Result<()> {
        let record = self.index.borrow().get(file_id).cloned().ok_or_else(|| VfsError::unknown_file(file_id))?;
        let mount =
            self.mounts.borrow().get(record.mount_id).cloned().ok_or_else(|| VfsError::unknown_mount(record.mount_id))?;

        let path = mount.root_dir_path.join(&record.mount_rel_path);
        let bytes = format::read_data_region(&path, record.offset, record.uncompressed_size, record.compressed_size)?;
        stream::hydrate(out, bytes)?;

        tracing::debug!(file_id, bytes = record.uncompressed_size, "read file");
        Ok(())
    }

    /// Aggregates `file_ids`, in order, into a single archive at
    /// `mount_id`/`filename`. Each source file's data region is copied
    /// verbatim — already-compressed files stay compressed, nothing is
    /// re-encoded. The in-memory record for each file is updated to point at
    /// the archive (`MountId` and `MountRelPath` both change); **the original
    /// single-file packages are left on disk untouched** — cleaning them up,
    /// if desired, is the caller's responsibility.
    pub fn create_archive(&self, mount_id: MountId, filename: &str, file_ids: &[u64]) -> bool {
        self.create_archive_detailed(mount_id, filename, file_ids).is_ok()
    }

    pub fn create_archive_detailed(&self, mount_id: MountId, filename: &str, file_ids: &[u64]) -> Result<()> {
        if filename.is_empty() {
            return Err(VfsError::InvalidArgument("filename must not be empty".into()));
        }
        let mount = self.mounts.borrow().get(mount_id).cloned().ok_or_else(|| VfsError::unknown_mount(mount_id))?;

        let mut entries = Vec::with_capacity(file_ids.len());
        for &id in file_ids {
            let record = self.index.borrow().get(id).cloned().ok_or_else(|| VfsError::unknown_file(id))?;
            let src_mount = self
                .mounts
                .borrow()
                .get(record.mount_id)
                .cloned()
                .ok_or_else(|| VfsError::unknown_mount(record.mount_id))?;
            let src_path = src_mount.root_dir_path.join(&record.mount_rel_path);
            let data = format::read_raw_region(&src_path, record.offset, record.compressed_size)?;
            entries.push(format::ArchiveEntry { record, data });
        }

        let dest_path = mount.root_dir_path.join(filename);
        let records = format::write_archive(&dest_path, mount_id, filename, entries)?;

        let mut index = self.index.borrow_mut();
        for record in &records {
            index.insert(record.clone());
        }

        tracing::debug!(mount_id = mount_id.get(), filename, count = records.len(), "created archive");
        Ok(())
    }

    // --------------------------------------------------------------- imports

    pub fn set_importer(&self, exts: &[&str], importer: Arc<dyn FileImporter>) {
        self.importers.borrow_mut().set_importer(exts, importer);
    }

    pub fn get_importer(&self, ext: &str) -> Option<Arc<dyn FileImporter>> {
        self.importers.borrow().get_importer(ext)
    }

    /// Looks up an importer by `source_path`'s extension and delegates to its
    /// `import`. Fails if the path doesn't exist, has no extension, or no
    /// importer is registered for it.
    pub fn import(&self, source_path: impl AsRef<Path>, output_mount: MountId, output_dir: &str) -> bool {
        self.import_detailed(source_path, output_mount, output_dir).unwrap_or(false)
    }

    pub fn import_detailed(&self, source_path: impl AsRef<Path>, output_mount: MountId, output_dir: &str) -> Result<bool> {
        let source_path = source_path.as_ref();
        if !source_path.is_file() {
            return Err(VfsError::NotFound(format!("source file {} does not exist", source_path.display())));
        }
        let ext = import::dot_extension(source_path)
            .ok_or_else(|| VfsError::InvalidArgument(format!("{} has no extension", source_path.display())))?;
        let importer = self
            .importers
            .borrow()
            .get_importer(&ext)
            .ok_or_else(|| VfsError::NotFound(format!("no importer registered for {ext}")))?;

        Ok(importer.import(self, source_path, output_mount, output_dir))
    }

    /// Re-runs the import that produced `file_id`, using its recorded
    /// `source_filename`. Fails if the file is unindexed, has no recorded
    /// source, that source no longer exists, or no importer matches its
    /// extension.
    pub fn reimport(&self, file_id: u64) -> bool {
        self.reimport_detailed(file_id).unwrap_or(false)
    }

    pub fn reimport_detailed(&self, file_id: u64) -> Result<bool> {
        let record = self.index.borrow().get(file_id).cloned().ok_or_else(|| VfsError::unknown_file(file_id))?;
        if record.source_filename.is_empty() {
            return Err(VfsError::InvalidArgument(format!("file {file_id} has no recorded source filename")));
        }
        let source_path = Path::new(&record.source_filename);
        if !source_path.is_file() {
            return Err(VfsError::NotFound(format!("source file {} does not exist", source_path.display())));
        }
        let ext = import::dot_extension(source_path)
            .ok_or_else(|| VfsError::InvalidArgument(format!("{} has no extension", source_path.display())))?;
        let importer = self
            .importers
            .borrow()
            .get_importer(&ext)
            .ok_or_else(|| VfsError::NotFound(format!("no importer registered for {ext}")))?;

        Ok(importer.reimport(self, &record))
    }

    // ------------------------------------------------------------ hot-reload

    /// Registers the callback `tick()` invokes once per hot-reloaded
    /// `FileID`. Replaces any previously registered callback.
    pub fn set_file_reimport_callback(&self, callback: impl FnMut(u64) + 'static) {
        *self.reimport_callback.borrow_mut() = Some(Box::new(callback));
    }

    /// Drains every mount's watcher, folding `added`/`removed`/`renamed_*`
    /// events into the index synchronously and pushing `modified` events onto
    /// the hot-reload queue; then drains that queue and invokes the
    /// reimport callback once per entry, in the order the watcher observed
    /// them.
    pub fn tick(&self) {
        let mounts: Vec<Mount> = {
            let registry = self.mounts.borrow();
            let mut collected = Vec::new();
            registry.for_each_mount(|m| collected.push(m.clone()));
            collected
        };

        {
            let watchers = self.watchers.borrow();
            for mount in &mounts {
                let Some(watcher) = watchers.get(&mount.id) else { continue };
                for event in watcher.drain() {
                    match self.index.borrow_mut().apply_watch_event(mount, &event) {
                        Ok(Some(file_id)) => self.hot_reload.push(file_id),
                        Ok(None) => {}
                        Err(err) => {
                            tracing::warn!(mount_id = mount.id.get(), %err, "failed to apply filesystem watch event");
                        }
                    }
                }
            }
        }

        let reloaded = self.hot_reload.drain();
        if reloaded.is_empty() {
            return;
        }
        let mut callback = self.reimport_callback.borrow_mut();
        if let Some(cb) = callback.as_mut() {
            for file_id in reloaded {
                cb(file_id);
            }
        }
    }

    /// Test-only hook: applies a watcher event directly, bypassing a real OS
    /// watcher, so hot-reload and removal semantics can be exercised
    /// deterministically.
    #[cfg(any(test, feature = "test-util"))]
    pub fn simulate_watch_event(&self, mount_id: MountId, event: crate::watch::WatchEvent) {
        let Some(mount) = self.mounts.borrow().get(mount_id).cloned() else { return };
        match self.index.borrow_mut().apply_watch_event(&mount, &event) {
            Ok(Some(file_id)) => self.hot_reload.push(file_id),
            Ok(None) => {}
            Err(err) => tracing::warn!(mount_id = mount_id.get(), %err, "failed to apply simulated watch event"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell as StdRefCell;
    use std::rc::Rc;
    use tempfile::tempdir;

    #[derive(Debug, Default, PartialEq)]
    struct Pod3 {
        a: u32,
        b: f32,
        c: bool,
    }

    impl Streamable for Pod3 {
        fn write(&self, buf: &mut crate::buffer::WriteBuffer) {
            self.a.write(buf);
            self.b.write(buf);
            self.c.write(buf);
        }
        fn read(&mut self, buf: &mut crate::buffer::ReadBuffer) -> Result<()> {
            self.a.read(buf)?;
            self.b.read(buf)?;
            self.c.read(buf)
        }
    }

    #[test]
    fn s1_pod_round_trip_uncompressed() {
        let dir = tempdir().unwrap();
        let fs = Filesystem::new();
        let m = fs.mount_dir(dir.path(), true);
        assert!(m.is_valid());

        let payload = Pod3 { a: 5, b: 3.1415, c: true };
        assert!(fs.write_file(m, "file.rbin", 234598753, &[], &payload, false, ""));

        let mut out = Pod3::default();
        assert!(fs.read_file(234598753, &mut out));
        assert_eq!(out, payload);
    }

    #[test]
    fn s3_large_text_compress_requested_but_below_threshold_is_suppressed() {
        let dir = tempdir().unwrap();
        let fs = Filesystem::new();
        let m = fs.mount_dir(dir.path(), true);

        let payload = "the quick brown fox ".repeat(20);
        assert!(fs.write_file(m, "small.rbin", 67236784, &[], &payload, true, ""));

        let record = fs.get_file(67236784).unwrap();
        assert_eq!(record.uncompressed_size, record.compressed_size);
    }

    #[test]
    fn s4_large_text_actually_compresses_and_round_trips() {
        let dir = tempdir().unwrap();
        let fs = Filesystem::new();
        let m = fs.mount_dir(dir.path(), true);

        let unit = "the quick brown fox jumps over the lazy dog. ".repeat(12);
        let payload = unit.repeat(1000);
        assert!(fs.write_file(m, "large.rbin", 8367428478, &[], &payload, true, ""));

        let record = fs.get_file(8367428478).unwrap();
        assert!(record.compressed_size < record.uncompressed_size);

        let mut out = String::new();
        assert!(fs.read_file(8367428478, &mut out));
        assert_eq!(out, payload);
    }

    #[test]
    fn s5_archive_equivalence() {
        let dir = tempdir().unwrap();
        let fs = Filesystem::new();
        let m = fs.mount_dir(dir.path(), true);

        let ids = [1111u64, 2222, 3333, 4444];
        for &id in &ids {
            let payload = format!("I am file {id}!");
            assert!(fs.write_file(m, &format!("{id}.rbin"), id, &[], &payload, false, ""));
        }

        assert!(fs.create_archive(m, "archive.rpak", &ids));

        for &id in &ids {
            let mut out = String::new();
            assert!(fs.read_file(id, &mut out));
            assert_eq!(out, format!("I am file {id}!"));
            assert_eq!(fs.get_file(id).unwrap().mount_rel_path, "archive.rpak");
        }
    }

    #[test]
    fn s6_locked_mount_cannot_be_unmounted() {
        let dir = tempdir().unwrap();
        let fs = Filesystem::new();
        let m = fs.mount_dir(dir.path(), false);

        assert!(fs.write_file(m, "a.rbin", 1, &[], &"hi".to_string(), false, ""));
        assert!(!fs.unmount_dir(m));
        assert!(fs.get_file(1).is_some());
    }

    #[test]
    fn overwrite_replaces_prior_record_and_bytes() {
        let dir = tempdir().unwrap();
        let fs = Filesystem::new();
        let m = fs.mount_dir(dir.path(), true);

        assert!(fs.write_file(m, "a.rbin", 1, &[], &"first".to_string(), false, ""));
        assert!(fs.write_file(m, "a.rbin", 1, &[], &"second".to_string(), false, ""));

        let mut out = String::new();
        assert!(fs.read_file(1, &mut out));
        assert_eq!(out, "second");
    }

    #[test]
    fn write_file_detailed_reports_unknown_mount() {
        let fs = Filesystem::new();
        let err = fs.write_file_detailed(MountId::new(99).unwrap(), "a.rbin", 1, &[], &"x".to_string(), false, "");
        assert!(matches!(err, Err(VfsError::NotFound(_))));
    }

    #[test]
    fn hot_reload_ordering_via_simulated_events() {
        let dir = tempdir().unwrap();
        let fs = Filesystem::new();
        let m = fs.mount_dir(dir.path(), true);

        assert!(fs.write_file(m, "x.rbin", 10, &[], &"x".to_string(), false, ""));
        assert!(fs.write_file(m, "y.rbin", 20, &[], &"y".to_string(), false, ""));

        let order = Rc::new(StdRefCell::new(Vec::new()));
        let order_clone = order.clone();
        fs.set_file_reimport_callback(move |id| order_clone.borrow_mut().push(id));

        fs.simulate_watch_event(m, crate::watch::WatchEvent::Modified(dir.path().join("x.rbin")));
        fs.simulate_watch_event(m, crate::watch::WatchEvent::Modified(dir.path().join("y.rbin")));
        fs.tick();

        assert_eq!(*order.borrow(), vec![10, 20]);
    }

    #[test]
    fn watcher_driven_removal_via_simulated_event() {
        let dir = tempdir().unwrap();
        let fs = Filesystem::new();
        let m = fs.mount_dir(dir.path(), true);
        assert!(fs.write_file(m, "z.rbin", 30, &[], &"z".to_string(), false, ""));

        std::fs::remove_file(dir.path().join("z.rbin")).unwrap();
        fs.simulate_watch_event(m, crate::watch::WatchEvent::Removed(dir.path().join("z.rbin")));

        assert!(fs.get_file(30).is_none());
    }

    #[test]
    fn importer_dispatch_and_unregistered_extension() {
        struct EchoImporter;
        impl FileImporter for EchoImporter {
            fn import(&self, fs: &Filesystem, source_path: &Path, output_mount: MountId, _output_dir: &str) -> bool {
                let text = std::fs::read_to_string(source_path).unwrap_or_default();
                fs.write_file(output_mount, "imported.rbin", 555, &[], &text, false, &source_path.display().to_string())
            }
            fn reimport(&self, fs: &Filesystem, file: &format::FileRecord) -> bool {
                let text = std::fs::read_to_string(&file.source_filename).unwrap_or_default();
                fs.write_file(file.mount_id, &file.mount_rel_path, file.file_id, &[], &text, false, &file.source_filename)
            }
        }

        let dir = tempdir().unwrap();
        let fs = Filesystem::new();
        let m = fs.mount_dir(dir.path(), true);

        let source = dir.path().join("a.txt");
        std::fs::write(&source, "hello").unwrap();

        assert!(!fs.import(&source, m, ""));
        fs.set_importer(&[".txt"], Arc::new(EchoImporter));
        assert!(fs.import(&source, m, ""));

        let mut out = String::new();
        assert!(fs.read_file(555, &mut out));
        assert_eq!(out, "hello");

        assert!(fs.reimport(555));
    }
}
