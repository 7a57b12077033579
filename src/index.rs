//! The content-addressed file index (C5): scans mount roots for packages,
//! maintains the `FileID -> FileRecord` map, and folds watcher events into it.
//!
//! A `(MountId, MountRelPath) -> FileID` reverse index is kept alongside the
//! forward map purely as an optimization so that
//! watcher-driven removals and renames, which only ever have a path in hand,
//! don't need a linear scan.

use std::path::Path;

use walkdir::WalkDir;

use crate::error::Result;
use crate::format::header::FormatHeader;
use crate::format::package::read_container;
use crate::format::record::FileRecord;
use crate::mount::Mount;
use crate::watch::WatchEvent;

#[derive(Debug, Default)]
pub struct FileIndex {
    files: std::collections::HashMap<u64, FileRecord>,
    by_path: std::collections::HashMap<(crate::mount::MountId, String), u64>,
}

fn to_mount_rel(root: &Path, path: &Path) -> Option<String> {
    path.strip_prefix(root).ok().map(|p| p.to_string_lossy().replace('\\', "/"))
}

impl FileIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: u64) -> Option<&FileRecord> {
        self.files.get(&id)
    }

    pub fn for_each(&self, mut f: impl FnMut(&FileRecord)) {
        for record in self.files.values() {
            f(record);
        }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Inserts `record`, replacing any prior record with the same `file_id`. If
    /// the record's path changed (overwrite at a new path, or a rename) the
    /// stale reverse-index entry for the old path is dropped.
    pub fn insert(&mut self, record: FileRecord) {
        let key = (record.mount_id, record.mount_rel_path.clone());
        let file_id = record.file_id;
        if let Some(prev) = self.files.insert(file_id, record) {
            let prev_key = (prev.mount_id, prev.mount_rel_path);
            if prev_key != key {
                self.by_path.remove(&prev_key);
            }
        }
        self.by_path.insert(key, file_id);
    }

    pub fn remove(&mut self, id: u64) -> Option<FileRecord> {
        let record = self.files.remove(&id)?;
        self.by_path.remove(&(record.mount_id, record.mount_rel_path.clone()));
        Some(record)
    }

    /// Drops every record belonging to `mount_id` (used on `unmount_dir`).
    pub fn remove_mount(&mut self, mount_id: crate::mount::MountId) {
        let ids: Vec<u64> =
            self.files.values().filter(|r| r.mount_id == mount_id).map(|r| r.file_id).collect();
        for id in ids {
            self.remove(id);
        }
    }

    /// Recursively enumerates regular files under `mount.root_dir_path`,
    /// validating and registering every one that parses as a package. Returns
    /// the number of files newly indexed. Non-package files are skipped
    /// silently.
    pub fn scan_mount(&mut self, mount: &Mount) -> Result<usize> {
        let mut count = 0;
        for entry in WalkDir::new(&mount.root_dir_path).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let Ok(metadata) = entry.metadata() else { continue };
            if metadata.len() < FormatHeader::SIZE as u64 {
                continue;
            }
            if self.validate_and_register(path, mount)? {
                count += 1;
            }
        }
        tracing::debug!(mount_id = mount.id.get(), indexed = count, "scanned mount");
        Ok(count)
    }

    /// Parses the header and first record at `path` and, if it is a valid
    /// package, registers it under `mount`. Returns `false` (without error) for
    /// any non-package file.
    fn validate_and_register(&mut self, path: &Path, mount: &Mount) -> Result<bool> {
        let Some((_header, mut records)) = read_container(path)? else {
            tracing::trace!(path = %path.display(), "skipping non-package file during scan");
            return Ok(false);
        };
        let Some(mut record) = records.drain(..).next() else { return Ok(false) };

        record.mount_id = mount.id;
        record.mount_rel_path =
            to_mount_rel(&mount.root_dir_path, path).unwrap_or_else(|| path.display().to_string());
        self.insert(record);
        Ok(true)
    }

    /// Re-validates and registers the single package found at `path`, called by
    /// [`Self::apply_watch_event`] for `added`/`renamed_new` events.
    fn revalidate_path(&mut self, mount: &Mount, path: &Path) -> Result<()> {
        let Ok(metadata) = std::fs::metadata(path) else { return Ok(()) };
        if !metadata.is_file() || metadata.len() < FormatHeader::SIZE as u64 {
            return Ok(());
        }
        self.validate_and_register(path, mount)?;
        Ok(())
    }

    fn remove_by_mount_path(&mut self, mount: &Mount, path: &Path) {
        let Some(rel) = to_mount_rel(&mount.root_dir_path, path) else { return };
        if let Some(id) = self.by_path.remove(&(mount.id, rel)) {
            self.files.remove(&id);
        }
    }

    /// Folds one watcher event into the index:
    /// `added`/`renamed_new` re-validate and insert; `removed`/`renamed_old`
    /// remove by path; `modified` resolves the file id (without mutating the
    /// index) so the caller can enqueue it on the hot-reload channel. Returns
    /// the file id to hot-reload, if any.
    pub fn apply_watch_event(&mut self, mount: &Mount, event: &WatchEvent) -> Result<Option<u64>> {
        match event {
            WatchEvent::Added(path) | WatchEvent::RenamedNew(path) => {
                self.revalidate_path(mount, path)?;
                Ok(None)
            }
            WatchEvent::Removed(path) | WatchEvent::RenamedOld(path) => {
                self.remove_by_mount_path(mount, path);
                Ok(None)
            }
            WatchEvent::Modified(path) => {
                let rel = to_mount_rel(&mount.root_dir_path, path);
                let id = rel.and_then(|rel| self.by_path.get(&(mount.id, rel)).copied());
                Ok(id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::package::write_single;
    use crate::mount::MountId;
    use tempfile::tempdir;

    fn mount(id: u32, root: &Path) -> Mount {
        Mount { id: MountId::new(id).unwrap(), root_dir_path: root.to_path_buf(), allow_unmount: true }
    }

    #[test]
    fn scan_finds_packages_and_skips_plain_files() {
        let dir = tempdir().unwrap();
        write_single(&dir.path().join("a.rbin"), MountId::new(1).unwrap(), 1, "a.rbin", "", &[], b"hello", false)
            .unwrap();
        std::fs::write(dir.path().join("readme.txt"), b"not a package").unwrap();

        let m = mount(1, dir.path());
        let mut index = FileIndex::new();
        let count = index.scan_mount(&m).unwrap();
        assert_eq!(count, 1);
        assert!(index.get(1).is_some());
    }

    #[test]
    fn removed_event_drops_record() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.rbin");
        write_single(&path, MountId::new(1).unwrap(), 7, "a.rbin", "", &[], b"hello", false).unwrap();

        let m = mount(1, dir.path());
        let mut index = FileIndex::new();
        index.scan_mount(&m).unwrap();
        assert!(index.get(7).is_some());

        std::fs::remove_file(&path).unwrap();
        let result = index.apply_watch_event(&m, &WatchEvent::Removed(path)).unwrap();
        assert!(result.is_none());
        assert!(index.get(7).is_none());
    }

    #[test]
    fn modified_event_resolves_file_id_without_removing_it() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.rbin");
        write_single(&path, MountId::new(1).unwrap(), 9, "a.rbin", "", &[], b"hello", false).unwrap();

        let m = mount(1, dir.path());
        let mut index = FileIndex::new();
        index.scan_mount(&m).unwrap();

        let result = index.apply_watch_event(&m, &WatchEvent::Modified(path)).unwrap();
        assert_eq!(result, Some(9));
        assert!(index.get(9).is_some());
    }

    #[test]
    fn remove_mount_drops_only_that_mounts_files() {
        let dir_a = tempdir().unwrap();
        let dir_b = tempdir().unwrap();
        write_single(&dir_a.path().join("a.rbin"), MountId::new(1).unwrap(), 1, "a.rbin", "", &[], b"a", false).unwrap();
        write_single(&dir_b.path().join("b.rbin"), MountId::new(2).unwrap(), 2, "b.rbin", "", &[], b"b", false).unwrap();

        let mut index = FileIndex::new();
        index.scan_mount(&mount(1, dir_a.path())).unwrap();
        index.scan_mount(&mount(2, dir_b.path())).unwrap();

        index.remove_mount(MountId::new(1).unwrap());
        assert!(index.get(1).is_none());
        assert!(index.get(2).is_some());
    }
}
