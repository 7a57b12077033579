//! The mount registry (C4): named associations between a [`MountId`] and a
//! directory on the host filesystem.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::constants::INVALID_MOUNT_ID;
use crate::error::{Result, VfsError};

/// A non-zero mount identifier; [`MountId::INVALID`] (zero) is never issued by
/// [`MountRegistry::mount_dir`] and is returned by lookups that find nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MountId(u32);

impl MountId {
    pub const INVALID: MountId = MountId(INVALID_MOUNT_ID);

    pub fn new(raw: u32) -> Option<Self> {
        if raw == INVALID_MOUNT_ID {
            None
        } else {
            Some(Self(raw))
        }
    }

    pub fn get(self) -> u32 {
        self.0
    }

    pub fn is_valid(self) -> bool {
        self.0 != INVALID_MOUNT_ID
    }
}

impl fmt::Display for MountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named source of content: a root directory plus the policy for whether it may
/// later be unmounted.
#[derive(Debug, Clone)]
pub struct Mount {
    pub id: MountId,
    pub root_dir_path: PathBuf,
    pub allow_unmount: bool,
}

/// Owns mount identity allocation and the live set of mounts. Mount ids are
/// monotonic for the life of the registry and are never reused, even across
/// `unmount_dir` calls.
#[derive(Debug, Default)]
pub struct MountRegistry {
    next_id: u32,
    mounts: Vec<Mount>,
}

impl MountRegistry {
    pub fn new() -> Self {
        Self { next_id: 1, mounts: Vec::new() }
    }

    /// Registers `root` as a new mount. Fails with [`VfsError::InvalidArgument`] if
    /// `root` does not exist or is not a directory.
    pub fn mount_dir(&mut self, root: impl AsRef<Path>, allow_unmount: bool) -> Result<MountId> {
        let root = root.as_ref();
        let metadata = std::fs::metadata(root).map_err(|_| {
            VfsError::InvalidArgument(format!("mount root {} does not exist", root.display()))
        })?;
        if !metadata.is_dir() {
            return Err(VfsError::InvalidArgument(format!("mount root {} is not a directory", root.display())));
        }

        let id = MountId(self.next_id);
        self.next_id += 1;
        self.mounts.push(Mount { id, root_dir_path: root.to_path_buf(), allow_unmount });
        tracing::debug!(mount_id = id.get(), root = %root.display(), "mounted directory");
        Ok(id)
    }

    /// Removes the mount iff it exists and was created with `allow_unmount = true`.
    pub fn unmount_dir(&mut self, id: MountId) -> bool {
        self.unmount_dir_detailed(id).is_ok()
    }

    /// Same as [`Self::unmount_dir`] but reports *why* a removal was refused:
    /// [`VfsError::NotFound`] for an unknown mount, [`VfsError::PolicyDenied`]
    /// for one created with `allow_unmount = false`.
    pub fn unmount_dir_detailed(&mut self, id: MountId) -> Result<()> {
        match self.mounts.iter().position(|m| m.id == id) {
            Some(idx) if self.mounts[idx].allow_unmount => {
                self.mounts.remove(idx);
                tracing::debug!(mount_id = id.get(), "unmounted directory");
                Ok(())
            }
            Some(_) => {
                tracing::warn!(mount_id = id.get(), "refusing to unmount: allow_unmount is false");
                Err(VfsError::PolicyDenied(format!("mount {id} was created with allow_unmount = false")))
            }
            None => Err(VfsError::unknown_mount(id)),
        }
    }

    pub fn get(&self, id: MountId) -> Option<&Mount> {
        self.mounts.iter().find(|m| m.id == id)
    }

    /// The first mount whose root equals `path` (after canonicalization), or
    /// [`MountId::INVALID`] if none matches.
    pub fn get_mount_id(&self, path: impl AsRef<Path>) -> MountId {
        let target = match path.as_ref().canonicalize() {
            Ok(p) => p,
            Err(_) => return MountId::INVALID,
        };
        self.mounts
            .iter()
            .find(|m| m.root_dir_path.canonicalize().map(|r| r == target).unwrap_or(false))
            .map(|m| m.id)
            .unwrap_or(MountId::INVALID)
    }

    pub fn for_each_mount(&self, mut f: impl FnMut(&Mount)) {
        for mount in &self.mounts {
            f(mount);
        }
    }

    /// `canonical(root/rel_path)` exists and has `root`'s canonical form as a prefix.
    /// Any canonicalization failure (missing file, permission) is treated as "not
    /// contained" rather than propagated.
    pub fn is_path_in_mount(&self, rel_path: impl AsRef<Path>, id: MountId) -> bool {
        let Some(mount) = self.get(id) else { return false };
        let Ok(root) = mount.root_dir_path.canonicalize() else { return false };
        let Ok(candidate) = mount.root_dir_path.join(rel_path).canonicalize() else { return false };
        candidate.starts_with(&root)
    }

    pub fn is_path_in_any_mount(&self, rel_path: impl AsRef<Path>) -> bool {
        let rel_path = rel_path.as_ref();
        self.mounts.iter().any(|m| self.is_path_in_mount(rel_path, m.id))
    }
}
