//! The fixed-size header every package or archive begins with.

use std::io::{Read, Write};

use crate::constants::{FORMAT_VERSION, MAGIC};
use crate::error::{Result, VfsError};

/// `magic (4) | version (2) | file_count (4)`, little-endian, tightly packed.
///
/// Serialized by hand (field-by-field, not via `#[repr(C)]` + `bytemuck::Pod`)
/// because `version: u16` followed by `file_count: u32` would otherwise pick
/// up two bytes of compiler-inserted alignment padding between them, which
/// would break the exact 10-byte wire layout this format commits to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatHeader {
    pub magic: [u8; 4],
    pub version: u16,
    pub file_count: u32,
}

impl FormatHeader {
    /// `4 (magic) + 2 (version) + 4 (file_count)`, not `size_of::<Self>()` —
    /// see the struct-level doc comment on why those can differ.
    pub const SIZE: usize = 4 + 2 + 4;

    pub fn new(file_count: u32) -> Self {
        Self { magic: MAGIC, version: FORMAT_VERSION, file_count }
    }

    pub fn write_to<W: Write>(&self, mut w: W) -> Result<()> {
        w.write_all(&self.magic).map_err(|e| VfsError::io("<header>", e))?;
        w.write_all(&self.version.to_le_bytes()).map_err(|e| VfsError::io("<header>", e))?;
        w.write_all(&self.file_count.to_le_bytes()).map_err(|e| VfsError::io("<header>", e))
    }

    /// Reads and validates a header. Returns `Ok(None)` if the magic number does not
    /// match — a magic mismatch during a scan is a silent skip, not an
    /// error. A short read (file smaller than the header) is also treated as "not a
    /// package" rather than an I/O failure, since that is the common case for an
    /// arbitrary non-package file sitting in a mount directory.
    pub fn read_from<R: Read>(mut r: R) -> Result<Option<Self>> {
        let mut magic = [0u8; 4];
        if let Err(e) = r.read_exact(&mut magic) {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                return Ok(None);
            }
            return Err(VfsError::io("<header>", e));
        }
        if magic != MAGIC {
            return Ok(None);
        }

        let mut version_bytes = [0u8; 2];
        let mut count_bytes = [0u8; 4];
        if let Err(e) = r.read_exact(&mut version_bytes).and_then(|_| r.read_exact(&mut count_bytes)) {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                return Ok(None);
            }
            return Err(VfsError::io("<header>", e));
        }
        let version = u16::from_le_bytes(version_bytes);
        let file_count = u32::from_le_bytes(count_bytes);

        if version != FORMAT_VERSION {
            return Err(VfsError::Format(format!(
                "unsupported format version {version} (expected {FORMAT_VERSION})"
            )));
        }
        Ok(Some(Self { magic, version, file_count }))
    }
}
