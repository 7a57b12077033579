//! Per-file metadata: the in-memory [`FileRecord`] and its wire encoding.
//!
//! The wire encoding uses u16-length-prefixed strings, which is deliberately a
//! different convention from the u64-length-prefixed strings `Streamable`s use
//! (see [`crate::stream`]) — the two must never be unified without a format
//! version bump.

use std::io::{Read, Result as IoResult, Seek, SeekFrom, Write};

use crate::error::{Result, VfsError};
use crate::mount::MountId;

/// One logical file packaged inside a container (a single-file package or one
/// entry of an archive).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub file_id: u64,
    /// Not part of the wire encoding; filled in from the owning [`crate::mount::Mount`]
    /// at load time.
    pub mount_id: MountId,
    pub mount_rel_path: String,
    pub source_filename: String,
    pub file_dependencies: Vec<u64>,
    pub uncompressed_size: u32,
    pub compressed_size: u32,
    /// Absolute byte offset of this file's data region within the container file.
    /// Unknown until the container has been laid out, so writers patch this in
    /// after the fact (see [`FileRecord::write_with_offset_fixup`]).
    pub offset: u32,
}

fn write_u16_string<W: Write>(w: &mut W, s: &str) -> IoResult<()> {
    w.write_all(&(s.len() as u16).to_le_bytes())?;
    w.write_all(s.as_bytes())
}

fn read_u16_string<R: Read>(r: &mut R) -> Result<String> {
    let mut len_bytes = [0u8; 2];
    r.read_exact(&mut len_bytes).map_err(|e| VfsError::io("<record>", e))?;
    let len = u16::from_le_bytes(len_bytes) as usize;
    let mut bytes = vec![0u8; len];
    r.read_exact(&mut bytes).map_err(|e| VfsError::io("<record>", e))?;
    String::from_utf8(bytes).map_err(|e| VfsError::Format(format!("invalid UTF-8 path: {e}")))
}

impl FileRecord {
    /// Writes the record with a placeholder `Offset`, returning the absolute stream
    /// position at which that placeholder lives so the caller can seek back and
    /// patch it in once the data region's real start is known.
    pub fn write_with_offset_fixup<W: Write + Seek>(&self, w: &mut W) -> Result<u64> {
        w.write_all(&self.file_id.to_le_bytes()).map_err(|e| VfsError::io("<record>", e))?;
        write_u16_string(w, &self.mount_rel_path).map_err(|e| VfsError::io("<record>", e))?;
        write_u16_string(w, &self.source_filename).map_err(|e| VfsError::io("<record>", e))?;

        w.write_all(&(self.file_dependencies.len() as u16).to_le_bytes())
            .map_err(|e| VfsError::io("<record>", e))?;
        for dep in &self.file_dependencies {
            w.write_all(&dep.to_le_bytes()).map_err(|e| VfsError::io("<record>", e))?;
        }

        w.write_all(&self.uncompressed_size.to_le_bytes()).map_err(|e| VfsError::io("<record>", e))?;
        w.write_all(&self.compressed_size.to_le_bytes()).map_err(|e| VfsError::io("<record>", e))?;

        let offset_pos = w.stream_position().map_err(|e| VfsError::io("<record>", e))?;
        w.write_all(&0u32.to_le_bytes()).map_err(|e| VfsError::io("<record>", e))?;
        Ok(offset_pos)
    }

    /// Seeks to `offset_pos` (as returned by [`Self::write_with_offset_fixup`]) and
    /// patches in the real offset, then restores the stream's prior position.
    pub fn patch_offset<W: Write + Seek>(w: &mut W, offset_pos: u64, offset: u32) -> Result<()> {
        let restore = w.stream_position().map_err(|e| VfsError::io("<record>", e))?;
        w.seek(SeekFrom::Start(offset_pos)).map_err(|e| VfsError::io("<record>", e))?;
        w.write_all(&offset.to_le_bytes()).map_err(|e| VfsError::io("<record>", e))?;
        w.seek(SeekFrom::Start(restore)).map_err(|e| VfsError::io("<record>", e))?;
        Ok(())
    }

    pub fn read_from<R: Read>(r: &mut R) -> Result<Self> {
        let mut file_id_bytes = [0u8; 8];
        r.read_exact(&mut file_id_bytes).map_err(|e| VfsError::io("<record>", e))?;
        let file_id = u64::from_le_bytes(file_id_bytes);

        let mount_rel_path = read_u16_string(r)?;
        let source_filename = read_u16_string(r)?;

        let mut dep_count_bytes = [0u8; 2];
        r.read_exact(&mut dep_count_bytes).map_err(|e| VfsError::io("<record>", e))?;
        let dep_count = u16::from_le_bytes(dep_count_bytes) as usize;
        let mut file_dependencies = Vec::with_capacity(dep_count);
        for _ in 0..dep_count {
            let mut dep_bytes = [0u8; 8];
            r.read_exact(&mut dep_bytes).map_err(|e| VfsError::io("<record>", e))?;
            file_dependencies.push(u64::from_le_bytes(dep_bytes));
        }

        let mut u32_bytes = [0u8; 4];
        r.read_exact(&mut u32_bytes).map_err(|e| VfsError::io("<record>", e))?;
        let uncompressed_size = u32::from_le_bytes(u32_bytes);
        r.read_exact(&mut u32_bytes).map_err(|e| VfsError::io("<record>", e))?;
        let compressed_size = u32::from_le_bytes(u32_bytes);
        r.read_exact(&mut u32_bytes).map_err(|e| VfsError::io("<record>", e))?;
        let offset = u32::from_le_bytes(u32_bytes);

        Ok(Self {
            file_id,
            mount_id: MountId::INVALID,
            mount_rel_path,
            source_filename,
            file_dependencies,
            uncompressed_size,
            compressed_size,
            offset,
        })
    }
}
