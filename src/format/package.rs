//! Lays out a container file on disk: header, records, data region. This is the
//! piece that ties [`super::header`], [`super::record`] and [`super::compress`]
//! together into the actual read/write operations the facade (C6) calls.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::{Result, VfsError};
use crate::format::compress::{self, CompressionOutcome};
use crate::format::header::FormatHeader;
use crate::format::record::FileRecord;
use crate::mount::MountId;

fn open_write(path: &Path) -> Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(|e| VfsError::io(path, e))
}

fn open_read(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| VfsError::io(path, e))
}

/// Writes a single-file package (`FileCount = 1`) to `dest_path`. Returns the
/// finalized [`FileRecord`] (offset already fixed up). `mount_id` is not written to
/// disk but is carried on the returned record for the caller's convenience.
pub fn write_single(
    dest_path: &Path,
    mount_id: MountId,
    file_id: u64,
    mount_rel_path: &str,
    source_filename: &str,
    deps: &[u64],
    payload: &[u8],
    compress: bool,
) -> Result<FileRecord> {
    let CompressionOutcome { bytes, uncompressed_size, compressed_size } = compress::maybe_compress(payload, compress)?;

    let mut record = FileRecord {
        file_id,
        mount_id,
        mount_rel_path: mount_rel_path.to_string(),
        source_filename: source_filename.to_string(),
        file_dependencies: deps.to_vec(),
        uncompressed_size,
        compressed_size,
        offset: 0,
    };

    let file = open_write(dest_path)?;
    let mut w = BufWriter::new(file);

    FormatHeader::new(1).write_to(&mut w)?;
    let offset_pos = record.write_with_offset_fixup(&mut w)?;

    let data_start = w.stream_position().map_err(|e| VfsError::io(dest_path, e))?;
    std::io::Write::write_all(&mut w, &bytes).map_err(|e| VfsError::io(dest_path, e))?;

    let offset = u32::try_from(data_start)
        .map_err(|_| VfsError::Format("container exceeds 4 GiB offset range".into()))?;
    FileRecord::patch_offset(&mut w, offset_pos, offset)?;
    record.offset = offset;

    Ok(record)
}

/// One already-packaged file going into an archive: its record (sizes, id, deps,
/// etc. already final; `offset` and `mount_rel_path` are overwritten by the archive
/// writer) and the verbatim bytes of its data region, read straight from its source
/// container without re-compressing or re-decompressing.
pub struct ArchiveEntry {
    pub record: FileRecord,
    pub data: Vec<u8>,
}

/// Writes an archive (`FileCount = N`) containing `entries` in order, rewriting each
/// record's `MountId` and `MountRelPath` to the archive's mount and filename and
/// patching in its real offset. Returns the finalized records in the same order
/// as `entries`.
pub fn write_archive(
    dest_path: &Path,
    mount_id: MountId,
    archive_rel_path: &str,
    entries: Vec<ArchiveEntry>,
) -> Result<Vec<FileRecord>> {
    let file = open_write(dest_path)?;
    let mut w = BufWriter::new(file);

    FormatHeader::new(entries.len() as u32).write_to(&mut w)?;

    let mut records: Vec<FileRecord> = Vec::with_capacity(entries.len());
    let mut offset_positions: Vec<u64> = Vec::with_capacity(entries.len());
    for entry in &entries {
        let mut record = entry.record.clone();
        record.mount_id = mount_id;
        record.mount_rel_path = archive_rel_path.to_string();
        let offset_pos = record.write_with_offset_fixup(&mut w)?;
        offset_positions.push(offset_pos);
        records.push(record);
    }

    for (record, entry) in records.iter_mut().zip(entries.into_iter()) {
        let data_start = w.stream_position().map_err(|e| VfsError::io(dest_path, e))?;
        let offset = u32::try_from(data_start)
            .map_err(|_| VfsError::Format("container exceeds 4 GiB offset range".into()))?;
        std::io::Write::write_all(&mut w, &entry.data).map_err(|e| VfsError::io(dest_path, e))?;
        record.offset = offset;
    }

    for (record, offset_pos) in records.iter().zip(offset_positions.into_iter()) {
        FileRecord::patch_offset(&mut w, offset_pos, record.offset)?;
    }

    Ok(records)
}

/// Reads and validates the header and all `FileCount` records at the start of
/// `path`. Returns `Ok(None)` when the file is not a package at all (magic
/// mismatch or short read) — this is a silent skip during a mount scan,
/// not an error. Each returned record's `mount_id` is [`MountId::INVALID`]; the
/// caller (the file index, which knows which mount it is scanning) fills it in.
pub fn read_container(path: &Path) -> Result<Option<(FormatHeader, Vec<FileRecord>)>> {
    let file = open_read(path)?;
    let mut r = BufReader::new(file);

    let header = match FormatHeader::read_from(&mut r)? {
        Some(h) => h,
        None => return Ok(None),
    };

    let mut records = Vec::with_capacity(header.file_count as usize);
    for _ in 0..header.file_count {
        records.push(FileRecord::read_from(&mut r)?);
    }

    Ok(Some((header, records)))
}

/// Same as [`read_container`] but fails loudly on a magic mismatch instead of
/// silently skipping — used by `read_file`, where the caller already believes this
/// path holds a specific indexed file and a mismatch is a genuine format error.
pub fn read_container_strict(path: &Path) -> Result<(FormatHeader, Vec<FileRecord>)> {
    read_container(path)?.ok_or_else(|| VfsError::Format(format!("{} is not a gfsf package", path.display())))
}

/// Reads exactly `compressed_size` bytes starting at `offset` and decompresses them
/// if necessary (see [`compress::decompress`]).
pub fn read_data_region(path: &Path, offset: u32, uncompressed_size: u32, compressed_size: u32) -> Result<Vec<u8>> {
    let mut file = open_read(path)?;
    file.seek(SeekFrom::Start(offset as u64)).map_err(|e| VfsError::io(path, e))?;

    let mut raw = vec![0u8; compressed_size as usize];
    file.read_exact(&mut raw).map_err(|e| VfsError::io(path, e))?;

    compress::decompress(&raw, uncompressed_size, compressed_size)
}

/// Reads exactly `compressed_size` bytes starting at `offset` verbatim, without
/// decompressing. Used by `create_archive`, which copies each source file's
/// data region into the archive byte-for-byte.
pub fn read_raw_region(path: &Path, offset: u32, compressed_size: u32) -> Result<Vec<u8>> {
    let mut file = open_read(path)?;
    file.seek(SeekFrom::Start(offset as u64)).map_err(|e| VfsError::io(path, e))?;

    let mut raw = vec![0u8; compressed_size as usize];
    file.read_exact(&mut raw).map_err(|e| VfsError::io(path, e))?;
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn write_single_then_read_back_verbatim() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("file.rbin");
        let payload = b"hello, package format";

        let record = write_single(&path, MountId::new(1).unwrap(), 77, "file.rbin", "", &[], payload, false).unwrap();
        assert_eq!(record.uncompressed_size, record.compressed_size);

        let (header, records) = read_container(&path).unwrap().unwrap();
        assert_eq!(header.file_count, 1);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].file_id, 77);

        let data = read_data_region(&path, records[0].offset, records[0].uncompressed_size, records[0].compressed_size).unwrap();
        assert_eq!(data, payload);
    }

    #[test]
    fn non_package_file_is_silent_none() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plain.txt");
        std::fs::write(&path, b"not a package").unwrap();
        assert!(read_container(&path).unwrap().is_none());
    }

    #[test]
    fn non_package_file_is_format_error_when_read_strictly() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plain.txt");
        std::fs::write(&path, b"not a package").unwrap();
        assert!(matches!(read_container_strict(&path), Err(VfsError::Format(_))));
    }

    #[test]
    fn write_archive_preserves_order_and_bytes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("archive.rpak");

        let entries = vec![
            ArchiveEntry {
                record: FileRecord {
                    file_id: 1,
                    mount_id: MountId::new(1).unwrap(),
                    mount_rel_path: "a.rbin".into(),
                    source_filename: String::new(),
                    file_dependencies: vec![],
                    uncompressed_size: 5,
                    compressed_size: 5,
                    offset: 0,
                },
                data: b"alpha".to_vec(),
            },
            ArchiveEntry {
                record: FileRecord {
                    file_id: 2,
                    mount_id: MountId::new(1).unwrap(),
                    mount_rel_path: "b.rbin".into(),
                    source_filename: String::new(),
                    file_dependencies: vec![],
                    uncompressed_size: 4,
                    compressed_size: 4,
                    offset: 0,
                },
                data: b"beta".to_vec(),
            },
        ];

        let records = write_archive(&path, MountId::new(1).unwrap(), "archive.rpak", entries).unwrap();
        assert_eq!(records[0].file_id, 1);
        assert_eq!(records[1].file_id, 2);
        assert_eq!(records[0].mount_rel_path, "archive.rpak");

        let data0 = read_data_region(&path, records[0].offset, records[0].uncompressed_size, records[0].compressed_size).unwrap();
        let data1 = read_data_region(&path, records[1].offset, records[1].uncompressed_size, records[1].compressed_size).unwrap();
        assert_eq!(data0, b"alpha");
        assert_eq!(data1, b"beta");
    }
}
