//! The packaged binary container format (C3): header, per-file records, optional
//! LZ4 compression, and the data region. This module implements the wire
//! layout byte-for-byte.

pub mod compress;
pub mod header;
pub mod package;
pub mod record;

pub use header::FormatHeader;
pub use package::{
    read_container, read_container_strict, read_data_region, read_raw_region, write_archive, write_single,
    ArchiveEntry,
};
pub use record::FileRecord;
