//! Compile-time configuration. The core reads no environment variables and no
//! config files: everything a caller can tune is either one of these constants
//! or an explicit argument on the operation itself (`compress`, `allow_unmount`, ...).

/// Container magic number, the ASCII bytes `"gfsf"`.
pub const MAGIC: [u8; 4] = *b"gfsf";

/// Current on-disk format version. Bump this (and extend [`crate::format::header::FormatHeader`])
/// before changing any wire layout; readers reject unknown versions outright.
pub const FORMAT_VERSION: u16 = 1;

/// Compression is only attempted when the uncompressed payload is at least this large.
/// Below this threshold `compress = true` is silently downgraded to verbatim storage.
pub const COMPRESS_MIN_BYTES: u64 = 524_288;

/// Reserved, never-issued mount id.
pub const INVALID_MOUNT_ID: u32 = 0;

/// Reserved, never-valid file id.
pub const INVALID_FILE_ID: u64 = 0;
