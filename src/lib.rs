//! `gfsfs`: a packaged-file virtual filesystem for games.
//!
//! The crate wraps heterogeneous content storage behind a single logical
//! namespace built from two primitives: **mounts** (named directories) and
//! **files** (binary blobs addressable by a stable, client-assigned 64-bit
//! file id). Two pieces of hard engineering sit underneath that surface:
//!
//! - a packaged binary container format ([`format`]) that wraps a payload with
//!   a header, per-file metadata, optional LZ4 compression, and a data
//!   region, with multiple files aggregable into a single archive;
//! - a content-addressed file index ([`index`]) populated by scanning mount
//!   roots and kept live by a filesystem watcher ([`watch`]), with hot-reload
//!   notification on modification ([`hotreload`]).
//!
//! [`Filesystem`] is the single public entry point; everything else in this
//! crate is a collaborator it owns. A minimal round trip:
//!
//! ```no_run
//! use gfsfs::Filesystem;
//!
//! let fs = Filesystem::new();
//! let mount = fs.mount_dir("./content", true);
//!
//! let payload = "hello, vfs".to_string();
//! fs.write_file(mount, "greeting.rbin", 1, &[], &payload, false, "");
//!
//! let mut out = String::new();
//! fs.read_file(1, &mut out);
//! assert_eq!(out, "hello, vfs");
//! ```

pub mod buffer;
pub mod constants;
pub mod error;
pub mod filesystem;
pub mod format;
pub mod hotreload;
pub mod import;
pub mod index;
pub mod mount;
pub mod stream;
pub mod watch;

pub use constants::{COMPRESS_MIN_BYTES, FORMAT_VERSION, INVALID_FILE_ID, INVALID_MOUNT_ID};
pub use error::{Result, VfsError};
pub use filesystem::Filesystem;
pub use format::FileRecord;
pub use import::FileImporter;
pub use mount::{Mount, MountId};
pub use stream::Streamable;
