//! Repository Metadata Layer: `repomd.xml` parsing, the primary/filelists
//! SQLite query layers, metalink parsing, and payload decompression.
//!
//! This crate owns every descriptor it parses and every SQLite connection
//! it opens; callers (the Upgrade Engine) share it by reference for the
//! duration of one upgrade, never mutate it concurrently from more than
//! one cooperative task.

pub mod compress;
pub mod error;
pub mod filelists;
pub mod metalink;
pub mod primary;
pub mod repomd;

pub use compress::decompress_zstd;
pub use error::RepomdError;
pub use filelists::FilelistsStore;
pub use metalink::parse_metalink;
pub use primary::{PrimaryStore, RemotePackageRow};
pub use repomd::{clean_file, parse_repomd, ChecksumAlgo, RepoDataEntry, RepoDataKind, RepoMetadata};
