//! Decompression of fetched repodata payloads.
//!
//! Yum repodata is historically gzip/bzip2, but the pack's teacher crate
//! carries `zstd` (not `flate2`) as its compression dependency, so that is
//! what this workspace reaches for when a fetched `*_db` location ends in
//! `.zst` rather than shelling out to an external decompressor.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::error::RepomdError;

pub fn decompress_zstd(src: &Path, dest: &Path) -> Result<(), RepomdError> {
    let input = File::open(src)?;
    let output = BufWriter::new(File::create(dest)?);
    zstd::stream::copy_decode(input, output)?;
    Ok(())
}
