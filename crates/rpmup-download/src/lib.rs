//! Blocking `Downloader` capability: fetch a URI to a file, with optional
//! content-type and checksum verification, and mirror rotation backed by
//! an [`rpmup_mirror::MirrorSet`].
//!
//! Grounded on `soar_dl::download::Download`/`soar_dl::http::Http` for the
//! streaming-GET shape, generalized per spec §4.B: no resume/extract/xattr
//! machinery (out of scope here), but the same blocking-agent, chunked-read,
//! cancellation-checked loop.

pub mod error;

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;

use md5::{Digest as _, Md5};
use rpmup_mirror::MirrorSet;
use rpmup_progress::{ActionKind, ProgressNode};
use sha1::Sha1;
use sha2::Sha256;
use tracing::{debug, trace, warn};

pub use error::DownloadError;

const CHUNK_SIZE: usize = 64 * 1024;

fn to_hex(bytes: impl AsRef<[u8]>) -> String {
    bytes.as_ref().iter().map(|b| format!("{b:02x}")).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumAlgo {
    Md5,
    Sha1,
    Sha256,
}

impl ChecksumAlgo {
    /// Parse a `releases.txt`/`.treeinfo`-style algorithm tag such as
    /// `"md5"`, `"sha1"`, `"sha256"`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "md5" => Some(Self::Md5),
            "sha1" => Some(Self::Sha1),
            "sha256" => Some(Self::Sha256),
            _ => None,
        }
    }

    /// Compute this algorithm's digest of `path` and compare it against
    /// `expected_hex`, case-insensitively. Returns `false` (rather than an
    /// error) if `path` cannot be read, since callers use this to decide
    /// whether a cached file is already good, not to report I/O failures.
    pub fn matches_file(self, path: &Path, expected_hex: &str) -> bool {
        match self.digest_hex(path) {
            Ok(actual) => actual.eq_ignore_ascii_case(expected_hex),
            Err(_) => false,
        }
    }

    fn digest_hex(self, path: &Path) -> std::io::Result<String> {
        let mut file = File::open(path)?;
        let mut buffer = [0u8; CHUNK_SIZE];
        let hex = match self {
            Self::Md5 => {
                let mut hasher = Md5::new();
                loop {
                    let n = file.read(&mut buffer)?;
                    if n == 0 {
                        break;
                    }
                    hasher.update(&buffer[..n]);
                }
                to_hex(hasher.finalize())
            }
            Self::Sha1 => {
                let mut hasher = Sha1::new();
                loop {
                    let n = file.read(&mut buffer)?;
                    if n == 0 {
                        break;
                    }
                    hasher.update(&buffer[..n]);
                }
                to_hex(hasher.finalize())
            }
            Self::Sha256 => {
                let mut hasher = Sha256::new();
                loop {
                    let n = file.read(&mut buffer)?;
                    if n == 0 {
                        break;
                    }
                    hasher.update(&buffer[..n]);
                }
                to_hex(hasher.finalize())
            }
        };
        Ok(hex)
    }
}

/// The capability set the Upgrade Engine consumes, kept as a trait so test
/// harnesses can inject a recorder/fixture in place of real network I/O.
pub trait Downloader {
    fn download(&self, uri: &str, dest: &Path, progress: &mut ProgressNode)
        -> Result<(), DownloadError>;

    #[allow(clippy::too_many_arguments)]
    fn download_with_verify(
        &self,
        uri: &str,
        dest: &Path,
        min_size: u64,
        content_type_list: Option<&[&str]>,
        algo: ChecksumAlgo,
        hex_digest: &str,
        progress: &mut ProgressNode,
    ) -> Result<(), DownloadError>;

    fn download_location(
        &self,
        relative_path: &str,
        dest: &Path,
        progress: &mut ProgressNode,
    ) -> Result<(), DownloadError>;

    /// Like [`Downloader::download_with_verify`] but resolves `relative_path`
    /// against the registered mirror set instead of taking a concrete URI,
    /// retrying the next mirror on failure the same way
    /// [`Downloader::download_location`] does.
    #[allow(clippy::too_many_arguments)]
    fn download_location_with_verify(
        &self,
        relative_path: &str,
        dest: &Path,
        min_size: u64,
        content_type_list: Option<&[&str]>,
        algo: ChecksumAlgo,
        hex_digest: &str,
        progress: &mut ProgressNode,
    ) -> Result<(), DownloadError>;

    fn add_location(&mut self, mirrors: MirrorSet);

    fn clear_locations(&mut self);
}

/// Blocking, `ureq`-backed `Downloader`.
pub struct HttpDownloader {
    agent: ureq::Agent,
    locations: Vec<MirrorSet>,
}

impl Default for HttpDownloader {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpDownloader {
    pub fn new() -> Self {
        let config = ureq::Agent::config_builder()
            .user_agent("rpmup/0.1")
            .timeout_global(Some(Duration::from_secs(300)))
            .build();
        Self {
            agent: config.into(),
            locations: Vec::new(),
        }
    }

    fn fetch_to_file(
        &self,
        uri: &str,
        dest: &Path,
        min_size: u64,
        content_type_list: Option<&[&str]>,
        progress: &mut ProgressNode,
    ) -> Result<(), DownloadError> {
        url::Url::parse(uri).map_err(|source| DownloadError::InvalidUri {
            uri: uri.to_string(),
            source,
        })?;

        debug!(uri, dest = %dest.display(), "downloading");
        let response = self.agent.get(uri).call().map_err(DownloadError::from)?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::HttpError {
                status: status.as_u16(),
                uri: uri.to_string(),
            });
        }

        if let Some(allowed) = content_type_list {
            let actual = response
                .headers()
                .get(ureq::http::header::CONTENT_TYPE)
                .and_then(|h| h.to_str().ok())
                .map(|s| s.split(';').next().unwrap_or(s).trim().to_string());
            let matches = actual
                .as_deref()
                .map(|ct| allowed.iter().any(|want| *want == ct))
                .unwrap_or(false);
            if !matches {
                return Err(DownloadError::ContentType {
                    expected: allowed.iter().map(|s| s.to_string()).collect(),
                    actual,
                });
            }
        }

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = File::create(dest)?;
        let mut reader = response.into_body().into_reader();
        let mut buffer = [0u8; CHUNK_SIZE];
        let mut downloaded: u64 = 0;

        loop {
            if progress.cancelled() {
                drop(file);
                let _ = std::fs::remove_file(dest);
                return Err(DownloadError::Cancelled);
            }
            let n = reader.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            file.write_all(&buffer[..n])?;
            downloaded += n as u64;
        }
        file.flush()?;

        if min_size > 0 && downloaded < min_size {
            let _ = std::fs::remove_file(dest);
            return Err(DownloadError::Checksum {
                expected: format!(">= {min_size} bytes"),
                actual: format!("{downloaded} bytes"),
            });
        }

        trace!(downloaded, "download complete");
        Ok(())
    }
}

impl Downloader for HttpDownloader {
    fn download(
        &self,
        uri: &str,
        dest: &Path,
        progress: &mut ProgressNode,
    ) -> Result<(), DownloadError> {
        progress.action_start(ActionKind::Downloading);
        let result = self.fetch_to_file(uri, dest, 0, None, progress);
        progress.action_stop();
        result
    }

    fn download_with_verify(
        &self,
        uri: &str,
        dest: &Path,
        min_size: u64,
        content_type_list: Option<&[&str]>,
        algo: ChecksumAlgo,
        hex_digest: &str,
        progress: &mut ProgressNode,
    ) -> Result<(), DownloadError> {
        progress.action_start(ActionKind::Downloading);
        let result = self.fetch_to_file(uri, dest, min_size, content_type_list, progress);
        progress.action_stop();
        result?;

        progress.action_start(ActionKind::Checking);
        let actual = algo.digest_hex(dest)?;
        progress.action_stop();

        if !actual.eq_ignore_ascii_case(hex_digest) {
            let _ = std::fs::remove_file(dest);
            return Err(DownloadError::Checksum {
                expected: hex_digest.to_string(),
                actual,
            });
        }
        Ok(())
    }

    fn download_location(
        &self,
        relative_path: &str,
        dest: &Path,
        progress: &mut ProgressNode,
    ) -> Result<(), DownloadError> {
        let mirrors: Vec<_> = self
            .locations
            .iter()
            .flat_map(|set| set.iter())
            .collect();
        if mirrors.is_empty() {
            return Err(DownloadError::NoMirrors);
        }

        let mut last_error = None;
        for mirror in mirrors {
            let base = mirror.uri.trim_end_matches('/');
            let uri = format!("{base}/{relative_path}");
            match self.download(&uri, dest, progress) {
                Ok(()) => return Ok(()),
                Err(err) => {
                    warn!(uri, error = %err, "mirror failed, trying next");
                    last_error = Some(err);
                }
            }
        }
        Err(last_error.unwrap_or(DownloadError::NoMirrors))
    }

    fn download_location_with_verify(
        &self,
        relative_path: &str,
        dest: &Path,
        min_size: u64,
        content_type_list: Option<&[&str]>,
        algo: ChecksumAlgo,
        hex_digest: &str,
        progress: &mut ProgressNode,
    ) -> Result<(), DownloadError> {
        let mirrors: Vec<_> = self
            .locations
            .iter()
            .flat_map(|set| set.iter())
            .collect();
        if mirrors.is_empty() {
            return Err(DownloadError::NoMirrors);
        }

        let mut last_error = None;
        for mirror in mirrors {
            let base = mirror.uri.trim_end_matches('/');
            let uri = format!("{base}/{relative_path}");
            match self.download_with_verify(
                &uri,
                dest,
                min_size,
                content_type_list,
                algo,
                hex_digest,
                progress,
            ) {
                Ok(()) => return Ok(()),
                Err(err) => {
                    warn!(uri, error = %err, "mirror failed, trying next");
                    last_error = Some(err);
                }
            }
        }
        Err(last_error.unwrap_or(DownloadError::NoMirrors))
    }

    fn add_location(&mut self, mirrors: MirrorSet) {
        self.locations.push(mirrors);
    }

    fn clear_locations(&mut self) {
        self.locations.clear();
    }
}
