use thiserror::Error;

use crate::process::SpawnError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("download failed: {0}")]
    DownloadFailed(#[from] rpmup_download::DownloadError),

    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    #[error("insufficient disk space on {path}: need {required} bytes, have {available}")]
    LowDiskSpace {
        path: String,
        required: u64,
        available: u64,
    },

    #[error("release version {0} not found")]
    NotFound(u64),

    #[error("could not determine filesystem UUID for {0}")]
    NoUuidForRoot(String),

    #[error("setup invalid: {0}")]
    SetupInvalid(String),

    #[error("failed to spawn external tool: {0}")]
    SpawnFailed(#[from] SpawnError),

    #[error("failed to write {path}: {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("upgrade cancelled")]
    Cancelled,

    #[error("repository metadata error: {0}")]
    Repomd(#[from] rpmup_repomd::RepomdError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rpmup_catalog::CatalogError> for EngineError {
    fn from(e: rpmup_catalog::CatalogError) -> Self {
        use rpmup_catalog::CatalogError as C;
        match e {
            C::NotFound(version) => EngineError::NotFound(version),
            C::InvalidMetadata(m) => EngineError::InvalidMetadata(m),
            C::SetupInvalid(m) => EngineError::SetupInvalid(m),
            C::Download(d) => EngineError::DownloadFailed(d),
            C::Io(io) => EngineError::Io(io),
        }
    }
}

impl From<rpmup_progress::ProgressError> for EngineError {
    fn from(e: rpmup_progress::ProgressError) -> Self {
        use rpmup_progress::ProgressError as P;
        match e {
            P::Cancelled => EngineError::Cancelled,
            P::NotBegun | P::Overflow => {
                EngineError::SetupInvalid(format!("progress reporting misuse: {e}"))
            }
        }
    }
}
