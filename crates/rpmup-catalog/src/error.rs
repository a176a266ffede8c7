use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("release version {0} not found in catalog")]
    NotFound(u64),

    #[error("invalid releases.txt: {0}")]
    InvalidMetadata(String),

    #[error("catalog setup invalid: {0}")]
    SetupInvalid(String),

    #[error("failed to download releases.txt: {0}")]
    Download(#[from] rpmup_download::DownloadError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
