use thiserror::Error;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("network request failed")]
    Network(#[from] Box<ureq::Error>),

    #[error("HTTP {status}: {uri}")]
    HttpError { status: u16, uri: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("checksum mismatch: expected {expected}, got {actual}")]
    Checksum { expected: String, actual: String },

    #[error("unexpected content-type {actual:?}, expected one of {expected:?}")]
    ContentType {
        expected: Vec<String>,
        actual: Option<String>,
    },

    #[error("no mirror locations registered")]
    NoMirrors,

    #[error("download cancelled")]
    Cancelled,

    #[error("invalid URI {uri}: {source}")]
    InvalidUri {
        uri: String,
        #[source]
        source: url::ParseError,
    },
}

impl From<ureq::Error> for DownloadError {
    fn from(e: ureq::Error) -> Self {
        Self::Network(Box::new(e))
    }
}
