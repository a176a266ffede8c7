use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepomdError {
    #[error("malformed repomd.xml: {0}")]
    InvalidMetadata(String),

    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}
