use thiserror::Error;

/// Top-level error for the demonstration binary. Every subcommand
/// propagates through this type up to `main`, which logs it and converts
/// it into a process exit code (config-file loading is the one exception:
/// it falls back to built-in defaults and logs inline instead).
#[derive(Debug, Error)]
pub enum CliError {
    #[error("repo_primary_db is not set in configuration")]
    MissingPrimaryDb,

    #[error("repository metadata error: {0}")]
    Repomd(#[from] rpmup_repomd::RepomdError),

    #[error("release catalog error: {0}")]
    Catalog(#[from] rpmup_catalog::CatalogError),

    #[error("upgrade failed: {0}")]
    Engine(#[from] rpmup_engine::EngineError),
}
