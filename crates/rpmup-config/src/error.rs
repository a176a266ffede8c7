use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("value for key {key} is not a uint: {value}")]
    NotAUint { key: String, value: String },
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}
