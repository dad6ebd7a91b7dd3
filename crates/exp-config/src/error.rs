use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config toml: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config toml: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("failed to load certificate material: {0}")]
    Certificate(String),
}
