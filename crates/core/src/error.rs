use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("invalid capacity: {0}")]
    InvalidCapacity(String),

    #[error("invalid strategy: {0}")]
    InvalidStrategy(String),
}
