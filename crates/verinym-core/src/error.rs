/// Core errors: identifier parsing and configuration handling.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid DID: {0}")]
    InvalidDid(String),

    #[error("invalid verkey: {0}")]
    InvalidVerkey(String),

    #[error("invalid role: {0}")]
    InvalidRole(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("config encode error: {0}")]
    ConfigEncode(#[from] toml::ser::Error),
}
