use thiserror::Error;

use craftlink_discovery::DiscoveryError;
use craftlink_stream::{RegistryError, StreamError};

#[derive(Error, Debug)]
pub enum BindingError {
    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Thing already added: {0}")]
    ThingExists(String),

    #[error("Thing not found: {0}")]
    ThingNotFound(String),
}

pub type Result<T> = std::result::Result<T, BindingError>;
