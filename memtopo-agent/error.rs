use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MemtopoError {
    #[error("CPUID query failed: {0}")]
    CpuidError(#[from] memtopo_raw::CpuidError),

    #[error("Unsupported CPU vendor: {0}")]
    UnsupportedVendor(String),

    #[error("Affinity operation failed: {0}")]
    AffinityError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Nix error: {0}")]
    NixError(#[from] nix::Error),

    #[error("Prometheus error: {0}")]
    PrometheusError(#[from] prometheus::Error),

    #[error("JSON encoding failed: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MemtopoError>;
