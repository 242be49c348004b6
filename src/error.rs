// src/error.rs

//! Crate-level error type
//!
//! Each pipeline stage has its own error enum next to the code that raises
//! it. This type is what the service layer and command handlers see.

use thiserror::Error;

use crate::assets::AssetError;
use crate::pkpass::{ArchiveError, GenerationError, SignError, VerifyError};
use crate::store::StoreError;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Package generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("Package verification failed: {0}")]
    Verification(#[from] VerifyError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Signing(#[from] SignError),

    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error("State store error: {0}")]
    Store(#[from] StoreError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized request for pass {0}")]
    Unauthorized(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Initialization error: {0}")]
    InitError(String),

    #[error("I/O error: {0}")]
    IoError(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
