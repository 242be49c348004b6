// src/lib.rs

//! Walletpass
//!
//! Issues signed, wallet-consumable pass packages (`.pkpass`): a JSON
//! descriptor and image assets, an integrity manifest, and a detached
//! signature, assembled into an uncompressed ZIP container.
//!
//! # Architecture
//!
//! - `checksum` / `hash`: CRC-32 for the container, SHA-1 for the manifest
//! - `pkpass`: entries, manifest, signing, archive writer/reader, assembly
//!   and verification
//! - `assets` / `store`: injected collaborators for images and pass state
//! - `service`: issue, device registration and conditional re-fetch
//! - `config`: TOML configuration wiring the above together

pub mod assets;
pub mod checksum;
pub mod config;
mod error;
pub mod hash;
pub mod pkpass;
pub mod service;
pub mod store;

pub use assets::{AssetError, AssetSource, DirAssetSource, HttpAssetSource, MemoryAssetSource};
pub use config::{Config, DEFAULT_CONFIG_PATH};
pub use error::{Error, Result};
pub use pkpass::{
    EntryList, GenerationError, Manifest, PackageEntry, PassBuilder, PassPackage, PassStyle,
    PassValues, Signer, SigningMode, VerificationReport, VerifyOptions, build_archive,
    read_archive, verify_package,
};
pub use service::{IssuedPass, LatestPass, PassService, Registration};
pub use store::{MemoryStateStore, PassRecord, SqliteStateStore, StateStore, StoreError};
