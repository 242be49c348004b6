// src/config.rs

//! Configuration file (`walletpass.toml`)
//!
//! ```toml
//! [pass]
//! pass_type_identifier = "pass.com.example.loyalty"
//! team_identifier = "ABCDE12345"
//! web_service_url = "https://passes.example.com/api/"
//!
//! [signing]
//! mode = "detached"            # or "raw"
//! private_key = "keys/pass.key"
//! certificate = "keys/pass.pem"
//! intermediate = "keys/wwdr.pem"
//!
//! [assets]
//! directory = "assets"         # or base_url = "https://cdn.example.com/pass/"
//! files = ["icon.png", "logo.png"]
//!
//! [state]
//! database = "state.db"        # omit to keep state in memory
//! ```
//!
//! Relative paths are resolved against the directory holding the file.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use crate::assets::{AssetSource, DirAssetSource, HttpAssetSource, MemoryAssetSource, validate_asset_name};
use crate::error::{Error, Result};
use crate::pkpass::{PassBuilder, PassStyle, Signer, SigningMode, signer_from_files};
use crate::service::PassService;
use crate::store::{MemoryStateStore, SqliteStateStore, StateStore};

/// Config file looked up when none is given
pub const DEFAULT_CONFIG_PATH: &str = "walletpass.toml";

fn default_asset_files() -> Vec<String> {
    vec!["logo.png".to_string()]
}

/// Signing credentials
#[derive(Debug, Clone, Deserialize)]
pub struct SigningConfig {
    #[serde(default)]
    pub mode: SigningMode,
    pub private_key: PathBuf,
    pub certificate: Option<PathBuf>,
    pub intermediate: Option<PathBuf>,
}

/// Where assets come from and which ones go into each pass
#[derive(Debug, Clone, Deserialize)]
pub struct AssetsConfig {
    pub directory: Option<PathBuf>,
    pub base_url: Option<String>,
    #[serde(default = "default_asset_files")]
    pub files: Vec<String>,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            directory: None,
            base_url: None,
            files: default_asset_files(),
        }
    }
}

/// Pass state persistence
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StateConfig {
    pub database: Option<PathBuf>,
}

/// Parsed configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub pass: PassStyle,
    pub signing: SigningConfig,
    #[serde(default)]
    pub assets: AssetsConfig,
    #[serde(default)]
    pub state: StateConfig,
}

fn resolve(base: &Path, path: &mut PathBuf) {
    if path.is_relative() {
        *path = base.join(&*path);
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        let mut config = Self::from_toml(&content)?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.resolve_paths(base);
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse configuration from a TOML string; paths are left as written
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| Error::ConfigError(format!("Invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Make every relative path absolute with respect to `base`
    pub fn resolve_paths(&mut self, base: &Path) {
        resolve(base, &mut self.signing.private_key);
        if let Some(cert) = self.signing.certificate.as_mut() {
            resolve(base, cert);
        }
        if let Some(cert) = self.signing.intermediate.as_mut() {
            resolve(base, cert);
        }
        if let Some(dir) = self.assets.directory.as_mut() {
            resolve(base, dir);
        }
        if let Some(db) = self.state.database.as_mut() {
            resolve(base, db);
        }
    }

    fn validate(&self) -> Result<()> {
        if self.signing.mode == SigningMode::Detached
            && (self.signing.certificate.is_none() || self.signing.intermediate.is_none())
        {
            return Err(Error::ConfigError(
                "detached signing needs [signing] certificate and intermediate".to_string(),
            ));
        }
        if self.assets.directory.is_some() && self.assets.base_url.is_some() {
            return Err(Error::ConfigError(
                "[assets] directory and base_url are mutually exclusive".to_string(),
            ));
        }
        if !self.assets.files.is_empty()
            && self.assets.directory.is_none()
            && self.assets.base_url.is_none()
        {
            return Err(Error::ConfigError(
                "[assets] files are listed but no directory or base_url is set".to_string(),
            ));
        }
        for name in &self.assets.files {
            validate_asset_name(name).map_err(|e| Error::ConfigError(e.to_string()))?;
        }
        Ok(())
    }

    /// Signer for the configured mode and credentials
    pub fn signer(&self) -> Result<Arc<dyn Signer>> {
        let signer = signer_from_files(
            self.signing.mode,
            &self.signing.private_key,
            self.signing.certificate.as_deref(),
            self.signing.intermediate.as_deref(),
        )?;
        Ok(Arc::from(signer))
    }

    /// Asset source for the configured location
    pub fn asset_source(&self) -> Result<Arc<dyn AssetSource>> {
        if let Some(dir) = &self.assets.directory {
            return Ok(Arc::new(DirAssetSource::new(dir)));
        }
        if let Some(url) = &self.assets.base_url {
            return Ok(Arc::new(HttpAssetSource::new(url)?));
        }
        Ok(Arc::new(MemoryAssetSource::new()))
    }

    /// State store for the configured database, in memory when unset
    pub fn state_store(&self) -> Result<Arc<dyn StateStore>> {
        match &self.state.database {
            Some(path) => Ok(Arc::new(SqliteStateStore::open(path)?)),
            None => Ok(Arc::new(MemoryStateStore::new())),
        }
    }

    /// State store that outlives the process
    ///
    /// Commands that act on passes issued earlier need this; an in-memory
    /// store would start empty every time.
    pub fn persistent_state_store(&self) -> Result<Arc<dyn StateStore>> {
        match &self.state.database {
            Some(path) => Ok(Arc::new(SqliteStateStore::open(path)?)),
            None => Err(Error::ConfigError(
                "[state] database must be set to work with previously issued passes".to_string(),
            )),
        }
    }

    /// Package builder with this configuration's style, assets and signer
    pub fn pass_builder(&self) -> Result<PassBuilder> {
        Ok(
            PassBuilder::new(self.pass.clone(), self.asset_source()?, self.signer()?)
                .with_assets(self.assets.files.iter().cloned()),
        )
    }

    /// Service over the configured builder and state store
    pub fn pass_service(&self) -> Result<PassService> {
        Ok(PassService::new(self.pass_builder()?, self.state_store()?))
    }

    /// Service over the configured builder and a persistent state store
    pub fn persistent_pass_service(&self) -> Result<PassService> {
        Ok(PassService::new(
            self.pass_builder()?,
            self.persistent_state_store()?,
        ))
    }
}
