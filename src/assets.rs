// src/assets.rs

//! Asset sources for pass images
//!
//! The orchestrator asks an [`AssetSource`] for each configured asset by
//! name (`logo.png`, `icon.png`, ...). Sources are plain blocking lookups:
//! a missing asset is `NotFound`, anything else that goes wrong is
//! `Unavailable`. No source retries.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::RwLock;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

/// Timeout for remote asset requests (30 seconds)
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from asset lookups
#[derive(Error, Debug)]
pub enum AssetError {
    #[error("Asset not found: {0}")]
    NotFound(String),

    #[error("Asset {name} unavailable: {reason}")]
    Unavailable { name: String, reason: String },

    #[error("Invalid asset name: {0}")]
    InvalidName(String),
}

/// Something that can produce asset bytes by name
pub trait AssetSource: Send + Sync {
    fn fetch(&self, name: &str) -> Result<Vec<u8>, AssetError>;
}

/// Check that a name is a single plain path component
pub fn validate_asset_name(name: &str) -> Result<(), AssetError> {
    let plain = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0']);
    if plain {
        Ok(())
    } else {
        Err(AssetError::InvalidName(name.to_string()))
    }
}

/// Assets read from a local directory
#[derive(Debug, Clone)]
pub struct DirAssetSource {
    root: PathBuf,
}

impl DirAssetSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl AssetSource for DirAssetSource {
    fn fetch(&self, name: &str) -> Result<Vec<u8>, AssetError> {
        validate_asset_name(name)?;
        let path = self.root.join(name);
        debug!("Reading asset {}", path.display());

        fs::read(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => AssetError::NotFound(name.to_string()),
            _ => AssetError::Unavailable {
                name: name.to_string(),
                reason: format!("{}: {}", path.display(), e),
            },
        })
    }
}

/// Assets fetched over HTTP(S) relative to a base URL
pub struct HttpAssetSource {
    client: Client,
    base: Url,
}

impl HttpAssetSource {
    /// Create a source rooted at `base_url`
    pub fn new(base_url: &str) -> crate::Result<Self> {
        // A base without a trailing slash would have its last segment
        // replaced by `Url::join`
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        let base = Url::parse(&normalized).map_err(|e| {
            crate::Error::ConfigError(format!("Invalid asset base URL {base_url}: {e}"))
        })?;

        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| crate::Error::InitError(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn url_for(&self, name: &str) -> Result<Url, AssetError> {
        validate_asset_name(name)?;
        self.base
            .join(name)
            .map_err(|_| AssetError::InvalidName(name.to_string()))
    }
}

impl AssetSource for HttpAssetSource {
    fn fetch(&self, name: &str) -> Result<Vec<u8>, AssetError> {
        let url = self.url_for(name)?;
        info!("Fetching asset from {}", url);

        let unavailable = |reason: String| AssetError::Unavailable {
            name: name.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url.clone())
            .send()
            .map_err(|e| unavailable(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(AssetError::NotFound(name.to_string())),
            status if !status.is_success() => Err(unavailable(format!("HTTP {} from {}", status, url))),
            _ => {
                let bytes = response
                    .bytes()
                    .map_err(|e| unavailable(format!("Failed to read response: {e}")))?;
                debug!("Fetched {} ({} bytes)", name, bytes.len());
                Ok(bytes.to_vec())
            }
        }
    }
}

/// In-memory assets
#[derive(Debug, Default)]
pub struct MemoryAssetSource {
    assets: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryAssetSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an asset
    pub fn insert(&self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.assets.write().insert(name.into(), bytes.into());
    }

    pub fn with_asset(self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(name, bytes);
        self
    }
}

impl AssetSource for MemoryAssetSource {
    fn fetch(&self, name: &str) -> Result<Vec<u8>, AssetError> {
        validate_asset_name(name)?;
        self.assets
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| AssetError::NotFound(name.to_string()))
    }
}

impl<T: AssetSource + ?Sized> AssetSource for Box<T> {
    fn fetch(&self, name: &str) -> Result<Vec<u8>, AssetError> {
        (**self).fetch(name)
    }
}

impl<T: AssetSource + ?Sized> AssetSource for std::sync::Arc<T> {
    fn fetch(&self, name: &str) -> Result<Vec<u8>, AssetError> {
        (**self).fetch(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_validate_asset_name() {
        assert!(validate_asset_name("logo.png").is_ok());
        assert!(validate_asset_name("logo@2x.png").is_ok());
        for bad in ["", ".", "..", "../secret", "a/b.png", "a\\b.png"] {
            assert!(
                matches!(validate_asset_name(bad), Err(AssetError::InvalidName(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_dir_source() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("logo.png"), b"png-bytes").unwrap();
        let source = DirAssetSource::new(dir.path());

        assert_eq!(source.fetch("logo.png").unwrap(), b"png-bytes");
        assert!(matches!(source.fetch("icon.png"), Err(AssetError::NotFound(n)) if n == "icon.png"));
        assert!(matches!(source.fetch("../logo.png"), Err(AssetError::InvalidName(_))));
    }

    #[test]
    fn test_memory_source() {
        let source = MemoryAssetSource::new().with_asset("logo.png", vec![1, 2, 3]);
        assert_eq!(source.fetch("logo.png").unwrap(), vec![1, 2, 3]);
        assert!(matches!(source.fetch("strip.png"), Err(AssetError::NotFound(_))));

        source.insert("logo.png", vec![9]);
        assert_eq!(source.fetch("logo.png").unwrap(), vec![9]);
    }

    #[test]
    fn test_http_source_urls() {
        let source = HttpAssetSource::new("https://cdn.example.com/assets").unwrap();
        assert_eq!(
            source.url_for("logo.png").unwrap().as_str(),
            "https://cdn.example.com/assets/logo.png"
        );
        assert!(matches!(source.url_for("../x"), Err(AssetError::InvalidName(_))));
        assert!(HttpAssetSource::new("not a url").is_err());
    }
}
