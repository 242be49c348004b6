// src/pkpass/builder.rs

//! Pass package assembly
//!
//! Runs the pipeline for one pass:
//!
//! 1. render `pass.json`
//! 2. fetch every configured asset, in configured order
//! 3. digest the entries into `manifest.json`
//! 4. sign the manifest into `signature`
//! 5. write the store-only archive
//!
//! The first failing stage aborts the run and nothing is returned but the
//! error. All assets are fetched before the signer is touched.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use super::archive::{ArchiveError, build_archive};
use super::descriptor::{DESCRIPTOR_NAME, PassStyle, PassValues};
use super::entry::EntryList;
use super::manifest::{MANIFEST_NAME, Manifest, ManifestError};
use super::signing::{SIGNATURE_NAME, SignError, Signer};
use crate::assets::{AssetError, AssetSource};

/// Media type of a finished package
pub const PKPASS_MEDIA_TYPE: &str = "application/vnd.apple.pkpass";

/// File extension for packages
pub const PKPASS_EXTENSION: &str = "pkpass";

/// Errors from package generation, one per pipeline stage
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Asset {name} unavailable: {source}")]
    AssetUnavailable {
        name: String,
        #[source]
        source: AssetError,
    },

    #[error("Failed to build pass descriptor: {0}")]
    Descriptor(String),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Signing(#[from] SignError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),
}

/// A finished, signed package
#[derive(Debug, Clone)]
pub struct PassPackage {
    /// Serial number of the pass
    pub serial: String,
    /// Manifest that was signed
    pub manifest: Manifest,
    /// Archive entry names in archive order
    pub entry_names: Vec<String>,
    /// Archive bytes
    pub bytes: Vec<u8>,
}

impl PassPackage {
    /// Suggested attachment filename (`<serial>.pkpass`)
    pub fn file_name(&self) -> String {
        attachment_file_name(&self.serial)
    }

    /// Write the archive to disk
    pub fn write_to(&self, path: &Path) -> crate::Result<()> {
        fs::write(path, &self.bytes).map_err(|e| {
            crate::Error::IoError(format!("Failed to write package {}: {}", path.display(), e))
        })
    }
}

/// Suggested attachment filename for a serial
pub fn attachment_file_name(serial: &str) -> String {
    format!("{}.{}", serial, PKPASS_EXTENSION)
}

/// Add manifest and signature to collected entries and archive them
///
/// `entries` holds the descriptor and assets. The manifest covers exactly
/// those entries; the signature covers the manifest bytes.
pub fn seal_entries(
    mut entries: EntryList,
    signer: &dyn Signer,
) -> Result<(Manifest, EntryList, Vec<u8>), GenerationError> {
    let manifest = Manifest::from_entries(&entries);
    let manifest_bytes = manifest.to_bytes()?;
    entries.add(MANIFEST_NAME, manifest_bytes.clone())?;
    debug!("Manifest covers {} entries", manifest.len());

    let signature = signer.sign(&manifest_bytes)?;
    entries.add(SIGNATURE_NAME, signature)?;
    debug!("Signed manifest ({} mode)", signer.mode());

    let bytes = build_archive(&entries)?;
    Ok((manifest, entries, bytes))
}

/// Assembles signed pass packages
pub struct PassBuilder {
    style: PassStyle,
    assets: Arc<dyn AssetSource>,
    asset_names: Vec<String>,
    signer: Arc<dyn Signer>,
}

impl PassBuilder {
    /// Create a builder
    pub fn new(style: PassStyle, assets: Arc<dyn AssetSource>, signer: Arc<dyn Signer>) -> Self {
        Self {
            style,
            assets,
            asset_names: Vec::new(),
            signer,
        }
    }

    /// Set the assets to include, in archive order
    pub fn with_assets<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.asset_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn style(&self) -> &PassStyle {
        &self.style
    }

    pub fn asset_names(&self) -> &[String] {
        &self.asset_names
    }

    /// Build the package for one pass
    pub fn build(&self, values: &PassValues<'_>) -> Result<PassPackage, GenerationError> {
        let descriptor = self
            .style
            .render(values)
            .map_err(|e| GenerationError::Descriptor(e.to_string()))?;

        let mut entries = EntryList::new();
        entries.add(DESCRIPTOR_NAME, descriptor)?;

        for name in &self.asset_names {
            let bytes = self
                .assets
                .fetch(name)
                .map_err(|source| GenerationError::AssetUnavailable {
                    name: name.clone(),
                    source,
                })?;
            debug!("Collected asset {} ({} bytes)", name, bytes.len());
            entries.add(name.as_str(), bytes)?;
        }

        let (manifest, entries, bytes) = seal_entries(entries, self.signer.as_ref())?;
        info!(
            "Assembled pass {} ({} entries, {} bytes)",
            values.serial,
            entries.len(),
            bytes.len()
        );

        Ok(PassPackage {
            serial: values.serial.to_string(),
            manifest,
            entry_names: entries.names().map(str::to_string).collect(),
            bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MemoryAssetSource;
    use crate::pkpass::reader::read_archive;
    use crate::pkpass::signing::SigningMode;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedSigner {
        calls: AtomicUsize,
    }

    impl Signer for FixedSigner {
        fn sign(&self, manifest: &[u8]) -> Result<Vec<u8>, SignError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(crate::hash::digest(manifest).to_vec())
        }

        fn mode(&self) -> SigningMode {
            SigningMode::Raw
        }
    }

    fn values() -> PassValues<'static> {
        PassValues {
            serial: "abc123",
            holder_name: "Ada",
            balance: 0.0,
            authentication_token: "token",
        }
    }

    #[test]
    fn test_build_entry_order() {
        let assets = MemoryAssetSource::new()
            .with_asset("logo.png", b"logo".to_vec())
            .with_asset("icon.png", b"icon".to_vec());
        let signer = Arc::new(FixedSigner {
            calls: AtomicUsize::new(0),
        });
        let builder = PassBuilder::new(PassStyle::default(), Arc::new(assets), signer.clone())
            .with_assets(["icon.png", "logo.png"]);

        let package = builder.build(&values()).unwrap();
        assert_eq!(
            package.entry_names,
            vec!["pass.json", "icon.png", "logo.png", "manifest.json", "signature"]
        );
        assert_eq!(package.file_name(), "abc123.pkpass");
        assert_eq!(signer.calls.load(Ordering::SeqCst), 1);

        let contents = read_archive(&package.bytes).unwrap();
        let manifest_bytes = contents.entries.get(MANIFEST_NAME).unwrap().payload();
        assert_eq!(Manifest::parse(manifest_bytes).unwrap(), package.manifest);
        assert_eq!(
            contents.entries.get(SIGNATURE_NAME).unwrap().payload(),
            crate::hash::digest(manifest_bytes).as_slice()
        );
    }

    #[test]
    fn test_missing_asset_stops_before_signing() {
        let signer = Arc::new(FixedSigner {
            calls: AtomicUsize::new(0),
        });
        let builder = PassBuilder::new(
            PassStyle::default(),
            Arc::new(MemoryAssetSource::new()),
            signer.clone(),
        )
        .with_assets(["logo.png"]);

        let err = builder.build(&values()).unwrap_err();
        assert!(matches!(
            err,
            GenerationError::AssetUnavailable { ref name, source: AssetError::NotFound(_) } if name == "logo.png"
        ));
        assert_eq!(signer.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_asset_named_like_reserved_entry_is_rejected() {
        let assets = MemoryAssetSource::new().with_asset("pass.json", b"{}".to_vec());
        let signer = Arc::new(FixedSigner {
            calls: AtomicUsize::new(0),
        });
        let builder = PassBuilder::new(PassStyle::default(), Arc::new(assets), signer.clone())
            .with_assets(["pass.json"]);

        let err = builder.build(&values()).unwrap_err();
        assert!(matches!(err, GenerationError::Archive(ArchiveError::DuplicateEntry(_))));
        assert_eq!(signer.calls.load(Ordering::SeqCst), 0);
    }
}
