// src/pkpass/mod.rs
//! Signed pass package format
//!
//! This module implements the `.pkpass` container, including:
//! - Ordered package entries
//! - The `pass.json` descriptor
//! - The SHA-1 integrity manifest (`manifest.json`)
//! - Raw and CMS detached manifest signatures
//! - The store-only ZIP writer and reader
//! - Package assembly and verification

pub mod archive;
pub mod builder;
pub mod descriptor;
pub mod entry;
pub mod manifest;
pub mod reader;
pub mod signing;
pub mod verify;

pub use archive::{ArchiveError, ArchiveLayout, build_archive, build_archive_with_layout};
pub use builder::{
    GenerationError, PKPASS_MEDIA_TYPE, PassBuilder, PassPackage, attachment_file_name,
    seal_entries,
};
pub use descriptor::{DESCRIPTOR_NAME, PassStyle, PassValues};
pub use entry::{EntryList, PackageEntry};
pub use manifest::{MANIFEST_NAME, Manifest, ManifestEntry, ManifestError};
pub use reader::{ArchiveContents, ArchiveEntryInfo, read_archive};
pub use signing::{
    DetachedSigner, RawSigner, SIGNATURE_NAME, SignError, Signer, SigningMode, load_public_key_pem,
    signer_from_files,
};
pub use verify::{VerificationReport, VerifyError, VerifyOptions, verify_package};
