// src/pkpass/manifest.rs

//! Integrity manifest (`manifest.json`)
//!
//! The manifest maps every package entry name to the hex SHA-1 of its
//! payload. Wallet clients compare these digests against the archive
//! contents, and the signature is computed over the manifest bytes, so the
//! encoding has to be stable: compact JSON with keys in entry insertion
//! order. Both serialization and parsing go through explicit visitors over
//! an ordered `Vec`, never a map type with its own ordering.

use std::fmt;

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use super::entry::EntryList;
use crate::hash;

/// Archive path of the manifest entry
pub const MANIFEST_NAME: &str = "manifest.json";

/// Errors from building, encoding or parsing a manifest
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Duplicate manifest entry: {0}")]
    DuplicateEntry(String),

    #[error("Failed to encode manifest: {0}")]
    Encode(String),

    #[error("Failed to parse manifest: {0}")]
    Parse(String),
}

/// One `(name, digest)` pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub name: String,
    pub digest: String,
}

/// Ordered name to digest mapping
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
}

impl Manifest {
    /// Digest every entry currently in the list, in insertion order
    ///
    /// Entries added to the list afterwards are not part of this manifest.
    pub fn from_entries(entries: &EntryList) -> Self {
        let entries = entries
            .iter()
            .map(|entry| ManifestEntry {
                name: entry.name().to_string(),
                digest: hash::digest_hex(entry.payload()),
            })
            .collect();
        Self { entries }
    }

    /// Append a pre-computed digest
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        digest: impl Into<String>,
    ) -> Result<(), ManifestError> {
        let name = name.into();
        if self.get(&name).is_some() {
            return Err(ManifestError::DuplicateEntry(name));
        }
        self.entries.push(ManifestEntry {
            name,
            digest: digest.into(),
        });
        Ok(())
    }

    /// Digest recorded for `name`
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.digest.as_str())
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Encode as compact JSON with keys in insertion order
    pub fn to_bytes(&self) -> Result<Vec<u8>, ManifestError> {
        serde_json::to_vec(self).map_err(|e| ManifestError::Encode(e.to_string()))
    }

    /// Parse manifest bytes, keeping key order
    ///
    /// Duplicate keys and non-string values are rejected.
    pub fn parse(bytes: &[u8]) -> Result<Self, ManifestError> {
        serde_json::from_slice(bytes).map_err(|e| {
            // Duplicate keys are reported through serde's custom error path.
            let message = e.to_string();
            match message.strip_prefix(DUPLICATE_PREFIX) {
                Some(rest) => ManifestError::DuplicateEntry(
                    rest.split(" at line").next().unwrap_or(rest).to_string(),
                ),
                None => ManifestError::Parse(message),
            }
        })
    }
}

const DUPLICATE_PREFIX: &str = "duplicate manifest key: ";

impl Serialize for Manifest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            map.serialize_entry(&entry.name, &entry.digest)?;
        }
        map.end()
    }
}

struct ManifestVisitor;

impl<'de> Visitor<'de> for ManifestVisitor {
    type Value = Manifest;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON object mapping entry names to hex digests")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Manifest, A::Error> {
        let mut manifest = Manifest {
            entries: Vec::with_capacity(access.size_hint().unwrap_or(0)),
        };
        while let Some((name, digest)) = access.next_entry::<String, String>()? {
            if manifest.get(&name).is_some() {
                return Err(de::Error::custom(format!("{}{}", DUPLICATE_PREFIX, name)));
            }
            manifest.entries.push(ManifestEntry { name, digest });
        }
        Ok(manifest)
    }
}

impl<'de> Deserialize<'de> for Manifest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(ManifestVisitor)
    }
}
