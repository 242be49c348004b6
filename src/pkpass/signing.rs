// src/pkpass/signing.rs
//! Manifest signing
//!
//! Two interchangeable signature forms over `manifest.json`:
//!
//! - **Raw**: RSASSA-PKCS1-v1_5 with SHA-1 whose message is the SHA-1 digest
//!   of the manifest bytes.
//! - **Detached**: a DER-encoded CMS `ContentInfo(SignedData)` with no
//!   encapsulated content, one signer identified by issuer and serial, the
//!   signed attributes content-type, message-digest and signing-time, and the
//!   leaf plus intermediate certificates attached. This is the form wallet
//!   clients accept.
//!
//! Both are reached through the [`Signer`] trait so the orchestrator does not
//! care which one configuration picked.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use cms::cert::{CertificateChoices, IssuerAndSerialNumber};
use cms::content_info::{CmsVersion, ContentInfo};
use cms::signed_data::{
    CertificateSet, EncapsulatedContentInfo, SignedData, SignerIdentifier, SignerInfo, SignerInfos,
};
use const_oid::ObjectIdentifier;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::signature::{SignatureEncoding, Signer as _};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use thiserror::Error;
use tracing::{debug, info};
use x509_cert::Certificate;
use x509_cert::attr::Attribute;
use x509_cert::der::asn1::{OctetString, SetOfVec, UtcTime};
use x509_cert::der::{Any, Decode, Encode};
use x509_cert::spki::AlgorithmIdentifierOwned;

use crate::hash;

/// Archive path of the signature entry
pub const SIGNATURE_NAME: &str = "signature";

pub const OID_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.1");
pub const OID_SIGNED_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.2");
pub const OID_CONTENT_TYPE: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.3");
pub const OID_MESSAGE_DIGEST: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.4");
pub const OID_SIGNING_TIME: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.5");
pub const OID_SHA1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.14.3.2.26");
pub const OID_RSA_ENCRYPTION: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");

/// Signing errors
#[derive(Error, Debug)]
pub enum SignError {
    #[error("Invalid key material: {0}")]
    KeyMaterialInvalid(String),

    #[error("Signing failed: {0}")]
    SigningFailure(String),
}

/// Which signature form to produce
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SigningMode {
    /// CMS detached signed-data envelope
    #[default]
    Detached,
    /// Bare RSA PKCS#1 v1.5 signature
    Raw,
}

impl fmt::Display for SigningMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Detached => write!(f, "detached"),
            Self::Raw => write!(f, "raw"),
        }
    }
}

impl FromStr for SigningMode {
    type Err = SignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "detached" | "cms" => Ok(Self::Detached),
            "raw" => Ok(Self::Raw),
            other => Err(SignError::SigningFailure(format!(
                "unknown signing mode: {}",
                other
            ))),
        }
    }
}

/// Produces the `signature` entry for a manifest
pub trait Signer: Send + Sync {
    /// Sign the manifest bytes
    fn sign(&self, manifest: &[u8]) -> Result<Vec<u8>, SignError>;

    /// Signature form this signer produces
    fn mode(&self) -> SigningMode;
}

// Credential loading

fn read_pem_file(path: &Path, what: &str) -> Result<String, SignError> {
    fs::read_to_string(path).map_err(|e| {
        SignError::KeyMaterialInvalid(format!(
            "failed to read {} {}: {}",
            what,
            path.display(),
            e
        ))
    })
}

/// Parse an RSA private key from PEM (PKCS#8 or PKCS#1)
pub fn load_private_key_pem(pem_text: &str) -> Result<RsaPrivateKey, SignError> {
    let parsed = pem::parse(pem_text)
        .map_err(|e| SignError::KeyMaterialInvalid(format!("private key is not PEM: {}", e)))?;

    match parsed.tag() {
        "PRIVATE KEY" => RsaPrivateKey::from_pkcs8_der(parsed.contents()).map_err(|e| {
            SignError::KeyMaterialInvalid(format!("not an RSA PKCS#8 private key: {}", e))
        }),
        "RSA PRIVATE KEY" => RsaPrivateKey::from_pkcs1_der(parsed.contents()).map_err(|e| {
            SignError::KeyMaterialInvalid(format!("not an RSA PKCS#1 private key: {}", e))
        }),
        other => Err(SignError::KeyMaterialInvalid(format!(
            "unsupported private key PEM label: {}",
            other
        ))),
    }
}

/// Load an RSA private key from a PEM file
pub fn load_private_key(path: &Path) -> Result<RsaPrivateKey, SignError> {
    load_private_key_pem(&read_pem_file(path, "private key")?)
}

/// Parse an X.509 certificate from PEM
pub fn load_certificate_pem(pem_text: &str) -> Result<Certificate, SignError> {
    let parsed = pem::parse(pem_text)
        .map_err(|e| SignError::KeyMaterialInvalid(format!("certificate is not PEM: {}", e)))?;
    if parsed.tag() != "CERTIFICATE" {
        return Err(SignError::KeyMaterialInvalid(format!(
            "expected CERTIFICATE PEM, found {}",
            parsed.tag()
        )));
    }
    Certificate::from_der(parsed.contents())
        .map_err(|e| SignError::KeyMaterialInvalid(format!("invalid certificate: {}", e)))
}

/// Load an X.509 certificate from a PEM file
pub fn load_certificate(path: &Path) -> Result<Certificate, SignError> {
    load_certificate_pem(&read_pem_file(path, "certificate")?)
}

/// Extract the RSA public key from a certificate
pub fn certificate_public_key(cert: &Certificate) -> Result<RsaPublicKey, SignError> {
    let spki = cert
        .tbs_certificate
        .subject_public_key_info
        .to_der()
        .map_err(|e| SignError::KeyMaterialInvalid(format!("invalid public key info: {}", e)))?;
    RsaPublicKey::from_public_key_der(&spki).map_err(|e| {
        SignError::KeyMaterialInvalid(format!("certificate key is not RSA: {}", e))
    })
}

/// Parse an RSA public key from PEM
///
/// Accepts a `PUBLIC KEY`, a `CERTIFICATE` (its subject key) or a private
/// key (its public half).
pub fn load_public_key_pem(pem_text: &str) -> Result<RsaPublicKey, SignError> {
    let parsed = pem::parse(pem_text)
        .map_err(|e| SignError::KeyMaterialInvalid(format!("public key is not PEM: {}", e)))?;

    match parsed.tag() {
        "PUBLIC KEY" => RsaPublicKey::from_public_key_der(parsed.contents()).map_err(|e| {
            SignError::KeyMaterialInvalid(format!("not an RSA public key: {}", e))
        }),
        "CERTIFICATE" => certificate_public_key(&load_certificate_pem(pem_text)?),
        "PRIVATE KEY" | "RSA PRIVATE KEY" => Ok(load_private_key_pem(pem_text)?.to_public_key()),
        other => Err(SignError::KeyMaterialInvalid(format!(
            "unsupported public key PEM label: {}",
            other
        ))),
    }
}

// Raw form

/// Bare RSASSA-PKCS1-v1_5 / SHA-1 signature whose message is the manifest's
/// SHA-1 digest, so the manifest ends up hashed twice
pub struct RawSigner {
    key: SigningKey<Sha1>,
}

impl RawSigner {
    pub fn new(key: RsaPrivateKey) -> Self {
        Self {
            key: SigningKey::<Sha1>::new(key),
        }
    }

    pub fn from_pem(key_pem: &str) -> Result<Self, SignError> {
        Ok(Self::new(load_private_key_pem(key_pem)?))
    }
}

impl Signer for RawSigner {
    fn sign(&self, manifest: &[u8]) -> Result<Vec<u8>, SignError> {
        let digest = hash::digest(manifest);
        let signature = self
            .key
            .try_sign(&digest)
            .map_err(|e| SignError::SigningFailure(e.to_string()))?;
        debug!("Produced raw manifest signature");
        Ok(signature.to_vec())
    }

    fn mode(&self) -> SigningMode {
        SigningMode::Raw
    }
}

// Detached form

/// CMS detached signature with leaf and intermediate certificates attached
pub struct DetachedSigner {
    key: SigningKey<Sha1>,
    leaf: Certificate,
    intermediate: Certificate,
    signing_time: Option<DateTime<Utc>>,
}

impl DetachedSigner {
    /// Create a signer, checking that the leaf certificate belongs to the key
    pub fn new(
        key: RsaPrivateKey,
        leaf: Certificate,
        intermediate: Certificate,
    ) -> Result<Self, SignError> {
        let leaf_key = certificate_public_key(&leaf)?;
        if leaf_key != key.to_public_key() {
            return Err(SignError::KeyMaterialInvalid(
                "leaf certificate public key does not match the private key".to_string(),
            ));
        }

        Ok(Self {
            key: SigningKey::<Sha1>::new(key),
            leaf,
            intermediate,
            signing_time: None,
        })
    }

    pub fn from_pem(
        key_pem: &str,
        leaf_pem: &str,
        intermediate_pem: &str,
    ) -> Result<Self, SignError> {
        Self::new(
            load_private_key_pem(key_pem)?,
            load_certificate_pem(leaf_pem)?,
            load_certificate_pem(intermediate_pem)?,
        )
    }

    /// Use a fixed signing time instead of the current clock
    pub fn with_signing_time(mut self, time: DateTime<Utc>) -> Self {
        self.signing_time = Some(time);
        self
    }

    pub fn leaf(&self) -> &Certificate {
        &self.leaf
    }

    fn signed_attributes(
        &self,
        manifest_digest: &[u8],
        now: DateTime<Utc>,
    ) -> Result<SetOfVec<Attribute>, SignError> {
        let seconds = u64::try_from(now.timestamp())
            .map_err(|_| SignError::SigningFailure(format!("signing time out of range: {}", now)))?;
        let time = UtcTime::from_unix_duration(Duration::from_secs(seconds)).map_err(der_failure)?;
        let digest = OctetString::new(manifest_digest.to_vec()).map_err(der_failure)?;

        let attributes = vec![
            attribute(OID_CONTENT_TYPE, Any::encode_from(&OID_DATA).map_err(der_failure)?)?,
            attribute(OID_MESSAGE_DIGEST, Any::encode_from(&digest).map_err(der_failure)?)?,
            attribute(OID_SIGNING_TIME, Any::encode_from(&time).map_err(der_failure)?)?,
        ];
        SetOfVec::try_from(attributes).map_err(der_failure)
    }
}

fn der_failure(err: x509_cert::der::Error) -> SignError {
    SignError::SigningFailure(format!("DER encoding failed: {}", err))
}

fn attribute(oid: ObjectIdentifier, value: Any) -> Result<Attribute, SignError> {
    Ok(Attribute {
        oid,
        values: SetOfVec::try_from(vec![value]).map_err(der_failure)?,
    })
}

fn sha1_algorithm() -> AlgorithmIdentifierOwned {
    AlgorithmIdentifierOwned {
        oid: OID_SHA1,
        parameters: None,
    }
}

impl Signer for DetachedSigner {
    fn sign(&self, manifest: &[u8]) -> Result<Vec<u8>, SignError> {
        let now = self.signing_time.unwrap_or_else(Utc::now);
        let signed_attrs = self.signed_attributes(&hash::digest(manifest), now)?;

        // The signature covers the DER of the attributes as a SET, not the
        // implicitly tagged [0] form they take inside SignerInfo.
        let signed_attrs_der = signed_attrs.to_der().map_err(der_failure)?;
        let signature = self
            .key
            .try_sign(&signed_attrs_der)
            .map_err(|e| SignError::SigningFailure(e.to_string()))?;

        let signer_info = SignerInfo {
            version: CmsVersion::V1,
            sid: SignerIdentifier::IssuerAndSerialNumber(IssuerAndSerialNumber {
                issuer: self.leaf.tbs_certificate.issuer.clone(),
                serial_number: self.leaf.tbs_certificate.serial_number.clone(),
            }),
            digest_alg: sha1_algorithm(),
            signed_attrs: Some(signed_attrs),
            signature_algorithm: AlgorithmIdentifierOwned {
                oid: OID_RSA_ENCRYPTION,
                parameters: Some(Any::null()),
            },
            signature: OctetString::new(signature.to_vec()).map_err(der_failure)?,
            unsigned_attrs: None,
        };

        let certificates = CertificateSet::try_from(vec![
            CertificateChoices::Certificate(self.leaf.clone()),
            CertificateChoices::Certificate(self.intermediate.clone()),
        ])
        .map_err(der_failure)?;

        let signed_data = SignedData {
            version: CmsVersion::V1,
            digest_algorithms: SetOfVec::try_from(vec![sha1_algorithm()]).map_err(der_failure)?,
            encap_content_info: EncapsulatedContentInfo {
                econtent_type: OID_DATA,
                econtent: None,
            },
            certificates: Some(certificates),
            crls: None,
            signer_infos: SignerInfos::try_from(vec![signer_info]).map_err(der_failure)?,
        };

        let content_info = ContentInfo {
            content_type: OID_SIGNED_DATA,
            content: Any::encode_from(&signed_data).map_err(der_failure)?,
        };
        let der = content_info.to_der().map_err(der_failure)?;

        debug!("Produced detached CMS signature ({} bytes)", der.len());
        Ok(der)
    }

    fn mode(&self) -> SigningMode {
        SigningMode::Detached
    }
}

/// Build a signer from PEM files
///
/// Detached mode needs the leaf and intermediate certificates; raw mode
/// ignores them.
pub fn signer_from_files(
    mode: SigningMode,
    private_key: &Path,
    certificate: Option<&Path>,
    intermediate: Option<&Path>,
) -> Result<Box<dyn Signer>, SignError> {
    let key = load_private_key(private_key)?;
    info!("Loaded signing key from {}", private_key.display());

    match mode {
        SigningMode::Raw => Ok(Box::new(RawSigner::new(key))),
        SigningMode::Detached => {
            let certificate = certificate.ok_or_else(|| {
                SignError::KeyMaterialInvalid(
                    "detached signing requires a leaf certificate".to_string(),
                )
            })?;
            let intermediate = intermediate.ok_or_else(|| {
                SignError::KeyMaterialInvalid(
                    "detached signing requires an intermediate certificate".to_string(),
                )
            })?;
            let signer = DetachedSigner::new(
                key,
                load_certificate(certificate)?,
                load_certificate(intermediate)?,
            )?;
            Ok(Box::new(signer))
        }
    }
}
