// src/pkpass/verify.rs

//! Package verification
//!
//! Checks a finished package the way a wallet client would: the archive
//! parses, the required entries are present, the manifest lists exactly the
//! content entries with matching digests, and the signature over the
//! manifest is valid. Certificate chains are not validated; a detached
//! signature is checked against its embedded leaf, optionally pinned to a
//! known certificate.

use chrono::{DateTime, Utc};
use cms::cert::CertificateChoices;
use cms::content_info::ContentInfo;
use cms::signed_data::{SignedData, SignerIdentifier};
use const_oid::ObjectIdentifier;
use rsa::RsaPublicKey;
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::signature::Verifier;
use serde::Serialize;
use sha1::Sha1;
use thiserror::Error;
use tracing::{debug, info};
use x509_cert::Certificate;
use x509_cert::der::asn1::UtcTime;
use x509_cert::der::{Decode, Encode, Tag, Tagged};

use super::archive::ArchiveError;
use super::descriptor::DESCRIPTOR_NAME;
use super::manifest::{MANIFEST_NAME, Manifest, ManifestError};
use super::reader::read_archive;
use super::signing::{
    OID_CONTENT_TYPE, OID_DATA, OID_MESSAGE_DIGEST, OID_SHA1, OID_SIGNED_DATA, OID_SIGNING_TIME,
    SIGNATURE_NAME, SignError, SigningMode, certificate_public_key,
};
use crate::hash;

/// Package verification failures
#[derive(Error, Debug)]
pub enum VerifyError {
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("Required entry missing: {0}")]
    MissingEntry(String),

    #[error("Entry {0} is not listed in the manifest")]
    UnlistedEntry(String),

    #[error("Manifest lists {0}, which is not in the archive")]
    MissingFromArchive(String),

    #[error("Digest mismatch for {name}: manifest has {expected}, content is {actual}")]
    DigestMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Raw signatures need a public key to verify against")]
    MissingPublicKey,

    #[error("Signer certificate does not match the pinned certificate")]
    CertificateMismatch,

    #[error(transparent)]
    KeyMaterial(#[from] SignError),
}

/// What to verify against
#[derive(Debug, Clone, Default)]
pub struct VerifyOptions {
    /// Public key for raw signatures
    pub public_key: Option<RsaPublicKey>,
    /// Require the detached signer to be exactly this certificate
    pub pinned_certificate: Option<Certificate>,
    /// Expected signature form; detected from the signature bytes when unset
    pub mode: Option<SigningMode>,
}

/// Details about a valid detached signature
#[derive(Debug, Clone, Serialize)]
pub struct DetachedSignatureInfo {
    pub signer_subject: String,
    pub signer_issuer: String,
    pub certificate_count: usize,
    pub signing_time: Option<DateTime<Utc>>,
}

/// Outcome of a successful verification
#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub entries: Vec<String>,
    pub manifest_entries: usize,
    pub mode: SigningMode,
    pub detached: Option<DetachedSignatureInfo>,
}

/// Guess the signature form from its bytes
pub fn detect_signing_mode(signature: &[u8]) -> SigningMode {
    match ContentInfo::from_der(signature) {
        Ok(info) if info.content_type == OID_SIGNED_DATA => SigningMode::Detached,
        _ => SigningMode::Raw,
    }
}

/// Verify a raw PKCS#1 v1.5 / SHA-1 signature over the manifest digest
pub fn verify_raw_signature(
    manifest: &[u8],
    signature: &[u8],
    public_key: &RsaPublicKey,
) -> Result<(), VerifyError> {
    let signature = Signature::try_from(signature)
        .map_err(|e| VerifyError::InvalidSignature(format!("malformed RSA signature: {}", e)))?;
    VerifyingKey::<Sha1>::new(public_key.clone())
        .verify(&hash::digest(manifest), &signature)
        .map_err(|_| VerifyError::InvalidSignature("RSA signature does not verify".to_string()))
}

fn invalid(msg: impl Into<String>) -> VerifyError {
    VerifyError::InvalidSignature(msg.into())
}

/// Verify a detached CMS signature over manifest bytes
pub fn verify_detached_signature(
    manifest: &[u8],
    signature: &[u8],
    pinned: Option<&Certificate>,
) -> Result<DetachedSignatureInfo, VerifyError> {
    let content_info =
        ContentInfo::from_der(signature).map_err(|e| invalid(format!("not CMS: {}", e)))?;
    if content_info.content_type != OID_SIGNED_DATA {
        return Err(invalid(format!(
            "content type {} is not signed-data",
            content_info.content_type
        )));
    }
    let signed: SignedData = content_info
        .content
        .decode_as()
        .map_err(|e| invalid(format!("bad signed-data: {}", e)))?;

    if signed.encap_content_info.econtent_type != OID_DATA
        || signed.encap_content_info.econtent.is_some()
    {
        return Err(invalid("signature is not detached over id-data"));
    }

    let mut signers = signed.signer_infos.0.iter();
    let signer = match (signers.next(), signers.next()) {
        (Some(signer), None) => signer,
        _ => {
            return Err(invalid(format!(
                "expected one signer, found {}",
                signed.signer_infos.0.len()
            )));
        }
    };
    if signer.digest_alg.oid != OID_SHA1 {
        return Err(invalid(format!("unexpected digest algorithm {}", signer.digest_alg.oid)));
    }

    let SignerIdentifier::IssuerAndSerialNumber(sid) = &signer.sid else {
        return Err(invalid("signer is not identified by issuer and serial"));
    };
    let certificates: Vec<&Certificate> = signed
        .certificates
        .as_ref()
        .map(|set| {
            set.0
                .iter()
                .filter_map(|choice| match choice {
                    CertificateChoices::Certificate(cert) => Some(cert),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();
    let leaf = certificates
        .iter()
        .find(|cert| {
            cert.tbs_certificate.issuer == sid.issuer
                && cert.tbs_certificate.serial_number == sid.serial_number
        })
        .ok_or_else(|| invalid("signer certificate not included"))?;

    if let Some(pinned) = pinned {
        let same = match (leaf.to_der(), pinned.to_der()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        };
        if !same {
            return Err(VerifyError::CertificateMismatch);
        }
    }

    let attrs = signer
        .signed_attrs
        .as_ref()
        .ok_or_else(|| invalid("no signed attributes"))?;
    let attr_value = |oid: ObjectIdentifier| {
        attrs
            .iter()
            .find(|attr| attr.oid == oid)
            .and_then(|attr| attr.values.get(0))
    };

    let content_type =
        attr_value(OID_CONTENT_TYPE).ok_or_else(|| invalid("no content-type attribute"))?;
    if content_type.decode_as::<ObjectIdentifier>().ok() != Some(OID_DATA) {
        return Err(invalid("content-type attribute is not id-data"));
    }

    let message_digest =
        attr_value(OID_MESSAGE_DIGEST).ok_or_else(|| invalid("no message-digest attribute"))?;
    let expected = hash::digest(manifest);
    if message_digest.tag() != Tag::OctetString || message_digest.value() != expected.as_slice() {
        return Err(invalid("message-digest does not match the manifest"));
    }

    let signing_time = attr_value(OID_SIGNING_TIME)
        .and_then(|value| value.decode_as::<UtcTime>().ok())
        .and_then(|time| {
            let secs = i64::try_from(time.to_unix_duration().as_secs()).ok()?;
            DateTime::<Utc>::from_timestamp(secs, 0)
        });

    let signed_attrs_der = attrs
        .to_der()
        .map_err(|e| invalid(format!("cannot re-encode signed attributes: {}", e)))?;
    let public_key = certificate_public_key(leaf)?;
    let signature = Signature::try_from(signer.signature.as_bytes())
        .map_err(|e| invalid(format!("malformed RSA signature: {}", e)))?;
    VerifyingKey::<Sha1>::new(public_key)
        .verify(&signed_attrs_der, &signature)
        .map_err(|_| invalid("signature over signed attributes does not verify"))?;

    debug!("Detached signature verified for {}", leaf.tbs_certificate.subject);
    Ok(DetachedSignatureInfo {
        signer_subject: leaf.tbs_certificate.subject.to_string(),
        signer_issuer: leaf.tbs_certificate.issuer.to_string(),
        certificate_count: certificates.len(),
        signing_time,
    })
}

/// Verify a complete package
pub fn verify_package(
    bytes: &[u8],
    options: &VerifyOptions,
) -> Result<VerificationReport, VerifyError> {
    let contents = read_archive(bytes)?;
    let entries = &contents.entries;

    for required in [DESCRIPTOR_NAME, MANIFEST_NAME, SIGNATURE_NAME] {
        if !entries.contains(required) {
            return Err(VerifyError::MissingEntry(required.to_string()));
        }
    }
    let manifest_bytes = entries
        .get(MANIFEST_NAME)
        .map(|e| e.payload())
        .unwrap_or_default();
    let signature = entries
        .get(SIGNATURE_NAME)
        .map(|e| e.payload())
        .unwrap_or_default();
    let manifest = Manifest::parse(manifest_bytes)?;

    for entry in entries {
        if entry.name() == MANIFEST_NAME || entry.name() == SIGNATURE_NAME {
            continue;
        }
        let expected = manifest
            .get(entry.name())
            .ok_or_else(|| VerifyError::UnlistedEntry(entry.name().to_string()))?;
        hash::verify_bytes(entry.payload(), expected).map_err(|e| VerifyError::DigestMismatch {
            name: entry.name().to_string(),
            expected: e.expected,
            actual: e.actual,
        })?;
    }
    if let Some(extra) = manifest.names().find(|name| !entries.contains(name)) {
        return Err(VerifyError::MissingFromArchive(extra.to_string()));
    }

    let mode = options.mode.unwrap_or_else(|| detect_signing_mode(signature));
    let detached = match mode {
        SigningMode::Raw => {
            let key = options
                .public_key
                .as_ref()
                .ok_or(VerifyError::MissingPublicKey)?;
            verify_raw_signature(manifest_bytes, signature, key)?;
            None
        }
        SigningMode::Detached => Some(verify_detached_signature(
            manifest_bytes,
            signature,
            options.pinned_certificate.as_ref(),
        )?),
    };

    info!(
        "Verified package: {} entries, {} signature",
        entries.len(),
        mode
    );
    Ok(VerificationReport {
        entries: entries.names().map(str::to_string).collect(),
        manifest_entries: manifest.len(),
        mode,
        detached,
    })
}
