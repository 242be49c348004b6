// src/commands/package.rs

//! Package commands
//!
//! One-off generation plus inspection and verification of package files.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use walletpass::pkpass::signing::load_certificate;
use walletpass::pkpass::{PassValues, load_public_key_pem};
use walletpass::service::{generate_auth_token, generate_serial};
use walletpass::{SigningMode, VerifyOptions, read_archive, verify_package};

use super::{load_config, output_path};

/// Build one package from configuration without recording state
pub fn cmd_generate(
    config_path: &Path,
    name: &str,
    serial: Option<String>,
    balance: f64,
    token: Option<String>,
    output: Option<PathBuf>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let builder = config.pass_builder()?;

    let serial = serial.unwrap_or_else(|| generate_serial(chrono::Utc::now().timestamp_millis()));
    let token = token.unwrap_or_else(generate_auth_token);

    let package = builder
        .build(&PassValues {
            serial: &serial,
            holder_name: name,
            balance,
            authentication_token: &token,
        })
        .context("Failed to generate package")?;

    let path = output_path(output, package.file_name());
    package.write_to(&path)?;

    println!("Generated {} ({} bytes)", path.display(), package.bytes.len());
    println!("  Serial: {}", serial);
    println!("  Token:  {}", token);
    println!("  Entries: {}", package.entry_names.join(", "));
    Ok(())
}

fn read_package(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("Failed to read package: {}", path.display()))
}

/// List the entries of a package file
pub fn cmd_inspect(package: &Path, json: bool) -> Result<()> {
    let bytes = read_package(package)?;
    let contents = read_archive(&bytes)
        .with_context(|| format!("Failed to read archive: {}", package.display()))?;

    if json {
        let output = serde_json::json!({
            "file": package.display().to_string(),
            "size": bytes.len(),
            "layout": contents.layout,
            "entries": contents.info,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Package: {}", package.display());
    println!("Size: {} bytes", bytes.len());
    println!(
        "Central directory: {} entries, {} bytes at offset {}",
        contents.layout.entry_count,
        contents.layout.central_directory_size,
        contents.layout.central_directory_offset
    );
    println!();
    println!("{:>10}  {:>10}  {:>8}  NAME", "OFFSET", "SIZE", "CRC32");
    for entry in &contents.info {
        println!(
            "{:>10}  {:>10}  {:08x}  {}",
            entry.local_header_offset, entry.size, entry.crc32, entry.name
        );
    }
    Ok(())
}

/// Verify manifest digests and the signature of a package file
pub fn cmd_verify(
    package: &Path,
    public_key: Option<PathBuf>,
    certificate: Option<PathBuf>,
    mode: Option<String>,
    json: bool,
) -> Result<()> {
    let bytes = read_package(package)?;

    let public_key = public_key
        .map(|path| -> Result<_> {
            let pem = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read key: {}", path.display()))?;
            Ok(load_public_key_pem(&pem)?)
        })
        .transpose()?;
    let pinned_certificate = certificate
        .map(|path| load_certificate(&path))
        .transpose()?;
    let mode = mode
        .map(|m| m.parse::<SigningMode>())
        .transpose()?;

    let options = VerifyOptions {
        public_key,
        pinned_certificate,
        mode,
    };
    let report = verify_package(&bytes, &options)
        .with_context(|| format!("Verification failed: {}", package.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("[OK] {}", package.display());
    println!("  Signature: {}", report.mode);
    println!(
        "  Manifest: {} entries, all digests match",
        report.manifest_entries
    );
    if let Some(detached) = &report.detached {
        println!("  Signer: {}", detached.signer_subject);
        println!("  Issuer: {}", detached.signer_issuer);
        println!("  Certificates: {}", detached.certificate_count);
        if let Some(time) = detached.signing_time {
            println!("  Signed at: {}", time.to_rfc3339());
        }
    }
    Ok(())
}
