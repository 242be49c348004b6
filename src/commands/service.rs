// src/commands/service.rs

//! Pass service commands
//!
//! Run the service operations against the configured state store, the way
//! a web front end would.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::warn;
use walletpass::{LatestPass, Registration};
use walletpass::service::{
    format_http_date, parse_authorization, parse_http_date, update_balance,
};

use super::{load_config, output_path};

/// Accept either a bare token or a full `ApplePass <token>` header value
fn token_from(auth: &str) -> &str {
    parse_authorization(auth).unwrap_or(auth)
}

/// Issue a new pass and write its package
pub fn cmd_issue(config_path: &Path, name: &str, output: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;
    if config.state.database.is_none() {
        warn!("No [state] database configured; the issued pass will not be remembered");
    }
    let service = config.pass_service()?;
    let issued = service.issue(name).context("Failed to issue pass")?;

    let path = output_path(output, issued.package.file_name());
    issued.package.write_to(&path)?;

    println!("Issued pass {} for {}", issued.serial, name);
    println!("  Token:   {}", issued.auth_token);
    println!("  Package: {}", path.display());
    Ok(())
}

/// Register a device for pass updates
pub fn cmd_register(
    config_path: &Path,
    serial: &str,
    device: &str,
    push_token: &str,
    auth: &str,
) -> Result<()> {
    let service = load_config(config_path)?.persistent_pass_service()?;
    let outcome = service
        .register_device(serial, token_from(auth), device, push_token)
        .with_context(|| format!("Failed to register device for {}", serial))?;

    match outcome {
        Registration::Created => println!("Registered device {} for pass {}", device, serial),
        Registration::Updated => println!("Updated push token of device {} for pass {}", device, serial),
    }
    Ok(())
}

/// Fetch the latest package for a pass
pub fn cmd_fetch(
    config_path: &Path,
    serial: &str,
    auth: &str,
    if_modified_since: Option<String>,
    output: Option<PathBuf>,
) -> Result<()> {
    let since = match if_modified_since {
        Some(value) => Some(
            parse_http_date(&value)
                .with_context(|| format!("Not an HTTP date: {}", value))?,
        ),
        None => None,
    };

    let service = load_config(config_path)?.persistent_pass_service()?;
    match service
        .latest_pass(serial, token_from(auth), since)
        .with_context(|| format!("Failed to fetch pass {}", serial))?
    {
        LatestPass::NotModified => println!("Pass {} not modified", serial),
        LatestPass::Updated {
            package,
            last_modified,
        } => {
            let path = output_path(output, package.file_name());
            package.write_to(&path)?;
            println!("Wrote {} ({} bytes)", path.display(), package.bytes.len());
            println!("  Last-Modified: {}", format_http_date(last_modified));
        }
    }
    Ok(())
}

/// Change the balance of a pass
pub fn cmd_balance(config_path: &Path, serial: &str, balance: f64) -> Result<()> {
    let store = load_config(config_path)?.persistent_state_store()?;
    let now = chrono::Utc::now().timestamp_millis();
    let record = update_balance(store.as_ref(), serial, balance, now)
        .with_context(|| format!("Failed to update pass {}", serial))?;

    println!("Pass {} balance is now {}", serial, record.balance);
    Ok(())
}
