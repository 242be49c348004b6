// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use walletpass::pkpass::{DetachedSigner, RawSigner};
use walletpass::{MemoryAssetSource, PassBuilder, PassStyle};

pub const SIGNING_KEY: &str = include_str!("../fixtures/signing.key");
pub const SIGNING_CERT: &str = include_str!("../fixtures/signing.pem");
pub const WWDR_CERT: &str = include_str!("../fixtures/wwdr.pem");
pub const OTHER_KEY: &str = include_str!("../fixtures/other.key");

/// Stand-in for a PNG logo; only the bytes matter to the package
pub const LOGO: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDRtest-logo";

pub fn fixture_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub fn test_style() -> PassStyle {
    PassStyle {
        pass_type_identifier: "pass.com.example.loyalty".to_string(),
        team_identifier: "ABCDE12345".to_string(),
        web_service_url: "https://passes.example.com/api/".to_string(),
        ..PassStyle::default()
    }
}

pub fn detached_signer() -> DetachedSigner {
    DetachedSigner::from_pem(SIGNING_KEY, SIGNING_CERT, WWDR_CERT).unwrap()
}

pub fn raw_signer() -> RawSigner {
    RawSigner::from_pem(SIGNING_KEY).unwrap()
}

/// Builder with one in-memory `logo.png` and the detached fixture signer
pub fn detached_builder() -> PassBuilder {
    let assets = MemoryAssetSource::new().with_asset("logo.png", LOGO);
    PassBuilder::new(test_style(), Arc::new(assets), Arc::new(detached_signer()))
        .with_assets(["logo.png"])
}

/// Builder with one in-memory `logo.png` and the raw fixture signer
pub fn raw_builder() -> PassBuilder {
    let assets = MemoryAssetSource::new().with_asset("logo.png", LOGO);
    PassBuilder::new(test_style(), Arc::new(assets), Arc::new(raw_signer()))
        .with_assets(["logo.png"])
}

/// Write a config file, an asset directory and a database path into a
/// fresh temp dir. Returns (TempDir, config_path); keep the TempDir alive.
pub fn setup_config_dir(mode: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let assets = dir.path().join("assets");
    fs::create_dir_all(&assets).unwrap();
    fs::write(assets.join("logo.png"), LOGO).unwrap();

    let signing = match mode {
        "raw" => format!(
            "mode = \"raw\"\nprivate_key = \"{}\"\n",
            fixture_path("signing.key").display()
        ),
        _ => format!(
            "mode = \"detached\"\nprivate_key = \"{}\"\ncertificate = \"{}\"\nintermediate = \"{}\"\n",
            fixture_path("signing.key").display(),
            fixture_path("signing.pem").display(),
            fixture_path("wwdr.pem").display()
        ),
    };

    let config = format!(
        r#"[pass]
pass_type_identifier = "pass.com.example.loyalty"
team_identifier = "ABCDE12345"
web_service_url = "https://passes.example.com/api/"

[signing]
{signing}
[assets]
directory = "assets"
files = ["logo.png"]

[state]
database = "state/passes.db"
"#
    );
    let config_path = dir.path().join("walletpass.toml");
    fs::write(&config_path, config).unwrap();
    (dir, config_path)
}
