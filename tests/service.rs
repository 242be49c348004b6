// tests/service.rs

//! Pass service workflow over a configured SQLite store.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{TimeZone, Utc};
use common::*;
use walletpass::service::{AUTHORIZATION_SCHEME, format_http_date, parse_http_date};
use walletpass::{
    Config, Error, LatestPass, MemoryStateStore, PassService, Registration, SqliteStateStore,
    StateStore, VerifyOptions, read_archive, verify_package,
};

#[test]
fn test_issue_register_fetch_over_sqlite() {
    let (dir, config_path) = setup_config_dir("detached");
    let config = Config::from_file(&config_path).unwrap();
    let service = config.pass_service().unwrap();

    let issued = service.issue("Grace").unwrap();
    assert_eq!(issued.auth_token.len(), 32);
    verify_package(&issued.package.bytes, &VerifyOptions::default()).unwrap();

    let db_path = dir.path().join("state/passes.db");
    assert!(db_path.exists());

    let first = service
        .register_device(&issued.serial, &issued.auth_token, "device-1", "push-a")
        .unwrap();
    assert_eq!(first, Registration::Created);
    let again = service
        .register_device(&issued.serial, &issued.auth_token, "device-1", "push-b")
        .unwrap();
    assert_eq!(again, Registration::Updated);

    // A second service over the same file sees the stored record
    drop(service);
    let store = SqliteStateStore::open(&db_path).unwrap();
    let record = store.get(&issued.serial).unwrap().unwrap();
    assert_eq!(record.name, "Grace");
    assert_eq!(record.devices.len(), 1);
    assert_eq!(record.devices[0].push_token, "push-b");

    let service = config.pass_service().unwrap();
    let header = format!("{} {}", AUTHORIZATION_SCHEME, issued.auth_token);
    let token = walletpass::service::parse_authorization(&header).unwrap();
    match service.latest_pass(&issued.serial, token, None).unwrap() {
        LatestPass::Updated { package, .. } => {
            let contents = read_archive(&package.bytes).unwrap();
            assert_eq!(contents.entries.len(), 4);
        }
        LatestPass::NotModified => panic!("expected a package"),
    }
}

#[test]
fn test_raw_config_builds_raw_packages() {
    let (_dir, config_path) = setup_config_dir("raw");
    let config = Config::from_file(&config_path).unwrap();
    let issued = config.pass_service().unwrap().issue("Linus").unwrap();

    let options = VerifyOptions {
        public_key: Some(walletpass::pkpass::load_public_key_pem(SIGNING_KEY).unwrap()),
        ..VerifyOptions::default()
    };
    let report = verify_package(&issued.package.bytes, &options).unwrap();
    assert_eq!(report.mode, walletpass::SigningMode::Raw);
}

#[test]
fn test_conditional_fetch_and_balance_update() {
    let now = Arc::new(AtomicI64::new(1_700_000_000_123));
    let clock_now = Arc::clone(&now);
    let store = Arc::new(MemoryStateStore::new());
    let service = PassService::new(detached_builder(), store.clone())
        .with_clock(Arc::new(move || clock_now.load(Ordering::SeqCst)));

    let issued = service.issue("Ada").unwrap();
    let last_modified = match service
        .latest_pass(&issued.serial, &issued.auth_token, None)
        .unwrap()
    {
        LatestPass::Updated { last_modified, .. } => last_modified,
        LatestPass::NotModified => panic!("expected a package"),
    };
    assert_eq!(last_modified, Utc.timestamp_opt(1_700_000_000, 0).unwrap());

    // Round-tripping through the HTTP date keeps the caller current
    let since = parse_http_date(&format_http_date(last_modified)).unwrap();
    assert!(matches!(
        service
            .latest_pass(&issued.serial, &issued.auth_token, Some(since))
            .unwrap(),
        LatestPass::NotModified
    ));

    now.store(1_700_000_060_000, Ordering::SeqCst);
    let record = service.set_balance(&issued.serial, 42.0).unwrap();
    assert_eq!(record.balance, 42.0);

    match service
        .latest_pass(&issued.serial, &issued.auth_token, Some(since))
        .unwrap()
    {
        LatestPass::Updated { package, .. } => {
            let contents = read_archive(&package.bytes).unwrap();
            let descriptor: serde_json::Value =
                serde_json::from_slice(contents.entries.get("pass.json").unwrap().payload())
                    .unwrap();
            assert_eq!(descriptor["storeCard"]["primaryFields"][0]["value"], 42.0);
        }
        LatestPass::NotModified => panic!("balance change should be visible"),
    }
}

#[test]
fn test_bad_token_and_unknown_serial() {
    let service = PassService::new(detached_builder(), Arc::new(MemoryStateStore::new()));
    let issued = service.issue("Ada").unwrap();

    let err = service
        .latest_pass(&issued.serial, "wrong-token", None)
        .unwrap_err();
    assert!(matches!(err, Error::Unauthorized(_)));

    let err = service
        .register_device("nope", &issued.auth_token, "device", "push")
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[test]
fn test_failed_issue_leaves_no_state() {
    let store = Arc::new(MemoryStateStore::new());
    let builder = detached_builder().with_assets(["logo.png", "strip.png"]);
    let service = PassService::new(builder, store.clone());

    let err = service.issue("Ada").unwrap_err();
    assert!(matches!(err, Error::Generation(_)));
    assert!(store.is_empty());
}
