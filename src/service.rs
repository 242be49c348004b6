// src/service.rs

//! Pass lifecycle operations
//!
//! The operations a wallet web service routes to: issuing a new pass,
//! registering a device for updates, and serving the latest version of a
//! pass. Transport is left to the caller; helpers for the `Authorization`
//! and HTTP-date headers live here so every front end parses them the same
//! way.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::pkpass::{PassBuilder, PassPackage, PassValues};
use crate::store::{PassRecord, StateStore};

/// Scheme prefix of the wallet `Authorization` header
pub const AUTHORIZATION_SCHEME: &str = "ApplePass";

/// Length of generated authentication tokens
pub const AUTH_TOKEN_LEN: usize = 32;

/// Length of the random part of a serial number
const SERIAL_SUFFIX_LEN: usize = 10;

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Source of the current time in epoch milliseconds
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

fn system_clock() -> i64 {
    Utc::now().timestamp_millis()
}

/// A newly issued pass
#[derive(Debug, Clone)]
pub struct IssuedPass {
    pub serial: String,
    pub auth_token: String,
    pub package: PassPackage,
}

/// Result of a device registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// Device was not registered before
    Created,
    /// Device was already registered; its push token was replaced
    Updated,
}

/// Result of asking for the latest version of a pass
#[derive(Debug, Clone)]
pub enum LatestPass {
    NotModified,
    Updated {
        package: PassPackage,
        last_modified: DateTime<Utc>,
    },
}

/// Issues and serves passes backed by a state store
pub struct PassService {
    builder: PassBuilder,
    store: Arc<dyn StateStore>,
    clock: Clock,
}

impl PassService {
    pub fn new(builder: PassBuilder, store: Arc<dyn StateStore>) -> Self {
        Self {
            builder,
            store,
            clock: Arc::new(system_clock),
        }
    }

    /// Replace the clock (milliseconds since the Unix epoch)
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn builder(&self) -> &PassBuilder {
        &self.builder
    }

    fn now(&self) -> i64 {
        (self.clock)()
    }

    fn build(&self, serial: &str, record: &PassRecord) -> Result<PassPackage> {
        let package = self.builder.build(&PassValues {
            serial,
            holder_name: &record.name,
            balance: record.balance,
            authentication_token: &record.auth_token,
        })?;
        Ok(package)
    }

    /// Load a record and check the presented token
    fn authorize(&self, serial: &str, token: &str) -> Result<PassRecord> {
        let record = self
            .store
            .get(serial)?
            .ok_or_else(|| Error::NotFound(format!("pass {}", serial)))?;
        if !record.token_matches(token) {
            warn!("Rejected request for pass {} with a bad token", serial);
            return Err(Error::Unauthorized(serial.to_string()));
        }
        Ok(record)
    }

    /// Issue a new pass for `name`
    ///
    /// The record is persisted only after the package has been assembled,
    /// so a failed assembly leaves no state behind.
    pub fn issue(&self, name: &str) -> Result<IssuedPass> {
        let now = self.now();
        let serial = generate_serial(now);
        let auth_token = generate_auth_token();
        let record = PassRecord::new(name, auth_token.clone(), now);

        let package = self.build(&serial, &record)?;
        self.store.put(&serial, &record)?;

        info!("Issued pass {} for {}", serial, name);
        Ok(IssuedPass {
            serial,
            auth_token,
            package,
        })
    }

    /// Register a device for updates to a pass
    pub fn register_device(
        &self,
        serial: &str,
        token: &str,
        device: &str,
        push_token: &str,
    ) -> Result<Registration> {
        let mut record = self.authorize(serial, token)?;
        let created = record.register_device(device, push_token, self.now());
        self.store.put(serial, &record)?;

        debug!("Device {} registered for pass {}", device, serial);
        Ok(if created {
            Registration::Created
        } else {
            Registration::Updated
        })
    }

    /// Latest version of a pass, or `NotModified` if the caller is current
    pub fn latest_pass(
        &self,
        serial: &str,
        token: &str,
        if_modified_since: Option<DateTime<Utc>>,
    ) -> Result<LatestPass> {
        let record = self.authorize(serial, token)?;
        let last_modified = last_modified_of(&record)?;

        if let Some(since) = if_modified_since {
            if since >= last_modified {
                debug!("Pass {} not modified since {}", serial, since);
                return Ok(LatestPass::NotModified);
            }
        }

        let package = self.build(serial, &record)?;
        Ok(LatestPass::Updated {
            package,
            last_modified,
        })
    }

    /// Change the balance shown on a pass
    pub fn set_balance(&self, serial: &str, balance: f64) -> Result<PassRecord> {
        update_balance(self.store.as_ref(), serial, balance, self.now())
    }
}

/// Change the balance of a stored pass and bump its `lastUpdated`
///
/// Needs only the store; nothing is built or signed.
pub fn update_balance(
    store: &dyn StateStore,
    serial: &str,
    balance: f64,
    now_millis: i64,
) -> Result<PassRecord> {
    let mut record = store
        .get(serial)?
        .ok_or_else(|| Error::NotFound(format!("pass {}", serial)))?;
    record.balance = balance;
    record.last_updated = now_millis;
    store.put(serial, &record)?;

    info!("Balance of pass {} set to {}", serial, balance);
    Ok(record)
}

/// `lastUpdated` truncated to whole seconds, the resolution of HTTP dates
fn last_modified_of(record: &PassRecord) -> Result<DateTime<Utc>> {
    let secs = record.last_updated.div_euclid(1000);
    Utc.timestamp_opt(secs, 0).single().ok_or_else(|| {
        Error::IoError(format!("lastUpdated out of range: {}", record.last_updated))
    })
}

/// Serial number: base-36 epoch milliseconds followed by a random suffix
pub fn generate_serial(now_millis: i64) -> String {
    let mut serial = to_base36(now_millis.max(0) as u64);
    let mut rng = rand::thread_rng();
    serial.extend((0..SERIAL_SUFFIX_LEN).map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char));
    serial
}

/// Random alphanumeric authentication token
pub fn generate_auth_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(AUTH_TOKEN_LEN)
        .map(char::from)
        .collect()
}

fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE36[(value % 36) as usize]);
        value /= 36;
    }
    digits.iter().rev().map(|&d| d as char).collect()
}

/// Extract the token from an `Authorization: ApplePass <token>` header
pub fn parse_authorization(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    (scheme == AUTHORIZATION_SCHEME && !token.is_empty()).then_some(token)
}

/// Format an instant as an HTTP date (`Sun, 06 Nov 1994 08:49:37 GMT`)
pub fn format_http_date(time: DateTime<Utc>) -> String {
    time.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Parse an HTTP date as sent in `If-Modified-Since`
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|time| time.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MemoryAssetSource;
    use crate::pkpass::{PassStyle, SignError, Signer, SigningMode};
    use crate::store::MemoryStateStore;
    use std::sync::atomic::{AtomicI64, Ordering};

    struct EchoSigner;

    impl Signer for EchoSigner {
        fn sign(&self, manifest: &[u8]) -> std::result::Result<Vec<u8>, SignError> {
            Ok(crate::hash::digest(manifest).to_vec())
        }

        fn mode(&self) -> SigningMode {
            SigningMode::Raw
        }
    }

    fn service(store: Arc<MemoryStateStore>, now: Arc<AtomicI64>) -> PassService {
        let assets = MemoryAssetSource::new().with_asset("logo.png", b"logo".to_vec());
        let builder = PassBuilder::new(PassStyle::default(), Arc::new(assets), Arc::new(EchoSigner))
            .with_assets(["logo.png"]);
        PassService::new(builder, store).with_clock(Arc::new(move || now.load(Ordering::SeqCst)))
    }

    #[test]
    fn test_issue_persists_record() {
        let store = Arc::new(MemoryStateStore::new());
        let now = Arc::new(AtomicI64::new(1_700_000_000_123));
        let issued = service(store.clone(), now).issue("Ada").unwrap();

        assert!(issued.serial.starts_with(&to_base36(1_700_000_000_123)));
        assert_eq!(issued.auth_token.len(), AUTH_TOKEN_LEN);
        assert_eq!(issued.package.serial, issued.serial);

        let record = store.get(&issued.serial).unwrap().unwrap();
        assert_eq!(record.name, "Ada");
        assert_eq!(record.balance, 0.0);
        assert_eq!(record.last_updated, 1_700_000_000_123);
        assert_eq!(record.auth_token, issued.auth_token);
    }

    #[test]
    fn test_failed_issue_writes_nothing() {
        let store = Arc::new(MemoryStateStore::new());
        let builder = PassBuilder::new(
            PassStyle::default(),
            Arc::new(MemoryAssetSource::new()),
            Arc::new(EchoSigner),
        )
        .with_assets(["logo.png"]);
        let service = PassService::new(builder, store.clone());

        assert!(matches!(service.issue("Ada"), Err(Error::Generation(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn test_register_device_auth() {
        let store = Arc::new(MemoryStateStore::new());
        let now = Arc::new(AtomicI64::new(1_000));
        let service = service(store.clone(), now.clone());
        let issued = service.issue("Ada").unwrap();

        assert!(matches!(
            service.register_device("nope", &issued.auth_token, "d1", "p1"),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            service.register_device(&issued.serial, "wrong", "d1", "p1"),
            Err(Error::Unauthorized(_))
        ));

        now.store(2_000, Ordering::SeqCst);
        assert_eq!(
            service
                .register_device(&issued.serial, &issued.auth_token, "d1", "p1")
                .unwrap(),
            Registration::Created
        );
        assert_eq!(
            service
                .register_device(&issued.serial, &issued.auth_token, "d1", "p2")
                .unwrap(),
            Registration::Updated
        );

        let record = store.get(&issued.serial).unwrap().unwrap();
        assert_eq!(record.devices.len(), 1);
        assert_eq!(record.devices[0].push_token, "p2");
        assert_eq!(record.last_updated, 2_000);
    }

    #[test]
    fn test_latest_pass_conditional() {
        let store = Arc::new(MemoryStateStore::new());
        let now = Arc::new(AtomicI64::new(1_700_000_000_500));
        let service = service(store, now.clone());
        let issued = service.issue("Ada").unwrap();

        let LatestPass::Updated { last_modified, .. } = service
            .latest_pass(&issued.serial, &issued.auth_token, None)
            .unwrap()
        else {
            panic!("expected a package");
        };
        assert_eq!(last_modified.timestamp(), 1_700_000_000);

        // Echoing Last-Modified back is enough to get NotModified
        let echoed = parse_http_date(&format_http_date(last_modified));
        assert!(matches!(
            service.latest_pass(&issued.serial, &issued.auth_token, echoed).unwrap(),
            LatestPass::NotModified
        ));

        now.store(1_700_000_005_000, Ordering::SeqCst);
        service.set_balance(&issued.serial, 12.5).unwrap();
        assert!(matches!(
            service.latest_pass(&issued.serial, &issued.auth_token, echoed).unwrap(),
            LatestPass::Updated { .. }
        ));
    }

    #[test]
    fn test_update_balance_without_builder() {
        let store = MemoryStateStore::new();
        store
            .put("serial1", &PassRecord::new("Ada", "token", 1_000))
            .unwrap();

        let record = update_balance(&store, "serial1", 7.5, 2_000).unwrap();
        assert_eq!(record.balance, 7.5);
        assert_eq!(record.last_updated, 2_000);
        assert_eq!(store.get("serial1").unwrap().unwrap(), record);

        assert!(matches!(
            update_balance(&store, "missing", 1.0, 3_000),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_parse_authorization() {
        assert_eq!(parse_authorization("ApplePass abc123"), Some("abc123"));
        assert_eq!(parse_authorization("  ApplePass   abc123 "), Some("abc123"));
        assert_eq!(parse_authorization("Bearer abc123"), None);
        assert_eq!(parse_authorization("ApplePass "), None);
        assert_eq!(parse_authorization("ApplePass"), None);
    }

    #[test]
    fn test_http_date_roundtrip() {
        let time = Utc.timestamp_opt(784_111_777, 0).unwrap();
        let text = format_http_date(time);
        assert_eq!(text, "Sun, 06 Nov 1994 08:49:37 GMT");
        assert_eq!(parse_http_date(&text), Some(time));
        assert_eq!(parse_http_date("yesterday"), None);
    }

    #[test]
    fn test_serial_format() {
        let serial = generate_serial(0);
        assert_eq!(serial.len(), 1 + SERIAL_SUFFIX_LEN);
        assert!(serial.bytes().all(|b| BASE36.contains(&b)));
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_ne!(generate_auth_token(), generate_auth_token());
    }
}
