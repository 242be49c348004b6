// src/store/mod.rs
//! Per-pass state
//!
//! Each issued pass has one [`PassRecord`] keyed by its serial number. The
//! record is stored as JSON so every backend keeps the same shape:
//!
//! ```json
//! {"name":"Ada","balance":0.0,"lastUpdated":1700000000000,
//!  "authToken":"k3j...","devices":[{"device":"d1","pushToken":"p1"}]}
//! ```

mod memory;
pub mod schema;
mod sqlite;

pub use memory::MemoryStateStore;
pub use sqlite::SqliteStateStore;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// State store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Failed to (de)serialize pass record: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("State store I/O error: {0}")]
    Io(String),
}

/// A wallet device registered for updates to a pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRegistration {
    /// Device library identifier
    pub device: String,
    pub push_token: String,
}

/// Stored state of one pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassRecord {
    /// Holder display name
    pub name: String,
    pub balance: f64,
    /// Last change, milliseconds since the Unix epoch
    pub last_updated: i64,
    pub auth_token: String,
    #[serde(default)]
    pub devices: Vec<DeviceRegistration>,
}

impl PassRecord {
    /// Fresh record with a zero balance and no devices
    pub fn new(name: impl Into<String>, auth_token: impl Into<String>, now_millis: i64) -> Self {
        Self {
            name: name.into(),
            balance: 0.0,
            last_updated: now_millis,
            auth_token: auth_token.into(),
            devices: Vec::new(),
        }
    }

    /// Register a device, replacing the push token if it is already known
    ///
    /// Returns `true` when the device was not registered before.
    pub fn register_device(
        &mut self,
        device: impl Into<String>,
        push_token: impl Into<String>,
        now_millis: i64,
    ) -> bool {
        let device = device.into();
        let push_token = push_token.into();
        self.last_updated = now_millis;

        match self.devices.iter_mut().find(|d| d.device == device) {
            Some(existing) => {
                existing.push_token = push_token;
                false
            }
            None => {
                self.devices.push(DeviceRegistration { device, push_token });
                true
            }
        }
    }

    /// Constant-time comparison against a presented token
    pub fn token_matches(&self, presented: &str) -> bool {
        let expected = self.auth_token.as_bytes();
        let presented = presented.as_bytes();
        if expected.len() != presented.len() {
            return false;
        }
        expected
            .iter()
            .zip(presented)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

/// Keyed storage for pass records
///
/// `get` and `put` are each atomic per serial. There is no cross-key
/// transaction.
pub trait StateStore: Send + Sync {
    fn get(&self, serial: &str) -> Result<Option<PassRecord>, StoreError>;

    fn put(&self, serial: &str, record: &PassRecord) -> Result<(), StoreError>;
}

impl<T: StateStore + ?Sized> StateStore for std::sync::Arc<T> {
    fn get(&self, serial: &str) -> Result<Option<PassRecord>, StoreError> {
        (**self).get(serial)
    }

    fn put(&self, serial: &str, record: &PassRecord) -> Result<(), StoreError> {
        (**self).put(serial, record)
    }
}
