//! Master key store for Droplit.
//!
//! Holds the session's active [`MasterKey`](droplit_crypto::MasterKey) in
//! memory and persists a recoverable [`KeyRecord`] for it. Key bytes never
//! reach storage in the clear:
//!
//! - password-derived keys persist only the salt and KDF parameters
//! - device-generated keys persist wrapped under a per-device secret
//!
//! The store is a two-state machine: uninitialized until a key is activated
//! (or restored) and ready afterwards. [`KeyStore::clear`] returns it to
//! uninitialized without touching the persisted record.

mod device;
mod duckdb_store;
mod error;
mod keystore;
mod record;
mod store;

pub use device::{DeviceKeyProvider, FileDeviceKey, StaticDeviceKey};
pub use duckdb_store::DuckDbKeyRecordStore;
pub use error::{VaultError, VaultResult};
pub use keystore::KeyStore;
pub use record::KeyRecord;
pub use store::{KeyRecordStore, MemoryKeyRecordStore};
