//! Privacy levels, the drop encryption engine and encryption status.
//!
//! A drop is a flat map of JSON fields. Its privacy level decides which of
//! those fields are sealed:
//!
//! ```text
//! standard  notes
//! high      notes, text, enrichment
//! maximum   notes, text, enrichment, mediaRef
//! ```
//!
//! Every sealed field records the id of the key that sealed it. Decrypting
//! with another key fails with [`DropError::KeyMismatch`] before any
//! cryptography runs; a failed authentication is [`DropError::Tamper`].

pub mod engine;
mod error;
pub mod policy;
pub mod status;
mod types;

pub use engine::{
    BatchFailure, BatchPolicy, BatchReport, change_level, decrypt_batch, decrypt_drop,
    encrypt_drop, rekey_drop,
};
pub use error::{DropError, DropResult};
pub use policy::{
    CipherParams, EncryptionScope, LevelInfo, PRIVACY_LEVELS, PrivacyLevel, compare, params_for,
    scope_for, scope_for_name,
};
pub use status::{DropStatus, EncryptionStatus, StatusReporter};
pub use types::{DropRecord, EncryptedDrop, SealedField};
