//! Encryption service for the Droplit app.
//!
//! [`EncryptionService`] is the single entry point the UI and sync layers
//! use: it owns the [`KeyStore`](droplit_vault::KeyStore) for one identity,
//! runs password derivation off the async executor, and applies the privacy
//! level policy to drops going out to and coming in from the cloud.
//!
//! ```no_run
//! # async fn run() -> droplit_core::CoreResult<()> {
//! use droplit_core::{CoreConfig, EncryptionService, SessionState};
//! use droplit_drops::{DropRecord, PrivacyLevel};
//!
//! let service = EncryptionService::open(CoreConfig::default())?;
//! if service.ensure_initialized().await? == SessionState::NotSetUp {
//!     service.setup_with_password("correcthorse").await?;
//! }
//! let drop = DropRecord::new().with_field("notes", "secret");
//! let sealed = service.encrypt_outbound(&drop, PrivacyLevel::Maximum)?;
//! # Ok(())
//! # }
//! ```

pub mod config;
mod error;
pub mod logging;
mod service;

pub use config::CoreConfig;
pub use error::{CoreError, CoreResult};
pub use service::{EncryptionService, SessionState};
