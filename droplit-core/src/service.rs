//! The surface the UI and sync layers call.

use crate::config::CoreConfig;
use crate::error::{CoreError, CoreResult};
use droplit_crypto::{
    KdfParams, KeyId, MasterKey, Provenance, Salt, derive_from_password, generate_random,
};
use droplit_drops::policy::FIELD_ENRICHMENT;
use droplit_drops::{
    BatchPolicy, BatchReport, DropRecord, DropStatus, EncryptedDrop, EncryptionStatus,
    PrivacyLevel, StatusReporter, decrypt_batch, decrypt_drop, encrypt_drop,
};
use droplit_proxy::{AnalysisAction, ImageAnalyzer, ImageInput};
use droplit_vault::{
    DeviceKeyProvider, DuckDbKeyRecordStore, FileDeviceKey, KeyRecordStore, KeyStore,
    MemoryKeyRecordStore, StaticDeviceKey,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

/// Where the session stands after [`EncryptionService::ensure_initialized`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// A key is active.
    Ready,
    /// A password-derived key is set up but must be unlocked.
    NeedsPassword,
    /// A device key is stored but was not loaded in this session (after
    /// sign-out).
    NeedsDeviceKey,
    /// No key has been set up for this identity.
    NotSetUp,
}

/// Owns the key store for one identity and exposes setup, unlock, and drop
/// encryption to the rest of the app.
pub struct EncryptionService {
    config: CoreConfig,
    store: Arc<KeyStore>,
    initialized: OnceCell<()>,
}

impl EncryptionService {
    /// Opens the persisted key store described by `config`, or an in-memory
    /// one when `data_dir` is unset.
    pub fn open(config: CoreConfig) -> CoreResult<Self> {
        crate::logging::init_logging(config.log_filter.as_deref());

        let (records, device): (Arc<dyn KeyRecordStore>, Arc<dyn DeviceKeyProvider>) =
            match (config.key_db_path(), config.device_key_path()) {
                (Some(db_path), Some(device_path)) => {
                    if let Some(dir) = &config.data_dir {
                        std::fs::create_dir_all(dir)
                            .map_err(|e| CoreError::Config(format!("{}: {e}", dir.display())))?;
                    }
                    info!("opening key store at {}", db_path.display());
                    (
                        Arc::new(DuckDbKeyRecordStore::open(&db_path)?),
                        Arc::new(FileDeviceKey::new(device_path)),
                    )
                }
                _ => {
                    debug!("using in-memory key store");
                    (
                        Arc::new(MemoryKeyRecordStore::new()),
                        Arc::new(StaticDeviceKey::random()),
                    )
                }
            };

        let store = KeyStore::new(config.identity.clone(), records, device);
        Ok(Self::with_store(config, Arc::new(store)))
    }

    /// Wraps an existing key store.
    pub fn with_store(config: CoreConfig, store: Arc<KeyStore>) -> Self {
        Self {
            config,
            store,
            initialized: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn key_store(&self) -> &Arc<KeyStore> {
        &self.store
    }

    // ── Setup & Session ──

    /// Runs session restore once and reports the resulting state.
    ///
    /// The first successful call reloads a persisted device key. Later calls
    /// only report. A failed restore is not recorded, so the next call
    /// retries it.
    pub async fn ensure_initialized(&self) -> CoreResult<SessionState> {
        self.initialized
            .get_or_try_init(|| async {
                let device_key_pending = matches!(
                    self.store.persisted_record()?,
                    Some(record) if record.provenance == Provenance::DeviceGenerated
                );
                if device_key_pending && !self.store.is_ready() {
                    self.store.load_device_key()?;
                }
                debug!("encryption service initialized for {}", self.store.identity());
                Ok::<(), CoreError>(())
            })
            .await?;
        self.session_state()
    }

    /// Current state without attempting a restore.
    pub fn session_state(&self) -> CoreResult<SessionState> {
        if self.store.is_ready() {
            return Ok(SessionState::Ready);
        }
        Ok(match self.store.persisted_record()? {
            Some(record) => match record.provenance {
                Provenance::PasswordDerived { .. } => SessionState::NeedsPassword,
                Provenance::DeviceGenerated => SessionState::NeedsDeviceKey,
            },
            None => SessionState::NotSetUp,
        })
    }

    /// Derives a new key from `password` with a fresh salt and activates it.
    pub async fn setup_with_password(&self, password: &str) -> CoreResult<KeyId> {
        self.ensure_not_set_up()?;
        let key = self.derive(password, None, self.config.kdf.clone()).await?;
        self.activate_new(key, None)
    }

    /// Reproduces a password-derived key created on another device from its
    /// salt and parameters, and activates it.
    pub async fn import_password_key(
        &self,
        password: &str,
        salt: Salt,
        params: KdfParams,
    ) -> CoreResult<KeyId> {
        let key = self.derive(password, Some(salt), params).await?;
        let allowed = key.id().clone();
        self.activate_new(key, Some(&allowed))
    }

    /// Re-derives the persisted password-derived key for this session.
    pub async fn unlock_with_password(&self, password: &str) -> CoreResult<KeyId> {
        let store = Arc::clone(&self.store);
        let password = Zeroizing::new(password.to_owned());
        let record =
            tokio::task::spawn_blocking(move || store.unlock_with_password(&password)).await??;
        Ok(record.key_id)
    }

    /// Reloads the stored device key, e.g. after signing out.
    pub fn load_device_key(&self) -> CoreResult<KeyId> {
        Ok(self.store.load_device_key()?.key_id)
    }

    /// Generates a random device-bound key and activates it. There is no way
    /// to recover it if the device data is lost.
    pub fn setup_random(&self) -> CoreResult<KeyId> {
        self.activate_new(generate_random(), None)
    }

    pub fn is_ready(&self) -> bool {
        self.store.is_ready()
    }

    /// Drops the in-memory key. The persisted record is kept.
    pub fn sign_out(&self) {
        self.store.clear();
        info!("signed out {}", self.store.identity());
    }

    /// Deletes the persisted key record. Drops sealed with that key become
    /// unreadable unless the key is reproduced (password keys only).
    pub fn forget_key(&self) -> CoreResult<bool> {
        let existed = self.store.delete_record()?;
        warn!("forgot key for {} (existed: {existed})", self.store.identity());
        Ok(existed)
    }

    // ── Status ──

    pub fn status_for(&self, drop: &EncryptedDrop) -> DropStatus {
        StatusReporter::new(&self.store).status_for(drop)
    }

    pub fn global_status(&self) -> EncryptionStatus {
        StatusReporter::new(&self.store).global_status()
    }

    // ── Sync ──

    pub fn encrypt_outbound(
        &self,
        drop: &DropRecord,
        level: PrivacyLevel,
    ) -> CoreResult<EncryptedDrop> {
        let key = self.store.active_key()?;
        Ok(encrypt_drop(drop, level, &key)?)
    }

    pub fn decrypt_inbound(&self, drop: &EncryptedDrop) -> CoreResult<DropRecord> {
        let key = self.store.active_key()?;
        Ok(decrypt_drop(drop, &key)?)
    }

    /// Decrypts `drops` across blocking worker tasks.
    ///
    /// Results keep input order. Under [`BatchPolicy::FailFast`] the error of
    /// the earliest failing drop is returned.
    pub async fn decrypt_inbound_batch(
        &self,
        drops: Vec<EncryptedDrop>,
    ) -> CoreResult<BatchReport> {
        let key = self.store.active_key()?;
        if drops.is_empty() {
            return Ok(BatchReport::default());
        }

        let chunk_size = drops.len().div_ceil(self.config.worker_count());
        let mut tasks = Vec::new();
        let mut drops = drops.into_iter().peekable();
        while drops.peek().is_some() {
            let chunk: Vec<EncryptedDrop> = drops.by_ref().take(chunk_size).collect();
            let key: Arc<MasterKey> = Arc::clone(&key);
            tasks.push(tokio::task::spawn_blocking(move || {
                decrypt_batch(&chunk, &key, BatchPolicy::SkipAndReport)
            }));
        }

        let mut report = BatchReport::default();
        for task in tasks {
            let part = task.await??;
            report.decrypted.extend(part.decrypted);
            report.failures.extend(part.failures);
        }

        if !report.failures.is_empty() {
            warn!(
                "{} of {} inbound drops could not be decrypted",
                report.failures.len(),
                report.failures.len() + report.decrypted.len()
            );
            if self.config.batch_policy == BatchPolicy::FailFast {
                let first = report.failures.swap_remove(0);
                return Err(first.error.into());
            }
        }
        Ok(report)
    }

    /// Moves a drop to another level with the active key.
    pub fn change_level(
        &self,
        drop: &EncryptedDrop,
        level: PrivacyLevel,
    ) -> CoreResult<EncryptedDrop> {
        let key = self.store.active_key()?;
        Ok(droplit_drops::change_level(drop, level, &key)?)
    }

    // ── Enrichment ──

    /// Runs image analysis and stores the text in the drop's `enrichment`
    /// field. The drop is returned in plaintext; encrypting it follows its
    /// privacy level like any other field. Works whether or not a key is
    /// active.
    pub async fn enrich(
        &self,
        drop: &DropRecord,
        analyzer: &dyn ImageAnalyzer,
        action: AnalysisAction,
        image: &ImageInput,
        prompt: Option<&str>,
    ) -> CoreResult<DropRecord> {
        let result = analyzer.analyze(action, image, prompt).await?;
        debug!("enriched drop {} via {}", drop.id, action.as_str());
        let mut enriched = drop.clone();
        enriched.set(FIELD_ENRICHMENT, result.text);
        Ok(enriched)
    }

    // ── Internals ──

    async fn derive(
        &self,
        password: &str,
        salt: Option<Salt>,
        params: KdfParams,
    ) -> CoreResult<MasterKey> {
        let password = Zeroizing::new(password.to_owned());
        let key = tokio::task::spawn_blocking(move || {
            derive_from_password(&password, salt.as_ref(), &params)
        })
        .await?
        .map_err(droplit_vault::VaultError::from)?;
        Ok(key)
    }

    /// Activates `key` unless a different key is already set up. Checked
    /// again atomically by the store, after any slow derivation.
    fn activate_new(&self, key: MasterKey, allowed: Option<&KeyId>) -> CoreResult<KeyId> {
        match self.store.activate_if_absent(key, allowed)? {
            Some(record) => Ok(record.key_id),
            None => Err(self.already_set_up()),
        }
    }

    /// Fails early, before deriving, when a key is already set up.
    fn ensure_not_set_up(&self) -> CoreResult<()> {
        match self.store.persisted_record()? {
            Some(_) => Err(self.already_set_up()),
            None => Ok(()),
        }
    }

    fn already_set_up(&self) -> CoreError {
        CoreError::AlreadySetUp(self.store.identity().to_string())
    }
}

impl std::fmt::Debug for EncryptionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionService")
            .field("store", &self.store)
            .field("initialized", &self.initialized.initialized())
            .finish()
    }
}
