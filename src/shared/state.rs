use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use uuid::Uuid;

use crate::config::AppConfig;
use crate::integrations::{CredentialStore, DbCredentialStore};
use crate::shared::utils::DbPool;
use crate::vendors::meta::MetaAdsProvider;
use crate::vendors::tiktok::TikTokAdsProvider;
use crate::vendors::{AdsProvider, RetryPolicy, VendorType};

pub struct AppState {
    pub conn: DbPool,
    pub config: AppConfig,
    providers: HashMap<VendorType, Arc<dyn AdsProvider>>,
    credentials: Arc<dyn CredentialStore>,
    pub sync_guard: SyncGuard,
}

impl AppState {
    pub fn new(config: AppConfig, conn: DbPool) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.vendors.request_timeout_secs))
            .build()?;

        let retry = RetryPolicy::new(
            config.vendors.retry_attempts,
            Duration::from_millis(config.vendors.retry_base_delay_ms),
        );

        let mut providers: HashMap<VendorType, Arc<dyn AdsProvider>> = HashMap::new();
        providers.insert(
            VendorType::Meta,
            Arc::new(MetaAdsProvider::new(
                http.clone(),
                config.vendors.meta_base_url.clone(),
                retry,
            )),
        );
        providers.insert(
            VendorType::TikTok,
            Arc::new(TikTokAdsProvider::new(
                http,
                config.vendors.tiktok_base_url.clone(),
                retry,
            )),
        );

        Ok(Self {
            credentials: Arc::new(DbCredentialStore::new(conn.clone())),
            conn,
            config,
            providers,
            sync_guard: SyncGuard::default(),
        })
    }

    pub fn provider(&self, vendor: VendorType) -> Option<Arc<dyn AdsProvider>> {
        self.providers.get(&vendor).cloned()
    }

    pub fn credentials(&self) -> Arc<dyn CredentialStore> {
        self.credentials.clone()
    }

    /// Swap in a provider, used by tests to point a vendor at a mock server.
    pub fn register_provider(&mut self, provider: Arc<dyn AdsProvider>) {
        self.providers.insert(provider.vendor(), provider);
    }

    /// Swap the credential store, the test-side counterpart to
    /// `register_provider`.
    pub fn set_credential_store(&mut self, store: Arc<dyn CredentialStore>) {
        self.credentials = store;
    }
}

/// In-process mutual exclusion for sync runs, keyed by (org, vendor).
/// A second sync request for the same key is rejected while one is running.
#[derive(Clone, Default)]
pub struct SyncGuard {
    active: Arc<Mutex<HashSet<(Uuid, VendorType)>>>,
}

impl SyncGuard {
    pub fn try_acquire(&self, org_id: Uuid, vendor: VendorType) -> Option<SyncPermit> {
        let mut active = self
            .active
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if !active.insert((org_id, vendor)) {
            return None;
        }
        Some(SyncPermit {
            guard: self.clone(),
            key: (org_id, vendor),
        })
    }
}

pub struct SyncPermit {
    guard: SyncGuard,
    key: (Uuid, VendorType),
}

impl Drop for SyncPermit {
    fn drop(&mut self) {
        let mut active = self
            .guard
            .active
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        active.remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_guard_is_exclusive_per_org_and_vendor() {
        let guard = SyncGuard::default();
        let org = Uuid::new_v4();

        let permit = guard.try_acquire(org, VendorType::Meta);
        assert!(permit.is_some());
        // same key: rejected while held
        assert!(guard.try_acquire(org, VendorType::Meta).is_none());
        // different vendor or org: independent
        assert!(guard.try_acquire(org, VendorType::TikTok).is_some());
        assert!(guard.try_acquire(Uuid::new_v4(), VendorType::Meta).is_some());

        drop(permit);
        assert!(guard.try_acquire(org, VendorType::Meta).is_some());
    }
}
