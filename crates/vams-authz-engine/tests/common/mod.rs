#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use vams_authz::{Constraint, Criterion, GroupPermission, Operator, Role, UserRoleAssignment};
use vams_authz_engine::{
    AuthorizationFacade, AuthzConfig, AuthzStore, InMemoryStore, Page, PageRequest, PolicyCache,
    RoleFilter, StoreError, StoreResult,
};

pub const RETRY_DELAY: Duration = Duration::from_millis(5);

pub fn test_config() -> AuthzConfig {
    AuthzConfig {
        policy_retry_delay: RETRY_DELAY,
        ..AuthzConfig::default()
    }
}

pub fn facade_over(store: Arc<dyn AuthzStore>, config: &AuthzConfig) -> AuthorizationFacade {
    let cache = Arc::new(PolicyCache::new(config.refresh_interval));
    AuthorizationFacade::new(store, cache, config)
}

/// alice holds `viewer`; viewers may GET assets in db1.
pub async fn seeded_store() -> InMemoryStore {
    let store = InMemoryStore::new();
    store.put_role(Role::new("viewer")).await;
    store.assign_role("alice", "viewer").await;
    store.put_constraint(db1_readers()).await;
    store
}

pub fn db1_readers() -> Constraint {
    Constraint::new("db1-readers", "asset")
        .with_and(Criterion::new("databaseId", Operator::Equals, "db1"))
        .with_group_permission(GroupPermission::allow("viewer", "GET"))
}

/// Store wrapper that counts compile attempts and fails on demand.
#[derive(Clone)]
pub struct FlakyStore {
    inner: InMemoryStore,
    failing: Arc<AtomicBool>,
    user_role_scans: Arc<AtomicUsize>,
}

impl FlakyStore {
    pub fn new(inner: InMemoryStore) -> Self {
        Self {
            inner,
            failing: Arc::new(AtomicBool::new(false)),
            user_role_scans: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn inner(&self) -> &InMemoryStore {
        &self.inner
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Every compile attempt starts with one user-role scan.
    pub fn attempts(&self) -> usize {
        self.user_role_scans.load(Ordering::SeqCst)
    }

    fn check(&self) -> StoreResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl AuthzStore for FlakyStore {
    async fn scan_roles(&self, filter: RoleFilter, page: PageRequest) -> StoreResult<Page<Role>> {
        self.check()?;
        self.inner.scan_roles(filter, page).await
    }

    async fn scan_user_roles(
        &self,
        user_id: &str,
        page: PageRequest,
    ) -> StoreResult<Page<UserRoleAssignment>> {
        if page.start_token.is_none() {
            self.user_role_scans.fetch_add(1, Ordering::SeqCst);
        }
        self.check()?;
        self.inner.scan_user_roles(user_id, page).await
    }

    async fn scan_constraints(
        &self,
        user_id: &str,
        role: Option<&str>,
        page: PageRequest,
    ) -> StoreResult<Page<Constraint>> {
        self.check()?;
        self.inner.scan_constraints(user_id, role, page).await
    }

    fn backend_name(&self) -> &'static str {
        "flaky"
    }
}
