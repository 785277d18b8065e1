//! Paginated reads of roles, role assignments and constraints.
//!
//! Every scan is drained until the store stops returning a continuation
//! token. A token seen twice is treated as a store defect rather than looped
//! on forever.
use crate::store::{AuthzStore, Page, PageRequest, RoleFilter, StoreError, StoreResult};
use std::collections::{BTreeSet, HashSet};
use std::future::Future;
use std::sync::Arc;
use vams_authz::Constraint;

#[derive(Clone)]
pub struct RepositoryAdapter {
    store: Arc<dyn AuthzStore>,
    page_size: usize,
}

async fn drain<T, F, Fut>(page_size: usize, mut fetch: F) -> StoreResult<Vec<T>>
where
    F: FnMut(PageRequest) -> Fut,
    Fut: Future<Output = StoreResult<Page<T>>>,
{
    let mut items = Vec::new();
    let mut seen = HashSet::new();
    let mut request = PageRequest::first(page_size);
    loop {
        let page = fetch(request).await?;
        items.extend(page.items);
        match page.next_token {
            None => return Ok(items),
            Some(token) => {
                if !seen.insert(token.clone()) {
                    return Err(StoreError::InvalidPageToken(token));
                }
                request = PageRequest::after(page_size, token);
            }
        }
    }
}

impl RepositoryAdapter {
    pub fn new(store: Arc<dyn AuthzStore>, page_size: usize) -> Self {
        Self {
            store,
            page_size: page_size.max(1),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    /// Names of every role that does not require MFA.
    pub async fn roles_without_mfa(&self) -> StoreResult<HashSet<String>> {
        let roles = drain(self.page_size, |page| {
            self.store.scan_roles(RoleFilter::without_mfa(), page)
        })
        .await?;
        Ok(roles.into_iter().map(|role| role.role_name).collect())
    }

    /// Role names assigned to `user_id`, de-duplicated and sorted.
    pub async fn user_roles(&self, user_id: &str) -> StoreResult<Vec<String>> {
        let assignments = drain(self.page_size, |page| {
            self.store.scan_user_roles(user_id, page)
        })
        .await?;
        let roles: BTreeSet<String> = assignments
            .into_iter()
            .map(|assignment| assignment.role_name)
            .collect();
        Ok(roles.into_iter().collect())
    }

    /// Constraints referencing `user_id` directly, or `role` when given.
    pub async fn constraints_for(
        &self,
        user_id: &str,
        role: Option<&str>,
    ) -> StoreResult<Vec<Constraint>> {
        let constraints = drain(self.page_size, |page| {
            self.store.scan_constraints(user_id, role, page)
        })
        .await?;
        tracing::debug!(
            user_id = %user_id,
            role = role.unwrap_or(""),
            count = constraints.len(),
            "loaded constraints"
        );
        Ok(constraints)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;
    use async_trait::async_trait;
    use vams_authz::{GroupPermission, Role, UserRoleAssignment};

    #[tokio::test]
    async fn drains_every_page() {
        let store = InMemoryStore::with_max_page_size(2);
        for index in 0..5 {
            store.put_role(Role::new(format!("role-{index}"))).await;
            store.assign_role("alice", &format!("role-{index}")).await;
            store
                .put_constraint(
                    Constraint::new(format!("c{index}"), "asset")
                        .with_group_permission(GroupPermission::allow("viewer", "GET")),
                )
                .await;
        }
        store.put_role(Role::new("admin").requiring_mfa()).await;

        let adapter = RepositoryAdapter::new(Arc::new(store), 2);
        let open = adapter.roles_without_mfa().await.expect("roles");
        assert_eq!(open.len(), 5);
        assert!(!open.contains("admin"));
        assert_eq!(adapter.user_roles("alice").await.expect("roles").len(), 5);
        let constraints = adapter
            .constraints_for("alice", Some("viewer"))
            .await
            .expect("constraints");
        assert_eq!(constraints.len(), 5);
    }

    struct LoopingStore;

    #[async_trait]
    impl AuthzStore for LoopingStore {
        async fn scan_roles(&self, _: RoleFilter, _: PageRequest) -> StoreResult<Page<Role>> {
            Ok(Page {
                items: vec![Role::new("viewer")],
                next_token: Some("same".to_string()),
            })
        }

        async fn scan_user_roles(
            &self,
            _: &str,
            _: PageRequest,
        ) -> StoreResult<Page<UserRoleAssignment>> {
            Ok(Page::last(Vec::new()))
        }

        async fn scan_constraints(
            &self,
            _: &str,
            _: Option<&str>,
            _: PageRequest,
        ) -> StoreResult<Page<Constraint>> {
            Ok(Page::last(Vec::new()))
        }

        fn backend_name(&self) -> &'static str {
            "looping"
        }
    }

    #[tokio::test]
    async fn repeated_token_is_an_error() {
        let adapter = RepositoryAdapter::new(Arc::new(LoopingStore), 10);
        let err = adapter.roles_without_mfa().await.expect_err("loop");
        assert!(matches!(err, StoreError::InvalidPageToken(token) if token == "same"));
        assert_eq!(adapter.backend_name(), "looping");
    }
}
