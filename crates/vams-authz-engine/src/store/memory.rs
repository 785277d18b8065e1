//! In-memory implementation of the authorization stores.
//!
//! # Purpose
//! Implements [`AuthzStore`] with maps guarded by `tokio::sync::RwLock`. It
//! backs tests and embedders that load roles and constraints from elsewhere.
//!
//! # Durability and consistency
//! - **Not durable**: all state is lost on process restart.
//! - Scans iterate in key order, so offset page tokens stay valid while the
//!   data is unchanged. A write between pages may shift later pages.
//!
//! # Paging
//! Each scan returns at most `min(request.limit, max_page_size)` items. Page
//! tokens are decimal offsets into the filtered result.
use super::{AuthzStore, Page, PageRequest, RoleFilter, StoreError, StoreResult};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use vams_authz::{Constraint, Role, UserRoleAssignment};

pub const DEFAULT_MAX_PAGE_SIZE: usize = 1000;

#[derive(Clone)]
pub struct InMemoryStore {
    max_page_size: usize,
    /// Roles keyed by `role_name`.
    roles: Arc<RwLock<BTreeMap<String, Role>>>,
    /// `(user_id, role_name)` pairs.
    assignments: Arc<RwLock<BTreeSet<(String, String)>>>,
    /// Constraints keyed by `constraint_id`.
    constraints: Arc<RwLock<BTreeMap<String, Constraint>>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn paginate<T: Clone>(
    items: Vec<T>,
    page: &PageRequest,
    max_page_size: usize,
) -> StoreResult<Page<T>> {
    let offset = match &page.start_token {
        None => 0,
        Some(token) => token
            .parse::<usize>()
            .map_err(|_| StoreError::InvalidPageToken(token.clone()))?,
    };
    if offset > items.len() {
        return Err(StoreError::InvalidPageToken(offset.to_string()));
    }
    let limit = page.limit.clamp(1, max_page_size.max(1));
    let end = (offset + limit).min(items.len());
    let next_token = (end < items.len()).then(|| end.to_string());
    Ok(Page {
        items: items[offset..end].to_vec(),
        next_token,
    })
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_max_page_size(DEFAULT_MAX_PAGE_SIZE)
    }

    pub fn with_max_page_size(max_page_size: usize) -> Self {
        Self {
            max_page_size: max_page_size.max(1),
            roles: Arc::new(RwLock::new(BTreeMap::new())),
            assignments: Arc::new(RwLock::new(BTreeSet::new())),
            constraints: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Insert or replace a role by name.
    pub async fn put_role(&self, role: Role) {
        self.roles
            .write()
            .await
            .insert(role.role_name.clone(), role);
    }

    pub async fn assign_role(&self, user_id: &str, role_name: &str) {
        self.assignments
            .write()
            .await
            .insert((user_id.to_string(), role_name.to_string()));
    }

    pub async fn revoke_role(&self, user_id: &str, role_name: &str) -> StoreResult<()> {
        let removed = self
            .assignments
            .write()
            .await
            .remove(&(user_id.to_string(), role_name.to_string()));
        if !removed {
            return Err(StoreError::NotFound(format!("{user_id} -> {role_name}")));
        }
        Ok(())
    }

    /// Insert or replace a constraint by id.
    pub async fn put_constraint(&self, constraint: Constraint) {
        self.constraints
            .write()
            .await
            .insert(constraint.constraint_id.clone(), constraint);
    }

    pub async fn delete_constraint(&self, constraint_id: &str) -> StoreResult<Constraint> {
        self.constraints
            .write()
            .await
            .remove(constraint_id)
            .ok_or_else(|| StoreError::NotFound(constraint_id.to_string()))
    }
}

#[async_trait]
impl AuthzStore for InMemoryStore {
    async fn scan_roles(&self, filter: RoleFilter, page: PageRequest) -> StoreResult<Page<Role>> {
        let roles: Vec<Role> = self
            .roles
            .read()
            .await
            .values()
            .filter(|role| filter.matches(role))
            .cloned()
            .collect();
        paginate(roles, &page, self.max_page_size)
    }

    async fn scan_user_roles(
        &self,
        user_id: &str,
        page: PageRequest,
    ) -> StoreResult<Page<UserRoleAssignment>> {
        let assignments: Vec<UserRoleAssignment> = self
            .assignments
            .read()
            .await
            .iter()
            .filter(|(user, _)| user == user_id)
            .map(|(user, role)| UserRoleAssignment::new(user.clone(), role.clone()))
            .collect();
        paginate(assignments, &page, self.max_page_size)
    }

    async fn scan_constraints(
        &self,
        user_id: &str,
        role: Option<&str>,
        page: PageRequest,
    ) -> StoreResult<Page<Constraint>> {
        let constraints: Vec<Constraint> = self
            .constraints
            .read()
            .await
            .values()
            .filter(|constraint| {
                constraint.references_user(user_id)
                    || role.is_some_and(|role| constraint.references_group(role))
            })
            .cloned()
            .collect();
        paginate(constraints, &page, self.max_page_size)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
