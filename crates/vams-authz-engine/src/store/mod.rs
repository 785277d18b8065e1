use async_trait::async_trait;
use thiserror::Error;
use vams_authz::{Constraint, Role, UserRoleAssignment};

pub mod memory;

/// One page request against a store scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: usize,
    pub start_token: Option<String>,
}

impl PageRequest {
    pub fn first(limit: usize) -> Self {
        Self {
            limit,
            start_token: None,
        }
    }

    pub fn after(limit: usize, token: String) -> Self {
        Self {
            limit,
            start_token: Some(token),
        }
    }
}

/// One page of scan results; `next_token` is `None` on the last page.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_token: Option<String>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_token: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoleFilter {
    pub mfa_required: Option<bool>,
}

impl RoleFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn without_mfa() -> Self {
        Self {
            mfa_required: Some(false),
        }
    }

    pub fn matches(&self, role: &Role) -> bool {
        self.mfa_required
            .is_none_or(|required| role.mfa_required == required)
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid page token: {0}")]
    InvalidPageToken(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Paginated read access to the role, role-assignment and constraint stores.
#[async_trait]
pub trait AuthzStore: Send + Sync {
    async fn scan_roles(&self, filter: RoleFilter, page: PageRequest) -> StoreResult<Page<Role>>;

    async fn scan_user_roles(
        &self,
        user_id: &str,
        page: PageRequest,
    ) -> StoreResult<Page<UserRoleAssignment>>;

    /// Constraints whose `userPermissions` name `user_id`, or whose
    /// `groupPermissions` name `role` when one is given.
    async fn scan_constraints(
        &self,
        user_id: &str,
        role: Option<&str>,
        page: PageRequest,
    ) -> StoreResult<Page<Constraint>>;

    fn backend_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_filter_matches_mfa_requirement() {
        let open = Role::new("viewer");
        let guarded = Role::new("admin").requiring_mfa();
        assert!(RoleFilter::all().matches(&open));
        assert!(RoleFilter::all().matches(&guarded));
        assert!(RoleFilter::without_mfa().matches(&open));
        assert!(!RoleFilter::without_mfa().matches(&guarded));
    }

    #[test]
    fn store_error_display() {
        let err = StoreError::Unavailable("throttled".to_string());
        assert_eq!(err.to_string(), "store unavailable: throttled");
        let err = StoreError::from(anyhow::anyhow!("boom"));
        assert_eq!(err.to_string(), "boom");
    }
}
