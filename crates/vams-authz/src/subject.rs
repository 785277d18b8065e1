//! Namespaced subject strings for principals and roles.
//!
//! # Purpose
//! Policy rules and role assignments name their subjects as `user::{id}` or
//! `role::{name}` so a user id can never collide with a role name.
//!
//! # Key invariants
//! - The canonical principal of a request is rendered with [`user_subject`].
//! - Prefixes are never stripped or re-parsed; they only flow into casbin rows.
//!
//! # Examples
//! ```rust
//! use vams_authz::{role_subject, user_subject};
//!
//! assert_eq!(user_subject("alice"), "user::alice");
//! assert_eq!(role_subject("viewer"), "role::viewer");
//! ```
use serde::{Deserialize, Serialize};

pub const USER_SUBJECT_PREFIX: &str = "user::";
pub const ROLE_SUBJECT_PREFIX: &str = "role::";

/// Render a principal id as a policy subject.
pub fn user_subject(user_id: &str) -> String {
    format!("{USER_SUBJECT_PREFIX}{user_id}")
}

/// Render a role name as a policy subject.
pub fn role_subject(role_name: &str) -> String {
    format!("{ROLE_SUBJECT_PREFIX}{role_name}")
}

/// Principal identifier wrapper.
///
/// # Summary
/// Newtype around the canonical identity string (first claims token).
///
/// # Example
/// ```rust
/// use vams_authz::PrincipalId;
///
/// let principal = PrincipalId::new("alice");
/// assert_eq!(principal.subject(), "user::alice");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PrincipalId(String);

impl PrincipalId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Policy subject for this principal.
    pub fn subject(&self) -> String {
        user_subject(&self.0)
    }
}

impl std::fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
