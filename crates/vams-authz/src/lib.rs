//! VAMS authorization primitives shared by the engine and its callers.
//!
//! # Purpose
//! Holds the stored authorization data model (roles, role assignments and
//! attribute constraints), the criterion compiler, the typed resource object
//! and the embedded casbin model.
//!
//! # How it fits
//! `vams-authz-engine` compiles these records into a per-principal policy
//! program and answers decisions. Handlers build [`ResourceObject`]s with the
//! types exported here.
//!
//! # Key invariants
//! - Criterion values are data: they are compiled into typed predicates and
//!   never spliced into evaluable expression text.
//! - Subjects are namespaced (`user::` / `role::`) before reaching casbin.
//!
//! # Examples
//! ```rust
//! use vams_authz::{Constraint, Criterion, GroupPermission, Operator};
//!
//! let constraint = Constraint::new("db1-readers", "asset")
//!     .with_and(Criterion::new("databaseId", Operator::Equals, "db1"))
//!     .with_group_permission(GroupPermission::allow("viewer", "GET"));
//! assert!(constraint.references_group("viewer"));
//! ```
//!
//! # Common pitfalls
//! - Criterion values are regex fragments; escape metacharacters for a
//!   literal match.

mod casbin_model;
mod constraint;
mod criterion;
mod errors;
mod resource;
mod search_filter;
mod subject;

pub use casbin_model::{casbin_model, casbin_model_string};
pub use constraint::{
    Constraint, GroupPermission, LegacyCriteria, PermissionType, Role, UserPermission,
    UserRoleAssignment,
};
pub use criterion::{Criterion, Junction, Operator, Predicate, PredicateGroup, compile_criteria};
pub use errors::{AuthzError, AuthzResult};
pub use resource::{
    API_OBJECT_TYPE, AttrValue, FieldDefaults, OBJECT_TYPE_FIELD, ROUTE_PATH_FIELD,
    ResourceObject,
};
pub use search_filter::{
    AGGREGATED_PERMISSIONS, constraints_for_groups, to_permission_aggregation, to_query_filter,
};
pub use subject::{
    PrincipalId, ROLE_SUBJECT_PREFIX, USER_SUBJECT_PREFIX, role_subject, user_subject,
};
