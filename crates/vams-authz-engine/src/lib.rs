//! Per-principal policy compilation, caching and enforcement.
//!
//! # Purpose
//! Compiles each principal's roles and attribute constraints into a casbin
//! enforcer, caches it per principal and MFA tier with a time-based refresh,
//! and answers allow/deny through [`AuthorizationFacade`].
//!
//! # How it fits
//! Handlers construct a [`vams_authz::ResourceObject`] and call the facade with
//! the caller's [`Claims`] and an action verb. Roles, assignments and
//! constraints are read through the [`AuthzStore`] trait.
//!
//! # Key invariants
//! - Decisions fail closed: internal errors, missing principals and
//!   unrecognized requests all answer `false`.
//! - A cached policy text and its enforcer are always replaced together.
//! - Constraint edits reach active sessions within one refresh interval.
//!
//! # Important configuration
//! - `VAMS_AUTHZ_REFRESH_POLICY_SECONDS`, `VAMS_AUTHZ_POLICY_RETRY_ATTEMPTS`,
//!   `VAMS_AUTHZ_POLICY_RETRY_DELAY_MS`, `VAMS_AUTHZ_PAGE_SIZE`, and an
//!   optional YAML override at `VAMS_AUTHZ_CONFIG`.
pub mod cache;
pub mod claims;
pub mod config;
pub mod facade;
pub mod observability;
pub mod policy;
pub mod store;

pub use cache::{CacheKey, Lookup, PolicyCache};
pub use claims::Claims;
pub use config::AuthzConfig;
pub use facade::{AuthorizationFacade, PrincipalEnforcer};
pub use observability::init_observability;
pub use policy::{
    CasbinEnforcerBuilder, CompileOutcome, EnforcerBuilder, EnforcerInstance, PolicyCompiler,
    PolicyProgram, RepositoryAdapter, RetryPolicy, build_enforcer,
};
pub use store::memory::InMemoryStore;
pub use store::{AuthzStore, Page, PageRequest, RoleFilter, StoreError, StoreResult};
