//! Policy compilation and enforcement.
//!
//! - `repository` drains paginated store scans.
//! - `compiler` selects the applicable roles and builds a program, retrying
//!   store failures.
//! - `program` is the compiled, typed policy and its text rendering.
//! - `enforcer` loads a program into casbin.
pub mod compiler;
pub mod enforcer;
pub mod program;
pub mod repository;

pub use compiler::{CompileOutcome, PolicyCompiler, RetryPolicy};
pub use enforcer::{CasbinEnforcerBuilder, EnforcerBuilder, EnforcerInstance, build_enforcer};
pub use program::{
    Condition, NEVER_PATTERN, PermissionRule, PolicyProgram, ProgramBuilder, RoleAssignment,
    RuleCondition,
};
pub use repository::RepositoryAdapter;
