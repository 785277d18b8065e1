//! Casbin enforcer built from one compiled program.
//!
//! # Purpose and responsibility
//! Loads a [`PolicyProgram`]'s role assignments and rules into an in-memory
//! casbin enforcer and answers decisions against widened resources.
//!
//! # Key invariants and assumptions
//! - An instance owns the program it was built from; its policy text is always
//!   the program's text.
//! - Identical rows are loaded once.
//!
//! # Security considerations
//! - Rule objects are opaque condition ids, never resource data, so nothing a
//!   caller supplies reaches the casbin expression engine.
use super::program::PolicyProgram;
use async_trait::async_trait;
use casbin::{CoreApi, Enforcer, MemoryAdapter, MgmtApi};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use vams_authz::{AuthzResult, ResourceObject, casbin_model};

pub struct EnforcerInstance {
    program: Arc<PolicyProgram>,
    enforcer: Enforcer,
}

/// Build an in-memory casbin enforcer for a compiled program.
///
/// # What it does
/// Loads the embedded model, inserts the program's role assignments as
/// grouping rows and its rules as policy rows keyed by condition id, then
/// builds role links.
///
/// # Invariants
/// - The returned instance owns `program`; its policy text is the text the
///   rows were loaded from.
/// - Identical rows are inserted once.
///
/// # Errors
/// - Returns [`vams_authz::AuthzError::Casbin`] for model or policy insertion
///   failures.
///
/// # Example
/// ```rust
/// use std::sync::Arc;
/// use vams_authz::{PrincipalId, ResourceObject};
/// use vams_authz_engine::{PolicyProgram, build_enforcer};
///
/// # async fn build() -> vams_authz::AuthzResult<()> {
/// let program = PolicyProgram::deny_all(&PrincipalId::new("alice"));
/// let enforcer = build_enforcer(Arc::new(program)).await?;
/// assert!(!enforcer.decide(&ResourceObject::new("asset"), "GET")?);
/// # Ok(())
/// # }
/// ```
pub async fn build_enforcer(program: Arc<PolicyProgram>) -> AuthzResult<EnforcerInstance> {
    let model = casbin_model().await?;
    let adapter = MemoryAdapter::default();
    let mut enforcer = Enforcer::new(model, adapter).await?;

    let mut groupings = HashSet::new();
    for assignment in program.role_assignments() {
        let row = vec![assignment.principal.clone(), assignment.role.clone()];
        if groupings.insert(row.clone()) {
            enforcer.add_grouping_policy(row).await?;
        }
    }

    let mut policies = HashSet::new();
    for rule in program.rules() {
        let row = vec![
            rule.subject.clone(),
            program.condition_of(rule).object_pattern(),
            rule.action.clone(),
            rule.effect.as_str().to_string(),
        ];
        if policies.insert(row.clone()) {
            enforcer.add_policy(row).await?;
        }
    }

    enforcer.build_role_links()?;
    Ok(EnforcerInstance { program, enforcer })
}

/// Turns compiled programs into enforcers.
///
/// The facade builds every enforcer through this trait, so embedders and
/// tests can substitute the casbin builder.
#[async_trait]
pub trait EnforcerBuilder: Send + Sync {
    async fn build(&self, program: Arc<PolicyProgram>) -> AuthzResult<EnforcerInstance>;
}

/// [`EnforcerBuilder`] backed by [`build_enforcer`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CasbinEnforcerBuilder;

#[async_trait]
impl EnforcerBuilder for CasbinEnforcerBuilder {
    async fn build(&self, program: Arc<PolicyProgram>) -> AuthzResult<EnforcerInstance> {
        build_enforcer(program).await
    }
}

impl EnforcerInstance {
    pub fn program(&self) -> &Arc<PolicyProgram> {
        &self.program
    }

    pub fn policy_text(&self) -> &str {
        self.program.text()
    }

    /// Decide `action` on an already widened `resource` for the program's
    /// principal.
    ///
    /// # Errors
    /// - [`vams_authz::AuthzError::MissingField`] when a condition references
    ///   an absent field.
    /// - [`vams_authz::AuthzError::Casbin`] for evaluation failures.
    pub fn decide(&self, resource: &ResourceObject, action: &str) -> AuthzResult<bool> {
        let object = self.program.request_object(resource)?;
        let subject = self.program.principal().subject();
        Ok(self
            .enforcer
            .enforce((subject.as_str(), object.as_str(), action))?)
    }
}

impl fmt::Debug for EnforcerInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnforcerInstance")
            .field("principal", self.program.principal())
            .field("rules", &self.program.rules().len())
            .field("deny_all", &self.program.is_deny_all())
            .finish()
    }
}
