//! Policy compilation with bounded retries.
//!
//! # Purpose
//! Loads a principal's applicable roles and constraints through the
//! [`RepositoryAdapter`] and builds a [`PolicyProgram`].
//!
//! # Key invariants
//! - Without MFA only roles whose `mfa_required` is false apply.
//! - A principal with no applicable role still gets its user-direct
//!   constraints.
//! - Store failures are retried `attempts` times with a fixed delay between
//!   attempts; only exhaustion is reported, as [`CompileOutcome::Exhausted`].
use super::program::{PolicyProgram, ProgramBuilder};
use super::repository::RepositoryAdapter;
use crate::observability::POLICY_COMPILES_TOTAL;
use crate::store::{StoreError, StoreResult};
use std::time::Duration;
use vams_authz::PrincipalId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// At least one attempt is always made.
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

#[derive(Debug)]
pub enum CompileOutcome {
    Compiled(PolicyProgram),
    Exhausted { attempts: u32, last_error: StoreError },
}

#[derive(Clone)]
pub struct PolicyCompiler {
    repository: RepositoryAdapter,
    retry: RetryPolicy,
}

impl PolicyCompiler {
    pub fn new(repository: RepositoryAdapter, retry: RetryPolicy) -> Self {
        Self { repository, retry }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Compile the principal's program, retrying store failures.
    ///
    /// # What it does
    /// Runs [`Self::compile_once`] up to the policy's attempt count, sleeping
    /// the configured delay between attempts but not after the last one.
    ///
    /// # Invariants
    /// - Only total exhaustion yields [`CompileOutcome::Exhausted`]; a single
    ///   failed attempt is logged and retried.
    /// - The outcome never holds a deny-all program. Building the fallback is
    ///   the caller's decision.
    ///
    /// # Errors
    /// Never fails outright. After the last attempt the final store or
    /// compile error is carried in [`CompileOutcome::Exhausted`].
    ///
    /// # Example
    /// ```rust
    /// use std::sync::Arc;
    /// use std::time::Duration;
    /// use vams_authz::PrincipalId;
    /// use vams_authz_engine::{
    ///     CompileOutcome, InMemoryStore, PolicyCompiler, RepositoryAdapter, RetryPolicy,
    /// };
    ///
    /// # async fn compile() {
    /// let repository = RepositoryAdapter::new(Arc::new(InMemoryStore::new()), 100);
    /// let compiler = PolicyCompiler::new(repository, RetryPolicy::new(3, Duration::ZERO));
    /// let outcome = compiler.compile(&PrincipalId::new("alice"), false).await;
    /// assert!(matches!(outcome, CompileOutcome::Compiled(_)));
    /// # }
    /// ```
    pub async fn compile(&self, principal: &PrincipalId, mfa_enabled: bool) -> CompileOutcome {
        let mut last_error = None;
        for attempt in 1..=self.retry.attempts {
            match self.compile_once(principal, mfa_enabled).await {
                Ok(program) => {
                    metrics::counter!(POLICY_COMPILES_TOTAL, "outcome" => "compiled").increment(1);
                    return CompileOutcome::Compiled(program);
                }
                Err(err) => {
                    tracing::warn!(
                        principal = %principal,
                        attempt,
                        attempts = self.retry.attempts,
                        backend = self.repository.backend_name(),
                        error = %err,
                        "policy compile attempt failed"
                    );
                    last_error = Some(err);
                    if attempt < self.retry.attempts {
                        tokio::time::sleep(self.retry.delay).await;
                    }
                }
            }
        }
        metrics::counter!(POLICY_COMPILES_TOTAL, "outcome" => "exhausted").increment(1);
        CompileOutcome::Exhausted {
            attempts: self.retry.attempts,
            last_error: last_error
                .unwrap_or_else(|| StoreError::Unavailable("no compile attempt made".to_string())),
        }
    }

    /// One compile attempt without retries.
    pub async fn compile_once(
        &self,
        principal: &PrincipalId,
        mfa_enabled: bool,
    ) -> StoreResult<PolicyProgram> {
        let user_id = principal.as_str();
        let assigned = self.repository.user_roles(user_id).await?;
        let roles = if mfa_enabled {
            assigned
        } else {
            let open = self.repository.roles_without_mfa().await?;
            assigned
                .into_iter()
                .filter(|role| open.contains(role))
                .collect()
        };

        let mut builder = ProgramBuilder::new(principal.clone());
        for role in &roles {
            builder.role(role);
        }
        if roles.is_empty() {
            for constraint in self.repository.constraints_for(user_id, None).await? {
                builder.constraint(constraint);
            }
        }
        for role in &roles {
            for constraint in self.repository.constraints_for(user_id, Some(role)).await? {
                builder.constraint(constraint);
            }
        }

        let program = builder.build();
        tracing::debug!(
            principal = %principal,
            mfa_enabled,
            roles = roles.len(),
            rules = program.rules().len(),
            "compiled policy"
        );
        Ok(program)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;
    use std::sync::Arc;
    use vams_authz::{Constraint, Criterion, GroupPermission, Operator, Role, UserPermission};

    async fn seeded() -> InMemoryStore {
        let store = InMemoryStore::new();
        store.put_role(Role::new("viewer")).await;
        store.put_role(Role::new("admin").requiring_mfa()).await;
        store.assign_role("alice", "viewer").await;
        store.assign_role("alice", "admin").await;
        store
            .put_constraint(
                Constraint::new("read", "asset")
                    .with_and(Criterion::new("databaseId", Operator::Equals, "db1"))
                    .with_group_permission(GroupPermission::allow("viewer", "GET")),
            )
            .await;
        store
            .put_constraint(
                Constraint::new("delete", "asset")
                    .with_and(Criterion::new("databaseId", Operator::Contains, ".*"))
                    .with_group_permission(GroupPermission::allow("admin", "DELETE")),
            )
            .await;
        store
    }

    fn compiler(store: InMemoryStore) -> PolicyCompiler {
        PolicyCompiler::new(
            RepositoryAdapter::new(Arc::new(store), 100),
            RetryPolicy::new(3, Duration::from_millis(10)),
        )
    }

    fn compiled(outcome: CompileOutcome) -> PolicyProgram {
        match outcome {
            CompileOutcome::Compiled(program) => program,
            CompileOutcome::Exhausted { last_error, .. } => panic!("exhausted: {last_error}"),
        }
    }

    #[test]
    fn retry_policy_makes_at_least_one_attempt() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).attempts(), 1);
    }

    #[tokio::test]
    async fn mfa_session_gets_every_role() {
        let program =
            compiled(compiler(seeded().await).compile(&PrincipalId::new("alice"), true).await);
        let roles: Vec<_> = program
            .role_assignments()
            .iter()
            .map(|a| a.role.as_str())
            .collect();
        assert_eq!(roles, vec!["role::admin", "role::viewer"]);
        assert!(program.text().contains("DELETE"));
    }

    #[tokio::test]
    async fn non_mfa_session_drops_mfa_roles() {
        let program =
            compiled(compiler(seeded().await).compile(&PrincipalId::new("alice"), false).await);
        let roles: Vec<_> = program
            .role_assignments()
            .iter()
            .map(|a| a.role.as_str())
            .collect();
        assert_eq!(roles, vec!["role::viewer"]);
        assert!(!program.text().contains("DELETE"));
    }

    #[tokio::test]
    async fn roleless_principal_keeps_direct_constraints() {
        let store = InMemoryStore::new();
        store
            .put_constraint(
                Constraint::new("direct", "asset")
                    .with_and(Criterion::new("databaseId", Operator::Equals, "db1"))
                    .with_user_permission(UserPermission::allow("carol", "GET")),
            )
            .await;
        let program = compiled(compiler(store).compile(&PrincipalId::new("carol"), false).await);
        assert!(program.role_assignments().is_empty());
        assert_eq!(program.rules().len(), 1);
        assert_eq!(program.rules()[0].subject, "user::carol");
    }
}
