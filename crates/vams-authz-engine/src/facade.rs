//! Authorization entry point for request handlers.
//!
//! # Purpose
//! [`AuthorizationFacade`] answers object-level checks (`enforce`) and
//! API-route checks (`enforce_api`) for a principal. It resolves the cached
//! enforcer for the principal's MFA tier, recompiling when the entry is
//! missing or stale.
//!
//! # Key invariants
//! - Every failure folds into `false`; no error reaches the caller.
//! - Exhausted compile retries drop the cache entry, so the next call
//!   recompiles. The current call is answered by an uncached deny-all program.
//! - When no enforcer can be built for a compiled program, the same path
//!   applies: the entry is dropped and an uncached deny-all enforcer answers.
//!   If even that cannot be built, the call is denied without consulting
//!   casbin.
//! - A field missing after widening is backfilled with empty text and the
//!   decision retried once.
//!
//! # Examples
//! ```rust,no_run
//! use std::sync::Arc;
//! use vams_authz::ResourceObject;
//! use vams_authz_engine::{
//!     AuthorizationFacade, AuthzConfig, Claims, InMemoryStore, PolicyCache,
//! };
//!
//! # async fn check() -> bool {
//! let config = AuthzConfig::default();
//! let cache = Arc::new(PolicyCache::new(config.refresh_interval));
//! let facade = AuthorizationFacade::new(Arc::new(InMemoryStore::new()), cache, &config);
//! let claims = Claims::for_user("alice");
//! let asset = ResourceObject::new("asset").with("databaseId", "db1");
//! facade.for_claims(&claims).enforce(&asset, "GET").await
//! # }
//! ```
use crate::cache::{CacheKey, Lookup, PolicyCache};
use crate::claims::Claims;
use crate::config::AuthzConfig;
use crate::observability::{DECISIONS_TOTAL, FALLBACKS_TOTAL, MISSING_FIELD_TOTAL};
use crate::policy::{
    CasbinEnforcerBuilder, CompileOutcome, EnforcerBuilder, EnforcerInstance, PolicyCompiler,
    PolicyProgram, RepositoryAdapter,
};
use crate::store::AuthzStore;
use serde_json::Value;
use std::sync::Arc;
use vams_authz::{AuthzError, FieldDefaults, ResourceObject};

#[derive(Clone)]
pub struct AuthorizationFacade {
    compiler: PolicyCompiler,
    cache: Arc<PolicyCache>,
    builder: Arc<dyn EnforcerBuilder>,
    defaults: FieldDefaults,
}

fn fallback(reason: &'static str) {
    metrics::counter!(FALLBACKS_TOTAL, "reason" => reason).increment(1);
}

fn record(allowed: bool) -> bool {
    let decision = if allowed { "allow" } else { "deny" };
    metrics::counter!(DECISIONS_TOTAL, "decision" => decision).increment(1);
    allowed
}

impl AuthorizationFacade {
    pub fn new(store: Arc<dyn AuthzStore>, cache: Arc<PolicyCache>, config: &AuthzConfig) -> Self {
        let repository = RepositoryAdapter::new(store, config.page_size);
        Self::from_compiler(PolicyCompiler::new(repository, config.retry_policy()), cache)
    }

    pub fn from_compiler(compiler: PolicyCompiler, cache: Arc<PolicyCache>) -> Self {
        Self {
            compiler,
            cache,
            builder: Arc::new(CasbinEnforcerBuilder),
            defaults: FieldDefaults::standard(),
        }
    }

    pub fn with_enforcer_builder(mut self, builder: Arc<dyn EnforcerBuilder>) -> Self {
        self.builder = builder;
        self
    }

    pub fn with_field_defaults(mut self, defaults: FieldDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn cache(&self) -> &Arc<PolicyCache> {
        &self.cache
    }

    pub fn for_claims<'a>(&'a self, claims: &'a Claims) -> PrincipalEnforcer<'a> {
        PrincipalEnforcer {
            facade: self,
            claims,
        }
    }

    /// Object-level check: may the claims' principal perform `action` on
    /// `resource`?
    pub async fn enforce(&self, claims: &Claims, resource: &ResourceObject, action: &str) -> bool {
        let Some(principal) = claims.principal() else {
            tracing::debug!(action, "no principal in claims");
            fallback("no_principal");
            return record(false);
        };
        let key = CacheKey::new(principal, claims.mfa_enabled);
        let Some(enforcer) = self.resolve(&key).await else {
            return record(false);
        };
        record(self.decide(&enforcer, resource, action))
    }

    /// Route-level check for an HTTP event.
    ///
    /// The action is `method_override` when non-empty, else the event's own
    /// method. Events without `requestContext.http` are denied.
    pub async fn enforce_api(&self, claims: &Claims, event: &Value, method_override: &str) -> bool {
        let Some(http) = event.pointer("/requestContext/http") else {
            tracing::debug!("request is not an HTTP event");
            fallback("unrecognized_request");
            return record(false);
        };
        let path = http.get("path").and_then(Value::as_str);
        let method = http.get("method").and_then(Value::as_str);
        let (Some(path), Some(method)) = (path, method) else {
            tracing::warn!("HTTP event lacks method or path");
            fallback("unrecognized_request");
            return record(false);
        };
        let action = if method_override.is_empty() {
            method
        } else {
            method_override
        };
        let resource = ResourceObject::api_route(path);
        self.enforce(claims, &resource, action).await
    }

    async fn resolve(&self, key: &CacheKey) -> Option<Arc<EnforcerInstance>> {
        match self.cache.lookup(key) {
            Lookup::Fresh(enforcer) => Some(enforcer),
            Lookup::Stale | Lookup::Missing => self.refresh(key).await,
        }
    }

    async fn refresh(&self, key: &CacheKey) -> Option<Arc<EnforcerInstance>> {
        match self.compiler.compile(&key.principal, key.mfa_enabled).await {
            CompileOutcome::Compiled(program) => self.install(key, Arc::new(program)).await,
            CompileOutcome::Exhausted {
                attempts,
                last_error,
            } => {
                tracing::error!(
                    principal = %key.principal,
                    attempts,
                    error = %last_error,
                    "policy compile retries exhausted; denying"
                );
                fallback("compile_exhausted");
                self.deny_uncached(key).await
            }
        }
    }

    async fn install(
        &self,
        key: &CacheKey,
        program: Arc<PolicyProgram>,
    ) -> Option<Arc<EnforcerInstance>> {
        match self.builder.build(program).await {
            Ok(enforcer) => {
                let enforcer = Arc::new(enforcer);
                self.cache.store_ready(key.clone(), enforcer.clone());
                tracing::debug!(
                    principal = %key.principal,
                    mfa = key.mfa_enabled,
                    "policy refreshed"
                );
                Some(enforcer)
            }
            Err(err) => {
                tracing::error!(principal = %key.principal, error = %err, "enforcer build failed");
                fallback("enforcer_build");
                self.deny_uncached(key).await
            }
        }
    }

    /// Drop the entry for `key` and answer from a deny-all enforcer that is
    /// never cached. `None` when even that cannot be built.
    async fn deny_uncached(&self, key: &CacheKey) -> Option<Arc<EnforcerInstance>> {
        let deny = Arc::new(self.cache.fail_closed(key));
        match self.builder.build(deny).await {
            Ok(enforcer) => Some(Arc::new(enforcer)),
            Err(err) => {
                tracing::error!(
                    principal = %key.principal,
                    error = %err,
                    "deny-all enforcer build failed; enforcer unusable"
                );
                fallback("unusable");
                None
            }
        }
    }

    fn decide(&self, enforcer: &EnforcerInstance, resource: &ResourceObject, action: &str) -> bool {
        let mut widened = resource.widen(&self.defaults);
        match enforcer.decide(&widened, action) {
            Ok(allowed) => allowed,
            Err(AuthzError::MissingField(field)) => {
                tracing::warn!(
                    field = %field,
                    object_type = widened.object_type().unwrap_or(""),
                    "policy references a field absent after widening; retrying with empty value"
                );
                metrics::counter!(MISSING_FIELD_TOTAL).increment(1);
                widened.backfill(&field);
                match enforcer.decide(&widened, action) {
                    Ok(allowed) => allowed,
                    Err(err) => {
                        tracing::warn!(error = %err, "decision failed after backfill");
                        fallback("evaluation_error");
                        false
                    }
                }
            }
            Err(err) => {
                tracing::error!(error = %err, "decision failed");
                fallback("evaluation_error");
                false
            }
        }
    }
}

/// Facade bound to one set of claims.
#[derive(Clone, Copy)]
pub struct PrincipalEnforcer<'a> {
    facade: &'a AuthorizationFacade,
    claims: &'a Claims,
}

impl PrincipalEnforcer<'_> {
    pub async fn enforce(&self, resource: &ResourceObject, action: &str) -> bool {
        self.facade.enforce(self.claims, resource, action).await
    }

    pub async fn enforce_api(&self, event: &Value, method_override: &str) -> bool {
        self.facade
            .enforce_api(self.claims, event, method_override)
            .await
    }
}
