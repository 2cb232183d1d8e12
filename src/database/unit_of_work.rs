//! Reentrant unit of work.
//!
//! A [`UnitOfWork`] owns at most one backing session. Scopes nest: every
//! [`enter`](UnitOfWork::enter) increments a depth counter and every
//! [`exit`](UnitOfWork::exit) decrements it. The session is opened on the
//! first entry and committed or rolled back, then closed, when the depth
//! returns to zero. Repositories are only reachable while a scope is open,
//! and all of them share the one session.

use std::sync::Arc;

use futures::future::BoxFuture;
use thiserror::Error;
use tracing::{debug, warn};

use crate::database::hooks::SessionHooks;
use crate::database::manager::DatabaseError;
use crate::database::models::Entity;
use crate::database::repository::{BoundRepository, Repositories};
use crate::database::session::{DbSession, SessionFactory};
use crate::types::{EntityKind, TenantId};

#[derive(Debug, Error)]
pub enum UnitOfWorkError {
    #[error("No repository found for {0}")]
    RepositoryNotFound(EntityKind),

    #[error("Cannot switch tenant from {current} to {requested} inside a tenant context")]
    InvalidTenantSwitch { current: TenantId, requested: TenantId },

    #[error("Invalid tenant id: {0}")]
    InvalidTenantId(TenantId),

    #[error("Unit of work is not in a context")]
    NotInContext,

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Tenant isolation state applied to the backing session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TenantContext {
    pub tenant_id: Option<TenantId>,
    pub read_only: bool,
    pub query_user: bool,
}

/// Requested tenant switch. `None` flags keep the current value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantScope {
    pub tenant_id: TenantId,
    pub read_only: Option<bool>,
    pub query_user: Option<bool>,
}

impl TenantScope {
    pub fn new(tenant_id: TenantId) -> Self {
        Self { tenant_id, read_only: None, query_user: None }
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = Some(read_only);
        self
    }

    pub fn query_user(mut self, query_user: bool) -> Self {
        self.query_user = Some(query_user);
        self
    }
}

/// How a scope body finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeExit {
    Success,
    Failure,
}

pub struct UnitOfWork {
    factory: Arc<dyn SessionFactory>,
    hooks: Arc<dyn SessionHooks>,
    session: Option<Box<dyn DbSession>>,
    context_depth: u32,
    tenant: TenantContext,
    repositories: Option<Repositories>,
    autocommit: bool,
    autocommit_ignore_nested: bool,
}

impl UnitOfWork {
    pub fn new(factory: Arc<dyn SessionFactory>, hooks: Arc<dyn SessionHooks>) -> Self {
        Self {
            factory,
            hooks,
            session: None,
            context_depth: 0,
            tenant: TenantContext::default(),
            repositories: None,
            autocommit: false,
            autocommit_ignore_nested: true,
        }
    }

    pub fn autocommit(mut self, autocommit: bool) -> Self {
        self.autocommit = autocommit;
        self
    }

    pub fn autocommit_ignore_nested(mut self, ignore_nested: bool) -> Self {
        self.autocommit_ignore_nested = ignore_nested;
        self
    }

    pub fn with_context(mut self, tenant: TenantContext) -> Self {
        self.tenant = tenant;
        self
    }

    pub fn tenant(&self) -> TenantContext {
        self.tenant
    }

    pub fn context_depth(&self) -> u32 {
        self.context_depth
    }

    pub fn is_in_context(&self) -> bool {
        self.context_depth > 0
    }

    pub fn is_root_context(&self) -> bool {
        self.context_depth == 1
    }

    /// Active backing session, for statements outside any repository
    pub fn session_mut(&mut self) -> Option<&mut (dyn DbSession + 'static)> {
        self.session.as_deref_mut()
    }

    pub fn repositories(&self) -> Option<&Repositories> {
        self.repositories.as_ref()
    }

    pub async fn enter(&mut self) -> Result<(), UnitOfWorkError> {
        self.context_depth += 1;

        if self.session.is_none() {
            if let Err(e) = self.begin_new_session().await {
                self.context_depth -= 1;
                return Err(e);
            }
        }

        if self.context_depth == 1 {
            self.repositories = Some(Repositories::new());
        }
        debug!("Entered unit of work (depth={})", self.context_depth);
        Ok(())
    }

    async fn begin_new_session(&mut self) -> Result<(), UnitOfWorkError> {
        let mut session = self.factory.open().await?;
        if let Err(e) = self.hooks.post_begin(session.as_mut(), &self.tenant).await {
            if let Err(close_err) = session.close().await {
                warn!("Failed to close session after post-begin failure: {}", close_err);
            }
            return Err(e.into());
        }
        self.session = Some(session);
        Ok(())
    }

    pub async fn exit(&mut self, outcome: ScopeExit) -> Result<(), UnitOfWorkError> {
        if self.context_depth == 0 {
            return Err(UnitOfWorkError::NotInContext);
        }
        self.context_depth -= 1;
        debug!("Exiting unit of work (depth={}, outcome={:?})", self.context_depth, outcome);

        if self.context_depth > 0 {
            // Committing while still nested ends the outer scope's transaction early
            if outcome == ScopeExit::Success && self.autocommit && !self.autocommit_ignore_nested {
                self.commit().await?;
            }
            return Ok(());
        }

        let result = match outcome {
            ScopeExit::Failure => self.rollback().await,
            ScopeExit::Success if self.autocommit => self.commit().await,
            ScopeExit::Success => Ok(()),
        };

        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.close().await {
                warn!("Failed to close session: {}", e);
            }
        }
        self.repositories = None;
        result
    }

    /// Run the pre-commit hook (outermost scope only), then commit
    pub async fn commit(&mut self) -> Result<(), UnitOfWorkError> {
        self.run_pre_commit().await;
        if let Some(session) = self.session.as_mut() {
            session.commit().await?;
        }
        Ok(())
    }

    pub async fn rollback(&mut self) -> Result<(), UnitOfWorkError> {
        if let Some(session) = self.session.as_mut() {
            session.rollback().await?;
        }
        Ok(())
    }

    async fn run_pre_commit(&mut self) {
        if self.context_depth > 1 {
            return;
        }
        if let Some(session) = self.session.as_mut() {
            self.hooks.pre_commit(session.as_mut()).await;
        }
    }

    /// Run `body` inside a scope. The scope is exited on every return path:
    /// success commits (per autocommit), failure rolls back.
    pub async fn scope<T, E, F>(&mut self, body: F) -> Result<T, E>
    where
        F: for<'a> FnOnce(&'a mut UnitOfWork) -> BoxFuture<'a, Result<T, E>>,
        E: From<UnitOfWorkError>,
    {
        self.enter().await?;
        let result = body(self).await;
        let outcome = if result.is_ok() { ScopeExit::Success } else { ScopeExit::Failure };
        let exited = self.exit(outcome).await;
        finish(result, exited)
    }

    /// Bind the unit of work to a tenant for the duration of `body`.
    ///
    /// A tenant, once bound, is sticky: switching to a different one fails
    /// with `InvalidTenantSwitch`. The previous `(tenant_id, read_only,
    /// query_user)` triple is restored when the body returns.
    pub async fn with_tenant<T, E, F>(&mut self, scope: TenantScope, body: F) -> Result<T, E>
    where
        F: for<'a> FnOnce(&'a mut UnitOfWork) -> BoxFuture<'a, Result<T, E>>,
        E: From<UnitOfWorkError>,
    {
        let saved = self.begin_tenant(scope).await?;
        let result = body(self).await;
        let outcome = if result.is_ok() {
            self.run_pre_commit().await;
            ScopeExit::Success
        } else {
            ScopeExit::Failure
        };
        let exited = self.end_tenant(saved, outcome).await;
        finish(result, exited)
    }

    /// Enter a tenant scope, returning the context to restore with
    /// [`end_tenant`](Self::end_tenant).
    pub async fn begin_tenant(&mut self, scope: TenantScope) -> Result<TenantContext, UnitOfWorkError> {
        if let Some(current) = self.tenant.tenant_id {
            if current != scope.tenant_id {
                return Err(UnitOfWorkError::InvalidTenantSwitch { current, requested: scope.tenant_id });
            }
        }

        let saved = self.tenant;
        let requested = TenantContext {
            tenant_id: Some(scope.tenant_id),
            read_only: scope.read_only.unwrap_or(saved.read_only),
            query_user: scope.query_user.unwrap_or(saved.query_user),
        };
        self.hooks.validate(&requested)?;

        self.enter().await?;
        self.tenant = requested;
        if let Err(e) = self.apply_tenant().await {
            self.tenant = saved;
            if let Err(exit_err) = self.exit(ScopeExit::Failure).await {
                warn!("Failed to exit unit of work after tenant switch failure: {}", exit_err);
            }
            return Err(e);
        }
        debug!("Switched unit of work to tenant {}", scope.tenant_id);
        Ok(saved)
    }

    pub async fn end_tenant(&mut self, saved: TenantContext, outcome: ScopeExit) -> Result<(), UnitOfWorkError> {
        self.tenant = saved;
        self.exit(outcome).await
    }

    async fn apply_tenant(&mut self) -> Result<(), UnitOfWorkError> {
        let session = self.session.as_mut().ok_or(UnitOfWorkError::NotInContext)?;
        self.hooks.post_begin(session.as_mut(), &self.tenant).await?;
        Ok(())
    }

    /// Repository for `E` bound to the active session
    pub fn repository<E: Entity>(&mut self) -> Result<BoundRepository<'_, E>, UnitOfWorkError> {
        let repositories = self
            .repositories
            .as_ref()
            .ok_or(UnitOfWorkError::RepositoryNotFound(E::KIND))?;
        let session = self.session.as_deref_mut().ok_or(UnitOfWorkError::NotInContext)?;
        Ok(BoundRepository::new(E::repository(repositories), session))
    }
}

/// Body errors win over exit errors; the latter are only logged then
fn finish<T, E>(result: Result<T, E>, exited: Result<(), UnitOfWorkError>) -> Result<T, E>
where
    E: From<UnitOfWorkError>,
{
    match (result, exited) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e.into()),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(exit_err)) => {
            warn!("Unit of work exit failed after body error: {}", exit_err);
            Err(e)
        }
    }
}
