use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::info;

use crate::config::{AppConfig, ConfigError, UnitOfWorkConfig};
use crate::database::hooks::{NoopHooks, SessionHooks, TenantIsolationHooks};
use crate::database::manager::DatabaseManager;
use crate::database::session::{PgSessionFactory, SessionFactory};
use crate::database::unit_of_work::{TenantContext, UnitOfWork, UnitOfWorkError};
use crate::types::TenantId;

/// Per-request unit-of-work options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UowOptions {
    pub tenant_id: Option<TenantId>,
    pub read_only: bool,
    pub query_user: bool,
}

impl UowOptions {
    pub fn tenant(tenant_id: TenantId) -> Self {
        Self { tenant_id: Some(tenant_id), ..Default::default() }
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn query_user(mut self, query_user: bool) -> Self {
        self.query_user = query_user;
        self
    }
}

/// Hands out configured units of work over the read-write or read-only pool
#[derive(Clone)]
pub struct UnitOfWorkFactory {
    sessions: Arc<dyn SessionFactory>,
    ro_sessions: Arc<dyn SessionFactory>,
    hooks: Arc<dyn SessionHooks>,
    config: UnitOfWorkConfig,
}

impl UnitOfWorkFactory {
    pub fn new(
        sessions: Arc<dyn SessionFactory>,
        ro_sessions: Arc<dyn SessionFactory>,
        hooks: Arc<dyn SessionHooks>,
        config: UnitOfWorkConfig,
    ) -> Self {
        Self { sessions, ro_sessions, hooks, config }
    }

    pub fn from_manager(manager: &DatabaseManager, config: &AppConfig) -> Result<Self, ConfigError> {
        let tenant = &config.database.tenant;
        let hooks: Arc<dyn SessionHooks> = if tenant.enabled {
            tenant.validate()?;
            Arc::new(TenantIsolationHooks::new(tenant.clone()))
        } else {
            Arc::new(NoopHooks)
        };
        info!(
            "Unit of work factory ready (tenant_isolation={}, read_only_pool={})",
            tenant.enabled,
            manager.has_read_only_pool()
        );

        Ok(Self::new(
            Arc::new(PgSessionFactory::new(manager.pool().clone(), config.database.force_read_only)),
            Arc::new(PgSessionFactory::new(manager.read_only_pool().clone(), true)),
            hooks,
            config.unit_of_work.clone(),
        ))
    }

    pub fn get_uow(&self, options: UowOptions) -> UnitOfWork {
        let sessions = if options.read_only { &self.ro_sessions } else { &self.sessions };
        // A read-only store always runs with the read-only role
        let read_only = options.read_only || sessions.is_read_only();
        UnitOfWork::new(sessions.clone(), self.hooks.clone())
            .autocommit(self.config.autocommit)
            .autocommit_ignore_nested(self.config.autocommit_ignore_nested)
            .with_context(TenantContext {
                tenant_id: options.tenant_id,
                read_only,
                query_user: options.query_user,
            })
    }

    /// Run `body` in the scope of a fresh unit of work
    pub async fn with_uow<T, E, F>(&self, options: UowOptions, body: F) -> Result<T, E>
    where
        F: for<'a> FnOnce(&'a mut UnitOfWork) -> BoxFuture<'a, Result<T, E>>,
        E: From<UnitOfWorkError>,
    {
        let mut uow = self.get_uow(options);
        uow.scope(body).await
    }
}
