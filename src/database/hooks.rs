use async_trait::async_trait;
use tracing::debug;

use crate::config::TenantRoleConfig;
use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::database::session::DbSession;
use crate::database::unit_of_work::{TenantContext, UnitOfWorkError};
use crate::filter::SqlResult;

/// Session lifecycle callbacks injected into a unit of work
#[async_trait]
pub trait SessionHooks: Send + Sync {
    /// Runs after a backing session is opened and after every tenant switch
    async fn post_begin(&self, session: &mut dyn DbSession, tenant: &TenantContext) -> Result<(), DatabaseError>;

    /// Runs before the outermost commit. Failures are not reported.
    async fn pre_commit(&self, session: &mut dyn DbSession);

    /// Checked before a tenant switch applies its context
    fn validate(&self, _tenant: &TenantContext) -> Result<(), UnitOfWorkError> {
        Ok(())
    }
}

pub struct NoopHooks;

#[async_trait]
impl SessionHooks for NoopHooks {
    async fn post_begin(&self, _session: &mut dyn DbSession, _tenant: &TenantContext) -> Result<(), DatabaseError> {
        Ok(())
    }

    async fn pre_commit(&self, _session: &mut dyn DbSession) {}
}

/// Row-level tenant isolation: switch to a tenant role and publish the
/// tenant id as a session parameter the store's policies read.
pub struct TenantIsolationHooks {
    config: TenantRoleConfig,
}

impl TenantIsolationHooks {
    pub fn new(config: TenantRoleConfig) -> Self {
        Self { config }
    }

    /// Role precedence: query user, then read-only, then read-write
    pub fn role_for(&self, tenant: &TenantContext) -> &str {
        if tenant.query_user {
            &self.config.query_role_ro
        } else if tenant.read_only {
            &self.config.role_ro
        } else {
            &self.config.role
        }
    }

    /// Statements issued after a session begins, in order
    pub fn post_begin_statements(&self, tenant: &TenantContext) -> Vec<SqlResult> {
        let Some(tenant_id) = tenant.tenant_id.filter(|_| self.config.enabled) else {
            return vec![];
        };
        vec![
            SqlResult::new(format!(
                "SET SESSION ROLE {}",
                DatabaseManager::quote_identifier(self.role_for(tenant))
            )),
            SqlResult::new(format!("SET {} = {}", self.config.parameter, tenant_id)),
        ]
    }
}

#[async_trait]
impl SessionHooks for TenantIsolationHooks {
    async fn post_begin(&self, session: &mut dyn DbSession, tenant: &TenantContext) -> Result<(), DatabaseError> {
        for statement in self.post_begin_statements(tenant) {
            debug!("Tenant session hook: {}", statement.query);
            session.execute(&statement).await?;
        }
        Ok(())
    }

    async fn pre_commit(&self, session: &mut dyn DbSession) {
        if !self.config.enabled {
            return;
        }
        if let Err(e) = session.execute(&SqlResult::new("RESET ROLE")).await {
            debug!("Ignoring role reset failure before commit: {}", e);
        }
    }

    fn validate(&self, tenant: &TenantContext) -> Result<(), UnitOfWorkError> {
        match tenant.tenant_id {
            Some(id) if self.config.enabled && id <= 0 => Err(UnitOfWorkError::InvalidTenantId(id)),
            _ => Ok(()),
        }
    }
}
