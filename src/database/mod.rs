pub mod factory;
pub mod hooks;
pub mod manager;
pub mod models;
pub mod query_builder;
pub mod repository;
pub mod session;
pub mod unit_of_work;

pub use factory::{UnitOfWorkFactory, UowOptions};
pub use hooks::{NoopHooks, SessionHooks, TenantIsolationHooks};
pub use manager::{DatabaseError, DatabaseManager};
pub use query_builder::ListQuery;
pub use repository::{BoundRepository, Repositories, Repository};
pub use session::{DbSession, PgSession, PgSessionFactory, SessionFactory};
pub use unit_of_work::{ScopeExit, TenantContext, TenantScope, UnitOfWork, UnitOfWorkError};
