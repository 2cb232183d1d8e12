//! Backing database sessions.
//!
//! A session is one pooled connection with at most one open transaction at a
//! time. The transaction begins lazily on the first statement. Rows come back
//! as JSON objects so repositories can decode them with serde.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgArguments, PgConnection};
use sqlx::{Executor, PgPool, Postgres, Row};
use tracing::{debug, warn};

use crate::database::manager::DatabaseError;
use crate::filter::SqlResult;

#[async_trait]
pub trait DbSession: Send {
    /// Run a statement, returning the number of affected rows
    async fn execute(&mut self, sql: &SqlResult) -> Result<u64, DatabaseError>;

    /// Run a query, returning each row as a JSON object
    async fn fetch_all(&mut self, sql: &SqlResult) -> Result<Vec<Value>, DatabaseError>;

    async fn commit(&mut self) -> Result<(), DatabaseError>;

    async fn rollback(&mut self) -> Result<(), DatabaseError>;

    /// Release the session. Rolls back anything uncommitted.
    async fn close(&mut self) -> Result<(), DatabaseError>;

    fn is_read_only(&self) -> bool;

    async fn fetch_optional(&mut self, sql: &SqlResult) -> Result<Option<Value>, DatabaseError> {
        Ok(self.fetch_all(sql).await?.into_iter().next())
    }
}

/// Opens backing sessions for a unit of work
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> Result<Box<dyn DbSession>, DatabaseError>;

    /// Sessions from this factory only allow reads
    fn is_read_only(&self) -> bool;
}

pub struct PgSessionFactory {
    pool: PgPool,
    read_only: bool,
}

impl PgSessionFactory {
    pub fn new(pool: PgPool, read_only: bool) -> Self {
        Self { pool, read_only }
    }
}

#[async_trait]
impl SessionFactory for PgSessionFactory {
    async fn open(&self) -> Result<Box<dyn DbSession>, DatabaseError> {
        let session = PgSession::acquire(&self.pool, self.read_only).await?;
        Ok(Box::new(session))
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }
}

pub struct PgSession {
    conn: Option<PoolConnection<Postgres>>,
    read_only: bool,
    in_transaction: bool,
}

impl PgSession {
    pub async fn acquire(pool: &PgPool, read_only: bool) -> Result<Self, DatabaseError> {
        let conn = pool.acquire().await?;
        debug!("Acquired session connection (read_only={})", read_only);
        Ok(Self { conn: Some(conn), read_only, in_transaction: false })
    }

    fn conn(&mut self) -> Result<&mut PgConnection, DatabaseError> {
        self.conn.as_deref_mut().ok_or(DatabaseError::SessionClosed)
    }

    async fn ensure_transaction(&mut self) -> Result<(), DatabaseError> {
        if self.in_transaction {
            return Ok(());
        }
        let begin = if self.read_only { "BEGIN READ ONLY" } else { "BEGIN" };
        self.conn()?.execute(begin).await?;
        self.in_transaction = true;
        Ok(())
    }

    async fn finish(&mut self, statement: &'static str) -> Result<(), DatabaseError> {
        if !self.in_transaction {
            return Ok(());
        }
        // The transaction is over even if the statement fails
        self.in_transaction = false;
        self.conn()?.execute(statement).await?;
        Ok(())
    }
}

#[async_trait]
impl DbSession for PgSession {
    async fn execute(&mut self, sql: &SqlResult) -> Result<u64, DatabaseError> {
        self.ensure_transaction().await?;
        let mut q = sqlx::query(&sql.query);
        for p in sql.params.iter() {
            q = bind_param(q, p);
        }
        let result = q.execute(self.conn()?).await?;
        Ok(result.rows_affected())
    }

    async fn fetch_all(&mut self, sql: &SqlResult) -> Result<Vec<Value>, DatabaseError> {
        self.ensure_transaction().await?;
        let wrapped = format!("WITH q AS ({}) SELECT to_jsonb(q) AS row FROM q", sql.query);
        let mut q = sqlx::query(&wrapped);
        for p in sql.params.iter() {
            q = bind_param(q, p);
        }
        let rows = q.fetch_all(self.conn()?).await?;
        rows.iter()
            .map(|row| row.try_get::<Value, _>("row").map_err(DatabaseError::from))
            .collect()
    }

    async fn commit(&mut self) -> Result<(), DatabaseError> {
        self.finish("COMMIT").await
    }

    async fn rollback(&mut self) -> Result<(), DatabaseError> {
        self.finish("ROLLBACK").await
    }

    async fn close(&mut self) -> Result<(), DatabaseError> {
        let Some(mut conn) = self.conn.take() else {
            return Ok(());
        };
        let in_transaction = std::mem::replace(&mut self.in_transaction, false);
        match reset_connection(&mut conn, in_transaction).await {
            Ok(()) => Ok(()),
            Err(e) => {
                // Never hand a connection with a tenant role back to the pool
                warn!("Failed to reset session connection, discarding it: {}", e);
                drop(conn.detach());
                Err(e.into())
            }
        }
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }
}

impl Drop for PgSession {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            debug!("Session dropped without close, discarding connection");
            drop(conn.detach());
        }
    }
}

async fn reset_connection(conn: &mut PgConnection, in_transaction: bool) -> Result<(), sqlx::Error> {
    if in_transaction {
        conn.execute("ROLLBACK").await?;
    }
    conn.execute("RESET ROLE").await?;
    conn.execute("RESET ALL").await?;
    Ok(())
}

fn bind_param<'q>(
    q: sqlx::query::Query<'q, Postgres, PgArguments>,
    v: &'q Value,
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    match v {
        Value::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(u) = n.as_u64() {
                // Postgres doesn't have u64; cast down if safe
                q.bind(u as i64)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => q.bind(s),
        Value::Array(items) => bind_array(q, items),
        Value::Object(_) => q.bind(v.clone()), // JSONB
    }
}

/// Homogeneous arrays bind as Postgres arrays; anything else as JSONB
fn bind_array<'q>(
    q: sqlx::query::Query<'q, Postgres, PgArguments>,
    items: &'q [Value],
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    if let Some(strings) = items.iter().map(|v| v.as_str().map(str::to_string)).collect::<Option<Vec<_>>>() {
        return q.bind(strings);
    }
    if let Some(ints) = items.iter().map(Value::as_i64).collect::<Option<Vec<_>>>() {
        return q.bind(ints);
    }
    if let Some(floats) = items.iter().map(Value::as_f64).collect::<Option<Vec<_>>>() {
        return q.bind(floats);
    }
    if let Some(bools) = items.iter().map(Value::as_bool).collect::<Option<Vec<_>>>() {
        return q.bind(bools);
    }
    q.bind(Value::Array(items.to_vec()))
}
