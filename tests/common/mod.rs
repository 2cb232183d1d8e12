#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use fury_api::config::{TenantRoleConfig, UnitOfWorkConfig};
use fury_api::database::{
    DatabaseError, DbSession, NoopHooks, SessionFactory, SessionHooks, TenantIsolationHooks, UnitOfWork,
    UnitOfWorkFactory, UowOptions,
};
use fury_api::filter::SqlResult;

/// Everything a recording session was asked to do, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Open { read_only: bool },
    Execute(String),
    Fetch(String),
    Commit,
    Rollback,
    Close,
}

/// Shared log and failure switches behind every recording session
#[derive(Default)]
pub struct Recorder {
    events: Mutex<Vec<Event>>,
    params: Mutex<Vec<Vec<Value>>>,
    rows: Mutex<VecDeque<Vec<Value>>>,
    fail_open: AtomicBool,
    fail_commit: AtomicBool,
    fail_statement: Mutex<Option<String>>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn record(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.events().iter().filter(|e| pred(e)).count()
    }

    /// SQL text of every executed or fetched statement
    pub fn statements(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Execute(sql) | Event::Fetch(sql) => Some(sql),
                _ => None,
            })
            .collect()
    }

    /// Bound parameters of every statement, in statement order
    pub fn params(&self) -> Vec<Vec<Value>> {
        self.params.lock().unwrap().clone()
    }

    /// Queue the rows returned by the next fetch
    pub fn push_rows(&self, rows: Vec<Value>) {
        self.rows.lock().unwrap().push_back(rows);
    }

    pub fn fail_open(&self) {
        self.fail_open.store(true, Ordering::SeqCst);
    }

    pub fn fail_commit(&self) {
        self.fail_commit.store(true, Ordering::SeqCst);
    }

    /// Fail any statement whose SQL contains `needle`
    pub fn fail_statement(&self, needle: &str) {
        *self.fail_statement.lock().unwrap() = Some(needle.to_string());
    }

    fn check_statement(&self, sql: &str) -> Result<(), DatabaseError> {
        match self.fail_statement.lock().unwrap().as_deref() {
            Some(needle) if sql.contains(needle) => Err(DatabaseError::QueryError(format!("injected failure: {}", sql))),
            _ => Ok(()),
        }
    }

    pub fn factory(self: &Arc<Self>, read_only: bool) -> Arc<RecordingFactory> {
        Arc::new(RecordingFactory { recorder: self.clone(), read_only })
    }

    /// Unit of work over a read-write recording factory with no hooks
    pub fn uow(self: &Arc<Self>, autocommit: bool, autocommit_ignore_nested: bool) -> UnitOfWork {
        UnitOfWork::new(self.factory(false), Arc::new(NoopHooks))
            .autocommit(autocommit)
            .autocommit_ignore_nested(autocommit_ignore_nested)
    }

    /// Unit of work factory with tenant isolation enabled
    pub fn tenant_factory(self: &Arc<Self>, config: UnitOfWorkConfig) -> UnitOfWorkFactory {
        let hooks: Arc<dyn SessionHooks> = Arc::new(TenantIsolationHooks::new(TenantRoleConfig::default()));
        UnitOfWorkFactory::new(self.factory(false), self.factory(true), hooks, config)
    }

    pub fn tenant_uow(self: &Arc<Self>, options: UowOptions) -> UnitOfWork {
        self.tenant_factory(UnitOfWorkConfig::default()).get_uow(options)
    }
}

pub struct RecordingFactory {
    recorder: Arc<Recorder>,
    read_only: bool,
}

#[async_trait]
impl SessionFactory for RecordingFactory {
    async fn open(&self) -> Result<Box<dyn DbSession>, DatabaseError> {
        if self.recorder.fail_open.load(Ordering::SeqCst) {
            return Err(DatabaseError::QueryError("injected open failure".to_string()));
        }
        self.recorder.record(Event::Open { read_only: self.read_only });
        Ok(Box::new(RecordingSession { recorder: self.recorder.clone(), read_only: self.read_only, closed: false }))
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }
}

pub struct RecordingSession {
    recorder: Arc<Recorder>,
    read_only: bool,
    closed: bool,
}

impl RecordingSession {
    fn ensure_open(&self) -> Result<(), DatabaseError> {
        if self.closed {
            return Err(DatabaseError::SessionClosed);
        }
        Ok(())
    }
}

#[async_trait]
impl DbSession for RecordingSession {
    async fn execute(&mut self, sql: &SqlResult) -> Result<u64, DatabaseError> {
        self.ensure_open()?;
        self.recorder.record(Event::Execute(sql.query.clone()));
        self.recorder.params.lock().unwrap().push(sql.params.clone());
        self.recorder.check_statement(&sql.query)?;
        Ok(0)
    }

    async fn fetch_all(&mut self, sql: &SqlResult) -> Result<Vec<Value>, DatabaseError> {
        self.ensure_open()?;
        self.recorder.record(Event::Fetch(sql.query.clone()));
        self.recorder.params.lock().unwrap().push(sql.params.clone());
        self.recorder.check_statement(&sql.query)?;
        Ok(self.recorder.rows.lock().unwrap().pop_front().unwrap_or_default())
    }

    async fn commit(&mut self) -> Result<(), DatabaseError> {
        self.ensure_open()?;
        self.recorder.record(Event::Commit);
        if self.recorder.fail_commit.load(Ordering::SeqCst) {
            return Err(DatabaseError::QueryError("injected commit failure".to_string()));
        }
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DatabaseError> {
        self.ensure_open()?;
        self.recorder.record(Event::Rollback);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), DatabaseError> {
        self.ensure_open()?;
        self.closed = true;
        self.recorder.record(Event::Close);
        Ok(())
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }
}
