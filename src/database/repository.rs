use std::marker::PhantomData;

use serde_json::{Map, Value};

use crate::database::manager::DatabaseError;
use crate::database::models::{Earthquake, Entity, Organization, User};
use crate::database::query_builder::{ListQuery, QueryBuilder};
use crate::database::session::DbSession;
use crate::filter::{FieldType, Filter, FilterOp};

/// Stateless data access for one entity. Every operation runs on the
/// session it is handed.
pub struct Repository<E> {
    _phantom: PhantomData<fn() -> E>,
}

impl<E> Default for Repository<E> {
    fn default() -> Self {
        Self { _phantom: PhantomData }
    }
}

impl<E: Entity> Repository<E> {
    pub fn new() -> Self {
        Self::default()
    }

    fn builder(&self) -> QueryBuilder {
        QueryBuilder::for_entity::<E>()
    }

    pub async fn get_by_id(&self, session: &mut dyn DbSession, id: i64) -> Result<Option<E>, DatabaseError> {
        let sql = self.builder().select_by_id(id)?;
        session.fetch_optional(&sql).await?.map(decode).transpose()
    }

    pub async fn list(&self, session: &mut dyn DbSession, query: &ListQuery) -> Result<Vec<E>, DatabaseError> {
        let sql = self.builder().select(query)?;
        session.fetch_all(&sql).await?.into_iter().map(decode).collect()
    }

    pub async fn list_by_ids(&self, session: &mut dyn DbSession, ids: &[i64]) -> Result<Vec<E>, DatabaseError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let sql = self.builder().select_ids(ids)?;
        session.fetch_all(&sql).await?.into_iter().map(decode).collect()
    }

    pub async fn count(&self, session: &mut dyn DbSession, filters: &[Filter]) -> Result<i64, DatabaseError> {
        let sql = self.builder().count(filters)?;
        let row = session
            .fetch_optional(&sql)
            .await?
            .ok_or_else(|| DatabaseError::QueryError("COUNT returned no rows".to_string()))?;
        row.get("count")
            .and_then(Value::as_i64)
            .ok_or_else(|| DatabaseError::QueryError("COUNT returned no count column".to_string()))
    }

    /// Insert the record, returning it as stored (generated id, server defaults)
    pub async fn add(&self, session: &mut dyn DbSession, record: &E) -> Result<E, DatabaseError> {
        let sql = self.builder().insert(&encode(record)?)?;
        let row = session
            .fetch_optional(&sql)
            .await?
            .ok_or_else(|| DatabaseError::QueryError(format!("INSERT into {} returned no row", E::TABLE)))?;
        decode(row)
    }

    /// Write every column of the record by id. `None` when no row matched.
    pub async fn update(&self, session: &mut dyn DbSession, record: &E) -> Result<Option<E>, DatabaseError> {
        let id = record
            .id()
            .ok_or_else(|| DatabaseError::QueryError(format!("Cannot update {} without id", E::KIND)))?;
        let sql = self.builder().update(id, &encode(record)?)?;
        session.fetch_optional(&sql).await?.map(decode).transpose()
    }

    /// Write only the given columns by id. An empty update reads the row back.
    pub async fn update_by_id(
        &self,
        session: &mut dyn DbSession,
        id: i64,
        updates: &Map<String, Value>,
    ) -> Result<Option<E>, DatabaseError> {
        if updates.is_empty() {
            return self.get_by_id(session, id).await;
        }
        let sql = self.builder().update_fields(id, updates)?;
        session.fetch_optional(&sql).await?.map(decode).transpose()
    }

    /// Delete by id, returning the deleted record if there was one
    pub async fn delete(&self, session: &mut dyn DbSession, id: i64) -> Result<Option<E>, DatabaseError> {
        let sql = self.builder().delete(id)?;
        session.fetch_optional(&sql).await?.map(decode).transpose()
    }

    pub async fn delete_many(&self, session: &mut dyn DbSession, ids: &[i64]) -> Result<Vec<E>, DatabaseError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let sql = self.builder().delete_ids(ids)?;
        session.fetch_all(&sql).await?.into_iter().map(decode).collect()
    }
}

impl Repository<User> {
    pub async fn get_by_email(&self, session: &mut dyn DbSession, email: &str) -> Result<Option<User>, DatabaseError> {
        let filters = vec![Filter::new("email", FilterOp::Eq, email).field_type(FieldType::String)];
        let query = ListQuery::new().filters(filters).limit(1, None);
        Ok(self.list(session, &query).await?.into_iter().next())
    }
}

fn encode<E: Entity>(record: &E) -> Result<Map<String, Value>, DatabaseError> {
    match serde_json::to_value(record)? {
        Value::Object(map) => Ok(map),
        other => Err(DatabaseError::QueryError(format!("{} did not serialize to an object: {}", E::KIND, other))),
    }
}

fn decode<E: Entity>(row: Value) -> Result<E, DatabaseError> {
    Ok(serde_json::from_value(row)?)
}

/// Per-scope repository registry, one field per entity
#[derive(Default)]
pub struct Repositories {
    pub organizations: Repository<Organization>,
    pub users: Repository<User>,
    pub earthquakes: Repository<Earthquake>,
}

impl Repositories {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A repository paired with the unit of work's active session
pub struct BoundRepository<'a, E> {
    repository: &'a Repository<E>,
    session: &'a mut dyn DbSession,
}

impl<'a, E: Entity> BoundRepository<'a, E> {
    pub fn new(repository: &'a Repository<E>, session: &'a mut dyn DbSession) -> Self {
        Self { repository, session }
    }

    pub fn repository(&self) -> &'a Repository<E> {
        self.repository
    }

    pub async fn get_by_id(&mut self, id: i64) -> Result<Option<E>, DatabaseError> {
        self.repository.get_by_id(&mut *self.session, id).await
    }

    pub async fn list(&mut self, query: &ListQuery) -> Result<Vec<E>, DatabaseError> {
        self.repository.list(&mut *self.session, query).await
    }

    pub async fn list_by_ids(&mut self, ids: &[i64]) -> Result<Vec<E>, DatabaseError> {
        self.repository.list_by_ids(&mut *self.session, ids).await
    }

    pub async fn count(&mut self, filters: &[Filter]) -> Result<i64, DatabaseError> {
        self.repository.count(&mut *self.session, filters).await
    }

    pub async fn add(&mut self, record: &E) -> Result<E, DatabaseError> {
        self.repository.add(&mut *self.session, record).await
    }

    pub async fn update(&mut self, record: &E) -> Result<Option<E>, DatabaseError> {
        self.repository.update(&mut *self.session, record).await
    }

    pub async fn update_by_id(&mut self, id: i64, updates: &Map<String, Value>) -> Result<Option<E>, DatabaseError> {
        self.repository.update_by_id(&mut *self.session, id, updates).await
    }

    pub async fn delete(&mut self, id: i64) -> Result<Option<E>, DatabaseError> {
        self.repository.delete(&mut *self.session, id).await
    }

    pub async fn delete_many(&mut self, ids: &[i64]) -> Result<Vec<E>, DatabaseError> {
        self.repository.delete_many(&mut *self.session, ids).await
    }
}

impl<'a> BoundRepository<'a, User> {
    pub async fn get_by_email(&mut self, email: &str) -> Result<Option<User>, DatabaseError> {
        self.repository.get_by_email(&mut *self.session, email).await
    }
}
