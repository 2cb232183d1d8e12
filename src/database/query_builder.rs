use serde_json::{Map, Value};

use crate::database::manager::DatabaseError;
use crate::database::models::{Column, Entity};
use crate::filter::{quote_column, quote_table, FieldType, Filter, FilterOp, FilterOrder, FilterWhere, Sort, SqlResult};

/// Filters, sorts and paging for a list query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    pub filters: Vec<Filter>,
    pub sorts: Vec<Sort>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filters(mut self, filters: Vec<Filter>) -> Self {
        self.filters = filters;
        self
    }

    pub fn sorts(mut self, sorts: Vec<Sort>) -> Self {
        self.sorts = sorts;
        self
    }

    pub fn limit(mut self, limit: u64, offset: Option<u64>) -> Self {
        self.limit = Some(limit);
        self.offset = offset;
        self
    }
}

/// Builds parameterised statements against one entity table
pub struct QueryBuilder {
    table_name: &'static str,
    id_column: &'static str,
    columns: &'static [Column],
}

impl QueryBuilder {
    pub fn for_entity<E: Entity>() -> Self {
        Self { table_name: E::TABLE, id_column: E::ID_COLUMN, columns: E::COLUMNS }
    }

    fn table(&self) -> Result<String, DatabaseError> {
        Ok(quote_table(self.table_name)?)
    }

    fn id_filter(&self, op: FilterOp, value: Value) -> Filter {
        Filter::new(self.id_column, op, value).field_type(FieldType::Integer)
    }

    pub fn select(&self, query: &ListQuery) -> Result<SqlResult, DatabaseError> {
        let (where_clause, mut params) = FilterWhere::generate(&query.filters, 0)?;

        // Primary key tiebreak keeps paging stable
        let mut sorts = query.sorts.clone();
        if !sorts.iter().any(|s| s.field == self.id_column && s.path.is_empty()) {
            sorts.push(Sort::asc(self.id_column));
        }
        let (order_clause, order_params) = FilterOrder::generate(&sorts, params.len())?;
        params.extend(order_params);

        let query = [
            format!("SELECT * FROM {}", self.table()?),
            format!("WHERE {}", where_clause),
            order_clause,
            Self::build_limit_clause(query.limit, query.offset),
        ].into_iter().filter(|s| !s.is_empty()).collect::<Vec<_>>().join(" ");

        Ok(SqlResult::with_params(query, params))
    }

    pub fn select_by_id(&self, id: i64) -> Result<SqlResult, DatabaseError> {
        self.select(&ListQuery::new().filters(vec![self.id_filter(FilterOp::Eq, Value::from(id))]))
    }

    pub fn select_ids(&self, ids: &[i64]) -> Result<SqlResult, DatabaseError> {
        let ids = Value::Array(ids.iter().copied().map(Value::from).collect());
        self.select(&ListQuery::new().filters(vec![self.id_filter(FilterOp::In, ids)]))
    }

    pub fn count(&self, filters: &[Filter]) -> Result<SqlResult, DatabaseError> {
        let (where_clause, params) = FilterWhere::generate(filters, 0)?;
        let query = format!("SELECT COUNT(*) AS count FROM {} WHERE {}", self.table()?, where_clause);
        Ok(SqlResult::with_params(query, params))
    }

    /// INSERT of every non-null, non-key column
    pub fn insert(&self, record: &Map<String, Value>) -> Result<SqlResult, DatabaseError> {
        let mut names = vec![];
        let mut placeholders = vec![];
        let mut params = vec![];
        for column in self.data_columns() {
            match record.get(column.name) {
                None | Some(Value::Null) => continue,
                Some(value) => {
                    params.push(value.clone());
                    names.push(quote_column(column.name)?);
                    placeholders.push(format!("${}::{}", params.len(), Self::column_cast(column.field_type)));
                }
            }
        }

        let query = if names.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES RETURNING *", self.table()?)
        } else {
            format!(
                "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
                self.table()?,
                names.join(", "),
                placeholders.join(", ")
            )
        };
        Ok(SqlResult::with_params(query, params))
    }

    /// UPDATE of every non-key column by primary key
    pub fn update(&self, id: i64, record: &Map<String, Value>) -> Result<SqlResult, DatabaseError> {
        let values = self
            .data_columns()
            .map(|column| (column, record.get(column.name).cloned().unwrap_or(Value::Null)))
            .collect();
        self.build_update(id, values)
    }

    /// UPDATE of only the given columns; keys must name non-key columns
    pub fn update_fields(&self, id: i64, updates: &Map<String, Value>) -> Result<SqlResult, DatabaseError> {
        let mut values = vec![];
        for (name, value) in updates {
            let column = self
                .data_columns()
                .find(|c| c.name == name.as_str())
                .ok_or_else(|| DatabaseError::QueryError(format!("Unknown column {} on {}", name, self.table_name)))?;
            values.push((column, value.clone()));
        }
        if values.is_empty() {
            return Err(DatabaseError::QueryError(format!("No columns to update on {}", self.table_name)));
        }
        self.build_update(id, values)
    }

    fn build_update(&self, id: i64, values: Vec<(&'static Column, Value)>) -> Result<SqlResult, DatabaseError> {
        let mut assignments = vec![];
        let mut params = vec![];
        for (column, value) in values {
            params.push(value);
            assignments.push(format!(
                "{} = ${}::{}",
                quote_column(column.name)?,
                params.len(),
                Self::column_cast(column.field_type)
            ));
        }
        params.push(Value::from(id));
        let query = format!(
            "UPDATE {} SET {} WHERE {} = ${}::bigint RETURNING *",
            self.table()?,
            assignments.join(", "),
            quote_column(self.id_column)?,
            params.len()
        );
        Ok(SqlResult::with_params(query, params))
    }

    pub fn delete(&self, id: i64) -> Result<SqlResult, DatabaseError> {
        let query = format!(
            "DELETE FROM {} WHERE {} = $1::bigint RETURNING *",
            self.table()?,
            quote_column(self.id_column)?
        );
        Ok(SqlResult::with_params(query, vec![Value::from(id)]))
    }

    pub fn delete_ids(&self, ids: &[i64]) -> Result<SqlResult, DatabaseError> {
        let ids = Value::Array(ids.iter().copied().map(Value::from).collect());
        let (where_clause, params) = FilterWhere::generate(&[self.id_filter(FilterOp::In, ids)], 0)?;
        let query = format!("DELETE FROM {} WHERE {} RETURNING *", self.table()?, where_clause);
        Ok(SqlResult::with_params(query, params))
    }

    fn data_columns(&self) -> impl Iterator<Item = &'static Column> + '_ {
        self.columns.iter().filter(move |c| c.name != self.id_column)
    }

    /// Placeholder cast for a stored column; nested documents are jsonb
    fn column_cast(field_type: FieldType) -> &'static str {
        match field_type {
            FieldType::Path => "jsonb",
            other => other.sql_type(),
        }
    }

    fn build_limit_clause(limit: Option<u64>, offset: Option<u64>) -> String {
        match (limit, offset) {
            (Some(l), Some(o)) => format!("LIMIT {} OFFSET {}", l, o),
            (Some(l), None) => format!("LIMIT {}", l),
            (None, Some(o)) => format!("OFFSET {}", o),
            (None, None) => String::new(),
        }
    }
}
