use std::collections::{HashMap, HashSet};

use super::types::{FieldType, FilterOp};
use crate::database::models::{Column, Entity};

/// Per-resource declaration of filterable and sortable fields.
///
/// `columns` holds the declared storage type of every column and is what the
/// translator introspects. `allowed_filters` / `allowed_sorts` gate what a
/// client may ask for, and `fields_map` maps client aliases to storage names.
#[derive(Debug, Clone, Default)]
pub struct SchemaDefinition {
    columns: HashMap<String, FieldType>,
    allowed_filters: HashMap<String, HashSet<FilterOp>>,
    allowed_sorts: HashSet<String>,
    fields_map: HashMap<String, String>,
}

impl SchemaDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from the declared columns of an entity
    pub fn for_entity<E: Entity>() -> Self {
        Self::from_columns(E::COLUMNS)
    }

    pub fn from_columns(columns: &[Column]) -> Self {
        columns
            .iter()
            .fold(Self::new(), |schema, column| schema.column(column.name, column.field_type))
    }

    pub fn column(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.columns.insert(name.into(), field_type);
        self
    }

    /// Allow filtering `field` with the default operators of its declared type
    pub fn filter(self, field: &str) -> Self {
        let ops = self
            .columns
            .get(field)
            .map(FieldType::default_ops)
            .unwrap_or_default();
        self.filter_ops(field, ops)
    }

    pub fn filter_ops(mut self, field: impl Into<String>, ops: impl IntoIterator<Item = FilterOp>) -> Self {
        self.allowed_filters.insert(field.into(), ops.into_iter().collect());
        self
    }

    pub fn sort(mut self, field: impl Into<String>) -> Self {
        self.allowed_sorts.insert(field.into());
        self
    }

    pub fn sorts<I, S>(self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        fields.into_iter().fold(self, |schema, field| schema.sort(field))
    }

    pub fn alias(mut self, alias: impl Into<String>, field: impl Into<String>) -> Self {
        self.fields_map.insert(alias.into(), field.into());
        self
    }

    /// Register the camelCase spelling of every allowed snake_case field as an
    /// alias, with the same allowed operators / sortability.
    pub fn with_camel_case_aliases(mut self) -> Self {
        let mut filter_updates = Vec::new();
        for (field, ops) in &self.allowed_filters {
            let alias = snake_to_camel(field);
            if alias == *field || self.fields_map.contains_key(field) {
                continue;
            }
            self.fields_map.entry(alias.clone()).or_insert_with(|| field.clone());
            if !self.allowed_filters.contains_key(&alias) {
                filter_updates.push((alias, ops.clone()));
            }
        }
        self.allowed_filters.extend(filter_updates);

        let mut sort_updates = Vec::new();
        for field in &self.allowed_sorts {
            let alias = snake_to_camel(field);
            if alias == *field || self.fields_map.contains_key(field) {
                continue;
            }
            self.fields_map.entry(alias.clone()).or_insert_with(|| field.clone());
            if !self.allowed_sorts.contains(&alias) {
                sort_updates.push(alias);
            }
        }
        self.allowed_sorts.extend(sort_updates);
        self
    }

    /// Declared type of a storage field. Nested paths on a declared column are
    /// addressed as text, so they resolve to `Path`.
    pub fn field_type(&self, field: &str, path: &[String]) -> Option<FieldType> {
        let field = self.resolve(field);
        let declared = self.columns.get(field).copied()?;
        if path.is_empty() {
            Some(declared)
        } else {
            Some(FieldType::Path)
        }
    }

    pub fn has_column(&self, field: &str) -> bool {
        self.columns.contains_key(field)
    }

    /// Storage name for a client field (identity when unmapped)
    pub fn resolve<'a>(&'a self, field: &'a str) -> &'a str {
        self.fields_map.get(field).map(String::as_str).unwrap_or(field)
    }

    pub fn allowed_ops(&self, field: &str) -> Option<&HashSet<FilterOp>> {
        self.allowed_filters.get(field)
    }

    pub fn is_filterable(&self, field: &str) -> bool {
        self.allowed_filters.contains_key(field)
    }

    pub fn is_sortable(&self, field: &str) -> bool {
        self.allowed_sorts.contains(field)
    }

    pub fn fields_map(&self) -> &HashMap<String, String> {
        &self.fields_map
    }
}

fn snake_to_camel(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut upper = false;
    for c in s.chars() {
        if c == '_' {
            upper = !out.is_empty();
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}
