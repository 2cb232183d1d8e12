use super::definition::SchemaDefinition;
use super::error::FilterError;
use super::types::{Filter, FilterOp, Sort, SortDirection, DEFAULT_PATH_SEPARATOR};
use serde_json::Value;

pub const DEFAULT_FIELDS_SEPARATOR: &str = ":";

/// Parses query-string expressions into filters and sorts for one resource.
///
/// Filters are written `field:op[:value]` and sorts `field[:asc|desc]`; the
/// field may address a nested path (`properties/products/origin`). Aliases
/// are mapped to storage names and the schema's type is attached, so the
/// output is ready for [`translate_filters`](super::translate_filters).
pub struct FiltersAndSortsParser<'a> {
    definition: &'a SchemaDefinition,
    fields_separator: String,
    path_separator: String,
}

impl<'a> FiltersAndSortsParser<'a> {
    pub fn new(definition: &'a SchemaDefinition) -> Self {
        Self::with_separators(definition, DEFAULT_FIELDS_SEPARATOR, DEFAULT_PATH_SEPARATOR)
    }

    pub fn with_separators(
        definition: &'a SchemaDefinition,
        fields_separator: impl Into<String>,
        path_separator: impl Into<String>,
    ) -> Self {
        Self {
            definition,
            fields_separator: fields_separator.into(),
            path_separator: path_separator.into(),
        }
    }

    pub fn parse(&self, raw_filters: &[String], raw_sorts: &[String]) -> Result<(Vec<Filter>, Vec<Sort>), FilterError> {
        Ok((self.parse_filters(raw_filters)?, self.parse_sorts(raw_sorts)?))
    }

    pub fn parse_filters(&self, raw_filters: &[String]) -> Result<Vec<Filter>, FilterError> {
        raw_filters.iter().map(|raw| self.parse_filter(raw)).collect()
    }

    pub fn parse_sorts(&self, raw_sorts: &[String]) -> Result<Vec<Sort>, FilterError> {
        raw_sorts.iter().map(|raw| self.parse_sort(raw)).collect()
    }

    fn parse_filter(&self, raw: &str) -> Result<Filter, FilterError> {
        let mut tokens = raw.splitn(3, self.fields_separator.as_str());
        let field = tokens.next().unwrap_or_default();
        let raw_op = tokens.next().ok_or_else(|| FilterError::InvalidFilterFormat(raw.to_string()))?;
        let value = tokens.next().map(|v| Value::String(v.to_string())).unwrap_or(Value::Null);
        if field.is_empty() || raw_op.is_empty() {
            return Err(FilterError::InvalidFilterFormat(raw.to_string()));
        }

        let (root, path) = self.split_root(field);
        let allowed = self
            .definition
            .allowed_ops(root)
            .ok_or_else(|| FilterError::FilterFieldNotAllowed(root.to_string()))?;

        let op: FilterOp = raw_op.parse().map_err(|_| FilterError::InvalidFilterOperation {
            field: field.to_string(),
            op: raw_op.to_string(),
        })?;
        if !allowed.contains(&op) {
            return Err(FilterError::FilterOperationNotAllowed {
                field: root.to_string(),
                op: raw_op.to_string(),
            });
        }

        let mapped = self.definition.resolve(root);
        let mut filter = Filter::with_separator(self.join(mapped, path), op, value, self.path_separator.as_str());
        filter.field_type = self.definition.field_type(mapped, &filter.path);
        Ok(filter)
    }

    fn parse_sort(&self, raw: &str) -> Result<Sort, FilterError> {
        let (field, direction) = match raw.split_once(self.fields_separator.as_str()) {
            Some((field, direction)) => (field, Some(direction)),
            None => (raw, None),
        };
        if field.is_empty() {
            return Err(FilterError::InvalidSortFormat(raw.to_string()));
        }

        let (root, path) = self.split_root(field);
        if !self.definition.is_sortable(root) {
            return Err(FilterError::SortFieldNotAllowed(root.to_string()));
        }
        let direction = match direction {
            Some(direction) => direction.parse::<SortDirection>()?,
            None => SortDirection::default(),
        };

        let mapped = self.definition.resolve(root);
        Ok(Sort::with_separator(self.join(mapped, path), direction, self.path_separator.as_str()))
    }

    fn split_root<'f>(&self, field: &'f str) -> (&'f str, Option<&'f str>) {
        match field.split_once(self.path_separator.as_str()) {
            Some((root, path)) => (root, Some(path)),
            None => (field, None),
        }
    }

    fn join(&self, root: &str, path: Option<&str>) -> String {
        match path {
            Some(path) => format!("{}{}{}", root, self.path_separator, path),
            None => root.to_string(),
        }
    }
}
