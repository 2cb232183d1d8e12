use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::FilterError;

pub const DEFAULT_PATH_SEPARATOR: &str = "/";
pub const VALUE_SPLIT_SEPARATOR: char = ',';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterOp {
    #[serde(rename = "eq")] Eq,
    #[serde(rename = "neq")] Neq,

    #[serde(rename = "lt")] Lt,
    #[serde(rename = "lte")] Lte,
    #[serde(rename = "gt")] Gt,
    #[serde(rename = "gte")] Gte,

    #[serde(rename = "in")] In,
    #[serde(rename = "notIn")] NotIn,

    #[serde(rename = "like")] Like,
    #[serde(rename = "ilike")] ILike,
    #[serde(rename = "notLike")] NotLike,
    #[serde(rename = "notILike")] NotILike,

    #[serde(rename = "contains")] Contains,
    #[serde(rename = "notContains")] NotContains,
    #[serde(rename = "containsOneOf")] ContainsOneOf,

    #[serde(rename = "isnull")] IsNull,
    #[serde(rename = "isnotnull")] IsNotNull,
}

impl FilterOp {
    pub const ALL: [FilterOp; 17] = [
        FilterOp::Eq,
        FilterOp::Neq,
        FilterOp::Lt,
        FilterOp::Lte,
        FilterOp::Gt,
        FilterOp::Gte,
        FilterOp::In,
        FilterOp::NotIn,
        FilterOp::Like,
        FilterOp::ILike,
        FilterOp::NotLike,
        FilterOp::NotILike,
        FilterOp::Contains,
        FilterOp::NotContains,
        FilterOp::ContainsOneOf,
        FilterOp::IsNull,
        FilterOp::IsNotNull,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::Neq => "neq",
            FilterOp::Lt => "lt",
            FilterOp::Lte => "lte",
            FilterOp::Gt => "gt",
            FilterOp::Gte => "gte",
            FilterOp::In => "in",
            FilterOp::NotIn => "notIn",
            FilterOp::Like => "like",
            FilterOp::ILike => "ilike",
            FilterOp::NotLike => "notLike",
            FilterOp::NotILike => "notILike",
            FilterOp::Contains => "contains",
            FilterOp::NotContains => "notContains",
            FilterOp::ContainsOneOf => "containsOneOf",
            FilterOp::IsNull => "isnull",
            FilterOp::IsNotNull => "isnotnull",
        }
    }

    /// Operators whose value is a list (comma separated when given as a string)
    pub fn can_use_value_list(&self) -> bool {
        matches!(
            self,
            FilterOp::In
                | FilterOp::NotIn
                | FilterOp::Contains
                | FilterOp::NotContains
                | FilterOp::ContainsOneOf
        )
    }

    /// Operators that ignore the filter value
    pub fn is_null_check(&self) -> bool {
        matches!(self, FilterOp::IsNull | FilterOp::IsNotNull)
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterOp {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FilterOp::ALL
            .iter()
            .copied()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| FilterError::UnknownOperator(s.to_string()))
    }
}

/// Semantic type of a filterable field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Integer,
    Float,
    Boolean,
    Timestamp,
    List,
    Path,
}

impl FieldType {
    /// Fixed default operator set for this type
    pub fn default_ops(&self) -> HashSet<FilterOp> {
        use FilterOp::*;
        let common = [Eq, Neq, In, NotIn, IsNull, IsNotNull];
        let extra: &[FilterOp] = match self {
            FieldType::List => return [Contains, NotContains, ContainsOneOf].into_iter().collect(),
            FieldType::String | FieldType::Path => &[Like, ILike, NotLike, NotILike, Contains, NotContains],
            FieldType::Integer | FieldType::Float | FieldType::Timestamp => &[Lt, Lte, Gt, Gte],
            FieldType::Boolean => &[],
        };
        common.into_iter().chain(extra.iter().copied()).collect()
    }

    pub fn supports(&self, op: FilterOp) -> bool {
        self.default_ops().contains(&op)
    }

    /// Postgres type used for typed placeholders and forced casts
    pub fn sql_type(&self) -> &'static str {
        match self {
            FieldType::String | FieldType::Path => "text",
            FieldType::Integer => "bigint",
            FieldType::Float => "double precision",
            FieldType::Boolean => "boolean",
            FieldType::Timestamp => "timestamptz",
            FieldType::List => "text[]",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Boolean => "boolean",
            FieldType::Timestamp => "timestamp",
            FieldType::List => "list",
            FieldType::Path => "path",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single filter condition over a (possibly nested) field.
///
/// `field` holds the root field only; nested segments live in `path`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    #[serde(default)]
    pub path: Vec<String>,
    pub op: FilterOp,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub field_type: Option<FieldType>,
    #[serde(default)]
    pub force_attr_cast: bool,
    #[serde(default = "default_path_separator")]
    pub path_separator: String,
}

impl Filter {
    pub fn new(field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        Self::with_separator(field, op, value, DEFAULT_PATH_SEPARATOR)
    }

    pub fn with_separator(
        field: impl Into<String>,
        op: FilterOp,
        value: impl Into<Value>,
        path_separator: impl Into<String>,
    ) -> Self {
        let path_separator = path_separator.into();
        let (field, path) = split_path(&field.into(), &path_separator);
        Self {
            field,
            path,
            op,
            value: value.into(),
            field_type: None,
            force_attr_cast: false,
            path_separator,
        }
    }

    pub fn field_type(mut self, field_type: FieldType) -> Self {
        self.field_type = Some(field_type);
        self
    }

    pub fn is_path(&self) -> bool {
        !self.path.is_empty()
    }

    pub fn sub_path(&self) -> String {
        self.path.join(&self.path_separator)
    }

    /// Root field and sub-path joined back with the separator
    pub fn full_field(&self) -> String {
        join_path(&self.field, &self.path, &self.path_separator)
    }

    /// Replace the root field, keeping the sub-path. The new root may itself
    /// address a nested path.
    pub fn set_field(&mut self, field: &str) {
        let full = join_path(field, &self.path, &self.path_separator);
        let (field, path) = split_path(&full, &self.path_separator);
        self.field = field;
        self.path = path;
    }

    pub fn can_use_value_list(&self) -> bool {
        self.op.can_use_value_list()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

impl FromStr for SortDirection {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            other => Err(FilterError::InvalidSortDirection(other.to_string())),
        }
    }
}

/// A single sort key over a (possibly nested) field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub field: String,
    #[serde(default)]
    pub path: Vec<String>,
    #[serde(default)]
    pub direction: SortDirection,
    #[serde(default = "default_path_separator")]
    pub path_separator: String,
}

impl Sort {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self::with_separator(field, direction, DEFAULT_PATH_SEPARATOR)
    }

    pub fn with_separator(
        field: impl Into<String>,
        direction: SortDirection,
        path_separator: impl Into<String>,
    ) -> Self {
        let path_separator = path_separator.into();
        let (field, path) = split_path(&field.into(), &path_separator);
        Self { field, path, direction, path_separator }
    }

    pub fn asc(field: impl Into<String>) -> Self {
        Self::new(field, SortDirection::Asc)
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self::new(field, SortDirection::Desc)
    }

    pub fn full_field(&self) -> String {
        join_path(&self.field, &self.path, &self.path_separator)
    }

    pub fn set_field(&mut self, field: &str) {
        let full = join_path(field, &self.path, &self.path_separator);
        let (field, path) = split_path(&full, &self.path_separator);
        self.field = field;
        self.path = path;
    }
}

/// Parameterised SQL ready to be bound and executed
#[derive(Debug, Clone, PartialEq)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<Value>,
}

impl SqlResult {
    pub fn new(query: impl Into<String>) -> Self {
        Self { query: query.into(), params: vec![] }
    }

    pub fn with_params(query: impl Into<String>, params: Vec<Value>) -> Self {
        Self { query: query.into(), params }
    }
}

/// Plain SQL identifier: a letter or underscore, then letters, digits, underscores
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub fn quote_column(name: &str) -> Result<String, FilterError> {
    if !is_valid_identifier(name) {
        return Err(FilterError::InvalidColumn(name.to_string()));
    }
    Ok(format!("\"{}\"", name))
}

pub fn quote_table(name: &str) -> Result<String, FilterError> {
    if !is_valid_identifier(name) {
        return Err(FilterError::InvalidTableName(name.to_string()));
    }
    Ok(format!("\"{}\"", name))
}

fn default_path_separator() -> String {
    DEFAULT_PATH_SEPARATOR.to_string()
}

fn split_path(field: &str, separator: &str) -> (String, Vec<String>) {
    if separator.is_empty() || !field.contains(separator) {
        return (field.to_string(), vec![]);
    }
    let mut parts = field.split(separator).map(str::to_string);
    let root = parts.next().unwrap_or_default();
    (root, parts.collect())
}

fn join_path(field: &str, path: &[String], separator: &str) -> String {
    if path.is_empty() {
        field.to_string()
    } else {
        format!("{}{}{}", field, separator, path.join(separator))
    }
}
