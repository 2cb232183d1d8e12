use serde_json::Value;

use super::error::FilterError;
use super::types::{quote_column, FieldType, Filter, FilterOp};

/// Renders translated filters into a parameterised WHERE clause.
///
/// Every value is bound through a typed placeholder (`$n::bigint`); column
/// names are validated and quoted. Filters are ANDed in input order.
pub struct FilterWhere {
    param_values: Vec<Value>,
    param_index: usize,
}

impl FilterWhere {
    pub fn new(starting_param_index: usize) -> Self {
        Self {
            param_values: vec![],
            param_index: starting_param_index,
        }
    }

    pub fn generate(filters: &[Filter], starting_param_index: usize) -> Result<(String, Vec<Value>), FilterError> {
        let mut filter_where = Self::new(starting_param_index);
        filter_where.build(filters)
    }

    fn build(&mut self, filters: &[Filter]) -> Result<(String, Vec<Value>), FilterError> {
        let mut sql_conditions = vec![];
        for filter in filters {
            sql_conditions.push(self.build_sql_condition(filter)?);
        }
        let where_clause = if sql_conditions.is_empty() { "1=1".to_string() } else { sql_conditions.join(" AND ") };
        Ok((where_clause, std::mem::take(&mut self.param_values)))
    }

    fn build_sql_condition(&mut self, filter: &Filter) -> Result<String, FilterError> {
        let field_type = filter.field_type.unwrap_or(FieldType::String);
        let column = self.column_expr(filter, field_type)?;
        // List columns compare element-wise against text values
        let value_type = match field_type {
            FieldType::List => FieldType::String,
            other => other,
        };

        match filter.op {
            FilterOp::Eq => {
                if filter.value.is_null() { Ok(format!("{} IS NULL", column)) }
                else { Ok(format!("{} = {}", column, self.param(filter.value.clone(), value_type))) }
            }
            FilterOp::Neq => {
                if filter.value.is_null() { Ok(format!("{} IS NOT NULL", column)) }
                else { Ok(format!("{} <> {}", column, self.param(filter.value.clone(), value_type))) }
            }
            FilterOp::Gt => Ok(format!("{} > {}", column, self.param(filter.value.clone(), value_type))),
            FilterOp::Gte => Ok(format!("{} >= {}", column, self.param(filter.value.clone(), value_type))),
            FilterOp::Lt => Ok(format!("{} < {}", column, self.param(filter.value.clone(), value_type))),
            FilterOp::Lte => Ok(format!("{} <= {}", column, self.param(filter.value.clone(), value_type))),
            FilterOp::Like => Ok(format!("{} LIKE {}", column, self.param(filter.value.clone(), FieldType::String))),
            FilterOp::ILike => Ok(format!("{} ILIKE {}", column, self.param(filter.value.clone(), FieldType::String))),
            FilterOp::NotLike => Ok(format!("{} NOT LIKE {}", column, self.param(filter.value.clone(), FieldType::String))),
            FilterOp::NotILike => Ok(format!("{} NOT ILIKE {}", column, self.param(filter.value.clone(), FieldType::String))),
            FilterOp::In | FilterOp::NotIn => {
                let values = as_list(&filter.value);
                let negate = filter.op == FilterOp::NotIn;
                if values.is_empty() { return Ok(if negate { "1=1" } else { "1=0" }.to_string()); }
                let params: Vec<String> = values.into_iter().map(|v| self.param(v, value_type)).collect();
                let keyword = if negate { "NOT IN" } else { "IN" };
                Ok(format!("{} {} ({})", column, keyword, params.join(", ")))
            }
            FilterOp::Contains | FilterOp::NotContains | FilterOp::ContainsOneOf if field_type == FieldType::List => {
                let values = Value::Array(as_list(&filter.value));
                let array = self.param(values, FieldType::List);
                Ok(match filter.op {
                    FilterOp::Contains => format!("{} @> {}", column, array),
                    FilterOp::NotContains => format!("NOT ({} @> {})", column, array),
                    _ => format!("{} && {}", column, array),
                })
            }
            FilterOp::Contains | FilterOp::NotContains | FilterOp::ContainsOneOf => {
                let values = as_list(&filter.value);
                if values.is_empty() { return Ok(if filter.op == FilterOp::ContainsOneOf { "1=0" } else { "1=1" }.to_string()); }
                let comparison = if filter.op == FilterOp::NotContains { "= 0" } else { "> 0" };
                let parts: Vec<String> = values
                    .into_iter()
                    .map(|v| format!("strpos({}, {}) {}", column, self.param(v, FieldType::String), comparison))
                    .collect();
                let joiner = if filter.op == FilterOp::ContainsOneOf { " OR " } else { " AND " };
                Ok(format!("({})", parts.join(joiner)))
            }
            FilterOp::IsNull => Ok(format!("{} IS NULL", column)),
            FilterOp::IsNotNull => Ok(format!("{} IS NOT NULL", column)),
        }
    }

    /// Quoted column, JSON path extraction for nested fields, forced cast last
    fn column_expr(&mut self, filter: &Filter, field_type: FieldType) -> Result<String, FilterError> {
        let mut expr = quote_column(&filter.field)?;
        if filter.is_path() {
            let path = Value::Array(filter.path.iter().cloned().map(Value::String).collect());
            expr = format!("({} #>> {})", expr, self.param(path, FieldType::List));
        } else if field_type == FieldType::Path {
            // Whole jsonb document compared as text
            expr = format!("({} #>> '{{}}')", expr);
        }
        if filter.force_attr_cast {
            expr = format!("CAST({} AS {})", expr, field_type.sql_type());
        }
        Ok(expr)
    }

    fn param(&mut self, value: Value, field_type: FieldType) -> String {
        self.param_values.push(value);
        self.param_index += 1;
        format!("${}::{}", self.param_index, field_type.sql_type())
    }
}

fn as_list(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        Value::Null => vec![],
        other => vec![other.clone()],
    }
}
