use serde_json::Value;

use super::error::FilterError;
use super::types::{quote_column, Sort};

pub struct FilterOrder;

impl FilterOrder {
    /// Render an ORDER BY clause. Nested sort paths bind their segments as a
    /// `text[]` parameter, numbered after `starting_param_index`.
    pub fn generate(sorts: &[Sort], starting_param_index: usize) -> Result<(String, Vec<Value>), FilterError> {
        if sorts.is_empty() { return Ok((String::new(), vec![])); }
        let mut params = vec![];
        let mut parts = vec![];
        for sort in sorts {
            let column = quote_column(&sort.field)?;
            let expr = if sort.path.is_empty() {
                column
            } else {
                params.push(Value::Array(sort.path.iter().cloned().map(Value::String).collect()));
                format!("({} #>> ${}::text[])", column, starting_param_index + params.len())
            };
            parts.push(format!("{} {}", expr, sort.direction.to_sql()));
        }
        Ok((format!("ORDER BY {}", parts.join(", ")), params))
    }
}
