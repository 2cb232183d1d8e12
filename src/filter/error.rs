use thiserror::Error;

use super::types::{FieldType, FilterOp};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    #[error("Unknown filter field: {0}")]
    UnknownFilterField(String),

    #[error("Field {0:?} is not sortable")]
    UnsortableField(String),

    #[error("Filter operation {op} not supported for {field_type} field {field:?}")]
    UnsupportedFilterOperator {
        field: String,
        op: FilterOp,
        field_type: FieldType,
    },

    #[error("Invalid value {value} for filter {field:?}, expected {expected}")]
    InvalidFilterValue {
        field: String,
        value: String,
        expected: FieldType,
    },

    #[error("Unknown filter operation: {0}")]
    UnknownOperator(String),

    #[error("Invalid filter format {0:?}")]
    InvalidFilterFormat(String),

    #[error("Filter field {0:?} not allowed")]
    FilterFieldNotAllowed(String),

    #[error("Filter operation {op:?} not allowed for field {field:?}")]
    FilterOperationNotAllowed { field: String, op: String },

    #[error("Invalid operation {op:?} for field {field:?}")]
    InvalidFilterOperation { field: String, op: String },

    #[error("Invalid sort format {0:?}")]
    InvalidSortFormat(String),

    #[error("Sort field {0:?} not allowed")]
    SortFieldNotAllowed(String),

    #[error("Invalid sort direction {0:?}")]
    InvalidSortDirection(String),

    #[error("Invalid column name: {0}")]
    InvalidColumn(String),

    #[error("Invalid table name: {0}")]
    InvalidTableName(String),
}
