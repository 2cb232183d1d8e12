pub mod earthquake;
pub mod organization;
pub mod user;

pub use earthquake::Earthquake;
pub use organization::Organization;
pub use user::{User, UserStatus};

use serde::{de::DeserializeOwned, Serialize};

use crate::database::repository::{Repositories, Repository};
use crate::filter::{FieldType, SchemaDefinition};
use crate::types::EntityKind;

/// Declared storage column of an entity table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub field_type: FieldType,
}

impl Column {
    pub const fn new(name: &'static str, field_type: FieldType) -> Self {
        Self { name, field_type }
    }
}

/// A table-backed record with a bigint primary key.
///
/// Records round-trip through JSON: rows are fetched as `to_jsonb(row)` and
/// deserialized, inserts and updates serialize the record and bind each
/// declared column with its type.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    const TABLE: &'static str;
    const KIND: EntityKind;
    const ID_COLUMN: &'static str = "id";
    const COLUMNS: &'static [Column];

    fn id(&self) -> Option<i64>;

    /// This entity's repository in the unit-of-work registry
    fn repository(repositories: &Repositories) -> &Repository<Self>;

    /// Filterable and sortable fields exposed to clients
    fn filter_definition() -> SchemaDefinition;
}
