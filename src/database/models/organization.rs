use serde::{Deserialize, Serialize};

use super::{Column, Entity};
use crate::database::repository::{Repositories, Repository};
use crate::filter::{FieldType, SchemaDefinition};
use crate::types::EntityKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: String,
}

impl Organization {
    pub fn new(name: impl Into<String>) -> Self {
        Self { id: None, name: name.into() }
    }
}

impl Entity for Organization {
    const TABLE: &'static str = "organization";
    const KIND: EntityKind = EntityKind::Organization;
    const COLUMNS: &'static [Column] = &[
        Column::new("id", FieldType::Integer),
        Column::new("name", FieldType::String),
    ];

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn repository(repositories: &Repositories) -> &Repository<Self> {
        &repositories.organizations
    }

    fn filter_definition() -> SchemaDefinition {
        SchemaDefinition::for_entity::<Self>()
            .filter("id")
            .filter("name")
            .sorts(["id", "name"])
    }
}
