use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Column, Entity};
use crate::database::repository::{Repositories, Repository};
use crate::filter::{FieldType, SchemaDefinition};
use crate::types::EntityKind;

/// Stored as an integer column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserStatus {
    Active = 1,
    Inactive = 2,
    Deleted = 3,
}

impl UserStatus {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(UserStatus::Active),
            2 => Some(UserStatus::Inactive),
            3 => Some(UserStatus::Deleted),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub firebase_id: Option<String>,
    #[serde(default)]
    pub organization_id: Option<i64>,
    #[serde(default = "default_status")]
    pub status: i32,
    #[serde(default)]
    pub is_system: bool,
    #[serde(default)]
    pub active_token_id: Option<String>,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
    #[serde(default)]
    pub date_joined: Option<DateTime<Utc>>,
}

fn default_status() -> i32 {
    UserStatus::Active as i32
}

impl User {
    pub fn status(&self) -> Option<UserStatus> {
        UserStatus::from_code(self.status)
    }
}

impl Entity for User {
    const TABLE: &'static str = "user";
    const KIND: EntityKind = EntityKind::User;
    const COLUMNS: &'static [Column] = &[
        Column::new("id", FieldType::Integer),
        Column::new("name", FieldType::String),
        Column::new("email", FieldType::String),
        Column::new("firebase_id", FieldType::String),
        Column::new("organization_id", FieldType::Integer),
        Column::new("status", FieldType::Integer),
        Column::new("is_system", FieldType::Boolean),
        Column::new("active_token_id", FieldType::String),
        Column::new("last_login", FieldType::Timestamp),
        Column::new("date_joined", FieldType::Timestamp),
    ];

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn repository(repositories: &Repositories) -> &Repository<Self> {
        &repositories.users
    }

    fn filter_definition() -> SchemaDefinition {
        SchemaDefinition::for_entity::<Self>()
            .filter("id")
            .filter("name")
            .filter("email")
            .filter("status")
            .filter("organization_id")
            .filter("date_joined")
            .sorts(["id", "name", "email", "date_joined"])
            .with_camel_case_aliases()
    }
}
