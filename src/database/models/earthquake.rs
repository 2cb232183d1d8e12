use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Column, Entity};
use crate::database::repository::{Repositories, Repository};
use crate::filter::{FieldType, SchemaDefinition};
use crate::types::EntityKind;

/// A seismic event as reported by the upstream feed
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Earthquake {
    pub id: Option<i64>,
    /// Provider identifier, e.g. `us6000rhpf`
    pub external_id: Option<String>,
    pub magnitude: Option<f64>,
    pub magnitude_type: Option<String>,
    pub place: Option<String>,
    pub status: Option<String>,
    pub event_type: Option<String>,
    pub title: String,
    pub detail_url: Option<String>,
    pub info_url: Option<String>,
    pub ciim_geo_image_url: Option<String>,
    pub significance: Option<i64>,
    pub tsunami: Option<bool>,
    pub felt_reports: Option<i64>,
    pub cdi: Option<f64>,
    pub mmi: Option<f64>,
    pub alert: Option<String>,
    /// Number of reporting stations (NST)
    pub station_count: Option<i64>,
    /// Minimum station distance (dmin)
    pub minimum_distance: Option<f64>,
    pub rms: Option<f64>,
    pub gap: Option<f64>,
    pub occurred_at: Option<DateTime<Utc>>,
    pub external_updated_at: Option<DateTime<Utc>>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub depth_km: Option<f64>,
    pub created_at: Option<DateTime<Utc>>,
    pub last_updated_at: Option<DateTime<Utc>>,
}

impl Earthquake {
    pub fn new(title: impl Into<String>) -> Self {
        Self { title: title.into(), ..Default::default() }
    }
}

const FILTERABLE: &[&str] = &[
    "id",
    "title",
    "external_id",
    "magnitude",
    "magnitude_type",
    "place",
    "status",
    "event_type",
    "detail_url",
    "info_url",
    "significance",
    "tsunami",
    "felt_reports",
    "cdi",
    "mmi",
    "alert",
    "station_count",
    "minimum_distance",
    "rms",
    "gap",
    "occurred_at",
    "external_updated_at",
    "latitude",
    "longitude",
    "depth_km",
    "created_at",
    "last_updated_at",
];

const NOT_SORTABLE: &[&str] = &["detail_url", "info_url"];

impl Entity for Earthquake {
    const TABLE: &'static str = "earthquake";
    const KIND: EntityKind = EntityKind::Earthquake;
    const COLUMNS: &'static [Column] = &[
        Column::new("id", FieldType::Integer),
        Column::new("external_id", FieldType::String),
        Column::new("magnitude", FieldType::Float),
        Column::new("magnitude_type", FieldType::String),
        Column::new("place", FieldType::String),
        Column::new("status", FieldType::String),
        Column::new("event_type", FieldType::String),
        Column::new("title", FieldType::String),
        Column::new("detail_url", FieldType::String),
        Column::new("info_url", FieldType::String),
        Column::new("ciim_geo_image_url", FieldType::String),
        Column::new("significance", FieldType::Integer),
        Column::new("tsunami", FieldType::Boolean),
        Column::new("felt_reports", FieldType::Integer),
        Column::new("cdi", FieldType::Float),
        Column::new("mmi", FieldType::Float),
        Column::new("alert", FieldType::String),
        Column::new("station_count", FieldType::Integer),
        Column::new("minimum_distance", FieldType::Float),
        Column::new("rms", FieldType::Float),
        Column::new("gap", FieldType::Float),
        Column::new("occurred_at", FieldType::Timestamp),
        Column::new("external_updated_at", FieldType::Timestamp),
        Column::new("latitude", FieldType::Float),
        Column::new("longitude", FieldType::Float),
        Column::new("depth_km", FieldType::Float),
        Column::new("created_at", FieldType::Timestamp),
        Column::new("last_updated_at", FieldType::Timestamp),
    ];

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn repository(repositories: &Repositories) -> &Repository<Self> {
        &repositories.earthquakes
    }

    fn filter_definition() -> SchemaDefinition {
        let schema = FILTERABLE
            .iter()
            .fold(SchemaDefinition::for_entity::<Self>(), |schema, field| schema.filter(field));
        schema
            .sorts(FILTERABLE.iter().copied().filter(|f| !NOT_SORTABLE.contains(f)))
            .with_camel_case_aliases()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterOp;

    #[test]
    fn filter_definition_uses_column_types() {
        let schema = Earthquake::filter_definition();
        assert!(schema.allowed_ops("tsunami").unwrap().contains(&FilterOp::Eq));
        assert!(!schema.allowed_ops("tsunami").unwrap().contains(&FilterOp::Like));
        assert!(schema.allowed_ops("occurred_at").unwrap().contains(&FilterOp::Gte));
        assert!(schema.is_sortable("magnitude"));
        assert!(schema.is_sortable("occurredAt"));
        assert!(!schema.is_sortable("detail_url"));
        assert!(!schema.is_filterable("ciim_geo_image_url"));
    }
}
