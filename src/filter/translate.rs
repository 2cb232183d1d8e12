//! Validation and rewriting of client filters/sorts against a schema.
//!
//! Both translators are pure. Running them a second time with an identity
//! translation map returns the same filters: forced types stay forced and
//! coerced values coerce to themselves.

use std::collections::HashMap;

use tracing::debug;

use super::definition::SchemaDefinition;
use super::error::FilterError;
use super::types::{FieldType, Filter, Sort};
use super::value::coerce_value;

pub fn translate_filters(
    filters: Vec<Filter>,
    field_translations: &HashMap<String, String>,
    schema: &SchemaDefinition,
    fields_types: Option<&HashMap<String, FieldType>>,
) -> Result<Vec<Filter>, FilterError> {
    filters
        .into_iter()
        .map(|filter| translate_filter(filter, field_translations, schema, fields_types))
        .collect()
}

fn translate_filter(
    mut filter: Filter,
    field_translations: &HashMap<String, String>,
    schema: &SchemaDefinition,
    fields_types: Option<&HashMap<String, FieldType>>,
) -> Result<Filter, FilterError> {
    let original = filter.field.clone();
    if let Some(target) = field_translations.get(&original) {
        filter.set_field(target);
    }
    let changed = filter.field != original;

    let forced = fields_types.and_then(|types| types.get(&original)).copied();
    let field_type = if let Some(forced) = forced {
        filter.force_attr_cast = true;
        forced
    } else if let (true, Some(kept)) = (filter.force_attr_cast, filter.field_type) {
        // Already carries a forced type from an earlier pass
        kept
    } else if !changed {
        let storage = schema.resolve(&filter.field).to_string();
        let filterable = schema.is_filterable(&filter.field) || schema.is_filterable(&storage);
        // Undeclared fields pass only with a type from an earlier translation
        if !filterable && (schema.has_column(&storage) || filter.field_type.is_none()) {
            return Err(FilterError::UnknownFilterField(filter.full_field()));
        }
        let allowed = schema.allowed_ops(&filter.field).or_else(|| schema.allowed_ops(&storage));
        if let Some(allowed) = allowed.filter(|ops| !ops.contains(&filter.op)) {
            debug!("Filter op {} not in {:?} for {}", filter.op, allowed, filter.full_field());
            let field_type = schema.field_type(&storage, &filter.path).unwrap_or(FieldType::String);
            return Err(FilterError::UnsupportedFilterOperator {
                field: filter.full_field(),
                op: filter.op,
                field_type,
            });
        }
        if storage != filter.field {
            filter.set_field(&storage);
        }
        // A type resolved by an earlier translation survives a second pass
        schema
            .field_type(&filter.field, &filter.path)
            .or(filter.field_type)
            .ok_or_else(|| FilterError::UnknownFilterField(filter.full_field()))?
    } else {
        filter
            .field_type
            .or_else(|| schema.field_type(&filter.field, &filter.path))
            .unwrap_or(FieldType::String)
    };

    if !field_type.supports(filter.op) {
        return Err(FilterError::UnsupportedFilterOperator {
            field: filter.full_field(),
            op: filter.op,
            field_type,
        });
    }

    filter.value = coerce_value(&filter.full_field(), filter.op, field_type, &filter.value)?;
    filter.field_type = Some(field_type);
    if changed {
        debug!("Translated filter field {} -> {}", original, filter.full_field());
    }
    Ok(filter)
}

pub fn translate_sorts(
    sorts: Vec<Sort>,
    field_translations: &HashMap<String, String>,
    schema: &SchemaDefinition,
) -> Result<Vec<Sort>, FilterError> {
    sorts
        .into_iter()
        .map(|mut sort| {
            if let Some(target) = field_translations.get(&sort.field) {
                sort.set_field(target);
            }
            if !schema.is_sortable(&sort.field) {
                return Err(FilterError::UnsortableField(sort.full_field()));
            }
            Ok(sort)
        })
        .collect()
}
