use serde::Serialize;
use serde_json::{json, Value};

use crate::cli::OutputFormat;
use crate::error::ApiError;

/// Output a success message in the appropriate format
pub fn output_success(output_format: &OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            if let (Some(Value::Object(extra)), Some(target)) = (data, response.as_object_mut()) {
                target.extend(extra);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Output an API error in the appropriate format
pub fn output_error(output_format: &OutputFormat, error: &ApiError) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&error.to_json())?);
        }
        OutputFormat::Text => {
            eprintln!("Error: {} ({})", error.message(), error.error_code());
        }
    }
    Ok(())
}

/// Output a list of records, one line per record in text mode
pub fn output_records<R, F>(
    output_format: &OutputFormat,
    collection_name: &str,
    records: &[R],
    line: F,
) -> anyhow::Result<()>
where
    R: Serialize,
    F: Fn(&R) -> String,
{
    match output_format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    collection_name: records,
                    "count": records.len()
                }))?
            );
        }
        OutputFormat::Text => {
            if records.is_empty() {
                println!("No {} found", collection_name);
            }
            for record in records {
                println!("{}", line(record));
            }
        }
    }
    Ok(())
}

/// Output a single record; pretty JSON in both modes
pub fn output_record<R: Serialize>(output_format: &OutputFormat, record: &R) -> anyhow::Result<()> {
    let value = serde_json::to_value(record)?;
    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&value)?),
        OutputFormat::Text => {
            if let Value::Object(map) = value {
                for (key, value) in map {
                    println!("{:>24}: {}", key, display_value(&value));
                }
            }
        }
    }
    Ok(())
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "-".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
