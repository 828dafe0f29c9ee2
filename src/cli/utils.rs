use serde::Serialize;
use serde_json::{json, Value};

use crate::cli::OutputFormat;

/// Output a success message in the appropriate format
pub fn output_success(
    output_format: &OutputFormat,
    message: &str,
    data: Option<Value>,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });
            if let Some(data) = data {
                response["data"] = data;
            }
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Output an empty collection in the appropriate format
pub fn output_empty_collection(
    output_format: &OutputFormat,
    collection_name: &str,
    message: &str,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json!({ collection_name: [] }))?);
        }
        OutputFormat::Text => {
            println!("{}", message);
        }
    }
    Ok(())
}

/// JSON: the whole value. Text: one `label: value` line per field.
pub fn output_fields<T: Serialize>(output_format: &OutputFormat, value: &T) -> anyhow::Result<()> {
    let value = serde_json::to_value(value)?;
    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&value)?),
        OutputFormat::Text => match value.as_object() {
            Some(fields) => {
                let width = fields.keys().map(|k| k.len()).max().unwrap_or(0);
                for (key, field) in fields {
                    println!("{:<width$}  {}", key, display_value(field), width = width);
                }
            }
            None => println!("{}", display_value(&value)),
        },
    }
    Ok(())
}

/// Plain text rendering of a JSON scalar; strings unquoted, null as `-`
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "-".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
