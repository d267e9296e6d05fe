use geojson::Feature;
use serde_json::{json, Value};

use crate::cli::OutputFormat;
use crate::map::feature_id;

/// Output a success message in the appropriate format
pub fn output_success(output_format: &OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            if let (Some(target), Some(Value::Object(extra))) = (response.as_object_mut(), data) {
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

/// Output an empty collection in the appropriate format
pub fn output_empty_collection(output_format: &OutputFormat, collection_name: &str, message: &str) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    collection_name: []
                }))?
            );
        }
        OutputFormat::Text => {
            println!("{}", message);
        }
    }
    Ok(())
}

/// Print saved polygons as a table, or as a GeoJSON array.
pub fn output_polygons(output_format: &OutputFormat, features: &[Feature]) -> anyhow::Result<()> {
    if features.is_empty() {
        return output_empty_collection(output_format, "polygons", "No polygons saved");
    }

    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json!({ "polygons": features }))?);
        }
        OutputFormat::Text => {
            println!("{:<38} {:<24} {}", "ID", "NAME", "CREATED");
            for feature in features {
                println!(
                    "{:<38} {:<24} {}",
                    feature_id(feature).unwrap_or_else(|| "-".to_string()),
                    property(feature, "name"),
                    property(feature, "created_at"),
                );
            }
        }
    }
    Ok(())
}

fn property(feature: &Feature, key: &str) -> String {
    match feature.property(key) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_formats_non_strings() {
        let feature = Feature {
            bbox: None,
            geometry: None,
            id: None,
            properties: json!({"name": "Field A", "area": 2.5}).as_object().cloned(),
            foreign_members: None,
        };

        assert_eq!(property(&feature, "name"), "Field A");
        assert_eq!(property(&feature, "area"), "2.5");
        assert_eq!(property(&feature, "missing"), "-");
    }
}
