//! Warehouse type mappings.
//!
//! The statement API returns every cell as a JSON string (or null) alongside
//! the column's type name. `TypeCategory` classifies the type name and
//! [`decode_cell`] turns the string back into a typed JSON value.

use crate::models::ColumnMetadata;
use serde_json::Value as JsonValue;

/// Logical category for warehouse column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Text,
    Complex,
}

/// Classify a warehouse type name (`INT`, `DECIMAL(10,2)`, `ARRAY<STRING>`, ...).
pub fn categorize_type(type_name: &str) -> TypeCategory {
    let upper = type_name.trim().to_ascii_uppercase();
    let base = upper
        .split(|c| c == '(' || c == '<')
        .next()
        .unwrap_or_default()
        .trim();

    match base {
        "TINYINT" | "BYTE" | "SMALLINT" | "SHORT" | "INT" | "INTEGER" | "BIGINT" | "LONG" => {
            TypeCategory::Integer
        }
        "FLOAT" | "REAL" | "DOUBLE" => TypeCategory::Float,
        "DECIMAL" | "DEC" | "NUMERIC" => TypeCategory::Decimal,
        "BOOLEAN" | "BOOL" => TypeCategory::Boolean,
        "ARRAY" | "MAP" | "STRUCT" => TypeCategory::Complex,
        // STRING, DATE, TIMESTAMP, INTERVAL, BINARY and anything unknown
        _ => TypeCategory::Text,
    }
}

/// Decode one cell. Values that do not parse as their declared type stay strings.
pub fn decode_cell(raw: &JsonValue, category: TypeCategory) -> JsonValue {
    let text = match raw {
        JsonValue::Null => return JsonValue::Null,
        JsonValue::String(s) => s.as_str(),
        // Already typed (some formats inline numbers/booleans)
        other => return other.clone(),
    };

    match category {
        TypeCategory::Integer => text
            .parse::<i64>()
            .map(JsonValue::from)
            .unwrap_or_else(|_| JsonValue::String(text.to_string())),
        TypeCategory::Float | TypeCategory::Decimal => text
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(JsonValue::Number)
            .unwrap_or_else(|| JsonValue::String(text.to_string())),
        TypeCategory::Boolean => match text {
            "true" | "TRUE" | "True" => JsonValue::Bool(true),
            "false" | "FALSE" | "False" => JsonValue::Bool(false),
            _ => JsonValue::String(text.to_string()),
        },
        TypeCategory::Complex => serde_json::from_str(text)
            .unwrap_or_else(|_| JsonValue::String(text.to_string())),
        TypeCategory::Text => JsonValue::String(text.to_string()),
    }
}

/// Build a row map from positional cells.
pub fn decode_row(
    columns: &[ColumnMetadata],
    categories: &[TypeCategory],
    cells: &[JsonValue],
) -> serde_json::Map<String, JsonValue> {
    columns
        .iter()
        .zip(categories)
        .enumerate()
        .map(|(idx, (col, category))| {
            let value = cells
                .get(idx)
                .map(|raw| decode_cell(raw, *category))
                .unwrap_or(JsonValue::Null);
            (col.name.clone(), value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_categorize_type() {
        assert_eq!(categorize_type("INT"), TypeCategory::Integer);
        assert_eq!(categorize_type("bigint"), TypeCategory::Integer);
        assert_eq!(categorize_type("DECIMAL(10,2)"), TypeCategory::Decimal);
        assert_eq!(categorize_type("DOUBLE"), TypeCategory::Float);
        assert_eq!(categorize_type("ARRAY<STRING>"), TypeCategory::Complex);
        assert_eq!(categorize_type("TIMESTAMP"), TypeCategory::Text);
    }

    #[test]
    fn test_decode_cell() {
        assert_eq!(decode_cell(&json!("2023"), TypeCategory::Integer), json!(2023));
        assert_eq!(decode_cell(&json!("2.5"), TypeCategory::Decimal), json!(2.5));
        assert_eq!(decode_cell(&json!("true"), TypeCategory::Boolean), json!(true));
        assert_eq!(decode_cell(&JsonValue::Null, TypeCategory::Integer), JsonValue::Null);
        assert_eq!(decode_cell(&json!("n/a"), TypeCategory::Integer), json!("n/a"));
        assert_eq!(decode_cell(&json!("[1,2]"), TypeCategory::Complex), json!([1, 2]));
    }

    #[test]
    fn test_decode_row_pads_missing_cells() {
        let columns = vec![
            ColumnMetadata::new("season", "INT", false),
            ColumnMetadata::new("driverName", "STRING", true),
        ];
        let categories: Vec<_> = columns.iter().map(|c| categorize_type(&c.type_name)).collect();
        let row = decode_row(&columns, &categories, &[json!("2023")]);
        assert_eq!(row["season"], json!(2023));
        assert_eq!(row["driverName"], JsonValue::Null);
    }
}
