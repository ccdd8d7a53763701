//! Argument checks shared by the tool handlers.
//!
//! Every check runs before any SQL is built, so a bad argument fails with
//! `InvalidArgument` and never reaches the validator.

use crate::error::{GatewayError, GatewayResult};

pub const MIN_SEASON: i64 = 1950;
pub const MAX_SEASON: i64 = 2100;

/// Maximum length of a free-text filter value.
const MAX_FILTER_LENGTH: usize = 100;

/// Check an optional season against the championship range.
pub fn season(value: Option<i64>) -> GatewayResult<Option<i64>> {
    value.map(required_season).transpose()
}

pub fn required_season(value: i64) -> GatewayResult<i64> {
    if (MIN_SEASON..=MAX_SEASON).contains(&value) {
        Ok(value)
    } else {
        Err(GatewayError::invalid_argument(
            "season",
            format!("must be between {} and {}", MIN_SEASON, MAX_SEASON),
        ))
    }
}

/// Trim a free-text filter. Blank values count as absent.
pub fn filter_text(name: &str, value: Option<&str>) -> GatewayResult<Option<String>> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    if value.chars().count() > MAX_FILTER_LENGTH {
        return Err(GatewayError::invalid_argument(
            name,
            format!("must be at most {} characters", MAX_FILTER_LENGTH),
        ));
    }
    if value.chars().any(char::is_control) {
        return Err(GatewayError::invalid_argument(
            name,
            "must not contain control characters",
        ));
    }
    Ok(Some(value.to_string()))
}

/// Like [`filter_text`] but the value must be present.
pub fn required_text(name: &str, value: &str) -> GatewayResult<String> {
    filter_text(name, Some(value))?
        .ok_or_else(|| GatewayError::invalid_argument(name, "must not be empty"))
}

/// Resolve an optional count against `1..=max`.
pub fn bounded(name: &str, value: Option<u32>, default: u32, max: u32) -> GatewayResult<u32> {
    match value {
        None => Ok(default),
        Some(n) if (1..=max).contains(&n) => Ok(n),
        Some(_) => Err(GatewayError::invalid_argument(
            name,
            format!("must be between 1 and {}", max),
        )),
    }
}

/// Reduce a possibly qualified table name to its last part and check it is a
/// plain identifier.
pub fn table_identifier(value: &str) -> GatewayResult<String> {
    let name = value.trim();
    let name = name.rsplit('.').next().unwrap_or(name);
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(GatewayError::invalid_argument(
            "table_name",
            "must contain only letters, digits and underscores",
        ));
    }
    Ok(name.to_string())
}

/// `total_points` -> `Total Points`
pub fn title_case(name: &str) -> String {
    name.split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
