//! Forgiving decoders for model-generated JSON.
//!
//! Vision and text models return numbers as strings, vary the case of
//! enum values and leave fields blank. These helpers normalize such values
//! at the collaborator boundary so pipeline code only sees typed data.

use serde::{Deserialize, Deserializer};
use std::str::FromStr;

#[derive(Deserialize)]
#[serde(untagged)]
enum RawNumber {
    Number(f64),
    Text(String),
}

/// Number or numeric string ("$12.50", "1,200"). Unparseable values become `None`.
pub(crate) fn number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<RawNumber>::deserialize(deserializer)? {
        Some(RawNumber::Number(n)) => Some(n),
        Some(RawNumber::Text(s)) => s
            .trim()
            .trim_start_matches('$')
            .replace(',', "")
            .parse()
            .ok(),
        None => None,
    })
}

/// Integer id given as a number or numeric string. Anything else becomes `None`.
pub(crate) fn identifier<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<RawNumber>::deserialize(deserializer)? {
        Some(RawNumber::Number(n)) if n.fract() == 0.0 => Some(n as i64),
        Some(RawNumber::Number(_)) => None,
        Some(RawNumber::Text(s)) => s.trim().trim_start_matches('#').parse().ok(),
        None => None,
    })
}

/// Whole-number level such as spice or richness.
pub(crate) fn level<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(number(deserializer)?.map(|n| n.round() as i32))
}

/// Optional text with blanks collapsed to `None`.
pub(crate) fn text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty()))
}

/// Enum value, falling back to its default when missing or unknown.
pub(crate) fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + Default,
{
    Ok(Option::<String>::deserialize(deserializer)?
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or_default())
}

/// Enum value, `None` when missing or unknown.
pub(crate) fn optional<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
{
    Ok(Option::<String>::deserialize(deserializer)?.and_then(|s| s.trim().parse().ok()))
}

/// List of enum values; unknown entries map to the default, duplicates are dropped.
pub(crate) fn list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + Default + PartialEq,
{
    let mut values = Vec::new();
    for raw in Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default() {
        let value = raw.trim().parse().unwrap_or_default();
        if !values.contains(&value) {
            values.push(value);
        }
    }
    Ok(values)
}

/// List of non-blank strings.
pub(crate) fn strings<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?
        .unwrap_or_default()
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}
