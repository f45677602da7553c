//! Shared utility functions used across the codebase.

use serde::{Deserialize, Deserializer, Serializer};
use std::time::Duration;

/// Parse a duration given as bare seconds (`"120"`) or with unit suffixes
/// (`"90s"`, `"1m"`, `"5h"`, `"2d"`, `"1h30m"`).
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("empty duration".to_string());
    }
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let mut total: u64 = 0;
    let mut digits = String::new();
    for ch in s.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
            continue;
        }
        let unit: u64 = match ch {
            's' => 1,
            'm' => 60,
            'h' => 60 * 60,
            'd' => 24 * 60 * 60,
            _ => return Err(format!("invalid duration unit '{}' in {:?}", ch, input)),
        };
        if digits.is_empty() {
            return Err(format!("missing number before '{}' in {:?}", ch, input));
        }
        let value: u64 = digits
            .parse()
            .map_err(|e| format!("invalid duration {:?}: {}", input, e))?;
        digits.clear();
        total = value
            .checked_mul(unit)
            .and_then(|secs| total.checked_add(secs))
            .ok_or_else(|| format!("duration {:?} overflows", input))?;
    }
    if !digits.is_empty() {
        return Err(format!("missing unit after {} in {:?}", digits, input));
    }
    Ok(Duration::from_secs(total))
}

/// Duration accepted in request bodies: integer seconds or a duration string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DurationInput {
    Seconds(u64),
    Text(String),
}

impl DurationInput {
    pub fn into_duration(self) -> Result<Duration, String> {
        match self {
            Self::Seconds(secs) => Ok(Duration::from_secs(secs)),
            Self::Text(text) => parse_duration(&text),
        }
    }
}

/// `deserialize_with` helper for optional request durations.
pub fn deserialize_opt_duration<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<DurationInput>::deserialize(deserializer)?
        .map(|input| input.into_duration().map_err(serde::de::Error::custom))
        .transpose()
}

/// Serde adapter storing a `Duration` as whole seconds.
pub mod duration_secs {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

/// Read an optional duration from the environment.
pub fn env_var_duration(name: &str) -> Result<Option<Duration>, String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => parse_duration(&value).map(Some),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_accepts_units() {
        assert_eq!(parse_duration("120").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("1m").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_duration("5h").unwrap(), Duration::from_secs(5 * 3600));
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("2d").unwrap(), Duration::from_secs(172_800));
        assert_eq!(parse_duration(" 0 ").unwrap(), Duration::ZERO);
    }

    #[test]
    fn parse_duration_rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("5x").is_err());
        assert!(parse_duration("h").is_err());
        assert!(parse_duration("10m5").is_err());
        assert!(parse_duration("-5s").is_err());
    }

    #[test]
    fn duration_input_from_json() {
        #[derive(Deserialize)]
        struct Body {
            #[serde(default, deserialize_with = "deserialize_opt_duration")]
            ttl: Option<Duration>,
        }

        let body: Body = serde_json::from_str(r#"{"ttl": 30}"#).unwrap();
        assert_eq!(body.ttl, Some(Duration::from_secs(30)));

        let body: Body = serde_json::from_str(r#"{"ttl": "1m"}"#).unwrap();
        assert_eq!(body.ttl, Some(Duration::from_secs(60)));

        let body: Body = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(body.ttl, None);

        assert!(serde_json::from_str::<Body>(r#"{"ttl": "soon"}"#).is_err());
    }
}
