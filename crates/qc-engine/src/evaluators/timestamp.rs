//! Timestamp parsing for SLA rules: ISO-8601 strings or epoch numbers

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

/// Numbers at or above this magnitude are epoch milliseconds, below it
/// epoch seconds.
const EPOCH_MILLIS_FLOOR: f64 = 1e11;

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n.as_f64().and_then(from_epoch),
        Value::String(s) => parse_str(s.trim()),
        _ => None,
    }
}

fn from_epoch(raw: f64) -> Option<DateTime<Utc>> {
    if !raw.is_finite() {
        return None;
    }
    let millis = if raw.abs() >= EPOCH_MILLIS_FLOOR {
        raw
    } else {
        raw * 1000.0
    };
    Utc.timestamp_millis_opt(millis.round() as i64).single()
}

fn parse_str(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Naive date-times are taken as UTC
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| Utc.from_utc_datetime(&naive));
    }
    s.parse::<f64>().ok().and_then(from_epoch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_iso_variants_agree() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).single();
        assert_eq!(parse_timestamp(&json!("2024-03-01T10:00:00Z")), expected);
        assert_eq!(parse_timestamp(&json!("2024-03-01T12:00:00+02:00")), expected);
        assert_eq!(parse_timestamp(&json!("2024-03-01T10:00:00")), expected);
        assert_eq!(parse_timestamp(&json!("2024-03-01 10:00:00.000")), expected);
    }

    #[test]
    fn test_epoch_seconds_and_millis() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).single();
        assert_eq!(parse_timestamp(&json!(1_709_287_200)), expected);
        assert_eq!(parse_timestamp(&json!(1_709_287_200_000u64)), expected);
        assert_eq!(parse_timestamp(&json!("1709287200")), expected);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(parse_timestamp(&json!("soon")).is_none());
        assert!(parse_timestamp(&json!(true)).is_none());
        assert!(parse_timestamp(&json!("")).is_none());
    }
}
