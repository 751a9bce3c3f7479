//! Record rules: numeric range, required fields, SLA time difference

use super::timestamp::parse_timestamp;
use super::{Check, RuleFault};
use crate::rule::{NumericRangeParams, RequiredFieldParams, SlaTimeDifferenceParams};
use qc_core::{Evidence, EvidenceKind, NormalizedInput};
use serde_json::{json, Map, Value};

fn record_of(input: &NormalizedInput) -> Result<&Map<String, Value>, RuleFault> {
    match input {
        NormalizedInput::Record { record } => Ok(record),
        _ => Err(RuleFault::mismatch("record", input)),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

pub(super) fn numeric_range(
    params: &NumericRangeParams,
    input: &NormalizedInput,
) -> Result<Check, RuleFault> {
    let record = record_of(input)?;
    let path = params.field_path.to_string();

    let raw = match params.field_path.resolve(record) {
        Some(value) if !value.is_null() => value,
        _ => {
            return Ok(Check::Fail(vec![Evidence::new(
                EvidenceKind::FieldMissing,
                format!("Field {} is missing", path),
            )
            .with_path(path)]))
        }
    };

    let value = match as_number(raw) {
        Some(v) => v,
        None => {
            return Ok(Check::Fail(vec![Evidence::new(
                EvidenceKind::ValueOutOfRange,
                format!("Field {} is not numeric", path),
            )
            .with_path(path)]))
        }
    };

    let above_min = params.min.map_or(true, |min| {
        if params.inclusive_min {
            value >= min
        } else {
            value > min
        }
    });
    let below_max = params.max.map_or(true, |max| {
        if params.inclusive_max {
            value <= max
        } else {
            value < max
        }
    });

    let meta = json!({
        "value": value,
        "min": params.min,
        "max": params.max,
        "inclusiveMin": params.inclusive_min,
        "inclusiveMax": params.inclusive_max,
    });

    if above_min && below_max {
        Ok(Check::Pass(vec![Evidence::new(
            EvidenceKind::ValueInRange,
            format!("Value {} is within the allowed range", value),
        )
        .with_path(path)
        .with_meta(meta)]))
    } else {
        Ok(Check::Fail(vec![Evidence::new(
            EvidenceKind::ValueOutOfRange,
            format!("Value {} is outside the allowed range", value),
        )
        .with_path(path)
        .with_meta(meta)]))
    }
}

fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}

pub(super) fn required_field(
    params: &RequiredFieldParams,
    input: &NormalizedInput,
) -> Result<Check, RuleFault> {
    let record = record_of(input)?;

    let missing: Vec<Evidence> = params
        .field_paths
        .iter()
        .filter(|path| !is_present(path.resolve(record)))
        .map(|path| {
            Evidence::new(
                EvidenceKind::FieldMissing,
                format!("Required field {} is missing or empty", path),
            )
            .with_path(path.to_string())
        })
        .collect();

    if missing.is_empty() {
        Ok(Check::Pass(vec![Evidence::new(
            EvidenceKind::FieldPresent,
            format!("All {} required fields are present", params.field_paths.len()),
        )]))
    } else {
        Ok(Check::Fail(missing))
    }
}

pub(super) fn sla_time_difference(
    params: &SlaTimeDifferenceParams,
    input: &NormalizedInput,
) -> Result<Check, RuleFault> {
    let record = record_of(input)?;

    let mut timestamps = Vec::with_capacity(2);
    for path in [&params.start_field_path, &params.end_field_path] {
        let label = path.to_string();
        let value = match path.resolve(record) {
            Some(value) if !value.is_null() => value,
            _ => {
                return Ok(Check::Fail(vec![Evidence::new(
                    EvidenceKind::FieldMissing,
                    format!("Timestamp field {} is missing", label),
                )
                .with_path(label)]))
            }
        };
        match parse_timestamp(value) {
            Some(ts) => timestamps.push(ts),
            None => {
                return Ok(Check::Fail(vec![Evidence::new(
                    EvidenceKind::TimeDifference,
                    format!("Timestamp field {} could not be parsed", label),
                )
                .with_path(label)]))
            }
        }
    }

    let difference_ms = (timestamps[1] - timestamps[0]).num_milliseconds();
    let meta = json!({
        "differenceMs": difference_ms,
        "maxDifferenceMs": params.max_difference_ms,
    });

    if difference_ms < 0 {
        return Ok(Check::Fail(vec![Evidence::new(
            EvidenceKind::TimeDifference,
            "End timestamp precedes start timestamp",
        )
        .with_meta(meta)]));
    }

    if difference_ms as u64 > params.max_difference_ms {
        Ok(Check::Fail(vec![Evidence::new(
            EvidenceKind::TimeDifference,
            format!(
                "Elapsed {} ms exceeds the {} ms limit",
                difference_ms, params.max_difference_ms
            ),
        )
        .with_meta(meta)]))
    } else {
        Ok(Check::Pass(vec![Evidence::new(
            EvidenceKind::TimeDifference,
            format!(
                "Elapsed {} ms is within the {} ms limit",
                difference_ms, params.max_difference_ms
            ),
        )
        .with_meta(meta)]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qc_core::FieldPath;

    fn record(value: Value) -> NormalizedInput {
        NormalizedInput::record(value.as_object().cloned().unwrap())
    }

    fn range(min: Option<f64>, max: Option<f64>, inclusive_max: bool) -> NumericRangeParams {
        NumericRangeParams {
            field_path: FieldPath::parse("amount"),
            min,
            max,
            inclusive_min: true,
            inclusive_max,
        }
    }

    #[test]
    fn test_exclusive_upper_bound() {
        let params = range(Some(0.0), Some(10.0), false);
        assert!(matches!(
            numeric_range(&params, &record(json!({ "amount": 10 }))),
            Ok(Check::Fail(_))
        ));
        assert!(matches!(
            numeric_range(&params, &record(json!({ "amount": 9.99 }))),
            Ok(Check::Pass(_))
        ));

        let inclusive = range(Some(0.0), Some(10.0), true);
        assert!(matches!(
            numeric_range(&inclusive, &record(json!({ "amount": "10" }))),
            Ok(Check::Pass(_))
        ));
    }

    #[test]
    fn test_missing_and_non_numeric() {
        let params = range(None, Some(5.0), true);
        assert!(matches!(
            numeric_range(&params, &record(json!({}))),
            Ok(Check::Fail(_))
        ));
        assert!(matches!(
            numeric_range(&params, &record(json!({ "amount": "n/a" }))),
            Ok(Check::Fail(_))
        ));
        assert!(matches!(
            numeric_range(&params, &NormalizedInput::text("5")),
            Err(RuleFault::InputMismatch { .. })
        ));
    }

    #[test]
    fn test_required_fields() {
        let params = RequiredFieldParams {
            field_paths: vec![FieldPath::parse("customer.email"), FieldPath::parse("orderId")],
        };
        let complete = record(json!({ "customer": { "email": "a@b.c" }, "orderId": 7 }));
        assert!(matches!(required_field(&params, &complete), Ok(Check::Pass(_))));

        let blank = record(json!({ "customer": { "email": "  " }, "orderId": null }));
        match required_field(&params, &blank) {
            Ok(Check::Fail(evidence)) => assert_eq!(evidence.len(), 2),
            other => panic!("unexpected check {:?}", other),
        }
    }

    #[test]
    fn test_sla_difference() {
        let params = SlaTimeDifferenceParams {
            start_field_path: FieldPath::parse("openedAt"),
            end_field_path: FieldPath::parse("firstReplyAt"),
            max_difference_ms: 60_000,
        };
        let fast = record(json!({
            "openedAt": "2024-03-01T10:00:00Z",
            "firstReplyAt": "2024-03-01T10:00:30Z"
        }));
        assert!(matches!(sla_time_difference(&params, &fast), Ok(Check::Pass(_))));

        let slow = record(json!({
            "openedAt": 1_709_287_200_000u64,
            "firstReplyAt": "2024-03-01T10:05:00Z"
        }));
        assert!(matches!(sla_time_difference(&params, &slow), Ok(Check::Fail(_))));

        let backwards = record(json!({
            "openedAt": "2024-03-01T10:05:00Z",
            "firstReplyAt": "2024-03-01T10:00:00Z"
        }));
        assert!(matches!(sla_time_difference(&params, &backwards), Ok(Check::Fail(_))));

        let garbage = record(json!({ "openedAt": "yesterday", "firstReplyAt": 5 }));
        assert!(matches!(sla_time_difference(&params, &garbage), Ok(Check::Fail(_))));
    }
}
