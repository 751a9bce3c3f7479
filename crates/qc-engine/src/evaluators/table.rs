//! Table rules: upper-case columns and required headers

use super::{Check, RuleFault};
use crate::rule::{AllCapsParams, RequiredColumnsParams};
use qc_core::{value_to_text, Evidence, EvidenceKind, NormalizedInput};
use serde_json::{json, Map, Value};

type Rows = [Map<String, Value>];

fn table_of(input: &NormalizedInput) -> Result<(&[String], &Rows), RuleFault> {
    match input {
        NormalizedInput::Table { columns, rows } => Ok((columns.as_slice(), rows.as_slice())),
        _ => Err(RuleFault::mismatch("table", input)),
    }
}

/// Upper-case ratio over alphabetic characters; `None` when the column has
/// no letters at all.
fn uppercase_ratio(rows: &Rows, column: &str) -> Option<f64> {
    let mut letters = 0usize;
    let mut upper = 0usize;
    for cell in rows.iter().filter_map(|row| row.get(column)) {
        let text = match cell {
            Value::String(s) => s.clone(),
            other => match value_to_text(other) {
                Some(t) => t,
                None => continue,
            },
        };
        for c in text.chars().filter(|c| c.is_alphabetic()) {
            letters += 1;
            if c.is_uppercase() {
                upper += 1;
            }
        }
    }
    (letters > 0).then(|| upper as f64 / letters as f64)
}

pub(super) fn all_caps(params: &AllCapsParams, input: &NormalizedInput) -> Result<Check, RuleFault> {
    let (columns, rows) = table_of(input)?;
    let targets: Vec<&String> = if params.columns.is_empty() {
        columns.iter().collect()
    } else {
        params.columns.iter().collect()
    };

    let mut failures = Vec::new();
    let mut checked = Vec::new();
    for column in targets {
        if !columns.contains(column) {
            failures.push(
                Evidence::new(EvidenceKind::ColumnCheck, format!("Column {} is not present", column))
                    .with_path(column.clone()),
            );
            continue;
        }
        match uppercase_ratio(rows, column) {
            Some(ratio) if ratio < params.threshold => failures.push(
                Evidence::new(
                    EvidenceKind::ColumnCheck,
                    format!("Column {} is not upper-case", column),
                )
                .with_path(column.clone())
                .with_meta(json!({ "ratio": ratio, "threshold": params.threshold })),
            ),
            _ => checked.push(column.clone()),
        }
    }

    if failures.is_empty() {
        Ok(Check::Pass(vec![Evidence::new(
            EvidenceKind::ColumnCheck,
            format!("{} columns are upper-case", checked.len()),
        )
        .with_meta(json!({ "columns": checked }))]))
    } else {
        Ok(Check::Fail(failures))
    }
}

pub(super) fn required_columns(
    params: &RequiredColumnsParams,
    input: &NormalizedInput,
) -> Result<Check, RuleFault> {
    let (columns, _) = table_of(input)?;
    let normalize = |s: &str| {
        let trimmed = s.trim();
        if params.case_sensitive {
            trimmed.to_string()
        } else {
            trimmed.to_lowercase()
        }
    };
    let present: Vec<String> = columns.iter().map(|c| normalize(c)).collect();

    let missing: Vec<&String> = params
        .columns
        .iter()
        .filter(|required| !present.contains(&normalize(required)))
        .collect();

    if missing.is_empty() {
        Ok(Check::Pass(vec![Evidence::new(
            EvidenceKind::ColumnCheck,
            format!("All {} required columns are present", params.columns.len()),
        )]))
    } else {
        Ok(Check::Fail(
            missing
                .into_iter()
                .map(|column| {
                    Evidence::new(
                        EvidenceKind::ColumnCheck,
                        format!("Required column {} is missing", column),
                    )
                    .with_path(column.clone())
                })
                .collect(),
        ))
    }
}
