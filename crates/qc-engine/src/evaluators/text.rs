//! Text rules: regex, keyword blacklist, required phrase

use super::{Check, RuleFault};
use crate::rule::{build_regex, KeywordBlacklistParams, RequiredPhraseParams, TextRegexParams};
use qc_core::{value_to_text, Evidence, EvidenceKind, FieldPath, NormalizedInput};
use serde_json::json;
use std::borrow::Cow;

const SNIPPET_CHARS: usize = 120;

/// Text under inspection. Record inputs read `field_path` (missing → empty)
/// or their canonical JSON when no path is configured.
fn extract_text<'a>(
    input: &'a NormalizedInput,
    field_path: Option<&FieldPath>,
) -> Result<Cow<'a, str>, RuleFault> {
    match input {
        NormalizedInput::Text { text, .. } => Ok(Cow::Borrowed(text.as_str())),
        NormalizedInput::Record { record } => match field_path {
            Some(path) => Ok(Cow::Owned(
                path.resolve(record)
                    .and_then(value_to_text)
                    .unwrap_or_default(),
            )),
            None => Ok(Cow::Owned(
                serde_json::to_string(record).unwrap_or_default(),
            )),
        },
        _ => Err(RuleFault::mismatch("text or record", input)),
    }
}

fn with_location(evidence: Evidence, field_path: Option<&FieldPath>) -> Evidence {
    match field_path {
        Some(path) => evidence.with_path(path.to_string()),
        None => evidence,
    }
}

fn snippet(text: &str) -> String {
    if text.chars().count() <= SNIPPET_CHARS {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(SNIPPET_CHARS).collect();
        cut.push('…');
        cut
    }
}

pub(super) fn regex(params: &TextRegexParams, input: &NormalizedInput) -> Result<Check, RuleFault> {
    let text = extract_text(input, params.field_path.as_ref())?;
    let re = build_regex(&params.pattern, &params.flags)
        .map_err(|e| RuleFault::InvalidPattern(e.to_string()))?;
    let path = params.field_path.as_ref();

    match (re.find(&text), params.must_match) {
        (Some(m), true) => Ok(Check::Pass(vec![with_location(
            Evidence::new(EvidenceKind::PatternMatch, "Required pattern was found")
                .with_meta(json!({ "match": snippet(m.as_str()), "offset": m.start() })),
            path,
        )])),
        (Some(m), false) => Ok(Check::Fail(vec![with_location(
            Evidence::new(EvidenceKind::PatternMatch, "Forbidden pattern was found")
                .with_meta(json!({ "match": snippet(m.as_str()), "offset": m.start() })),
            path,
        )])),
        (None, true) => Ok(Check::Fail(vec![with_location(
            Evidence::new(EvidenceKind::PatternMissing, "Required pattern was not found"),
            path,
        )])),
        (None, false) => Ok(Check::Pass(vec![with_location(
            Evidence::new(EvidenceKind::PatternMissing, "Forbidden pattern was not found"),
            path,
        )])),
    }
}

pub(super) fn keyword_blacklist(
    params: &KeywordBlacklistParams,
    input: &NormalizedInput,
) -> Result<Check, RuleFault> {
    let text = extract_text(input, params.field_path.as_ref())?;
    let haystack = if params.case_sensitive {
        text.into_owned()
    } else {
        text.to_lowercase()
    };
    let path = params.field_path.as_ref();

    let mut hits: Vec<(&String, usize)> = Vec::new();
    for keyword in &params.keywords {
        let needle = if params.case_sensitive {
            keyword.clone()
        } else {
            keyword.to_lowercase()
        };
        let count = haystack.matches(needle.as_str()).count();
        if count > 0 && !hits.iter().any(|(k, _)| *k == keyword) {
            hits.push((keyword, count));
        }
    }

    if hits.is_empty() {
        return Ok(Check::Pass(vec![with_location(
            Evidence::new(EvidenceKind::KeywordAbsent, "No blacklisted keywords were found"),
            path,
        )]));
    }

    let evidence = hits
        .into_iter()
        .map(|(keyword, count)| {
            with_location(
                Evidence::new(
                    EvidenceKind::KeywordHit,
                    format!("Blacklisted keyword \"{}\" found", keyword),
                )
                .with_meta(json!({ "keyword": keyword, "count": count })),
                path,
            )
        })
        .collect();
    Ok(Check::Fail(evidence))
}

pub(super) fn required_phrase(
    params: &RequiredPhraseParams,
    input: &NormalizedInput,
) -> Result<Check, RuleFault> {
    let text = extract_text(input, params.field_path.as_ref())?;
    let found = if params.case_sensitive {
        text.contains(params.phrase.as_str())
    } else {
        text.to_lowercase().contains(&params.phrase.to_lowercase())
    };
    let path = params.field_path.as_ref();

    if found {
        Ok(Check::Pass(vec![with_location(
            Evidence::new(
                EvidenceKind::PhraseFound,
                format!("Required phrase \"{}\" was found", params.phrase),
            ),
            path,
        )]))
    } else {
        Ok(Check::Fail(vec![with_location(
            Evidence::new(
                EvidenceKind::PhraseMissing,
                format!("Required phrase \"{}\" was not found", params.phrase),
            ),
            path,
        )]))
    }
}
