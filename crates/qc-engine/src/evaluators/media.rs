//! Audio duration and AI-signal rules

use super::{Check, RuleFault};
use crate::rule::{AudioDurationParams, ImpliedAbuseParams, ToneParams};
use qc_core::{AiSignals, Evidence, EvidenceKind, NormalizedInput};
use serde_json::json;

pub(super) fn audio_duration(
    params: &AudioDurationParams,
    input: &NormalizedInput,
) -> Result<Check, RuleFault> {
    let duration_ms = match input {
        NormalizedInput::Audio { duration_ms, .. } => *duration_ms,
        _ => return Err(RuleFault::mismatch("audio", input)),
    };
    let meta = json!({
        "durationMs": duration_ms,
        "maxDurationMs": params.max_duration_ms,
        "minDurationMs": params.min_duration_ms,
    });

    if duration_ms > params.max_duration_ms {
        return Ok(Check::Fail(vec![Evidence::new(
            EvidenceKind::DurationCheck,
            format!("Audio lasts {} ms, above the {} ms limit", duration_ms, params.max_duration_ms),
        )
        .with_meta(meta)]));
    }
    if let Some(min) = params.min_duration_ms.filter(|min| duration_ms < *min) {
        return Ok(Check::Fail(vec![Evidence::new(
            EvidenceKind::DurationCheck,
            format!("Audio lasts {} ms, below the {} ms minimum", duration_ms, min),
        )
        .with_meta(meta)]));
    }
    Ok(Check::Pass(vec![Evidence::new(
        EvidenceKind::DurationCheck,
        format!("Audio duration {} ms is within limits", duration_ms),
    )
    .with_meta(meta)]))
}

pub(super) fn tone(params: &ToneParams, signals: Option<&AiSignals>) -> Result<Check, RuleFault> {
    let Some(tone) = signals.and_then(|s| s.tone.as_ref()) else {
        return Ok(Check::NotApplicable("No tone signal supplied".to_string()));
    };
    let meta = json!({ "label": tone.label, "confidence": tone.confidence });
    let disallowed = params
        .disallowed_labels
        .iter()
        .any(|label| label.eq_ignore_ascii_case(tone.label.trim()));

    if disallowed && tone.confidence >= params.min_confidence {
        Ok(Check::Fail(vec![Evidence::new(
            EvidenceKind::Signal,
            format!("Disallowed tone {} detected", tone.label),
        )
        .with_meta(meta)]))
    } else {
        Ok(Check::Pass(vec![Evidence::new(
            EvidenceKind::Signal,
            format!("Tone {} is acceptable", tone.label),
        )
        .with_meta(meta)]))
    }
}

pub(super) fn implied_abuse(
    params: &ImpliedAbuseParams,
    signals: Option<&AiSignals>,
) -> Result<Check, RuleFault> {
    let Some(abuse) = signals.and_then(|s| s.implied_abuse.as_ref()) else {
        return Ok(Check::NotApplicable("No implied abuse signal supplied".to_string()));
    };
    let meta = json!({ "confidence": abuse.confidence, "threshold": params.threshold });

    if abuse.confidence >= params.threshold {
        Ok(Check::Fail(vec![Evidence::new(
            EvidenceKind::Signal,
            "Implied abuse detected",
        )
        .with_meta(meta)]))
    } else {
        Ok(Check::Pass(vec![Evidence::new(
            EvidenceKind::Signal,
            "No implied abuse detected",
        )
        .with_meta(meta)]))
    }
}
