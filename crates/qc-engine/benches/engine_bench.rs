use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use qc_core::NormalizedInput;
use qc_engine::{
    evaluate, EngineOptions, KeywordBlacklistParams, RequiredPhraseParams, RuleDefinition,
    RuleKind, TextRegexParams,
};

fn rules(count: usize) -> Vec<RuleDefinition> {
    (0..count)
        .map(|i| {
            let kind = match i % 3 {
                0 => RuleKind::TextRequiredPhrase(RequiredPhraseParams {
                    phrase: format!("order {}", i),
                    case_sensitive: false,
                    field_path: None,
                }),
                1 => RuleKind::TextKeywordBlacklist(KeywordBlacklistParams {
                    keywords: vec!["refund".into(), "lawsuit".into()],
                    case_sensitive: false,
                    field_path: None,
                }),
                _ => RuleKind::TextRegex(TextRegexParams {
                    pattern: r"\b\d{3}-\d{4}\b".into(),
                    flags: "i".into(),
                    must_match: false,
                    field_path: None,
                }),
            };
            RuleDefinition::new(format!("rule-{}", i), format!("Rule {}", i), kind)
        })
        .collect()
}

fn bench_evaluate(c: &mut Criterion) {
    let transcript = "Operator: Hello, thanks for calling about order 12.\n".repeat(200);
    let input = NormalizedInput::text(transcript);
    let options = EngineOptions::default();

    for count in [10, 100, 500] {
        let rules = rules(count);
        c.bench_function(&format!("evaluate_{}_rules", count), |b| {
            b.iter(|| {
                evaluate(
                    black_box(&input),
                    black_box(&rules),
                    Utc::now(),
                    None,
                    &options,
                )
            })
        });
    }
}

criterion_group!(benches, bench_evaluate);
criterion_main!(benches);
