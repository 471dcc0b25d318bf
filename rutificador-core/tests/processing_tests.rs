//! End-to-end behaviour through the public API
//!
//! Exercises classification, masking, tokenization and batch processing the
//! way an embedding application would: one shared checksum cache, one
//! validator, one processor.

use rutificador_core::mask::TOKEN_PREFIX;
use rutificador_core::{
    BatchProcessor, ChecksumCache, ErrorCode, FormatOptions, ItemOutcome, MaskOptions, Rigor,
    RutConfig, RutInput, RutValidator, ValidationState,
};
use std::sync::Arc;

fn shared_validator() -> RutValidator {
    RutValidator::new(RutConfig::default(), Arc::new(ChecksumCache::new(128)))
}

#[test]
fn test_typing_sequence_states() {
    let validator = shared_validator();
    let states: Vec<ValidationState> = ["", "1", "12", "12.345", "12.345.678-", "12.345.678-5"]
        .into_iter()
        .map(|prefix| validator.validate(prefix).state)
        .collect();
    assert_eq!(
        states,
        [
            ValidationState::Incomplete,
            ValidationState::Possible,
            ValidationState::Possible,
            ValidationState::Possible,
            ValidationState::Possible,
            ValidationState::Valid,
        ]
    );
}

#[test]
fn test_mismatch_and_short_rut() {
    let validator = shared_validator();
    let result = validator.validate("12345678-9");
    assert_eq!(result.state, ValidationState::Invalid);
    assert_eq!(result.errors[0].code, Some(ErrorCode::DvMismatch));

    assert!(validator.validate("1-9").is_valid());
}

#[test]
fn test_dots_error_reported_first() {
    let result = shared_validator().validate("12..345");
    assert_eq!(result.state, ValidationState::Invalid);
    assert_eq!(result.errors[0].code_str(), Some("FORMAT_DOTS"));
}

#[test]
fn test_fullwidth_digits_never_accepted() {
    let inputs = [
        "\u{FF11}\u{FF12}\u{FF13}\u{FF14}\u{FF15}\u{FF16}\u{FF17}\u{FF18}-\u{FF15}",
        " \u{FF11}\u{FF12}\u{FF13}\u{FF14}\u{FF15}\u{FF16}\u{FF17}\u{FF18}-\u{FF15}",
        "\u{FF11}\u{FF12}.\u{FF13}\u{FF14}\u{FF15}.\u{FF16}\u{FF17}\u{FF18}-\u{FF15}",
    ];
    for rigor in [Rigor::Strict, Rigor::Lenient, Rigor::Legacy] {
        for input in inputs {
            let result = shared_validator().with_rigor(rigor).validate(input);
            assert_eq!(result.state, ValidationState::Invalid, "{:?} {}", rigor, input);
            assert_eq!(result.errors[0].code, Some(ErrorCode::InvalidChars));
        }
    }
}

#[test]
fn test_json_values_as_input() {
    let validator = shared_validator();
    let value = serde_json::json!(12345678);
    assert_eq!(
        validator.validate(&value).state,
        ValidationState::Possible
    );

    let value = serde_json::json!([1, 2]);
    let result = validator.validate(RutInput::from(&value));
    assert_eq!(result.state, ValidationState::Invalid);
    assert_eq!(result.errors[0].code, Some(ErrorCode::TypeError));
}

#[test]
fn test_masking() {
    let validator = shared_validator();
    assert_eq!(
        validator
            .mask("12.345.678-5", &MaskOptions::masked(3, 'X'))
            .unwrap(),
        "XXXXX678-5"
    );
    assert_eq!(
        validator
            .mask("12345678-5", &MaskOptions::masked(8, '*'))
            .unwrap(),
        "12345678-5"
    );
}

#[test]
fn test_tokens_are_keyed() {
    let validator = shared_validator();
    let a1 = validator.mask("12345678-5", &MaskOptions::token("key-a")).unwrap();
    let a2 = validator.mask("12.345.678-5", &MaskOptions::token("key-a")).unwrap();
    let b = validator.mask("12345678-5", &MaskOptions::token("key-b")).unwrap();
    assert_eq!(a1, a2);
    assert_ne!(a1, b);
    assert!(a1.starts_with(TOKEN_PREFIX));
    assert!(b.starts_with(TOKEN_PREFIX));
}

#[test]
fn test_stream_contract() {
    let processor = BatchProcessor::new(shared_validator());
    let outcomes: Vec<ItemOutcome> = processor
        .validate_stream(vec!["12.345.678-5", "12.345.678-1", "abc", "9"])
        .collect();
    let valid: Vec<bool> = outcomes.iter().map(ItemOutcome::is_valid).collect();
    assert_eq!(valid, [true, false, false, false]);

    let states: Vec<ValidationState> = processor
        .results(["12.345.678-5", "12.345.678-1", "abc", "9"])
        .map(|r| r.state)
        .collect();
    assert_eq!(
        states,
        [
            ValidationState::Valid,
            ValidationState::Invalid,
            ValidationState::Invalid,
            ValidationState::Possible,
        ]
    );
}

#[test]
fn test_stream_is_lazy() {
    let processor = BatchProcessor::new(shared_validator());
    // Unbounded input: only the items pulled are classified
    let endless = (1u64..).map(|n| n.to_string());
    let first: Vec<ItemOutcome> = processor.validate_stream(endless).take(3).collect();
    assert_eq!(first.len(), 3);
}

#[test]
fn test_parallel_and_sequential_agree() {
    let validator = shared_validator();
    let items: Vec<String> = (0..2500u32)
        .map(|i| match i % 5 {
            0 => format!("{}-k", 1_000_000 + i),
            1 => String::new(),
            2 => format!("{}", 2_000_000 + i),
            _ => {
                let base = (3_000_000 + i).to_string();
                let dv = validator.verification_digit(&base).unwrap();
                format!("{}-{}", base, dv)
            }
        })
        .collect();

    let processor = BatchProcessor::new(validator).with_chunk_size(100);
    let sequential = processor.validate_batch(&items, false);
    let parallel = processor.validate_batch(&items, true);

    assert_eq!(sequential.valid_items, parallel.valid_items);
    assert_eq!(sequential.invalid_items, parallel.invalid_items);
    assert_eq!(sequential.total_processed, 2500);
    assert_eq!(
        sequential.valid_items.len() + sequential.invalid_items.len(),
        2500
    );
}

#[test]
fn test_invalid_items_keep_original_text() {
    let processor = BatchProcessor::new(shared_validator());
    let result = processor.validate_batch(&["  ", "12.345.678-9", "x1"], false);
    let subjects: Vec<&str> = result
        .invalid_items
        .iter()
        .map(|d| d.subject.as_deref().unwrap())
        .collect();
    assert_eq!(subjects, ["  ", "12.345.678-9", "x1"]);
    assert!(result.invalid_items.iter().all(|d| !d.hint.is_empty()));
}

#[test]
fn test_empty_batch() {
    let processor = BatchProcessor::new(shared_validator());
    let result = processor.validate_batch::<String>(&[], false);
    assert_eq!(result.success_rate(), 0.0);
    assert!(result.valid_items.is_empty());
}

#[test]
fn test_format_batch_xml() {
    let processor = BatchProcessor::new(shared_validator());
    let report = processor
        .format_batch(
            &["6-k", "12345678-5"],
            &FormatOptions::default().thousands(true).uppercase(true),
            Some("xml"),
            true,
        )
        .unwrap();
    assert!(report.contains("<rut>6-K</rut>"));
    assert!(report.contains("<rut>12.345.678-5</rut>"));
    assert!(report.contains("- Success rate: 100.0%"));
}

#[test]
fn test_cache_shared_across_validators() {
    let cache = Arc::new(ChecksumCache::new(8));
    let strict = RutValidator::new(RutConfig::default(), Arc::clone(&cache));
    let lenient = strict.with_rigor(Rigor::Lenient);

    strict.validate("12345678-5");
    lenient.validate("12 345 678-5");
    let stats = cache.stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 1);
}
