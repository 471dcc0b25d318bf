//! Incremental classification
//!
//! Classifies input into one of four states so that a caller validating as
//! the user types can tell "keep typing" (`Incomplete`, `Possible`) apart
//! from "this is wrong" (`Invalid`).
//!
//! ```text
//! ""             -> incomplete
//! "1"            -> possible
//! "12.345"       -> possible
//! "12.345.678-"  -> possible
//! "12.345.678-5" -> valid
//! "12.345.678-9" -> invalid (DV_MISMATCH)
//! ```

use crate::checksum::{verification_digit, ChecksumCache};
use crate::config::{Rigor, RutConfig};
use crate::detail::{serialize_secs, ErrorCode, ErrorDetail};
use crate::normalize::{normalize, Normalization, RutInput};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Lifecycle state of a classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationState {
    /// Nothing usable yet
    Incomplete,
    /// Plausible prefix, not yet verifiable
    Possible,
    /// Base within bounds and check character verified
    Valid,
    /// Fatal error, out-of-bounds base or wrong check character
    Invalid,
}

impl ValidationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationState::Incomplete => "incomplete",
            ValidationState::Possible => "possible",
            ValidationState::Valid => "valid",
            ValidationState::Invalid => "invalid",
        }
    }
}

impl fmt::Display for ValidationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of classifying one input
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    /// Raw input as given
    pub original: String,
    /// `base`, `base-` or `base-dv`
    pub normalized: Option<String>,
    pub base: Option<String>,
    pub check_char: Option<char>,
    pub state: ValidationState,
    pub errors: Vec<ErrorDetail>,
    pub warnings: Vec<ErrorDetail>,
    pub rigor_used: Rigor,
    #[serde(serialize_with = "serialize_secs")]
    pub duration: Duration,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.state == ValidationState::Valid
    }

    pub fn first_error(&self) -> Option<&ErrorDetail> {
        self.errors.first()
    }
}

/// Syntactic breakdown of an input
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatMatch {
    pub normalized: Option<String>,
    pub base: Option<String>,
    /// `None` both when no hyphen was typed and when the hyphen has nothing after it
    pub check_char: Option<char>,
    pub errors: Vec<ErrorDetail>,
    pub warnings: Vec<ErrorDetail>,
}

impl From<Normalization> for FormatMatch {
    fn from(n: Normalization) -> Self {
        let (base, check_char) = match n.normalized.as_deref() {
            Some(value) => match value.split_once('-') {
                Some((base, dv)) => (Some(base.to_string()), dv.chars().next()),
                None => (Some(value.to_string()), None),
            },
            None => (None, None),
        };
        Self {
            normalized: n.normalized,
            base,
            check_char,
            errors: n.errors,
            warnings: n.warnings,
        }
    }
}

/// The three classification steps
///
/// `parse` composes them into the state machine; implementors only need to
/// provide the steps.
pub trait Validator {
    /// Rigor applied by `validate_format`
    fn rigor(&self) -> Rigor;

    /// Normalize and split into base and check character
    fn validate_format(&self, input: &RutInput) -> FormatMatch;

    /// Check the base against the configured digit bounds
    fn validate_base(&self, base: &str) -> Result<(), ErrorDetail>;

    /// Verify a supplied check character against the computed one
    fn validate_check_char(&self, base: &str, supplied: char) -> Result<(), ErrorDetail>;

    /// Classify `input`
    fn parse(&self, input: &RutInput) -> ValidationResult {
        let start = Instant::now();
        let format = self.validate_format(input);

        let mut result = ValidationResult {
            original: input.to_string(),
            normalized: format.normalized,
            base: format.base,
            check_char: format.check_char,
            state: ValidationState::Incomplete,
            errors: format.errors,
            warnings: format.warnings,
            rigor_used: self.rigor(),
            duration: Duration::ZERO,
        };

        result.state = if !result.errors.is_empty() {
            let only_empty = result
                .errors
                .iter()
                .all(|e| e.code == Some(ErrorCode::EmptyRut));
            if only_empty {
                ValidationState::Incomplete
            } else {
                ValidationState::Invalid
            }
        } else {
            match result.base.as_deref() {
                None | Some("") => ValidationState::Incomplete,
                Some(base) => match self.validate_base(base) {
                    Err(e) => {
                        result.errors.push(e);
                        ValidationState::Invalid
                    }
                    Ok(()) => match result.check_char {
                        None => ValidationState::Possible,
                        Some(dv) => match self.validate_check_char(base, dv) {
                            Ok(()) => ValidationState::Valid,
                            Err(e) => {
                                result.errors.push(e);
                                ValidationState::Invalid
                            }
                        },
                    },
                },
            }
        };

        result.duration = start.elapsed();
        debug!(
            input = %result.original,
            state = %result.state,
            errors = result.errors.len(),
            warnings = result.warnings.len(),
            "Classified RUT"
        );
        result
    }
}

/// Configured validator with an injected checksum cache
///
/// Cloning is cheap and clones share the cache.
#[derive(Debug, Clone)]
pub struct RutValidator {
    config: Arc<RutConfig>,
    cache: Arc<ChecksumCache>,
}

impl RutValidator {
    pub fn new(config: RutConfig, cache: Arc<ChecksumCache>) -> Self {
        debug!(rigor = %config.rigor(), "RutValidator initialized");
        Self {
            config: Arc::new(config),
            cache,
        }
    }

    /// Validator with its own default-sized cache
    pub fn with_config(config: RutConfig) -> Self {
        Self::new(config, Arc::new(ChecksumCache::default()))
    }

    pub fn config(&self) -> &RutConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<ChecksumCache> {
        &self.cache
    }

    /// Same parameters and cache, different rigor
    pub fn with_rigor(&self, rigor: Rigor) -> Self {
        if rigor == self.config.rigor() {
            return self.clone();
        }
        Self {
            config: Arc::new(self.config.with_rigor(rigor)),
            cache: Arc::clone(&self.cache),
        }
    }

    pub fn normalize(&self, input: impl Into<RutInput>) -> Normalization {
        normalize(&input.into(), self.config.rigor())
    }

    /// Classify anything convertible into [`RutInput`]
    pub fn validate(&self, input: impl Into<RutInput>) -> ValidationResult {
        self.parse(&input.into())
    }

    /// Memoized check character for `base_digits`
    pub fn verification_digit(&self, base_digits: &str) -> Result<char, ErrorDetail> {
        verification_digit(base_digits, &self.config, &self.cache)
    }
}

impl Default for RutValidator {
    fn default() -> Self {
        Self::with_config(RutConfig::default())
    }
}

impl Validator for RutValidator {
    fn rigor(&self) -> Rigor {
        self.config.rigor()
    }

    fn validate_format(&self, input: &RutInput) -> FormatMatch {
        normalize(input, self.config.rigor()).into()
    }

    fn validate_base(&self, base: &str) -> Result<(), ErrorDetail> {
        let len = base.len();
        if len < self.config.min_digits() {
            return Err(ErrorDetail::new(ErrorCode::LengthMin).with_message(format!(
                "RUT base has {} digits; minimum is {}",
                len,
                self.config.min_digits()
            )));
        }
        if len > self.config.max_digits() {
            return Err(ErrorDetail::new(ErrorCode::LengthMax).with_message(format!(
                "RUT base has {} digits; maximum is {}",
                len,
                self.config.max_digits()
            )));
        }
        Ok(())
    }

    fn validate_check_char(&self, base: &str, supplied: char) -> Result<(), ErrorDetail> {
        let expected = self.verification_digit(base)?;
        if supplied.eq_ignore_ascii_case(&expected) {
            Ok(())
        } else {
            Err(ErrorDetail::new(ErrorCode::DvMismatch))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detail::contains_code;

    fn state(s: &str) -> ValidationState {
        RutValidator::default().validate(s).state
    }

    #[test]
    fn test_basic_states() {
        assert_eq!(state(""), ValidationState::Incomplete);
        assert_eq!(state("1"), ValidationState::Possible);
        assert_eq!(state("12.345.678-"), ValidationState::Possible);
        assert_eq!(state("12.345.678-5"), ValidationState::Valid);
    }

    #[test]
    fn test_incremental_typing() {
        let validator = RutValidator::default();
        let states: Vec<_> = ["", "1", "12", "12.345", "12.345.678-", "12.345.678-5"]
            .iter()
            .map(|s| validator.validate(*s).state)
            .collect();
        assert_eq!(
            states,
            vec![
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
    fn test_valid_result_fields() {
        let result = RutValidator::default().validate("12.345.678-5");
        assert_eq!(result.original, "12.345.678-5");
        assert_eq!(result.normalized.as_deref(), Some("12345678-5"));
        assert_eq!(result.base.as_deref(), Some("12345678"));
        assert_eq!(result.check_char, Some('5'));
        assert!(result.errors.is_empty());
        assert!(contains_code(&result.warnings, ErrorCode::NormalizedDots));
        assert_eq!(result.rigor_used, Rigor::Strict);
    }

    #[test]
    fn test_mismatch() {
        let result = RutValidator::default().validate("12345678-9");
        assert_eq!(result.state, ValidationState::Invalid);
        assert_eq!(result.first_error().unwrap().code, Some(ErrorCode::DvMismatch));
    }

    #[test]
    fn test_uppercase_k_matches() {
        // 6 -> k
        let result = RutValidator::default().validate("6-K");
        assert_eq!(result.state, ValidationState::Valid);
        assert_eq!(result.normalized.as_deref(), Some("6-k"));
        assert!(contains_code(&result.warnings, ErrorCode::NormalizedDv));
    }

    #[test]
    fn test_empty_rut_is_incomplete_not_invalid() {
        let result = RutValidator::default().validate("   ");
        assert_eq!(result.state, ValidationState::Incomplete);
        assert!(contains_code(&result.errors, ErrorCode::EmptyRut));
    }

    #[test]
    fn test_no_digits_is_incomplete() {
        let result = RutValidator::default().validate("-");
        assert_eq!(result.state, ValidationState::Incomplete);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_length_bounds() {
        let result = RutValidator::default().validate("123456789-2");
        assert_eq!(result.state, ValidationState::Invalid);
        assert!(contains_code(&result.errors, ErrorCode::LengthMax));

        let config = RutConfig::new(vec![2, 3, 4, 5, 6, 7], 11, 7, 8, Rigor::Strict).unwrap();
        let result = RutValidator::with_config(config).validate("123");
        assert_eq!(result.state, ValidationState::Invalid);
        assert!(contains_code(&result.errors, ErrorCode::LengthMin));
    }

    #[test]
    fn test_fatal_errors_make_invalid() {
        for input in ["abc", "12..345", "1-2-3", "12345678-55"] {
            assert_eq!(state(input), ValidationState::Invalid, "{}", input);
        }
    }

    #[test]
    fn test_fullwidth_rejected() {
        let result = RutValidator::default()
            .validate("\u{FF11}\u{FF12}\u{FF13}\u{FF14}\u{FF15}\u{FF16}\u{FF17}\u{FF18}-\u{FF15}");
        assert_eq!(result.state, ValidationState::Invalid);
        assert!(contains_code(&result.errors, ErrorCode::InvalidChars));
    }

    #[test]
    fn test_rigor_switch_shares_cache() {
        let strict = RutValidator::default();
        let lenient = strict.with_rigor(Rigor::Lenient);
        assert!(Arc::ptr_eq(strict.cache(), lenient.cache()));
        assert_eq!(strict.validate("12 345 678-5").state, ValidationState::Invalid);
        let result = lenient.validate("12 345 678-5");
        assert_eq!(result.state, ValidationState::Valid);
        assert_eq!(result.rigor_used, Rigor::Lenient);
    }

    #[test]
    fn test_integer_input_is_possible() {
        let result = RutValidator::default().validate(12345678i64);
        assert_eq!(result.state, ValidationState::Possible);
        assert_eq!(result.original, "12345678");
    }

    #[test]
    fn test_checksum_memoized_through_validator() {
        let validator = RutValidator::default();
        validator.validate("12345678-5");
        validator.validate("12.345.678-5");
        let stats = validator.cache().stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
    }
}
