//! Error catalog and structured error details
//!
//! Every problem found while normalizing or classifying an identifier is
//! described by an [`ErrorDetail`]: a stable [`ErrorCode`] plus the message,
//! hint, severity and recoverability taken from the static catalog. Call
//! sites distinguish cases by code, never by type.

use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Severity of a catalog entry
///
/// `Error` terminates classification as invalid; `Warning` never does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// Stable error codes
///
/// The string form (`as_str`) is part of the public contract and never
/// changes between releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    TypeError,
    EmptyRut,
    InvalidChars,
    FormatDots,
    FormatHyphen,
    LengthMin,
    LengthMax,
    DvInvalid,
    DvMismatch,
    NormalizedWs,
    NormalizedDash,
    NormalizedDots,
    NormalizedDv,
    LeadingZeros,
    MaskState,
    TokenKeyRequired,
    EmptyBase,
    InvalidDigits,
    RutInvalid,
}

/// One row of the static catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    pub message: &'static str,
    pub hint: &'static str,
    pub severity: Severity,
    pub recoverable: bool,
}

const fn entry(
    message: &'static str,
    hint: &'static str,
    severity: Severity,
    recoverable: bool,
) -> CatalogEntry {
    CatalogEntry {
        message,
        hint,
        severity,
        recoverable,
    }
}

impl ErrorCode {
    /// Every code in catalog order
    pub const ALL: [ErrorCode; 19] = [
        ErrorCode::TypeError,
        ErrorCode::EmptyRut,
        ErrorCode::InvalidChars,
        ErrorCode::FormatDots,
        ErrorCode::FormatHyphen,
        ErrorCode::LengthMin,
        ErrorCode::LengthMax,
        ErrorCode::DvInvalid,
        ErrorCode::DvMismatch,
        ErrorCode::NormalizedWs,
        ErrorCode::NormalizedDash,
        ErrorCode::NormalizedDots,
        ErrorCode::NormalizedDv,
        ErrorCode::LeadingZeros,
        ErrorCode::MaskState,
        ErrorCode::TokenKeyRequired,
        ErrorCode::EmptyBase,
        ErrorCode::InvalidDigits,
        ErrorCode::RutInvalid,
    ];

    /// Stable upper-snake identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::TypeError => "TYPE_ERROR",
            ErrorCode::EmptyRut => "EMPTY_RUT",
            ErrorCode::InvalidChars => "INVALID_CHARS",
            ErrorCode::FormatDots => "FORMAT_DOTS",
            ErrorCode::FormatHyphen => "FORMAT_HYPHEN",
            ErrorCode::LengthMin => "LENGTH_MIN",
            ErrorCode::LengthMax => "LENGTH_MAX",
            ErrorCode::DvInvalid => "DV_INVALID",
            ErrorCode::DvMismatch => "DV_MISMATCH",
            ErrorCode::NormalizedWs => "NORMALIZED_WS",
            ErrorCode::NormalizedDash => "NORMALIZED_DASH",
            ErrorCode::NormalizedDots => "NORMALIZED_DOTS",
            ErrorCode::NormalizedDv => "NORMALIZED_DV",
            ErrorCode::LeadingZeros => "LEADING_ZEROS",
            ErrorCode::MaskState => "MASK_STATE",
            ErrorCode::TokenKeyRequired => "TOKEN_KEY_REQUIRED",
            ErrorCode::EmptyBase => "EMPTY_BASE",
            ErrorCode::InvalidDigits => "INVALID_DIGITS",
            ErrorCode::RutInvalid => "RUT_INVALID",
        }
    }

    /// Catalog lookup
    pub fn entry(&self) -> CatalogEntry {
        use Severity::{Error, Warning};
        match self {
            ErrorCode::TypeError => entry(
                "RUT must be a string or an integer",
                "Convert the value to a string or integer",
                Error,
                false,
            ),
            ErrorCode::EmptyRut => {
                entry("RUT cannot be empty", "Enter at least one digit", Error, true)
            }
            ErrorCode::InvalidChars => entry(
                "RUT contains characters that are not allowed",
                "Use only digits, dots and a hyphen",
                Error,
                false,
            ),
            ErrorCode::FormatDots => entry(
                "Invalid thousands separators",
                "Use groups of 3 digits",
                Error,
                false,
            ),
            ErrorCode::FormatHyphen => entry(
                "Invalid hyphen in RUT",
                "Use a single hyphen before the check character",
                Error,
                false,
            ),
            ErrorCode::LengthMin => entry(
                "RUT is shorter than the allowed minimum",
                "Enter more digits",
                Error,
                true,
            ),
            ErrorCode::LengthMax => entry(
                "RUT exceeds the allowed maximum",
                "Check the base number",
                Error,
                false,
            ),
            ErrorCode::DvInvalid => {
                entry("Invalid check character", "Use 0-9 or K", Error, false)
            }
            ErrorCode::DvMismatch => entry(
                "Check character does not match",
                "Correct the check character according to the calculation",
                Error,
                false,
            ),
            ErrorCode::NormalizedWs => entry(
                "Whitespace was removed from the RUT",
                "Enter the RUT without spaces",
                Warning,
                true,
            ),
            ErrorCode::NormalizedDash => entry(
                "Check character separator was normalized",
                "Use a standard hyphen (-)",
                Warning,
                true,
            ),
            ErrorCode::NormalizedDots => entry(
                "Thousands separators were removed",
                "Enter the RUT without dots for internal use",
                Warning,
                true,
            ),
            ErrorCode::NormalizedDv => entry(
                "Check character was normalized to lowercase",
                "Use 'k' or 'K'",
                Warning,
                true,
            ),
            ErrorCode::LeadingZeros => entry(
                "Leading zeros were removed",
                "Enter the base without leading zeros",
                Warning,
                true,
            ),
            ErrorCode::MaskState => entry(
                "Masking is not available for a RUT that is not valid",
                "Validate the RUT before masking",
                Error,
                false,
            ),
            ErrorCode::TokenKeyRequired => entry(
                "Tokenization requires a key",
                "Provide a key",
                Error,
                false,
            ),
            ErrorCode::EmptyBase => entry(
                "Base number cannot be empty",
                "Provide the digits of the base",
                Error,
                false,
            ),
            ErrorCode::InvalidDigits => entry(
                "Base number must contain only digits",
                "Remove anything that is not 0-9",
                Error,
                false,
            ),
            ErrorCode::RutInvalid => entry(
                "Invalid RUT",
                "Check the RUT format and check character",
                Error,
                false,
            ),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ErrorCode::ALL
            .iter()
            .copied()
            .find(|code| code.as_str() == s)
            .ok_or_else(|| format!("Unknown error code: {}", s))
    }
}

/// Structured error or warning
///
/// Equality ignores `duration`. `code` is `None` only for the generic detail
/// produced when a worker fails unexpectedly.
#[derive(Debug, Clone, Error, Serialize)]
#[error("{message}")]
pub struct ErrorDetail {
    pub code: Option<ErrorCode>,
    pub message: String,
    pub hint: String,
    pub severity: Severity,
    pub recoverable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(serialize_with = "serialize_secs")]
    pub duration: Duration,
}

impl ErrorDetail {
    /// Build a detail from the catalog entry for `code`
    pub fn new(code: ErrorCode) -> Self {
        let e = code.entry();
        Self {
            code: Some(code),
            message: e.message.to_string(),
            hint: e.hint.to_string(),
            severity: e.severity,
            recoverable: e.recoverable,
            subject: None,
            duration: Duration::ZERO,
        }
    }

    /// Generic code-less detail for failures outside the domain
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            hint: "Retry the operation or report the failure".to_string(),
            severity: Severity::Error,
            recoverable: false,
            subject: None,
            duration: Duration::ZERO,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = hint.into();
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Stable code string, or `None` for generic failures
    pub fn code_str(&self) -> Option<&'static str> {
        self.code.map(|c| c.as_str())
    }
}

impl PartialEq for ErrorDetail {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
            && self.message == other.message
            && self.hint == other.hint
            && self.severity == other.severity
            && self.recoverable == other.recoverable
            && self.subject == other.subject
    }
}

impl Eq for ErrorDetail {}

impl From<ErrorCode> for ErrorDetail {
    fn from(code: ErrorCode) -> Self {
        ErrorDetail::new(code)
    }
}

/// Serialize a duration as fractional seconds
pub(crate) fn serialize_secs<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

/// True when any detail in `details` carries `code`
pub fn contains_code(details: &[ErrorDetail], code: ErrorCode) -> bool {
    details.iter().any(|d| d.code == Some(code))
}
