//! Input normalization
//!
//! Turns arbitrary input into the canonical `base`, `base-` or `base-dv`
//! form. Cosmetic deviations are repaired and reported as warnings; anything
//! that cannot be repaired stops processing with a single fatal error.
//! Warnings gathered before the fatal condition are kept.

use crate::config::Rigor;
use crate::detail::{ErrorCode, ErrorDetail};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use tracing::trace;
use unicode_normalization::UnicodeNormalization;

/// 1-3 leading digits, then `.` + exactly three digits, repeated
static GROUPED_THOUSANDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9]{1,3}(?:\.[0-9]{3})*$").expect("grouped-thousands pattern compiles")
});

/// Separators rewritten to an ASCII hyphen
const DASH_VARIANTS: [char; 3] = ['\u{2013}', '\u{2014}', '_'];

/// Raw value handed to the normalizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RutInput {
    Text(String),
    Integer(i64),
    /// Any other kind of value; carries its type name for the error message
    Unsupported(String),
}

impl RutInput {
    /// Textual rendering of the input as given, when it has one
    pub fn as_text(&self) -> Option<String> {
        match self {
            RutInput::Text(s) => Some(s.clone()),
            RutInput::Integer(n) => Some(n.to_string()),
            RutInput::Unsupported(_) => None,
        }
    }
}

impl fmt::Display for RutInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RutInput::Text(s) => f.write_str(s),
            RutInput::Integer(n) => write!(f, "{}", n),
            RutInput::Unsupported(kind) => write!(f, "<{}>", kind),
        }
    }
}

impl From<&str> for RutInput {
    fn from(s: &str) -> Self {
        RutInput::Text(s.to_string())
    }
}

impl From<String> for RutInput {
    fn from(s: String) -> Self {
        RutInput::Text(s)
    }
}

impl From<&String> for RutInput {
    fn from(s: &String) -> Self {
        RutInput::Text(s.clone())
    }
}

impl From<i64> for RutInput {
    fn from(n: i64) -> Self {
        RutInput::Integer(n)
    }
}

impl From<u32> for RutInput {
    fn from(n: u32) -> Self {
        RutInput::Integer(i64::from(n))
    }
}

impl From<&serde_json::Value> for RutInput {
    fn from(value: &serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::String(s) => RutInput::Text(s.clone()),
            Value::Number(n) => match n.as_i64() {
                Some(i) => RutInput::Integer(i),
                None => RutInput::Unsupported("float".to_string()),
            },
            Value::Null => RutInput::Unsupported("null".to_string()),
            Value::Bool(_) => RutInput::Unsupported("bool".to_string()),
            Value::Array(_) => RutInput::Unsupported("array".to_string()),
            Value::Object(_) => RutInput::Unsupported("object".to_string()),
        }
    }
}

/// Outcome of [`normalize`]
///
/// `normalized` is `None` when a fatal error occurred (then `errors` holds
/// exactly that error) or when the input contains no digit at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Normalization {
    pub normalized: Option<String>,
    pub errors: Vec<ErrorDetail>,
    pub warnings: Vec<ErrorDetail>,
}

impl Normalization {
    pub fn is_fatal(&self) -> bool {
        !self.errors.is_empty()
    }

    /// `(normalized, errors, warnings)`
    pub fn into_parts(self) -> (Option<String>, Vec<ErrorDetail>, Vec<ErrorDetail>) {
        (self.normalized, self.errors, self.warnings)
    }

    fn warn(&mut self, code: ErrorCode) {
        if !self.warnings.iter().any(|w| w.code == Some(code)) {
            self.warnings.push(ErrorDetail::new(code));
        }
    }

    fn fail(mut self, error: ErrorDetail) -> Self {
        trace!(code = ?error.code, "Normalization failed");
        self.normalized = None;
        self.errors.push(error);
        self
    }
}

fn is_allowed(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, 'k' | 'K' | '.' | '-')
}

/// First non-ASCII character that NFKC folds into something other than
/// whitespace, such as a full-width digit or hyphen
fn lookalike(raw: &str) -> Option<char> {
    raw.chars().filter(|c| !c.is_ascii()).find(|&c| {
        let folded: String = std::iter::once(c).nfkc().collect();
        folded != c.to_string() && !folded.chars().all(char::is_whitespace)
    })
}

/// Normalize `input` under `rigor`
///
/// Steps, each able to stop with a fatal error: type check, NFKC
/// canonicalization, trimming, dash repair, internal whitespace, emptiness,
/// character whitelist, hyphen layout, thousands grouping, leading zeros,
/// and check character syntax. Any character that canonicalization folded
/// into a RUT character, rather than into whitespace, is fatal.
pub fn normalize(input: &RutInput, rigor: Rigor) -> Normalization {
    let out = Normalization::default();

    let raw = match input {
        RutInput::Text(s) => s.clone(),
        RutInput::Integer(n) => n.to_string(),
        RutInput::Unsupported(kind) => {
            return out.fail(
                ErrorDetail::new(ErrorCode::TypeError)
                    .with_message(format!("RUT must be a string or an integer, got {}", kind)),
            );
        }
    };

    normalize_text(&raw, rigor, out)
}

fn normalize_text(raw: &str, rigor: Rigor, mut out: Normalization) -> Normalization {
    let canonical: String = raw.nfkc().collect();

    let trimmed = canonical.trim();
    if trimmed.len() != canonical.len() {
        out.warn(ErrorCode::NormalizedWs);
    }

    let mut text: String = trimmed
        .chars()
        .map(|c| if DASH_VARIANTS.contains(&c) { '-' } else { c })
        .collect();
    if text != trimmed {
        out.warn(ErrorCode::NormalizedDash);
    }

    if text.chars().any(char::is_whitespace) {
        if !rigor.tolerates_whitespace() {
            return out.fail(
                ErrorDetail::new(ErrorCode::InvalidChars)
                    .with_message("RUT contains internal whitespace")
                    .with_hint("Remove the spaces or validate in lenient mode"),
            );
        }
        text.retain(|c| !c.is_whitespace());
        out.warn(ErrorCode::NormalizedWs);
    }

    if text.is_empty() {
        return out.fail(ErrorDetail::new(ErrorCode::EmptyRut));
    }

    if let Some(bad) = text.chars().find(|&c| !is_allowed(c)) {
        return out.fail(ErrorDetail::new(ErrorCode::InvalidChars).with_message(format!(
            "RUT contains a character that is not allowed: '{}'",
            bad
        )));
    }

    if let Some(c) = lookalike(raw) {
        return out.fail(
            ErrorDetail::new(ErrorCode::InvalidChars)
                .with_message(format!("RUT contains a look-alike Unicode character: '{}'", c))
                .with_hint("Type the RUT using plain ASCII digits"),
        );
    }

    if !text.bytes().any(|b| b.is_ascii_digit()) {
        // Nothing usable yet; the caller treats this as incomplete
        return out;
    }

    if text.matches('-').count() > 1 {
        return out.fail(
            ErrorDetail::new(ErrorCode::FormatHyphen).with_message("RUT contains more than one hyphen"),
        );
    }

    let (base_part, check_part) = match text.split_once('-') {
        Some(("", _)) => {
            return out.fail(
                ErrorDetail::new(ErrorCode::FormatHyphen)
                    .with_message("Hyphen must be preceded by the base number"),
            );
        }
        Some((base, check)) => (base, Some(check)),
        None => (text.as_str(), None),
    };

    let digits = if base_part.contains('.') {
        if !GROUPED_THOUSANDS.is_match(base_part) {
            return out.fail(ErrorDetail::new(ErrorCode::FormatDots));
        }
        out.warn(ErrorCode::NormalizedDots);
        base_part.replace('.', "")
    } else {
        base_part.to_string()
    };

    if digits.contains(['k', 'K']) {
        return out.fail(
            ErrorDetail::new(ErrorCode::FormatHyphen)
                .with_message("Check character must follow a hyphen"),
        );
    }

    let stripped = digits.trim_start_matches('0');
    let base = if stripped.is_empty() {
        "0".to_string()
    } else {
        stripped.to_string()
    };
    if base != digits {
        out.warn(ErrorCode::LeadingZeros);
    }

    let check = match check_part {
        None => None,
        Some("") => Some(None),
        Some(part) => {
            let mut chars = part.chars();
            let dv = match (chars.next(), chars.next()) {
                (Some(c), None) if c.is_ascii_digit() || c == 'k' || c == 'K' => c,
                _ => {
                    return out.fail(ErrorDetail::new(ErrorCode::DvInvalid).with_message(format!(
                        "Invalid check character '{}'",
                        part
                    )));
                }
            };
            let lower = dv.to_ascii_lowercase();
            if lower != dv {
                out.warn(ErrorCode::NormalizedDv);
            }
            Some(Some(lower))
        }
    };

    out.normalized = Some(match check {
        None => base,
        Some(None) => format!("{}-", base),
        Some(Some(dv)) => format!("{}-{}", base, dv),
    });
    out
}
