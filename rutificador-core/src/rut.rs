//! Validated identifier value and display formatting

use crate::detail::{ErrorCode, ErrorDetail};
use crate::normalize::RutInput;
use crate::validator::{RutValidator, ValidationState};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Display options for [`Rut::format`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatOptions {
    /// Group base digits by thousands
    pub thousands: bool,
    /// Upper-case the check character
    pub uppercase: bool,
    /// Thousands separator
    pub separator: char,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            thousands: false,
            uppercase: false,
            separator: '.',
        }
    }
}

impl FormatOptions {
    pub fn thousands(mut self, enabled: bool) -> Self {
        self.thousands = enabled;
        self
    }

    pub fn uppercase(mut self, enabled: bool) -> Self {
        self.uppercase = enabled;
        self
    }

    pub fn separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }
}

/// A verified RUT
///
/// Only constructed from a `valid` classification or from a `possible` one
/// whose check character was filled in, so the pair is always consistent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Rut {
    base: String,
    check_char: char,
}

impl Rut {
    /// Resolve `input` under the schema adapter contract
    ///
    /// `valid` yields the value; `possible` without errors gets its check
    /// character computed; anything else surfaces the first error, or
    /// `RUT_INVALID` when there is none.
    pub fn resolve(input: impl Into<RutInput>, validator: &RutValidator) -> Result<Rut, ErrorDetail> {
        let result = validator.validate(input);

        match (result.state, result.base.as_deref(), result.check_char) {
            (ValidationState::Valid, Some(base), Some(dv)) => Ok(Rut::trusted(base, dv)),
            (ValidationState::Possible, Some(base), None) if result.errors.is_empty() => {
                let dv = validator.verification_digit(base)?;
                Ok(Rut::trusted(base, dv))
            }
            _ => Err(result
                .errors
                .into_iter()
                .next()
                .unwrap_or_else(|| ErrorDetail::new(ErrorCode::RutInvalid))),
        }
    }

    /// Wrap parts that already passed validation
    pub(crate) fn trusted(base: &str, check_char: char) -> Self {
        Self {
            base: base.to_string(),
            check_char: check_char.to_ascii_lowercase(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn check_char(&self) -> char {
        self.check_char
    }

    /// Render for display; never recomputes the check character
    pub fn format(&self, options: &FormatOptions) -> String {
        let base = if options.thousands {
            group_thousands(&self.base, options.separator)
        } else {
            self.base.clone()
        };
        let dv = if options.uppercase {
            self.check_char.to_ascii_uppercase()
        } else {
            self.check_char
        };
        format!("{}-{}", base, dv)
    }
}

impl fmt::Display for Rut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.base, self.check_char)
    }
}

impl FromStr for Rut {
    type Err = ErrorDetail;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Rut::resolve(s, &RutValidator::default())
    }
}

/// Insert `separator` every three digits from the right
pub fn group_thousands(digits: &str, separator: char) -> String {
    let len = digits.chars().count();
    let mut out = String::with_capacity(len + len / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(separator);
        }
        out.push(c);
    }
    out
}
