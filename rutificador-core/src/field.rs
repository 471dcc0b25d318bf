//! Serde field type for records that carry a RUT
//!
//! Deserializing a [`RutField`] classifies the raw value under `Strict`
//! rigor and keeps the canonical `base-dv` form. A value still missing its
//! check character is completed; any other failure surfaces the first
//! catalog error unchanged.

use crate::config::Rigor;
use crate::detail::{ErrorCode, ErrorDetail};
use crate::normalize::RutInput;
use crate::rut::Rut;
use crate::validator::RutValidator;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;
use thiserror::Error;

/// Failure surfaced to a schema layer
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{code}: {message}")]
pub struct FieldError {
    pub code: ErrorCode,
    pub message: String,
    pub hint: String,
}

impl From<ErrorDetail> for FieldError {
    fn from(detail: ErrorDetail) -> Self {
        match detail.code {
            Some(code) => Self {
                code,
                message: detail.message,
                hint: detail.hint,
            },
            None => ErrorDetail::new(ErrorCode::RutInvalid).into(),
        }
    }
}

/// Canonical `base-dv` for `value`, completing a missing check character
pub fn coerce_rut(value: impl Into<RutInput>, validator: &RutValidator) -> Result<String, FieldError> {
    let strict = validator.with_rigor(Rigor::Strict);
    Rut::resolve(value, &strict)
        .map(|rut| rut.to_string())
        .map_err(FieldError::from)
}

/// Canonical RUT string accepted from text or integers
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RutField(String);

impl RutField {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Deref for RutField {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RutField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RutField {
    type Err = FieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        coerce_rut(s, &RutValidator::default()).map(RutField)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawRut {
    Text(String),
    Integer(i64),
}

impl<'de> Deserialize<'de> for RutField {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let input = match RawRut::deserialize(deserializer)? {
            RawRut::Text(s) => RutInput::Text(s),
            RawRut::Integer(n) => RutInput::Integer(n),
        };
        coerce_rut(input, &RutValidator::default())
            .map(RutField)
            .map_err(serde::de::Error::custom)
    }
}
