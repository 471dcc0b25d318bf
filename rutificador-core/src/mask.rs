//! Privacy-preserving representations of a valid RUT
//!
//! Two modes: redaction (`Mask`) keeps the last few base digits and the check
//! character; pseudonymization (`Token`) derives `tok_` + base32 of
//! HMAC-SHA256(key, "base-dv"). Tokens are deterministic per key and cannot
//! be inverted.

use crate::detail::{ErrorCode, ErrorDetail};
use crate::normalize::RutInput;
use crate::validator::{RutValidator, ValidationState, Validator};
use data_encoding::BASE32_NOPAD;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

/// Prefix of every token
pub const TOKEN_PREFIX: &str = "tok_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaskMode {
    #[default]
    Mask,
    Token,
}

/// Options for [`RutValidator::mask`]
#[derive(Clone, PartialEq, Eq)]
pub struct MaskOptions {
    /// Trailing base digits left visible (`Mask` mode)
    pub keep: usize,
    pub mask_char: char,
    pub mode: MaskMode,
    /// MAC key (`Token` mode)
    pub key: Option<Vec<u8>>,
}

impl MaskOptions {
    pub fn masked(keep: usize, mask_char: char) -> Self {
        Self {
            keep,
            mask_char,
            mode: MaskMode::Mask,
            key: None,
        }
    }

    pub fn token(key: impl AsRef<[u8]>) -> Self {
        Self {
            mode: MaskMode::Token,
            key: Some(key.as_ref().to_vec()),
            ..Self::default()
        }
    }
}

impl Default for MaskOptions {
    fn default() -> Self {
        Self::masked(4, '*')
    }
}

impl std::fmt::Debug for MaskOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaskOptions")
            .field("keep", &self.keep)
            .field("mask_char", &self.mask_char)
            .field("mode", &self.mode)
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Replace all but the last `keep` base digits with `mask_char`
///
/// The check character is always appended unmasked.
pub fn mask_base(base: &str, check_char: char, keep: usize, mask_char: char) -> String {
    let len = base.chars().count();
    let hidden = len.saturating_sub(keep);
    let mut out = String::with_capacity(len + 2);
    out.extend(std::iter::repeat(mask_char).take(hidden));
    out.extend(base.chars().skip(hidden));
    out.push('-');
    out.push(check_char);
    out
}

/// Keyed one-way token for a normalized `base-dv` string
pub fn tokenize(normalized: &str, key: &[u8]) -> Result<String, ErrorDetail> {
    if key.is_empty() {
        return Err(ErrorDetail::new(ErrorCode::TokenKeyRequired));
    }
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| ErrorDetail::new(ErrorCode::TokenKeyRequired).with_message(e.to_string()))?;
    mac.update(normalized.as_bytes());
    let digest = mac.finalize().into_bytes();
    Ok(format!(
        "{}{}",
        TOKEN_PREFIX,
        BASE32_NOPAD.encode(&digest).to_lowercase()
    ))
}

impl RutValidator {
    /// Mask or tokenize `input`, which must classify as valid
    pub fn mask(&self, input: impl Into<RutInput>, options: &MaskOptions) -> Result<String, ErrorDetail> {
        let input = input.into();
        let result = self.parse(&input);

        let (base, check_char) = match (result.state, result.base.as_deref(), result.check_char) {
            (ValidationState::Valid, Some(base), Some(dv)) => (base, dv),
            (state, ..) => {
                return Err(ErrorDetail::new(ErrorCode::MaskState)
                    .with_message(format!(
                        "Masking is not available for a RUT in state '{}'",
                        state
                    ))
                    .with_subject(result.original.clone()));
            }
        };

        match options.mode {
            MaskMode::Mask => Ok(mask_base(base, check_char, options.keep, options.mask_char)),
            MaskMode::Token => {
                let key = match options.key.as_deref() {
                    Some(key) if !key.is_empty() => key,
                    _ => {
                        return Err(ErrorDetail::new(ErrorCode::TokenKeyRequired)
                            .with_subject(result.original.clone()));
                    }
                };
                let token = tokenize(&format!("{}-{}", base, check_char), key)?;
                debug!("Tokenized RUT");
                Ok(token)
            }
        }
    }
}
