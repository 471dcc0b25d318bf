//! # Rutificador Core Library
//!
//! Validation, normalization and batch processing of Chilean RUT
//! identifiers, including:
//! - Input normalization under configurable rigor
//! - Memoized weighted modulo-11 check character calculation
//! - Four-state incremental classification (incomplete/possible/valid/invalid)
//! - Masking and keyed tokenization of valid identifiers
//! - Eager, lazy and async batch processing with CSV/XML/JSON output
//! - Configuration loading

pub mod async_batch;
pub mod batch;
pub mod checksum;
pub mod config;
pub mod detail;
pub mod error;
pub mod field;
pub mod formatters;
pub mod mask;
pub mod normalize;
pub mod perf;
pub mod rut;
pub mod validator;
pub mod version;

pub use batch::{BatchProcessor, BatchResult, ItemOutcome};
pub use checksum::{CacheStats, ChecksumCache};
pub use config::{Rigor, RutConfig, TomlConfig};
pub use detail::{ErrorCode, ErrorDetail, Severity};
pub use error::{Error, Result};
pub use field::{coerce_rut, FieldError, RutField};
pub use formatters::{FormatterRegistry, RutFormatter};
pub use mask::{MaskMode, MaskOptions};
pub use normalize::RutInput;
pub use rut::{FormatOptions, Rut};
pub use validator::{RutValidator, ValidationResult, ValidationState, Validator};
pub use version::{version_info, VersionInfo};
