//! Library version metadata

use serde::Serialize;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version information
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionInfo {
    pub version: &'static str,
    pub license: &'static str,
    pub description: &'static str,
    pub features: Vec<&'static str>,
}

pub fn version_info() -> VersionInfo {
    VersionInfo {
        version: VERSION,
        license: env!("CARGO_PKG_LICENSE"),
        description: env!("CARGO_PKG_DESCRIPTION"),
        features: vec![
            "Incremental four-state validation",
            "Memoized checksum calculation",
            "Parallel batch processing",
            "Masking and keyed tokenization",
            "CSV, XML and JSON output",
            "Configurable rigor",
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_info() {
        let info = version_info();
        assert_eq!(info.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(info.license, "MIT");
        assert!(!info.features.is_empty());
    }
}
