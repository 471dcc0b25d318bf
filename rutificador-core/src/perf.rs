//! Throughput benchmark over randomly generated identifiers

use crate::batch::BatchProcessor;
use crate::checksum::CacheStats;
use crate::error::Result;
use crate::rut::FormatOptions;
use crate::validator::RutValidator;
use rand::Rng;
use serde::Serialize;
use std::time::Instant;
use tracing::info;

/// Items formatted during the formatting phase (at most)
pub const FORMAT_SAMPLE: usize = 1000;

/// Benchmark results
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkReport {
    pub test_ruts_count: usize,
    pub parallel_processing: bool,
    /// Seconds
    pub validation_time: f64,
    /// Items per second
    pub validation_rate: f64,
    pub formatting_count: usize,
    pub formatting_time: f64,
    pub formatting_rate: f64,
    /// Percentage, expected to be 100 for generated input
    pub success_rate: f64,
    pub cache_stats: CacheStats,
}

fn rate(count: usize, secs: f64) -> f64 {
    if secs > 0.0 {
        count as f64 / secs
    } else {
        0.0
    }
}

/// Random `base-dv` strings with seven- and eight-digit bases
pub fn generate_ruts<R: Rng>(rng: &mut R, count: usize, validator: &RutValidator) -> Result<Vec<String>> {
    (0..count)
        .map(|_| {
            let base = rng.gen_range(1_000_000u32..=99_999_999).to_string();
            let dv = validator
                .verification_digit(&base)
                .map_err(|e| crate::Error::InvalidInput(e.to_string()))?;
            Ok(format!("{}-{}", base, dv))
        })
        .collect()
}

/// Validate `count` random identifiers, then format up to [`FORMAT_SAMPLE`] of them
pub fn benchmark(processor: &BatchProcessor<RutValidator>, count: usize, parallel: bool) -> Result<BenchmarkReport> {
    let ruts = generate_ruts(&mut rand::thread_rng(), count, processor.validator())?;

    let start = Instant::now();
    let result = processor.validate_batch(&ruts, parallel);
    let validation_time = start.elapsed().as_secs_f64();

    let sample = &ruts[..ruts.len().min(FORMAT_SAMPLE)];
    let start = Instant::now();
    processor.format_batch(sample, &FormatOptions::default(), None, parallel)?;
    let formatting_time = start.elapsed().as_secs_f64();

    let report = BenchmarkReport {
        test_ruts_count: count,
        parallel_processing: parallel,
        validation_time,
        validation_rate: rate(count, validation_time),
        formatting_count: sample.len(),
        formatting_time,
        formatting_rate: rate(sample.len(), formatting_time),
        success_rate: result.success_rate(),
        cache_stats: processor.validator().cache().stats(),
    };
    info!(
        count,
        parallel,
        "Benchmark: {:.0} validations/s, {:.0} formats/s",
        report.validation_rate,
        report.formatting_rate
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_generated_ruts_are_valid() {
        let validator = RutValidator::default();
        let ruts = generate_ruts(&mut StdRng::seed_from_u64(7), 50, &validator).unwrap();
        assert_eq!(ruts.len(), 50);
        assert!(ruts.iter().all(|r| validator.validate(r.as_str()).is_valid()));
    }

    #[test]
    fn test_benchmark_report() {
        let processor = BatchProcessor::default().with_chunk_size(64);
        let report = benchmark(&processor, 200, true).unwrap();
        assert_eq!(report.test_ruts_count, 200);
        assert_eq!(report.formatting_count, 200);
        assert_eq!(report.success_rate, 100.0);
        assert!(report.cache_stats.size > 0);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["parallel_processing"], true);
        assert!(json["cache_stats"]["capacity"].is_number());
    }

    #[test]
    fn test_empty_benchmark() {
        let report = benchmark(&BatchProcessor::default(), 0, false).unwrap();
        assert_eq!(report.success_rate, 0.0);
        assert_eq!(report.formatting_count, 0);
    }
}
