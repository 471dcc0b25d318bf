//! rutificador command-line interface
//!
//! Reads one identifier per line from a file or stdin and drives the core
//! library's lazy stream interface, so memory stays bounded whatever the
//! input size. Results go to stdout; per-item failures and logs go to
//! stderr.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rutificador_core::config::resolve_rigor;
use rutificador_core::perf::benchmark;
use rutificador_core::{
    version_info, BatchProcessor, ChecksumCache, FormatOptions, ItemOutcome, MaskOptions, Rigor,
    RutValidator, TomlConfig, VersionInfo,
};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Environment variable holding the tokenization key
pub const TOKEN_KEY_ENV_VAR: &str = "RUTIFICADOR_TOKEN_KEY";

/// Command-line arguments for rutificador
#[derive(Parser, Debug)]
#[command(name = "rutificador")]
#[command(about = "Validate, format and mask Chilean RUT identifiers")]
pub struct Cli {
    /// Configuration file (overrides RUTIFICADOR_CONFIG)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Validation rigor: strict, lenient or legacy (overrides RUTIFICADOR_RIGOR)
    #[arg(long, global = true)]
    pub rigor: Option<Rigor>,

    /// Log level or filter directive (overrides RUST_LOG and the config file)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate identifiers, printing the normalized form of valid ones
    Validate {
        /// Input file, one identifier per line (stdin when omitted)
        file: Option<PathBuf>,

        /// Print every classification as a JSON line
        #[arg(long)]
        json: bool,
    },

    /// Validate and format identifiers
    Format {
        file: Option<PathBuf>,

        /// Group base digits by thousands
        #[arg(long)]
        thousands: bool,

        /// Upper-case the check character
        #[arg(long)]
        uppercase: bool,

        /// Print a report serialized as csv, xml or json instead of streaming
        #[arg(long)]
        format: Option<String>,

        /// Use the worker pool for the report (only with --format)
        #[arg(long)]
        parallel: bool,
    },

    /// Mask or tokenize valid identifiers
    Mask {
        file: Option<PathBuf>,

        /// Trailing base digits left visible
        #[arg(long, default_value_t = 4)]
        keep: usize,

        /// Replacement character
        #[arg(long = "char", default_value_t = '*')]
        mask_char: char,

        /// Emit keyed tokens instead of masked values
        #[arg(long)]
        token: bool,

        /// Tokenization key
        #[arg(long, env = TOKEN_KEY_ENV_VAR, hide_env_values = true)]
        key: Option<String>,
    },

    /// Print the check character of a base number
    CheckDigit { base: String },

    /// Measure validation and formatting throughput
    Bench {
        #[arg(long, default_value_t = 10_000)]
        count: usize,

        /// Disable the worker pool
        #[arg(long)]
        sequential: bool,
    },

    /// Print version and build information
    Version {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Build identification
#[derive(Debug, Serialize)]
pub struct BuildInfo {
    pub version: String,
    pub git_hash: String,
    pub build_timestamp: String,
    pub build_profile: String,
}

pub fn build_info() -> BuildInfo {
    BuildInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: env!("GIT_HASH").to_string(),
        build_timestamp: env!("BUILD_TIMESTAMP").to_string(),
        build_profile: env!("BUILD_PROFILE").to_string(),
    }
}

/// `version --json` document
#[derive(Debug, Serialize)]
struct VersionReport {
    build: BuildInfo,
    library: VersionInfo,
}

/// Log filter: `--log-level`, then `RUST_LOG`, then the config file level
pub fn env_filter(cli_level: Option<&str>, config_level: &str) -> Result<EnvFilter> {
    if let Some(level) = cli_level {
        return EnvFilter::try_new(level).with_context(|| format!("Invalid log level '{}'", level));
    }
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(config_level)
            .with_context(|| format!("Invalid log level '{}' in configuration", config_level)),
    }
}

/// Validator and processor configured from the file and the rigor override
pub fn build_processor(config: &TomlConfig, rigor: Option<Rigor>) -> Result<BatchProcessor> {
    let rigor = resolve_rigor(rigor, config).context("Failed to resolve rigor")?;
    let rut_config = config
        .rut_config(Some(rigor))
        .context("Invalid validation parameters")?;
    let cache = Arc::new(ChecksumCache::new(config.cache_capacity));
    let validator = RutValidator::new(rut_config, cache);
    Ok(BatchProcessor::new(validator).with_settings(&config.batch))
}

/// Non-blank input lines
///
/// A line that is not valid UTF-8 is decoded lossily and still yielded, so
/// it is reported as an invalid item like any other. A read error stops the
/// iteration and is kept for [`finish`](Self::finish).
struct InputLines<R> {
    reader: R,
    buf: Vec<u8>,
    line_no: usize,
    error: Option<io::Error>,
}

impl<R: BufRead> InputLines<R> {
    fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            line_no: 0,
            error: None,
        }
    }

    fn finish(self) -> Result<()> {
        match self.error {
            Some(e) => Err(e).context("Failed to read input"),
            None => Ok(()),
        }
    }
}

impl<R: BufRead> Iterator for InputLines<R> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {
                    self.line_no += 1;
                    let line = String::from_utf8_lossy(&self.buf);
                    if std::str::from_utf8(&self.buf).is_err() {
                        warn!(line = self.line_no, "Input line is not valid UTF-8");
                    }
                    if line.trim().is_empty() {
                        continue;
                    }
                    return Some(line.trim_end_matches(['\n', '\r']).to_string());
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.error = Some(e);
                    return None;
                }
            }
        }
    }
}

fn open_input<'a, R: BufRead + 'a>(file: Option<&Path>, stdin: R) -> Result<Box<dyn BufRead + 'a>> {
    match file {
        Some(path) => {
            let f = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
            Ok(Box::new(BufReader::new(f)))
        }
        None => Ok(Box::new(stdin)),
    }
}

fn report_invalid<E: Write>(err: &mut E, outcome: &ItemOutcome) -> Result<()> {
    if let ItemOutcome::Invalid(detail) = outcome {
        writeln!(
            err,
            "{} - {}",
            detail.subject.as_deref().unwrap_or_default(),
            detail.message
        )?;
    }
    Ok(())
}

/// Write outcomes: valid values to `out`, failures to `err`; returns the failure count
fn write_outcomes<I, W, E>(outcomes: I, out: &mut W, err: &mut E) -> Result<usize>
where
    I: Iterator<Item = ItemOutcome>,
    W: Write,
    E: Write,
{
    let mut failures = 0;
    for outcome in outcomes {
        match &outcome {
            ItemOutcome::Valid(value) => writeln!(out, "{}", value)?,
            ItemOutcome::Invalid(_) => {
                failures += 1;
                report_invalid(err, &outcome)?;
            }
        }
    }
    Ok(failures)
}

fn exit_code(failures: usize) -> i32 {
    if failures == 0 {
        0
    } else {
        1
    }
}

pub fn validate_command<R, W, E>(
    processor: &BatchProcessor,
    input: R,
    json: bool,
    out: &mut W,
    err: &mut E,
) -> Result<i32>
where
    R: BufRead,
    W: Write,
    E: Write,
{
    let mut lines = InputLines::new(input);
    let failures = if json {
        let mut failures = 0;
        for result in processor.results(&mut lines) {
            if !result.is_valid() {
                failures += 1;
            }
            serde_json::to_writer(&mut *out, &result)?;
            writeln!(out)?;
        }
        failures
    } else {
        write_outcomes(processor.validate_stream(&mut lines), out, err)?
    };
    lines.finish()?;
    debug!(failures, "validate finished");
    Ok(exit_code(failures))
}

pub fn format_command<R, W, E>(
    processor: &BatchProcessor,
    input: R,
    options: FormatOptions,
    format: Option<&str>,
    parallel: bool,
    out: &mut W,
    err: &mut E,
) -> Result<i32>
where
    R: BufRead,
    W: Write,
    E: Write,
{
    let mut lines = InputLines::new(input);
    match format {
        Some(name) => {
            let items: Vec<String> = lines.by_ref().collect();
            lines.finish()?;
            let report = processor.format_batch(&items, &options, Some(name), parallel)?;
            writeln!(out, "{}", report)?;
            Ok(0)
        }
        None => {
            let failures = write_outcomes(processor.format_stream(&mut lines, options), out, err)?;
            lines.finish()?;
            Ok(exit_code(failures))
        }
    }
}

pub fn mask_command<R, W, E>(
    validator: &RutValidator,
    input: R,
    options: &MaskOptions,
    out: &mut W,
    err: &mut E,
) -> Result<i32>
where
    R: BufRead,
    W: Write,
    E: Write,
{
    let mut lines = InputLines::new(input);
    let outcomes = (&mut lines).map(|line| match validator.mask(line.as_str(), options) {
        Ok(value) => ItemOutcome::Valid(value),
        Err(detail) => ItemOutcome::Invalid(detail.with_subject(line)),
    });
    let failures = write_outcomes(outcomes, out, err)?;
    lines.finish()?;
    Ok(exit_code(failures))
}

pub fn check_digit_command<W, E>(validator: &RutValidator, base: &str, out: &mut W, err: &mut E) -> Result<i32>
where
    W: Write,
    E: Write,
{
    match validator.verification_digit(base) {
        Ok(dv) => {
            writeln!(out, "{}", dv)?;
            Ok(0)
        }
        Err(detail) => {
            writeln!(err, "{} - {}", base, detail.message)?;
            Ok(1)
        }
    }
}

pub fn bench_command<W: Write>(processor: &BatchProcessor, count: usize, parallel: bool, out: &mut W) -> Result<i32> {
    let report = benchmark(processor, count, parallel)?;
    serde_json::to_writer_pretty(&mut *out, &report)?;
    writeln!(out)?;
    Ok(0)
}

pub fn version_command<W: Write>(json: bool, out: &mut W) -> Result<i32> {
    let build = build_info();
    if json {
        let report = VersionReport {
            build,
            library: version_info(),
        };
        serde_json::to_writer_pretty(&mut *out, &report)?;
        writeln!(out)?;
        return Ok(0);
    }
    writeln!(
        out,
        "rutificador {} [{}] built {} ({})",
        build.version, build.git_hash, build.build_timestamp, build.build_profile
    )?;
    for feature in version_info().features {
        writeln!(out, "- {}", feature)?;
    }
    Ok(0)
}

/// Dispatch `cli.command`; returns the process exit code
pub fn run<R, W, E>(cli: &Cli, config: &TomlConfig, stdin: R, out: &mut W, err: &mut E) -> Result<i32>
where
    R: BufRead,
    W: Write,
    E: Write,
{
    if let Commands::Version { json } = cli.command {
        return version_command(json, out);
    }

    let processor = build_processor(config, cli.rigor)?;
    info!(rigor = %processor.validator().config().rigor(), "Processor ready");

    match &cli.command {
        Commands::Validate { file, json } => {
            let input = open_input(file.as_deref(), stdin)?;
            validate_command(&processor, input, *json, out, err)
        }
        Commands::Format {
            file,
            thousands,
            uppercase,
            format,
            parallel,
        } => {
            let input = open_input(file.as_deref(), stdin)?;
            let options = FormatOptions::default()
                .thousands(*thousands)
                .uppercase(*uppercase);
            format_command(&processor, input, options, format.as_deref(), *parallel, out, err)
        }
        Commands::Mask {
            file,
            keep,
            mask_char,
            token,
            key,
        } => {
            let options = if *token {
                match key.as_deref() {
                    Some(k) if !k.is_empty() => MaskOptions::token(k),
                    _ => bail!("--token requires --key or {}", TOKEN_KEY_ENV_VAR),
                }
            } else {
                MaskOptions::masked(*keep, *mask_char)
            };
            let input = open_input(file.as_deref(), stdin)?;
            mask_command(processor.validator(), input, &options, out, err)
        }
        Commands::CheckDigit { base } => check_digit_command(processor.validator(), base, out, err),
        Commands::Bench { count, sequential } => bench_command(&processor, *count, !*sequential, out),
        Commands::Version { json } => version_command(*json, out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Captured {
        code: i32,
        out: String,
        err: String,
    }

    fn run_args(args: &[&str], input: &str) -> Captured {
        let mut argv = vec!["rutificador"];
        argv.extend_from_slice(args);
        let cli = Cli::try_parse_from(argv).unwrap();
        let mut out = Vec::new();
        let mut err = Vec::new();
        let code = run(&cli, &TomlConfig::default(), input.as_bytes(), &mut out, &mut err).unwrap();
        Captured {
            code,
            out: String::from_utf8(out).unwrap(),
            err: String::from_utf8(err).unwrap(),
        }
    }

    #[test]
    fn test_validate_splits_streams() {
        let r = run_args(&["validate"], "12.345.678-5\n\n12345678-9\n6-K\n");
        assert_eq!(r.code, 1);
        assert_eq!(r.out, "12345678-5\n6-k\n");
        assert!(r.err.starts_with("12345678-9 - "));
    }

    #[test]
    fn test_validate_all_valid_exit_zero() {
        let r = run_args(&["validate"], "1-9\r\n12345678-5\r\n");
        assert_eq!(r.code, 0);
        assert_eq!(r.out, "1-9\n12345678-5\n");
        assert!(r.err.is_empty());
    }

    #[test]
    fn test_validate_json_lines() {
        let r = run_args(&["validate", "--json"], "12.345.678-5\n9\n");
        assert_eq!(r.code, 1);
        let lines: Vec<serde_json::Value> = r
            .out
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["state"], "valid");
        assert_eq!(lines[1]["state"], "possible");
    }

    #[test]
    fn test_rigor_flag() {
        let r = run_args(&["validate"], "12 345 678-5\n");
        assert_eq!(r.code, 1);
        let r = run_args(&["--rigor", "lenient", "validate"], "12 345 678-5\n");
        assert_eq!(r.code, 0);
        assert_eq!(r.out, "12345678-5\n");
    }

    #[test]
    fn test_format_stream_mode() {
        let r = run_args(&["format", "--thousands", "--uppercase"], "12345678-5\n6-k\n");
        assert_eq!(r.code, 0);
        assert_eq!(r.out, "12.345.678-5\n6-K\n");
    }

    #[test]
    fn test_format_report_mode() {
        let r = run_args(&["format", "--format", "json", "--parallel"], "6-k\nbad\n");
        assert_eq!(r.code, 0);
        assert!(r.out.starts_with("Valid RUTs:\n[\n"));
        assert!(r.out.contains("bad - "));
        assert!(r.out.contains("- Success rate: 50.0%"));
    }

    #[test]
    fn test_format_unknown_report_format() {
        let cli = Cli::try_parse_from(["rutificador", "format", "--format", "yaml"]).unwrap();
        let result = run(&cli, &TomlConfig::default(), "6-k\n".as_bytes(), &mut Vec::new(), &mut Vec::new());
        assert!(result.is_err());
    }

    #[test]
    fn test_mask_and_token() {
        let r = run_args(&["mask", "--keep", "3", "--char", "X"], "12.345.678-5\n12345678-9\n");
        assert_eq!(r.code, 1);
        assert_eq!(r.out, "XXXXX678-5\n");
        assert!(r.err.starts_with("12345678-9 - "));

        let r = run_args(&["mask", "--token", "--key", "secret"], "12345678-5\n");
        assert_eq!(r.code, 0);
        assert!(r.out.starts_with("tok_"));
    }

    #[test]
    fn test_check_digit() {
        let r = run_args(&["check-digit", "12345678"], "");
        assert_eq!((r.code, r.out.as_str()), (0, "5\n"));

        let r = run_args(&["check-digit", "12a"], "");
        assert_eq!(r.code, 1);
        assert!(r.err.starts_with("12a - "));
    }

    #[test]
    fn test_version() {
        let r = run_args(&["version"], "");
        assert!(r.out.starts_with(&format!("rutificador {}", env!("CARGO_PKG_VERSION"))));
    }

    #[test]
    fn test_version_json() {
        let r = run_args(&["version", "--json"], "");
        let report: serde_json::Value = serde_json::from_str(&r.out).unwrap();
        assert_eq!(report["build"]["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(report["build"]["git_hash"], env!("GIT_HASH"));
        assert_eq!(report["library"]["version"], rutificador_core::version::VERSION);
    }

    #[test]
    fn test_invalid_utf8_line_is_an_item() {
        let cli = Cli::try_parse_from(["rutificador", "validate"]).unwrap();
        let mut out = Vec::new();
        let mut err = Vec::new();
        let input: &[u8] = b"1-9\n\xff\n6-k\n";
        let code = run(&cli, &TomlConfig::default(), input, &mut out, &mut err).unwrap();

        assert_eq!(code, 1);
        assert_eq!(String::from_utf8(out).unwrap(), "1-9\n6-k\n");
        let err = String::from_utf8(err).unwrap();
        assert_eq!(err.lines().count(), 1);
        assert!(err.starts_with("\u{FFFD} - "));
    }

    #[test]
    fn test_invalid_utf8_json_reports_invalid_chars() {
        let cli = Cli::try_parse_from(["rutificador", "validate", "--json"]).unwrap();
        let mut out = Vec::new();
        let input: &[u8] = b"12345678-5\xff\n6-k\n";
        let code = run(&cli, &TomlConfig::default(), input, &mut out, &mut Vec::new()).unwrap();

        assert_eq!(code, 1);
        let lines: Vec<serde_json::Value> = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["state"], "invalid");
        assert_eq!(lines[0]["errors"][0]["code"], "INVALID_CHARS");
        assert_eq!(lines[1]["state"], "valid");
    }

    #[test]
    fn test_bench_json() {
        let r = run_args(&["bench", "--count", "20", "--sequential"], "");
        let report: serde_json::Value = serde_json::from_str(&r.out).unwrap();
        assert_eq!(report["test_ruts_count"], 20);
        assert_eq!(report["parallel_processing"], false);
    }

    #[test]
    fn test_env_filter_cli_level() {
        assert!(env_filter(Some("debug"), "info").is_ok());
        assert!(env_filter(Some("rutificador_core=trace,warn"), "info").is_ok());
    }
}
