mod printer;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use printer::Printer;
use serde::Serialize;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use vrts_common::{
    ensure_config, load_config, load_config_from, save_config, AppConfig, CompareOutcome,
    ComparisonReport, ComparisonRequest, LoadedConfig, SampleMismatch, VrtsError,
};
use vrts_core::{
    CallStatus, DecodeOptions, FileCollector, FileComparator, FileResult, ProcessRunner,
    RegressionRunner, RegressionSettings, RunSummary,
};

/// Exit code when at least one comparison failed
const EXIT_FAILURES: i32 = 2;

#[derive(Parser)]
#[command(name = "vrts")]
#[command(author = "VRTS Contributors")]
#[command(version = "0.1.0")]
#[command(
    about = "Compares new vs old vgmstream CLI output, for regression testing",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to vrts.toml next to the binary or in the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Disable ANSI colors in output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode files with the new and old CLI and compare the output
    Compare {
        /// Files to match (glob patterns)
        files: Vec<String>,

        /// Search files in subfolders
        #[arg(short, long)]
        recursive: bool,

        /// Fuzzy threshold of +-N PCM16LE (0 compares exactly)
        #[arg(short = 'z', long)]
        fuzzy: Option<u32>,

        /// Don't delete decoded output
        #[arg(long)]
        no_delete: bool,

        /// Only report diffs, size mismatches and missing output
        #[arg(long)]
        report_diffs: bool,

        /// Compare looping output (slower)
        #[arg(short, long)]
        looping: bool,

        /// New CLI name, path or directory
        #[arg(long)]
        cli_new: Option<PathBuf>,

        /// Old CLI name, path or directory
        #[arg(long)]
        cli_old: Option<PathBuf>,

        /// Comparison workers per file pair
        #[arg(short = 'm', long)]
        workers: Option<usize>,

        /// Extra CLI flags, quoted (like " -l 3.0 -F")
        #[arg(short, long, allow_hyphen_values = true)]
        flags: Option<String>,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Measure decode performance of the new and/or old CLI
    Perf {
        /// Files to match (glob patterns)
        files: Vec<String>,

        /// Search files in subfolders
        #[arg(short, long)]
        recursive: bool,

        /// Test the new CLI (both if neither --new nor --old is given)
        #[arg(long)]
        new: bool,

        /// Test the old CLI
        #[arg(long)]
        old: bool,

        /// Repeat every file N more times
        #[arg(long, default_value_t = 0)]
        repeat: usize,

        /// Decode with loops
        #[arg(short, long)]
        looping: bool,

        #[arg(long)]
        cli_new: Option<PathBuf>,

        #[arg(long)]
        cli_old: Option<PathBuf>,

        /// Extra CLI flags, quoted
        #[arg(short, long, allow_hyphen_values = true)]
        flags: Option<String>,
    },

    /// Compare input files directly, each against the next one
    Diffs {
        /// Files to match (glob patterns)
        files: Vec<String>,

        #[arg(short, long)]
        recursive: bool,

        #[arg(short = 'z', long)]
        fuzzy: Option<u32>,

        #[arg(short = 'm', long)]
        workers: Option<usize>,

        #[arg(long)]
        report_diffs: bool,

        #[arg(long)]
        json: bool,
    },

    /// Compare two files
    Files {
        first: PathBuf,

        second: PathBuf,

        /// Accepted +-N PCM16LE difference
        #[arg(short, long, default_value_t = 0)]
        tolerance: u32,

        /// Leading bytes always compared exactly (even)
        #[arg(long, default_value_t = 0, value_parser = parse_even::<u64>)]
        header_size: u64,

        /// Bytes per compared chunk (even, non-zero)
        #[arg(long, value_parser = parse_even::<usize>)]
        chunk_size: Option<usize>,

        #[arg(short = 'm', long, default_value_t = 1)]
        workers: usize,

        #[arg(long)]
        json: bool,
    },

    /// Show the config file location
    Config {
        /// Write a default config file if none exists
        #[arg(long)]
        init: bool,
    },
}

fn main() {
    // Logs go to stderr so results and JSON stay alone on stdout
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let use_color = !cli.no_color && std::io::stdout().is_terminal();

    if let Commands::Config { init } = cli.command {
        return run_config(cli.config.as_deref(), init);
    }

    let loaded = read_config(cli.config.as_deref())?;
    info!("Using config {} (exists: {})", loaded.path.display(), loaded.exists);
    let config = loaded.config;

    match cli.command {
        Commands::Compare {
            files,
            recursive,
            fuzzy,
            no_delete,
            report_diffs,
            looping,
            cli_new,
            cli_old,
            workers,
            flags,
            json,
        } => {
            let mut settings = settings(&config, fuzzy, workers);
            settings.keep_outputs = no_delete;
            settings.decode = decode_options(looping, flags.as_deref());

            let cli_new = find_cli(cli_new.as_deref(), &config.cli_new, "new")?;
            let cli_old = find_cli(cli_old.as_deref(), &config.cli_old, "old")?;
            let files = FileCollector::new(files)
                .with_recursive(recursive)
                .with_ignored_extensions(&config.ignored_extensions)
                .collect()?;

            let printer = Printer::new(use_color, report_diffs);
            run_compare(&files, &cli_new, &cli_old, settings, &printer, flags.as_deref(), json)
        }
        Commands::Perf {
            files,
            recursive,
            new,
            old,
            repeat,
            looping,
            cli_new,
            cli_old,
            flags,
        } => {
            let (test_new, test_old) = if new || old { (new, old) } else { (true, true) };
            let mut settings = settings(&config, None, None);
            settings.decode = decode_options(looping, flags.as_deref());

            let files = FileCollector::new(files)
                .with_recursive(recursive)
                .with_ignored_extensions(&config.ignored_extensions)
                .with_repeat(repeat)
                .collect()?;

            let runner = RegressionRunner::new(settings);
            let printer = Printer::new(use_color, false);
            if test_new {
                let cli = find_cli(cli_new.as_deref(), &config.cli_new, "new")?;
                run_performance(&runner, &printer, "new", &cli, &files);
            }
            if test_old {
                let cli = find_cli(cli_old.as_deref(), &config.cli_old, "old")?;
                run_performance(&runner, &printer, "old", &cli, &files);
            }
            Ok(0)
        }
        Commands::Diffs {
            files,
            recursive,
            fuzzy,
            workers,
            report_diffs,
            json,
        } => {
            let files = FileCollector::new(files)
                .with_recursive(recursive)
                .with_keep_ignored(true)
                .collect()?;

            let runner = RegressionRunner::new(settings(&config, fuzzy, workers));
            let printer = Printer::new(use_color, report_diffs);
            let mut results = Vec::new();
            let summary = runner.compare_inputs(&files, |result| {
                if !json {
                    printer.result(&result.path.display().to_string(), &result.report);
                }
                results.push(result.clone());
            });

            if json {
                print_json(&build_json_report("diffs", &results, &summary))?;
            }
            Ok(exit_code(&summary))
        }
        Commands::Files {
            first,
            second,
            tolerance,
            header_size,
            chunk_size,
            workers,
            json,
        } => {
            let request = ComparisonRequest::new(&first, &second)
                .with_tolerance(tolerance)
                .with_header_size(header_size)
                .with_chunk_size(chunk_size.unwrap_or(config.chunk_size))
                .with_workers(workers);
            let report = FileComparator::compare(&request);
            let failed = report.is_failure();

            if json {
                let mut summary = RunSummary::default();
                if failed {
                    summary.ko = 1;
                } else {
                    summary.ok = 1;
                }
                let result = FileResult {
                    path: first,
                    tolerance,
                    report,
                };
                print_json(&build_json_report("files", &[result], &summary))?;
            } else {
                Printer::new(use_color, false).result(&first.display().to_string(), &report);
            }

            Ok(if failed { EXIT_FAILURES } else { 0 })
        }
        Commands::Config { .. } => unreachable!("handled before loading the config"),
    }
}

fn run_compare(
    files: &[PathBuf],
    cli_new: &Path,
    cli_old: &Path,
    settings: RegressionSettings,
    printer: &Printer,
    flags: Option<&str>,
    json: bool,
) -> Result<i32> {
    if !json {
        let msg = match flags {
            Some(flags) => format!("comparing files [{}]", flags),
            None => "comparing files".to_string(),
        };
        printer.info(&msg);
    }

    let runner = RegressionRunner::new(settings);
    let mut results = Vec::new();
    let summary = runner.compare_decodes(files, cli_new, cli_old, |result| {
        if !json {
            printer.result(&result.path.display().to_string(), &result.report);
        }
        results.push(result.clone());
    });

    if json {
        print_json(&build_json_report("compare", &results, &summary))?;
    } else {
        printer.info(&format!(
            "done: ok={}, ko={}, elapsed {:.3}s",
            summary.ok,
            summary.ko,
            summary.elapsed.as_secs_f64()
        ));
    }

    Ok(exit_code(&summary))
}

fn run_performance(
    runner: &RegressionRunner,
    printer: &Printer,
    which: &str,
    cli: &Path,
    files: &[PathBuf],
) {
    printer.info(&format!("testing {} performance", which));
    let run = runner.performance(cli, files);
    let status = match run.status {
        CallStatus::Ok => "",
        CallStatus::Failed => " (decoder returned an error)",
        CallStatus::NotFound => " (decoder could not be started)",
    };
    printer.info(&format!(
        "done: elapsed {:.3}s{}",
        run.elapsed.as_secs_f64(),
        status
    ));
}

fn run_config(path: Option<&Path>, init: bool) -> Result<i32> {
    let loaded = match (path, init) {
        (Some(path), true) => {
            let loaded = load_config_from(path)?;
            if !loaded.exists {
                save_config(path, &loaded.config)?;
            }
            loaded
        }
        (Some(path), false) => load_config_from(path)?,
        (None, true) => ensure_config(false)?,
        (None, false) => load_config(false)?,
    };

    let state = if loaded.exists {
        "exists"
    } else if init {
        "created"
    } else {
        "not created, using defaults"
    };
    println!("{} ({})", loaded.path.display(), state);
    Ok(0)
}

fn read_config(path: Option<&Path>) -> Result<LoadedConfig> {
    let loaded = match path {
        Some(path) => load_config_from(path),
        None => load_config(false),
    };
    loaded.context("Failed to load configuration")
}

fn settings(config: &AppConfig, fuzzy: Option<u32>, workers: Option<usize>) -> RegressionSettings {
    let mut settings = RegressionSettings::from_config(config);
    if let Some(fuzzy) = fuzzy {
        settings.fuzzy = fuzzy;
    }
    if let Some(workers) = workers {
        settings.workers = workers.max(1);
    }
    settings
}

// Sizes are in bytes and must cover whole PCM16 samples
fn parse_even<T>(value: &str) -> Result<T, String>
where
    T: std::str::FromStr + Copy + PartialEq + From<u8> + std::ops::Rem<Output = T>,
    T::Err: std::fmt::Display,
{
    let size: T = value.parse().map_err(|e: T::Err| e.to_string())?;
    if size % T::from(2) != T::from(0) {
        return Err(format!("{} is odd, sizes must be a multiple of 2 bytes", value));
    }
    Ok(size)
}

fn decode_options(looping: bool, flags: Option<&str>) -> DecodeOptions {
    DecodeOptions {
        looping,
        flags: flags.map(DecodeOptions::parse_flags).unwrap_or_default(),
    }
}

fn find_cli(arg: Option<&Path>, default_name: &str, which: &str) -> Result<PathBuf, VrtsError> {
    let cli = ProcessRunner::find_cli(arg, default_name)
        .ok_or_else(|| VrtsError::CliNotFound(which.to_string()))?;
    info!("Using {} CLI: {}", which, cli.display());
    Ok(cli)
}

fn exit_code(summary: &RunSummary) -> i32 {
    if summary.ko > 0 {
        EXIT_FAILURES
    } else {
        0
    }
}

fn print_json(report: &JsonReport) -> Result<()> {
    let output = serde_json::to_string_pretty(report)?;
    println!("{output}");
    Ok(())
}

#[derive(Serialize)]
struct JsonReport {
    mode: &'static str,
    summary: JsonSummary,
    entries: Vec<JsonEntry>,
}

#[derive(Serialize)]
struct JsonSummary {
    total: usize,
    ok: usize,
    ko: usize,
    elapsed_secs: f64,
}

#[derive(Serialize)]
struct JsonEntry {
    path: String,
    outcome: CompareOutcome,
    code: i32,
    tolerance: u32,
    fuzzy_chunks: usize,
    mismatch: Option<SampleMismatch>,
    inconclusive: bool,
}

fn build_json_report(mode: &'static str, results: &[FileResult], summary: &RunSummary) -> JsonReport {
    JsonReport {
        mode,
        summary: JsonSummary {
            total: results.len(),
            ok: summary.ok,
            ko: summary.ko,
            elapsed_secs: summary.elapsed.as_secs_f64(),
        },
        entries: results.iter().map(json_entry).collect(),
    }
}

fn json_entry(result: &FileResult) -> JsonEntry {
    let ComparisonReport {
        outcome,
        fuzzy_chunks,
        mismatch,
        inconclusive,
    } = result.report.clone();

    JsonEntry {
        path: result.path.to_string_lossy().to_string(),
        outcome,
        code: outcome.code(),
        tolerance: result.tolerance,
        fuzzy_chunks,
        mismatch,
        inconclusive,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn result(path: &str, outcome: CompareOutcome) -> FileResult {
        FileResult {
            path: PathBuf::from(path),
            tolerance: 1,
            report: ComparisonReport::new(outcome),
        }
    }

    #[test]
    fn test_cli_parses() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_compare_flags_accept_leading_dash() {
        let cli = Cli::try_parse_from(["vrts", "compare", "*.adx", "-f", "-l 3.0 -F", "-z", "2"])
            .unwrap();
        match cli.command {
            Commands::Compare { files, flags, fuzzy, .. } => {
                assert_eq!(files, vec!["*.adx"]);
                assert_eq!(flags.as_deref(), Some("-l 3.0 -F"));
                assert_eq!(fuzzy, Some(2));
            }
            _ => panic!("expected compare"),
        }
    }

    #[test]
    fn test_settings_overrides() {
        let config = AppConfig::default();
        let defaults = settings(&config, None, None);
        assert_eq!(defaults.fuzzy, 1);
        assert_eq!(defaults.workers, 1);

        let overridden = settings(&config, Some(0), Some(0));
        assert_eq!(overridden.fuzzy, 0);
        assert_eq!(overridden.workers, 1);
    }

    #[test]
    fn test_sizes_must_be_even() {
        assert_eq!(parse_even::<usize>("1024"), Ok(1024));
        assert_eq!(parse_even::<u64>("80"), Ok(80));
        assert!(parse_even::<usize>("33").is_err());
        assert!(parse_even::<u64>("81").is_err());
        assert!(parse_even::<u64>("lots").is_err());

        assert!(Cli::try_parse_from(["vrts", "files", "a", "b", "--chunk-size", "33"]).is_err());
        assert!(Cli::try_parse_from(["vrts", "files", "a", "b", "--header-size", "81"]).is_err());
        assert!(Cli::try_parse_from(["vrts", "files", "a", "b", "--header-size", "80"]).is_ok());
    }

    #[test]
    fn test_decode_options() {
        let options = decode_options(true, Some(" -F  -l 2"));
        assert!(options.looping);
        assert_eq!(options.flags, vec!["-F", "-l", "2"]);
        assert!(decode_options(false, None).flags.is_empty());
    }

    #[test]
    fn test_exit_code() {
        let mut summary = RunSummary::default();
        summary.ok = 3;
        assert_eq!(exit_code(&summary), 0);
        summary.ko = 1;
        assert_eq!(exit_code(&summary), EXIT_FAILURES);
    }

    #[test]
    fn test_build_json_report() {
        let results = vec![
            result("a.adx", CompareOutcome::Same),
            result("b.ogg", CompareOutcome::Diffs),
        ];
        let summary = RunSummary {
            ok: 1,
            ko: 1,
            elapsed: Duration::from_millis(1500),
        };

        let report = build_json_report("compare", &results, &summary);
        assert_eq!(report.summary.total, 2);
        assert_eq!(report.summary.elapsed_secs, 1.5);
        assert_eq!(report.entries[1].path, "b.ogg");
        assert_eq!(report.entries[1].code, -3);

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["entries"][0]["outcome"], "Same");
        assert!(value["entries"][0]["mismatch"].is_null());
    }
}
