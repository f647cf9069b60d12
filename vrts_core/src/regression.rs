//! Regression runs: decode every input with the new and old CLI and compare
//! the two outputs, time decodes, or compare inputs against each other.

use crate::comparison::FileComparator;
use crate::process::{
    decode_command, performance_command, CallStatus, DecodeOptions, ProcessRunner,
};
use regex::Regex;
use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use vrts_common::{AppConfig, ComparisonReport, ComparisonRequest};

static ENCODING_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*encoding:\s*(.*?)\s*$").unwrap());

/// Per-run comparison and decode settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegressionSettings {
    /// +-N PCM16 tolerance for float codecs, 0 disables fuzzy matching
    pub fuzzy: u32,
    pub workers: usize,
    /// Header bytes compared exactly whenever fuzzy matching is active
    pub header_size: u64,
    pub chunk_size: usize,
    pub fuzzy_codecs: Vec<String>,
    /// Keep decoded `.new.wav` / `.old.wav` files
    pub keep_outputs: bool,
    pub decode: DecodeOptions,
}

impl RegressionSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            fuzzy: config.fuzzy,
            workers: config.workers.max(1),
            header_size: config.header_size,
            chunk_size: config.chunk_size,
            fuzzy_codecs: config.fuzzy_codecs.clone(),
            keep_outputs: false,
            decode: DecodeOptions::default(),
        }
    }
}

/// Comparison result of one input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileResult {
    pub path: PathBuf,
    /// Tolerance actually applied
    pub tolerance: u32,
    pub report: ComparisonReport,
}

/// Pass/fail totals of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub ok: usize,
    pub ko: usize,
    pub elapsed: Duration,
}

impl RunSummary {
    fn record(&mut self, report: &ComparisonReport) {
        if report.is_failure() {
            self.ko += 1;
        } else {
            self.ok += 1;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerformanceRun {
    pub status: CallStatus,
    pub elapsed: Duration,
}

/// Decoded outputs of one input, removed on drop unless kept
struct TempOutputs {
    paths: Vec<PathBuf>,
    keep: bool,
}

impl Drop for TempOutputs {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        for path in &self.paths {
            if let Err(e) = fs::remove_file(path) {
                if e.kind() != ErrorKind::NotFound {
                    warn!("Failed to remove {}: {}", path.display(), e);
                }
            }
        }
    }
}

pub struct RegressionRunner {
    settings: RegressionSettings,
}

impl RegressionRunner {
    pub fn new(settings: RegressionSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &RegressionSettings {
        &self.settings
    }

    /// Decode each input with both CLIs and compare the outputs
    pub fn compare_decodes<F>(
        &self,
        files: &[PathBuf],
        cli_new: &Path,
        cli_old: &Path,
        mut on_result: F,
    ) -> RunSummary
    where
        F: FnMut(&FileResult),
    {
        let start = Instant::now();
        let mut summary = RunSummary::default();

        for file in files {
            let new_wav = output_path(file, ".new.wav");
            let old_wav = output_path(file, ".old.wav");
            let _outputs = TempOutputs {
                paths: vec![new_wav.clone(), old_wav.clone()],
                keep: self.settings.keep_outputs,
            };

            // decode errors are not fatal, missing outputs are classified below
            let commands = [
                decode_command(cli_new, &new_wav, file, &self.settings.decode),
                decode_command(cli_old, &old_wav, file, &self.settings.decode),
            ];
            let outputs = ProcessRunner::run_parallel(&commands, true);
            let stdout = outputs.first().and_then(|output| output.stdout.as_deref());

            let tolerance = self.select_tolerance(stdout);
            let report = FileComparator::compare(&self.request(&new_wav, &old_wav, tolerance));
            debug!(file = %file.display(), ?report, "Compared decodes");

            summary.record(&report);
            on_result(&FileResult {
                path: file.clone(),
                tolerance,
                report,
            });
        }

        summary.elapsed = start.elapsed();
        info!("Compared {} files: ok={}, ko={}", files.len(), summary.ok, summary.ko);
        summary
    }

    /// Compare each input with the next one, without decoding
    pub fn compare_inputs<F>(&self, files: &[PathBuf], mut on_result: F) -> RunSummary
    where
        F: FnMut(&FileResult),
    {
        let start = Instant::now();
        let mut summary = RunSummary::default();
        let tolerance = self.settings.fuzzy;

        for pair in files.windows(2) {
            let report = FileComparator::compare(&self.request(&pair[0], &pair[1], tolerance));
            summary.record(&report);
            on_result(&FileResult {
                path: pair[0].clone(),
                tolerance,
                report,
            });
        }

        summary.elapsed = start.elapsed();
        summary
    }

    /// Decode every input in a single call without writing output, timed
    pub fn performance(&self, cli: &Path, files: &[PathBuf]) -> PerformanceRun {
        let command = performance_command(cli, files, &self.settings.decode);
        let start = Instant::now();
        let status = ProcessRunner::run(&command);
        let elapsed = start.elapsed();

        if status != CallStatus::Ok {
            warn!("{} returned {:?}", cli.display(), status);
        }
        PerformanceRun { status, elapsed }
    }

    /// Pick the tolerance for one decode from the new CLI's stdout
    ///
    /// Only codecs with float decode paths may drift, everything else must
    /// match exactly. Without stdout there is nothing to go on, so the
    /// configured tolerance is kept.
    pub fn select_tolerance(&self, stdout: Option<&[u8]>) -> u32 {
        let fuzzy = self.settings.fuzzy;
        if fuzzy == 0 {
            return 0;
        }

        let Some(stdout) = stdout else {
            return fuzzy;
        };

        let text = String::from_utf8_lossy(stdout);
        let Some(captures) = ENCODING_LINE.captures(&text) else {
            return 0;
        };

        let encoding = captures[1].to_lowercase();
        let is_fuzzy = self
            .settings
            .fuzzy_codecs
            .iter()
            .any(|codec| encoding.contains(&codec.to_lowercase()));

        if is_fuzzy {
            fuzzy
        } else {
            0
        }
    }

    fn request(&self, first: &Path, second: &Path, tolerance: u32) -> ComparisonRequest {
        let header_size = if tolerance > 0 {
            self.settings.header_size
        } else {
            0
        };

        ComparisonRequest::new(first, second)
            .with_tolerance(tolerance)
            .with_workers(self.settings.workers)
            .with_header_size(header_size)
            .with_chunk_size(self.settings.chunk_size)
    }
}

fn output_path(input: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(input.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}
