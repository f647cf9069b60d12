use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default size of a streamed comparison chunk (10 MiB)
pub const DEFAULT_CHUNK_SIZE: usize = 0x0010_0000 * 10;

/// Size of the WAV header region compared byte-exactly in fuzzy mode
pub const DEFAULT_HEADER_SIZE: u64 = 0x50;

/// Outcome of comparing a file pair
///
/// Outcomes with a negative [`code`](CompareOutcome::code) are failures;
/// everything else is acceptable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOutcome {
    /// Both files are byte-identical
    Same,
    /// Every chunk matched, at least one only within the sample tolerance
    FuzzySame,
    /// Neither file exists
    NeitherExists,
    /// Content differs
    Diffs,
    /// Files have different lengths
    SizeMismatch,
    /// The first (new) file does not exist
    MissingFirst,
    /// The second (old) file does not exist
    MissingSecond,
}

impl CompareOutcome {
    pub fn code(self) -> i32 {
        match self {
            CompareOutcome::Same => 0,
            CompareOutcome::FuzzySame => 1,
            CompareOutcome::NeitherExists => 2,
            CompareOutcome::Diffs => -3,
            CompareOutcome::SizeMismatch => -4,
            CompareOutcome::MissingFirst => -5,
            CompareOutcome::MissingSecond => 6,
        }
    }

    pub fn is_failure(self) -> bool {
        self.code() < 0
    }

    pub fn label(self) -> &'static str {
        match self {
            CompareOutcome::Same => "same",
            CompareOutcome::FuzzySame => "fuzzy same",
            CompareOutcome::NeitherExists => "neither works",
            CompareOutcome::Diffs => "diffs",
            CompareOutcome::SizeMismatch => "wrong sizes",
            CompareOutcome::MissingFirst => "missing new",
            CompareOutcome::MissingSecond => "missing old",
        }
    }
}

/// A single file-pair comparison, built right before it runs
#[derive(Debug, Clone)]
pub struct ComparisonRequest {
    pub first: PathBuf,
    pub second: PathBuf,
    /// Accepted +-N difference between PCM16LE samples, 0 for exact
    pub tolerance: u32,
    /// Number of comparison workers, 1 compares on the calling thread
    pub workers: usize,
    /// Leading bytes always compared exactly, 0 for none
    pub header_size: u64,
    pub chunk_size: usize,
}

impl ComparisonRequest {
    pub fn new(first: impl AsRef<Path>, second: impl AsRef<Path>) -> Self {
        Self {
            first: first.as_ref().to_path_buf(),
            second: second.as_ref().to_path_buf(),
            tolerance: 0,
            workers: 1,
            header_size: 0,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_tolerance(mut self, tolerance: u32) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Odd sizes are rounded up so later chunks start on a sample boundary
    pub fn with_header_size(mut self, header_size: u64) -> Self {
        self.header_size = header_size + (header_size & 1);
        self
    }

    /// 0 selects the default, odd sizes are rounded up to whole samples
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = match chunk_size {
            0 => DEFAULT_CHUNK_SIZE,
            size => size + (size & 1),
        };
        self
    }
}

/// First sample pair found outside the tolerance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleMismatch {
    /// First sample minus second sample
    pub delta: i32,
    /// Byte offset of the sample
    pub offset: u64,
}

/// Result of a [`ComparisonRequest`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub outcome: CompareOutcome,
    /// Chunks that only matched within the tolerance
    pub fuzzy_chunks: usize,
    /// Only filled by single-threaded fuzzy comparisons
    pub mismatch: Option<SampleMismatch>,
    /// The outcome was forced by a read error or a failed worker
    pub inconclusive: bool,
}

impl ComparisonReport {
    pub fn new(outcome: CompareOutcome) -> Self {
        Self {
            outcome,
            fuzzy_chunks: 0,
            mismatch: None,
            inconclusive: false,
        }
    }

    pub fn inconclusive() -> Self {
        Self {
            inconclusive: true,
            ..Self::new(CompareOutcome::Diffs)
        }
    }

    pub fn is_failure(&self) -> bool {
        self.outcome.is_failure()
    }
}

fn default_cli_new() -> String {
    "vgmstream-cli".to_string()
}

fn default_cli_old() -> String {
    "vgmstream-cli_old".to_string()
}

fn default_fuzzy() -> u32 {
    1
}

fn default_workers() -> usize {
    1
}

fn default_header_size() -> u64 {
    DEFAULT_HEADER_SIZE
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_ignored_extensions() -> Vec<String> {
    [
        ".exe", ".dll", ".zip", ".7z", ".rar", ".bat", ".sh", ".txt", ".lnk", ".wav", ".py",
        ".md", ".idb",
    ]
    .iter()
    .map(|ext| ext.to_string())
    .collect()
}

fn default_fuzzy_codecs() -> Vec<String> {
    ["ffmpeg", "vorbis", "mpeg", "speex", "celt"]
        .iter()
        .map(|codec| codec.to_string())
        .collect()
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// New decoder CLI (name in PATH, file or directory)
    #[serde(default = "default_cli_new")]
    pub cli_new: String,

    /// Old decoder CLI (name in PATH, file or directory)
    #[serde(default = "default_cli_old")]
    pub cli_old: String,

    /// Default +-N PCM16 tolerance
    #[serde(default = "default_fuzzy")]
    pub fuzzy: u32,

    /// Comparison workers per file pair
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Header bytes compared exactly when fuzzy matching decoded output
    #[serde(default = "default_header_size")]
    pub header_size: u64,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Extensions never passed to the decoder (lowercase, with dot)
    #[serde(default = "default_ignored_extensions")]
    pub ignored_extensions: Vec<String>,

    /// Codecs with float decode paths, where small sample drift is accepted
    #[serde(default = "default_fuzzy_codecs")]
    pub fuzzy_codecs: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cli_new: default_cli_new(),
            cli_old: default_cli_old(),
            fuzzy: default_fuzzy(),
            workers: default_workers(),
            header_size: default_header_size(),
            chunk_size: default_chunk_size(),
            ignored_extensions: default_ignored_extensions(),
            fuzzy_codecs: default_fuzzy_codecs(),
        }
    }
}
