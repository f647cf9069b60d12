pub mod reader;
pub mod sample_compare;
pub mod dispatch;
pub mod comparison;
pub mod files;
pub mod process;
pub mod regression;

pub use reader::{ChunkPair, ChunkedReader};
pub use sample_compare::{compare_chunk, ChunkVerdict, CompareMode};
pub use dispatch::{dispatch_chunks, DispatchSummary};
pub use comparison::FileComparator;
pub use files::FileCollector;
pub use process::{CallOutput, CallStatus, CliCommand, DecodeOptions, ProcessRunner};
pub use regression::{FileResult, PerformanceRun, RegressionRunner, RegressionSettings, RunSummary};
