use crate::dispatch::dispatch_chunks;
use crate::reader::ChunkedReader;
use crate::sample_compare::{compare_chunk, ChunkVerdict, CompareMode};
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};
use vrts_common::{
    CompareOutcome, ComparisonReport, ComparisonRequest, SampleMismatch, VrtsError,
};

/// Classifies a file pair into a [`CompareOutcome`]
///
/// Every input resolves to a report: missing files, size mismatches, read
/// errors and failed workers all map to an outcome instead of an error.
pub struct FileComparator;

impl FileComparator {
    pub fn compare(request: &ComparisonRequest) -> ComparisonReport {
        let first_len = file_len(&request.first);
        let second_len = file_len(&request.second);

        let (first_len, second_len) = match (first_len, second_len) {
            (None, None) => return ComparisonReport::new(CompareOutcome::NeitherExists),
            (None, Some(_)) => return ComparisonReport::new(CompareOutcome::MissingFirst),
            (Some(_), None) => return ComparisonReport::new(CompareOutcome::MissingSecond),
            (Some(first), Some(second)) => (first, second),
        };

        if first_len != second_len {
            debug!(first_len, second_len, "Size mismatch");
            return ComparisonReport::new(CompareOutcome::SizeMismatch);
        }

        settle(request, Self::compare_contents(request))
    }

    fn compare_contents(request: &ComparisonRequest) -> Result<ComparisonReport, VrtsError> {
        let first = File::open(&request.first)?;
        let second = File::open(&request.second)?;
        compare_streams(first, second, request)
    }
}

/// Errors past the size check leave the pair undecided, never `Same`
fn settle(
    request: &ComparisonRequest,
    result: Result<ComparisonReport, VrtsError>,
) -> ComparisonReport {
    match result {
        Ok(report) => report,
        Err(e) => {
            warn!(
                "Comparison of {} and {} aborted: {}",
                request.first.display(),
                request.second.display(),
                e
            );
            ComparisonReport::inconclusive()
        }
    }
}

fn compare_streams<A: Read, B: Read>(
    first: A,
    second: B,
    request: &ComparisonRequest,
) -> Result<ComparisonReport, VrtsError> {
    // fields may be set without the builder, chunks must still start on a sample
    let chunk_size = request.chunk_size + (request.chunk_size & 1);
    let header_size = request.header_size + (request.header_size & 1);
    let mut reader = ChunkedReader::new(first, second, chunk_size);
    let mode = CompareMode::from_tolerance(request.tolerance);

    // header bytes are never tolerant
    if header_size > 0 {
        let header = reader.read_header(header_size)?;
        if header.first != header.second {
            debug!("Header region differs");
            return Ok(ComparisonReport::new(CompareOutcome::Diffs));
        }
    }

    if request.workers > 1 {
        let summary = dispatch_chunks(&mut reader, mode, request.workers)?;
        if summary.worker_failed {
            warn!(
                "Comparison worker failed on {}, result is inconclusive",
                request.first.display()
            );
            return Ok(ComparisonReport::inconclusive());
        }

        let outcome = if summary.failed {
            CompareOutcome::Diffs
        } else {
            escalate(summary.fuzzy_chunks)
        };
        return Ok(ComparisonReport {
            fuzzy_chunks: summary.fuzzy_chunks,
            ..ComparisonReport::new(outcome)
        });
    }

    let mut fuzzy_chunks = 0;
    while let Some(pair) = reader.next_pair()? {
        match compare_chunk(mode, &pair.first, &pair.second) {
            ChunkVerdict::Same => {}
            ChunkVerdict::FuzzySame => fuzzy_chunks += 1,
            ChunkVerdict::Diffs(mismatch) => {
                let mismatch = mismatch.map(|m| SampleMismatch {
                    delta: m.delta,
                    offset: pair.offset + m.offset,
                });
                return Ok(ComparisonReport {
                    fuzzy_chunks,
                    mismatch,
                    ..ComparisonReport::new(CompareOutcome::Diffs)
                });
            }
        }
    }

    Ok(ComparisonReport {
        fuzzy_chunks,
        ..ComparisonReport::new(escalate(fuzzy_chunks))
    })
}

fn escalate(fuzzy_chunks: usize) -> CompareOutcome {
    if fuzzy_chunks > 0 {
        CompareOutcome::FuzzySame
    } else {
        CompareOutcome::Same
    }
}

fn file_len(path: &Path) -> Option<u64> {
    fs::metadata(path)
        .ok()
        .filter(|metadata| metadata.is_file())
        .map(|metadata| metadata.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct Pair {
        _temp: TempDir,
        first: PathBuf,
        second: PathBuf,
    }

    fn pair(first: &[u8], second: &[u8]) -> Pair {
        let temp = TempDir::new().unwrap();
        let first_path = temp.path().join("file.new.wav");
        let second_path = temp.path().join("file.old.wav");
        fs::write(&first_path, first).unwrap();
        fs::write(&second_path, second).unwrap();
        Pair {
            _temp: temp,
            first: first_path,
            second: second_path,
        }
    }

    fn outcome(pair: &Pair, tolerance: u32) -> CompareOutcome {
        let request = ComparisonRequest::new(&pair.first, &pair.second).with_tolerance(tolerance);
        FileComparator::compare(&request).outcome
    }

    /// 0x100 zero bytes vs the same with the sample at 0x50 raised by 2
    fn sample_scenario() -> Pair {
        let a = vec![0u8; 0x100];
        let mut b = a.clone();
        b[0x50..0x52].copy_from_slice(&2i16.to_le_bytes());
        pair(&a, &b)
    }

    #[test]
    fn test_identical_files_any_tolerance() {
        let data: Vec<u8> = (0..4000u32).map(|i| (i * 7) as u8).collect();
        let files = pair(&data, &data);
        for tolerance in [0, 1, 5, 1000] {
            assert_eq!(outcome(&files, tolerance), CompareOutcome::Same);
        }
    }

    #[test]
    fn test_sample_tolerance_scenario() {
        let files = sample_scenario();
        assert_eq!(outcome(&files, 0), CompareOutcome::Diffs);
        assert_eq!(outcome(&files, 1), CompareOutcome::Diffs);
        assert_eq!(outcome(&files, 2), CompareOutcome::FuzzySame);
        assert_eq!(outcome(&files, 3), CompareOutcome::FuzzySame);
    }

    #[test]
    fn test_sample_scenario_with_header_outside_diff() {
        let files = sample_scenario();
        let request = ComparisonRequest::new(&files.first, &files.second)
            .with_tolerance(2)
            .with_header_size(0x50);
        let report = FileComparator::compare(&request);
        assert_eq!(report.outcome, CompareOutcome::FuzzySame);
        assert_eq!(report.fuzzy_chunks, 1);
    }

    #[test]
    fn test_header_is_always_exact() {
        let a = vec![0u8; 0x100];
        let mut b = a.clone();
        b[0x10] = 1;
        let files = pair(&a, &b);

        let request = ComparisonRequest::new(&files.first, &files.second)
            .with_tolerance(4)
            .with_header_size(0x50);
        assert_eq!(FileComparator::compare(&request).outcome, CompareOutcome::Diffs);

        // same byte outside any header is within tolerance
        assert_eq!(outcome(&files, 4), CompareOutcome::FuzzySame);
    }

    #[test]
    fn test_size_mismatch_regardless_of_content() {
        let files = pair(&[0u8; 10], &[0u8; 12]);
        for tolerance in [0, 3, 100] {
            assert_eq!(outcome(&files, tolerance), CompareOutcome::SizeMismatch);
        }
    }

    #[test]
    fn test_missing_files() {
        let temp = TempDir::new().unwrap();
        let present = temp.path().join("present.wav");
        let absent = temp.path().join("absent.wav");
        fs::write(&present, [0u8; 10]).unwrap();

        let neither = ComparisonRequest::new(&absent, temp.path().join("also_absent.wav"));
        assert_eq!(FileComparator::compare(&neither).outcome, CompareOutcome::NeitherExists);

        let missing_first = FileComparator::compare(&ComparisonRequest::new(&absent, &present));
        assert_eq!(missing_first.outcome, CompareOutcome::MissingFirst);
        assert!(missing_first.is_failure());

        let missing_second = FileComparator::compare(&ComparisonRequest::new(&present, &absent));
        assert_eq!(missing_second.outcome, CompareOutcome::MissingSecond);
        assert!(!missing_second.is_failure());
    }

    #[test]
    fn test_directory_counts_as_missing() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("file.wav");
        fs::write(&file, [1u8; 4]).unwrap();

        let request = ComparisonRequest::new(&file, temp.path());
        assert_eq!(FileComparator::compare(&request).outcome, CompareOutcome::MissingSecond);
    }

    #[test]
    fn test_swapped_order_same_classification() {
        let a: Vec<u8> = [5i16, -5, 100, 7].iter().flat_map(|s| s.to_le_bytes()).collect();
        let b: Vec<u8> = [6i16, -7, 100, 7].iter().flat_map(|s| s.to_le_bytes()).collect();
        let files = pair(&a, &b);

        for tolerance in 0..4 {
            let forward = ComparisonRequest::new(&files.first, &files.second).with_tolerance(tolerance);
            let backward = ComparisonRequest::new(&files.second, &files.first).with_tolerance(tolerance);
            assert_eq!(
                FileComparator::compare(&forward).outcome,
                FileComparator::compare(&backward).outcome
            );
        }
    }

    #[test]
    fn test_mismatch_diagnostics_use_file_offsets() {
        let a = vec![0u8; 0x200];
        let mut b = a.clone();
        b[0x90..0x92].copy_from_slice(&(-9i16).to_le_bytes());
        let files = pair(&a, &b);

        let request = ComparisonRequest::new(&files.first, &files.second)
            .with_tolerance(3)
            .with_header_size(0x10)
            .with_chunk_size(0x40);
        let report = FileComparator::compare(&request);
        assert_eq!(report.outcome, CompareOutcome::Diffs);
        assert_eq!(report.mismatch, Some(SampleMismatch { delta: 9, offset: 0x90 }));
    }

    #[test]
    fn test_exact_mode_has_no_diagnostics() {
        let files = sample_scenario();
        let report = FileComparator::compare(&ComparisonRequest::new(&files.first, &files.second));
        assert_eq!(report.outcome, CompareOutcome::Diffs);
        assert!(report.mismatch.is_none());
        assert!(!report.inconclusive);
    }

    #[test]
    fn test_diffs_short_circuit_keeps_earlier_fuzzy_count() {
        let a = vec![0u8; 0x80];
        let mut b = a.clone();
        b[0x00] = 1; // fuzzy in chunk 0
        b[0x40] = 50; // hard diff in chunk 2
        let files = pair(&a, &b);

        let request = ComparisonRequest::new(&files.first, &files.second)
            .with_tolerance(1)
            .with_chunk_size(0x20);
        let report = FileComparator::compare(&request);
        assert_eq!(report.outcome, CompareOutcome::Diffs);
        assert_eq!(report.fuzzy_chunks, 1);
        assert_eq!(report.mismatch.map(|m| m.offset), Some(0x40));
    }

    #[test]
    fn test_parallel_matches_single_threaded_outcomes() {
        let files = sample_scenario();
        for tolerance in 0..4 {
            let single = ComparisonRequest::new(&files.first, &files.second)
                .with_tolerance(tolerance)
                .with_chunk_size(0x20);
            let parallel = single.clone().with_workers(3);

            let single = FileComparator::compare(&single);
            let parallel = FileComparator::compare(&parallel);
            assert_eq!(single.outcome, parallel.outcome);
            assert!(parallel.mismatch.is_none());
        }
    }

    #[test]
    fn test_parallel_large_identical_files() {
        let data: Vec<u8> = (0..0x10000u32).map(|i| (i % 251) as u8).collect();
        let files = pair(&data, &data);
        let request = ComparisonRequest::new(&files.first, &files.second)
            .with_tolerance(1)
            .with_header_size(0x50)
            .with_chunk_size(0x400)
            .with_workers(4);
        let report = FileComparator::compare(&request);
        assert_eq!(report.outcome, CompareOutcome::Same);
        assert_eq!(report.fuzzy_chunks, 0);
    }

    #[test]
    fn test_odd_sizes_keep_samples_aligned() {
        let a = vec![0u8; 0x100];
        let mut b = a.clone();
        b[0xa2..0xa4].copy_from_slice(&1i16.to_le_bytes());
        let files = pair(&a, &b);
        let base = ComparisonRequest::new(&files.first, &files.second).with_tolerance(1);

        let requests = [
            base.clone().with_chunk_size(0x20),
            base.clone().with_chunk_size(0x21),
            base.clone().with_header_size(0x51).with_chunk_size(0x20),
            base.clone().with_header_size(0x51).with_chunk_size(0x21).with_workers(3),
            ComparisonRequest {
                header_size: 0x51,
                chunk_size: 0x21,
                ..base.clone()
            },
        ];
        for request in &requests {
            assert_eq!(
                FileComparator::compare(request).outcome,
                CompareOutcome::FuzzySame,
                "header {:#x}, chunk {:#x}",
                request.header_size,
                request.chunk_size
            );
        }
    }

    /// Serves `data`, then fails once `fail_at` bytes were read
    struct FailingReader {
        data: std::io::Cursor<Vec<u8>>,
        fail_at: u64,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.data.position() >= self.fail_at {
                return Err(std::io::Error::new(std::io::ErrorKind::Other, "device gone"));
            }
            self.data.read(buf)
        }
    }

    #[test]
    fn test_read_error_is_inconclusive_diffs() {
        let data = vec![0u8; 0x400];
        for workers in [1, 3] {
            let request = ComparisonRequest::new("song.new.wav", "song.old.wav")
                .with_tolerance(1)
                .with_header_size(0x50)
                .with_chunk_size(0x40)
                .with_workers(workers);
            let failing = FailingReader {
                data: std::io::Cursor::new(data.clone()),
                fail_at: 0x200,
            };

            let result = compare_streams(failing, data.as_slice(), &request);
            assert!(matches!(result, Err(VrtsError::Io(_))), "workers={}", workers);

            let report = settle(&request, result);
            assert_eq!(report.outcome, CompareOutcome::Diffs);
            assert!(report.inconclusive);
            assert!(report.is_failure());
        }
    }

    #[test]
    fn test_empty_files_are_same() {
        let files = pair(&[], &[]);
        assert_eq!(outcome(&files, 0), CompareOutcome::Same);
        assert_eq!(outcome(&files, 2), CompareOutcome::Same);
    }
}
