//! Parallel chunk comparison for big file pairs.
//!
//! The calling thread reads chunk pairs and feeds a bounded queue; a fixed set
//! of worker threads compares them. The failure reported is the first one a
//! worker *detects*, which is not necessarily the first one in file order.
//! Deterministic diagnostics need the single-threaded path.

use crate::reader::{ChunkPair, ChunkedReader};
use crate::sample_compare::{compare_chunk, ChunkVerdict, CompareMode};
use crossbeam::channel::{self, Receiver};
use std::io::Read;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, warn};
use vrts_common::VrtsError;

/// Merged result of all workers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Some chunk differed, or a worker died
    pub failed: bool,
    pub fuzzy_chunks: usize,
    pub worker_failed: bool,
}

enum WorkItem {
    Chunk(ChunkPair),
    Shutdown,
}

/// Sets the shared failure flag if its worker unwinds
struct PanicGuard(Arc<AtomicBool>);

impl Drop for PanicGuard {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.store(true, Ordering::Release);
        }
    }
}

/// Compare the remaining chunks of `reader` on `workers` threads
pub fn dispatch_chunks<A: Read, B: Read>(
    reader: &mut ChunkedReader<A, B>,
    mode: CompareMode,
    workers: usize,
) -> Result<DispatchSummary, VrtsError> {
    dispatch_with(reader, workers, move |first: &[u8], second: &[u8]| {
        compare_chunk(mode, first, second)
    })
}

fn dispatch_with<A, B, F>(
    reader: &mut ChunkedReader<A, B>,
    workers: usize,
    compare: F,
) -> Result<DispatchSummary, VrtsError>
where
    A: Read,
    B: Read,
    F: Fn(&[u8], &[u8]) -> ChunkVerdict + Send + Copy + 'static,
{
    let workers = workers.max(1);
    let failed = Arc::new(AtomicBool::new(false));
    let fuzzy_chunks = Arc::new(AtomicUsize::new(0));
    let (sender, receiver) = channel::bounded::<WorkItem>(workers);

    let mut handles = Vec::with_capacity(workers);
    let mut spawn_error = None;
    for index in 0..workers {
        let receiver = receiver.clone();
        let failed = Arc::clone(&failed);
        let fuzzy_chunks = Arc::clone(&fuzzy_chunks);
        let spawned = thread::Builder::new()
            .name(format!("vrts-compare-{}", index))
            .spawn(move || worker_loop(receiver, compare, failed, fuzzy_chunks));

        match spawned {
            Ok(handle) => handles.push(handle),
            Err(e) => {
                spawn_error = Some(e);
                break;
            }
        }
    }
    drop(receiver);

    let mut read_error = None;
    if spawn_error.is_none() {
        loop {
            // new chunks are pointless once any worker flagged a failure
            if failed.load(Ordering::Acquire) {
                break;
            }

            match reader.next_pair() {
                Ok(Some(pair)) => {
                    if sender.send(WorkItem::Chunk(pair)).is_err() {
                        warn!("All comparison workers stopped early");
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    read_error = Some(e);
                    break;
                }
            }
        }
    }

    for _ in 0..handles.len() {
        if sender.send(WorkItem::Shutdown).is_err() {
            break;
        }
    }
    drop(sender);

    let mut worker_failed = false;
    for handle in handles {
        if handle.join().is_err() {
            worker_failed = true;
        }
    }

    if let Some(e) = spawn_error {
        return Err(VrtsError::Comparison(format!(
            "Failed to start comparison worker: {}",
            e
        )));
    }
    if let Some(e) = read_error {
        return Err(e);
    }

    let summary = DispatchSummary {
        failed: failed.load(Ordering::Acquire) || worker_failed,
        fuzzy_chunks: fuzzy_chunks.load(Ordering::Acquire),
        worker_failed,
    };
    debug!(?summary, workers, "Parallel comparison finished");
    Ok(summary)
}

fn worker_loop<F>(
    receiver: Receiver<WorkItem>,
    compare: F,
    failed: Arc<AtomicBool>,
    fuzzy_chunks: Arc<AtomicUsize>,
) where
    F: Fn(&[u8], &[u8]) -> ChunkVerdict,
{
    let _guard = PanicGuard(Arc::clone(&failed));

    // a closed queue ends the worker as well as an explicit shutdown
    while let Ok(item) = receiver.recv() {
        let pair = match item {
            WorkItem::Chunk(pair) => pair,
            WorkItem::Shutdown => break,
        };

        // keep draining so the producer never blocks on a full queue
        if failed.load(Ordering::Acquire) {
            continue;
        }

        match compare(&pair.first, &pair.second) {
            ChunkVerdict::Same => {}
            ChunkVerdict::FuzzySame => {
                fuzzy_chunks.fetch_add(1, Ordering::AcqRel);
            }
            ChunkVerdict::Diffs(_) => {
                debug!(offset = pair.offset, "Chunk differs");
                failed.store(true, Ordering::Release);
            }
        }
    }
}
