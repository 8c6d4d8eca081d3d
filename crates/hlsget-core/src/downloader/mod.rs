//! Bounded-concurrency segment scheduler.
//!
//! Segments that still need fetching go on a shared work queue; up to
//! `concurrency` worker threads pop from it, each performing one blocking GET
//! and writing `segment_<index>.ts`. Results flow back over an mpsc channel
//! to the coordinating thread, which owns the completed-set, persists it
//! after every success, and emits progress events. The pause flag gates new
//! work only; transfers already in flight always run to completion.

mod segment;

pub use segment::SegmentError;

use anyhow::{Context, Result};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use crate::events::EventSender;
use crate::playlist::Segment;
use crate::progress;

/// How often a paused worker re-checks the pause flag.
pub const PAUSE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// On-disk name for a segment by playlist index.
pub fn segment_filename(index: usize) -> String {
    format!("segment_{}.ts", index)
}

/// Splits `segment_<n>.ts` back into its index. The merge step uses this to
/// discover and order segment files.
pub fn segment_index_of(file_name: &str) -> Option<usize> {
    file_name
        .strip_prefix("segment_")?
        .strip_suffix(".ts")?
        .parse()
        .ok()
}

/// Downloads every segment not yet completed, updating `completed` and the
/// sidecar file after each success and emitting a progress event per
/// completion. Returns after all segments are done or after the first
/// failure; on failure, queued work is abandoned, in-flight work drains, and
/// successes from the drain are still recorded.
pub fn download_segments(
    segments: &[Segment],
    custom_headers: &HashMap<String, String>,
    output_dir: &Path,
    concurrency: usize,
    pause: &Arc<AtomicBool>,
    completed: &mut BTreeSet<usize>,
    events: &EventSender,
) -> Result<()> {
    let total = segments.len();

    // Disk state wins over the record: a segment file that already exists is
    // complete even if a crash lost its progress entry.
    let mut reconciled = false;
    for seg in segments {
        if !completed.contains(&seg.index) && output_dir.join(segment_filename(seg.index)).exists()
        {
            completed.insert(seg.index);
            reconciled = true;
        }
    }
    if reconciled {
        progress::save(output_dir, completed).context("persist reconciled progress")?;
    }

    let incomplete: Vec<Segment> = segments
        .iter()
        .filter(|s| !completed.contains(&s.index))
        .cloned()
        .collect();
    if incomplete.is_empty() {
        events.progress(percent_done(completed, total));
        return Ok(());
    }

    let count = incomplete.len();
    let work: Arc<Mutex<VecDeque<Segment>>> =
        Arc::new(Mutex::new(incomplete.into_iter().collect()));
    let abort = Arc::new(AtomicBool::new(false));
    let (tx, rx) = mpsc::channel::<(Segment, Result<(), SegmentError>)>();

    let num_workers = concurrency.clamp(1, count);
    let mut handles = Vec::with_capacity(num_workers);
    for _ in 0..num_workers {
        let work = Arc::clone(&work);
        let abort = Arc::clone(&abort);
        let pause = Arc::clone(pause);
        let tx = tx.clone();
        let headers = custom_headers.clone();
        let dir = output_dir.to_path_buf();
        handles.push(std::thread::spawn(move || {
            worker_loop(&work, &abort, &pause, &tx, &headers, &dir);
        }));
    }
    drop(tx);

    // Single mutator: only this loop touches the completed-set and the
    // sidecar file, so a mutation+persist pair can never interleave.
    let mut fatal: Option<anyhow::Error> = None;
    for (seg, result) in rx {
        match result {
            Ok(()) => {
                completed.insert(seg.index);
                if let Err(e) = progress::save(output_dir, completed) {
                    abort.store(true, Ordering::Relaxed);
                    if fatal.is_none() {
                        fatal =
                            Some(e.context(format!("persist progress after segment {}", seg.index)));
                    }
                    continue;
                }
                events.progress(percent_done(completed, total));
            }
            Err(e) => {
                // Already set by the failing worker; setting it again is
                // idempotent.
                abort.store(true, Ordering::Relaxed);
                if fatal.is_none() {
                    fatal = Some(
                        anyhow::Error::new(e)
                            .context(format!("segment {} ({})", seg.index, seg.url)),
                    );
                }
            }
        }
    }
    for handle in handles {
        handle
            .join()
            .unwrap_or_else(|e| panic!("segment worker panicked: {:?}", e));
    }

    match fatal {
        None => Ok(()),
        Some(e) => Err(e),
    }
}

/// Integer percentage of playlist segments completed. Indices outside the
/// current playlist (stale progress entries) do not count.
fn percent_done(completed: &BTreeSet<usize>, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let done = completed.range(..total).count();
    (done * 100 / total) as u8
}

fn worker_loop(
    work: &Mutex<VecDeque<Segment>>,
    abort: &AtomicBool,
    pause: &AtomicBool,
    tx: &mpsc::Sender<(Segment, Result<(), SegmentError>)>,
    headers: &HashMap<String, String>,
    dir: &Path,
) {
    loop {
        // Pause gates new submissions only; a worker mid-transfer never
        // reaches this check until its segment is finished.
        while pause.load(Ordering::Relaxed) && !abort.load(Ordering::Relaxed) {
            std::thread::sleep(PAUSE_POLL_INTERVAL);
        }
        if abort.load(Ordering::Relaxed) {
            break;
        }
        let seg = match work.lock().unwrap().pop_front() {
            Some(seg) => seg,
            None => break,
        };
        let path = dir.join(segment_filename(seg.index));
        let result = segment::download_one_segment(&seg.url, headers, &path);
        if result.is_err() {
            // First failure stops the batch: no worker hands out new work
            // once this is set, but nobody cancels a transfer in flight.
            abort.store(true, Ordering::Relaxed);
        }
        if tx.send((seg, result)).is_err() {
            break;
        }
    }
}
