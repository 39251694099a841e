// Bounded worker pool over file jobs
//
// N workers consume (path, bytes) jobs from a bounded queue, run the
// detection pipeline and push results onto the result channel. Submission is
// non-blocking by contract; results arrive in no particular order. A shared
// cancellation flag turns queued jobs into Cancelled results while letting
// in-flight files finish.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::ScanConfig;
use crate::constants::SHUTDOWN_GRACE_MS;
use crate::detection::DetectionPipeline;
use crate::error::ScanError;
use crate::types::{FileStats, Finding};
use crate::utils::{count_lines, is_binary_content};

/// One unit of work: a repo-relative path plus the file bytes.
#[derive(Debug, Clone)]
pub struct FileJob {
    pub path: String,
    pub bytes: Vec<u8>,
}

/// Outcome for one submitted job.
#[derive(Debug, Clone)]
pub struct FileResult {
    pub path: String,
    pub findings: Vec<Finding>,
    pub stats: FileStats,
    pub error: Option<ScanError>,
}

impl FileResult {
    fn failed(path: String, error: ScanError) -> Self {
        Self {
            path,
            findings: Vec::new(),
            stats: FileStats::default(),
            error: Some(error),
        }
    }
}

/// Cumulative scan counters, updated with atomic increments by the workers.
#[derive(Debug, Default)]
pub struct ScanCounters {
    pub files_processed: AtomicU64,
    pub bytes_processed: AtomicU64,
}

pub struct FileProcessor {
    job_tx: Option<mpsc::Sender<FileJob>>,
    cancel: Arc<AtomicBool>,
    counters: Arc<ScanCounters>,
    workers: Vec<JoinHandle<()>>,
}

impl FileProcessor {
    /// Spawn the pool. Returns the processor handle plus the result channel.
    pub fn spawn(
        pipeline: Arc<DetectionPipeline>,
        config: &ScanConfig,
    ) -> (Self, mpsc::Receiver<FileResult>) {
        Self::spawn_inner(
            pipeline,
            config.effective_workers(),
            config.effective_queue_size(),
            config.max_file_size_bytes,
        )
    }

    fn spawn_inner(
        pipeline: Arc<DetectionPipeline>,
        workers: usize,
        queue_size: usize,
        max_file_size: usize,
    ) -> (Self, mpsc::Receiver<FileResult>) {
        let (job_tx, job_rx) = mpsc::channel::<FileJob>(queue_size.max(1));
        let (result_tx, result_rx) = mpsc::channel::<FileResult>(queue_size.max(1));

        let job_rx = Arc::new(Mutex::new(job_rx));
        let cancel = Arc::new(AtomicBool::new(false));
        let counters = Arc::new(ScanCounters::default());

        let mut handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let job_rx = Arc::clone(&job_rx);
            let result_tx = result_tx.clone();
            let cancel = Arc::clone(&cancel);
            let counters = Arc::clone(&counters);
            let pipeline = Arc::clone(&pipeline);

            handles.push(tokio::spawn(async move {
                worker_loop(
                    worker_id,
                    pipeline,
                    job_rx,
                    result_tx,
                    cancel,
                    counters,
                    max_file_size,
                )
                .await;
            }));
        }

        debug!(workers, queue_size, "file processor started");
        (
            Self {
                job_tx: Some(job_tx),
                cancel,
                counters,
                workers: handles,
            },
            result_rx,
        )
    }

    /// Non-blocking submit; `QueueFull` when the queue is at capacity.
    pub fn submit(&self, job: FileJob) -> Result<(), ScanError> {
        self.try_submit(job).map_err(|(_, error)| error)
    }

    /// Like `submit`, but hands the job back on failure so callers can
    /// retry once the queue drains.
    pub fn try_submit(&self, job: FileJob) -> Result<(), (FileJob, ScanError)> {
        let tx = match &self.job_tx {
            Some(tx) => tx,
            None => return Err((job, ScanError::Cancelled)),
        };
        match tx.try_send(job) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(job)) => Err((job, ScanError::QueueFull)),
            Err(mpsc::error::TrySendError::Closed(job)) => Err((job, ScanError::Cancelled)),
        }
    }

    /// Flip the cancellation flag. Queued jobs drain as `Cancelled` results;
    /// files already past the pattern scan complete best-effort.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn counters(&self) -> &ScanCounters {
        &self.counters
    }

    /// Close the job queue: no further submissions, workers drain what is
    /// left and then exit. Callers should keep reading results after this,
    /// otherwise workers can stall on a full result channel.
    pub fn close(&mut self) {
        self.job_tx.take();
    }

    /// Close the queue and join all workers within the grace period.
    /// Safe to call more than once.
    pub async fn shutdown(&mut self) {
        self.close();

        let grace = Duration::from_millis(SHUTDOWN_GRACE_MS);
        for handle in self.workers.drain(..) {
            if tokio::time::timeout(grace, handle).await.is_err() {
                warn!("worker did not stop within the grace period");
            }
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    pipeline: Arc<DetectionPipeline>,
    job_rx: Arc<Mutex<mpsc::Receiver<FileJob>>>,
    result_tx: mpsc::Sender<FileResult>,
    cancel: Arc<AtomicBool>,
    counters: Arc<ScanCounters>,
    max_file_size: usize,
) {
    loop {
        let job = {
            let mut rx = job_rx.lock().await;
            rx.recv().await
        };
        let job = match job {
            Some(job) => job,
            None => break,
        };

        let result = process_job(&pipeline, job, &cancel, &counters, max_file_size);
        if result_tx.send(result).await.is_err() {
            // Receiver gone, nothing left to report to
            break;
        }
    }
    debug!(worker_id, "worker stopped");
}

fn process_job(
    pipeline: &DetectionPipeline,
    job: FileJob,
    cancel: &AtomicBool,
    counters: &ScanCounters,
    max_file_size: usize,
) -> FileResult {
    if cancel.load(Ordering::Relaxed) {
        return FileResult::failed(job.path, ScanError::Cancelled);
    }

    if job.bytes.len() > max_file_size {
        return FileResult::failed(
            job.path,
            ScanError::FileTooLarge {
                size: job.bytes.len() as u64,
                limit: max_file_size as u64,
            },
        );
    }

    if is_binary_content(&job.bytes) {
        return FileResult::failed(job.path, ScanError::BinarySkipped);
    }

    let start = Instant::now();
    let outcome = pipeline.detect_file(&job.bytes, &job.path, cancel);
    let stats = FileStats {
        bytes_processed: job.bytes.len() as u64,
        lines_processed: count_lines(&job.bytes),
        duration_ms: start.elapsed().as_millis() as u64,
    };

    counters.files_processed.fetch_add(1, Ordering::Relaxed);
    counters
        .bytes_processed
        .fetch_add(job.bytes.len() as u64, Ordering::Relaxed);

    match outcome {
        Ok(findings) => FileResult {
            path: job.path,
            findings,
            stats,
            error: None,
        },
        Err(error) => FileResult {
            path: job.path,
            findings: Vec::new(),
            stats,
            error: Some(error),
        },
    }
}
