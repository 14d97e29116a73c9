//! Parallel multi-document processing.
//!
//! Documents are independent: one unreadable scan never aborts the batch.
//! Per-document work is CPU-bound (rasterization, filtering, OCR), so each
//! document runs on the blocking pool, with a semaphore bounding the number
//! in flight to the machine's parallelism.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{info, warn};

use super::types::ExtractionResult;
use super::DocumentPipeline;

/// Outcome of one batch run. Order within each list follows completion,
/// not submission.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub results: Vec<(PathBuf, ExtractionResult)>,
    pub failed: Vec<(PathBuf, String)>,
}

impl BatchSummary {
    pub fn processed_count(&self) -> usize {
        self.results.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }
}

fn worker_limit() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Process every path, at most one document per core at a time.
pub async fn process_batch(pipeline: Arc<DocumentPipeline>, paths: Vec<PathBuf>) -> BatchSummary {
    let semaphore = Arc::new(Semaphore::new(worker_limit()));
    let mut handles = Vec::with_capacity(paths.len());

    for path in paths {
        let semaphore = Arc::clone(&semaphore);
        let pipeline = Arc::clone(&pipeline);
        handles.push(tokio::spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => return (path, Err(e.to_string())),
            };
            let worker_path = path.clone();
            let outcome = tokio::task::spawn_blocking(move || {
                pipeline.process(&worker_path).map_err(|e| e.to_string())
            })
            .await;
            match outcome {
                Ok(result) => (path, result),
                Err(e) => (path, Err(format!("worker panicked: {e}"))),
            }
        }));
    }

    let mut summary = BatchSummary::default();
    for handle in handles {
        match handle.await {
            Ok((path, Ok(result))) => summary.results.push((path, result)),
            Ok((path, Err(reason))) => {
                warn!(path = %path.display(), reason, "document failed");
                summary.failed.push((path, reason));
            }
            Err(e) => warn!(error = %e, "batch task failed to complete"),
        }
    }

    info!(
        processed = summary.processed_count(),
        failed = summary.failed_count(),
        "batch complete"
    );
    summary
}
