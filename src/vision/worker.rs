//! Background recognition service
//!
//! Recognition is slow and the engine is stateful, so one dedicated thread
//! owns the [`TaskOrchestrator`]. Callers submit batches over a channel and
//! get results back on a oneshot. Batches run strictly in submission order.

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::RwLock;
use std::future::Future;
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::oneshot;
use tracing::{error, info};

use crate::capture::frame::CapturedFrame;
use crate::error::OcrError;
use crate::vision::orchestrator::TaskOrchestrator;
use crate::vision::task::{BatchOutput, TaskBatch};

type Reply = oneshot::Sender<Result<BatchOutput, OcrError>>;

enum Job {
    Recognize {
        frame: CapturedFrame,
        batch: TaskBatch,
        reply: Reply,
    },
    Terminate {
        reply: oneshot::Sender<()>,
    },
    Shutdown,
}

/// Snapshot of the worker's state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceStatus {
    /// Whether an engine is currently loaded
    pub session_ready: bool,
    /// Languages of the loaded engine
    pub session_languages: Option<String>,
    /// Batches that ran to completion
    pub batches_completed: u64,
    /// Tasks that ended in a failed outcome
    pub tasks_failed: u64,
    /// Most recent batch-aborting error
    pub last_error: Option<String>,
}

/// Handle to the recognition worker thread
pub struct RecognitionService {
    jobs: Sender<Job>,
    status: Arc<RwLock<ServiceStatus>>,
    handle: Option<JoinHandle<()>>,
}

impl RecognitionService {
    /// Move `orchestrator` onto a new worker thread
    pub fn spawn(orchestrator: TaskOrchestrator) -> anyhow::Result<Self> {
        let (jobs, queue) = unbounded();
        let status = Arc::new(RwLock::new(ServiceStatus::default()));

        let worker_status = status.clone();
        let handle = std::thread::Builder::new()
            .name("recognition-worker".to_string())
            .spawn(move || {
                info!("Recognition worker starting...");
                run_worker(orchestrator, queue, worker_status);
                info!("Recognition worker exiting...");
            })?;

        Ok(Self {
            jobs,
            status,
            handle: Some(handle),
        })
    }

    /// Queue a batch and await its result
    ///
    /// The batch is queued when this is called, not when the future is
    /// first polled.
    pub fn recognize(
        &self,
        frame: CapturedFrame,
        batch: impl Into<TaskBatch>,
    ) -> impl Future<Output = Result<BatchOutput, OcrError>> {
        let queued = self.submit(frame, batch.into());
        async move {
            match queued {
                Ok(rx) => rx.await.unwrap_or(Err(OcrError::ServiceStopped)),
                Err(err) => Err(err),
            }
        }
    }

    /// Queue a batch and block the current thread until it completes
    ///
    /// Must not be called from within an async runtime.
    pub fn recognize_blocking(
        &self,
        frame: CapturedFrame,
        batch: impl Into<TaskBatch>,
    ) -> Result<BatchOutput, OcrError> {
        let rx = self.submit(frame, batch.into())?;
        rx.blocking_recv().unwrap_or(Err(OcrError::ServiceStopped))
    }

    /// Release the engine once every batch queued before this call is done
    pub async fn terminate(&self) -> Result<(), OcrError> {
        let (reply, rx) = oneshot::channel();
        self.jobs
            .send(Job::Terminate { reply })
            .map_err(|_| OcrError::ServiceStopped)?;
        rx.await.map_err(|_| OcrError::ServiceStopped)
    }

    pub fn status(&self) -> ServiceStatus {
        self.status.read().clone()
    }

    /// Check if the worker thread is still alive
    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    fn submit(
        &self,
        frame: CapturedFrame,
        batch: TaskBatch,
    ) -> Result<oneshot::Receiver<Result<BatchOutput, OcrError>>, OcrError> {
        let (reply, rx) = oneshot::channel();
        self.jobs
            .send(Job::Recognize { frame, batch, reply })
            .map_err(|_| OcrError::ServiceStopped)?;
        Ok(rx)
    }
}

impl Drop for RecognitionService {
    fn drop(&mut self) {
        let _ = self.jobs.send(Job::Shutdown);

        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Recognition worker panicked");
            }
        }
    }
}

fn run_worker(mut orchestrator: TaskOrchestrator, queue: Receiver<Job>, status: Arc<RwLock<ServiceStatus>>) {
    while let Ok(job) = queue.recv() {
        match job {
            Job::Recognize { frame, batch, reply } => {
                let result = orchestrator.recognize(&frame, batch);
                {
                    let mut status = status.write();
                    match &result {
                        Ok(output) => {
                            status.batches_completed += 1;
                            status.tasks_failed += output.outcomes().iter().filter(|o| o.is_failed()).count() as u64;
                        }
                        Err(err) => status.last_error = Some(err.to_string()),
                    }
                    sync_session(&mut status, &orchestrator);
                }
                // Caller may have stopped waiting
                let _ = reply.send(result);
            }
            Job::Terminate { reply } => {
                orchestrator.terminate();
                sync_session(&mut status.write(), &orchestrator);
                let _ = reply.send(());
            }
            Job::Shutdown => break,
        }
    }
    orchestrator.terminate();
}

fn sync_session(status: &mut ServiceStatus, orchestrator: &TaskOrchestrator) {
    let session = orchestrator.session();
    status.session_ready = session.is_ready();
    status.session_languages = session.languages().map(|l| l.to_string());
}
