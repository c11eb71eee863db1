//! Asynchronous job queue and worker pool.
//!
//! Enqueueing is a cheap send on a channel; N workers receive jobs and
//! run each one end-to-end through the orchestrator. Job records are
//! kept in a bounded in-memory registry so callers can poll status;
//! terminal records beyond the retention cap are evicted oldest-first.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::task::JoinHandle;
use tracing::{error, info};
use uuid::Uuid;

use crate::orchestrator::IngestionOrchestrator;
use crate::types::{IngestError, IngestRequest, IngestionJob, IngestionReport, JobStatus};

/// Immediate acknowledgement returned to the caller on enqueue.
#[derive(Debug, Clone)]
pub struct EnqueueAck {
    pub job_id: Uuid,
    pub status: JobStatus,
}

/// Queryable state of one job, terminal or not.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub job: IngestionJob,
    pub status: JobStatus,
    pub report: Option<IngestionReport>,
    pub error: Option<String>,
}

#[derive(Default)]
struct Registry {
    records: FxHashMap<Uuid, JobRecord>,
    /// Terminal job ids in completion order, for retention eviction.
    finished: VecDeque<Uuid>,
}

impl Registry {
    fn settle(&mut self, job_id: Uuid, status: JobStatus, retention: usize) {
        debug_assert!(status.is_terminal());
        if let Some(record) = self.records.get_mut(&job_id) {
            record.status = status;
        }
        self.finished.push_back(job_id);
        while self.finished.len() > retention {
            if let Some(evicted) = self.finished.pop_front() {
                self.records.remove(&evicted);
            }
        }
    }
}

/// Producer/consumer queue owning the worker pool.
pub struct JobQueue {
    sender: flume::Sender<IngestionJob>,
    registry: Arc<Mutex<Registry>>,
    workers: Vec<JoinHandle<()>>,
}

impl JobQueue {
    /// Default number of terminal job records retained for status
    /// queries.
    pub const DEFAULT_RETENTION: usize = 100;

    /// Starts `workers` worker tasks draining the queue through
    /// `orchestrator`.
    pub fn start(
        orchestrator: Arc<IngestionOrchestrator>,
        workers: usize,
        retention: usize,
    ) -> Self {
        let (sender, receiver) = flume::unbounded::<IngestionJob>();
        let registry: Arc<Mutex<Registry>> = Arc::new(Mutex::new(Registry::default()));

        let handles = (0..workers.max(1))
            .map(|worker| {
                let receiver = receiver.clone();
                let registry = Arc::clone(&registry);
                let orchestrator = Arc::clone(&orchestrator);
                tokio::spawn(async move {
                    while let Ok(job) = receiver.recv_async().await {
                        let job_id = job.job_id;
                        if let Some(record) = registry.lock().records.get_mut(&job_id) {
                            record.status = JobStatus::Running;
                        }
                        info!(worker, job_id = %job_id, url = %job.url, "job picked up");

                        match orchestrator.run(&job).await {
                            Ok(report) => {
                                let mut registry = registry.lock();
                                if let Some(record) = registry.records.get_mut(&job_id) {
                                    record.report = Some(report);
                                }
                                registry.settle(job_id, JobStatus::Succeeded, retention);
                            }
                            Err(err) => {
                                error!(worker, job_id = %job_id, error = %err, "job failed");
                                let mut registry = registry.lock();
                                if let Some(record) = registry.records.get_mut(&job_id) {
                                    record.error = Some(err.to_string());
                                }
                                registry.settle(job_id, JobStatus::Failed, retention);
                            }
                        }
                    }
                })
            })
            .collect();

        Self {
            sender,
            registry,
            workers: handles,
        }
    }

    /// Accepts a request, records it as queued, and returns immediately.
    /// The caller never blocks on or observes the job's execution here.
    pub fn enqueue(&self, request: IngestRequest) -> Result<EnqueueAck, IngestError> {
        if request.app_name.trim().is_empty() {
            return Err(IngestError::Config("appName must be non-empty".into()));
        }

        let job = IngestionJob::new(request);
        let job_id = job.job_id;
        self.registry.lock().records.insert(
            job_id,
            JobRecord {
                job: job.clone(),
                status: JobStatus::Queued,
                report: None,
                error: None,
            },
        );

        if self.sender.send(job).is_err() {
            self.registry.lock().records.remove(&job_id);
            return Err(IngestError::QueueClosed);
        }
        info!(job_id = %job_id, "job enqueued");
        Ok(EnqueueAck {
            job_id,
            status: JobStatus::Queued,
        })
    }

    /// Current record for a job, if still retained.
    pub fn job(&self, job_id: Uuid) -> Option<JobRecord> {
        self.registry.lock().records.get(&job_id).cloned()
    }

    /// Closes the queue and waits for in-flight jobs to finish. Queued
    /// jobs still in the channel are processed before workers exit.
    pub async fn shutdown(self) {
        drop(self.sender);
        for handle in self.workers {
            if let Err(err) = handle.await {
                error!(error = %err, "worker task panicked");
            }
        }
    }
}
