//! SyncWorker - single-consumer command queue
//!
//! The scheduler and the web API never call the orchestrator directly; they
//! post `SyncCommand`s to one worker task that executes them strictly in
//! order. Two cycles can therefore never race on the dedup store.

use super::{SnapshotKind, SyncOrchestrator, SyncReport, SyncTrigger, UploadedPhoto};
use crate::error::{Error, Result};
use crate::retention_manager::RetentionReport;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Command accepted by the worker
pub enum SyncCommand {
    RunCycle {
        trigger: SyncTrigger,
        reply: Option<oneshot::Sender<Result<SyncReport>>>,
    },
    UploadLatest {
        kind: SnapshotKind,
        reply: Option<oneshot::Sender<Result<UploadedPhoto>>>,
    },
    EnforceRetention {
        reply: oneshot::Sender<Result<RetentionReport>>,
    },
}

/// Worker state visible to the UI
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncStatus {
    /// A command is executing
    pub is_running: bool,
    pub last_trigger: Option<SyncTrigger>,
    pub last_started_at: Option<DateTime<Utc>>,
    pub last_finished_at: Option<DateTime<Utc>>,
    pub last_uploaded: usize,
    pub last_skipped: usize,
    pub last_failed: usize,
    pub total_uploaded: u64,
    /// Cycles in a row that aborted or had failed files
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
}

impl SyncStatus {
    fn record(&mut self, result: &Result<SyncReport>) {
        self.last_finished_at = Some(Utc::now());

        match result {
            Ok(report) => {
                self.last_uploaded = report.uploaded.len();
                self.last_skipped = report.skipped;
                self.last_failed = report.failed.len();
                self.total_uploaded += report.uploaded.len() as u64;

                if report.is_complete() || (report.cancelled && report.failed.is_empty()) {
                    self.consecutive_failures = 0;
                    self.last_error = None;
                } else {
                    self.consecutive_failures += 1;
                    self.last_error = report.failed.first().map(|f| f.error.clone());
                }
            }
            Err(e) => {
                self.last_uploaded = 0;
                self.last_skipped = 0;
                self.last_failed = 0;
                self.consecutive_failures += 1;
                self.last_error = Some(e.to_string());
            }
        }
    }
}

fn worker_stopped() -> Error {
    Error::Internal("sync worker stopped".to_string())
}

/// Cloneable handle to the worker
#[derive(Clone)]
pub struct SyncHandle {
    commands: mpsc::Sender<SyncCommand>,
    status: Arc<RwLock<SyncStatus>>,
    shutdown: CancellationToken,
}

impl SyncHandle {
    /// Queue a cycle and wait for its report
    pub async fn run_cycle(&self, trigger: SyncTrigger) -> Result<SyncReport> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(SyncCommand::RunCycle {
                trigger,
                reply: Some(tx),
            })
            .await
            .map_err(|_| worker_stopped())?;
        rx.await.map_err(|_| worker_stopped())?
    }

    /// Queue a cycle without waiting; `Busy` when the queue is full
    pub fn trigger_cycle(&self, trigger: SyncTrigger) -> Result<()> {
        self.try_post(SyncCommand::RunCycle {
            trigger,
            reply: None,
        })
    }

    /// Queue a snapshot upload without waiting
    pub fn trigger_snapshot(&self, kind: SnapshotKind) -> Result<()> {
        self.try_post(SyncCommand::UploadLatest { kind, reply: None })
    }

    fn try_post(&self, command: SyncCommand) -> Result<()> {
        self.commands.try_send(command).map_err(|e| match e {
            TrySendError::Full(_) => Error::Busy("sync queue is full".to_string()),
            TrySendError::Closed(_) => worker_stopped(),
        })
    }

    /// Queue a snapshot upload and wait for it
    pub async fn upload_most_recent(&self, kind: SnapshotKind) -> Result<UploadedPhoto> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(SyncCommand::UploadLatest {
                kind,
                reply: Some(tx),
            })
            .await
            .map_err(|_| worker_stopped())?;
        rx.await.map_err(|_| worker_stopped())?
    }

    /// Queue a retention pass and wait for it
    pub async fn enforce_retention(&self) -> Result<RetentionReport> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(SyncCommand::EnforceRetention { reply: tx })
            .await
            .map_err(|_| worker_stopped())?;
        rx.await.map_err(|_| worker_stopped())?
    }

    pub async fn status(&self) -> SyncStatus {
        self.status.read().await.clone()
    }

    /// Stop the worker; a running cycle stops at the next file boundary
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

/// SyncWorker instance
pub struct SyncWorker {
    orchestrator: Arc<SyncOrchestrator>,
    commands: mpsc::Receiver<SyncCommand>,
    status: Arc<RwLock<SyncStatus>>,
    shutdown: CancellationToken,
    prune_after_cycle: bool,
}

impl SyncWorker {
    /// Create worker and handle without starting the task
    pub fn new(
        orchestrator: Arc<SyncOrchestrator>,
        queue_capacity: usize,
        prune_after_cycle: bool,
    ) -> (Self, SyncHandle) {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let status = Arc::new(RwLock::new(SyncStatus::default()));
        let shutdown = CancellationToken::new();

        let worker = Self {
            orchestrator,
            commands: rx,
            status: status.clone(),
            shutdown: shutdown.clone(),
            prune_after_cycle,
        };
        let handle = SyncHandle {
            commands: tx,
            status,
            shutdown,
        };

        (worker, handle)
    }

    /// Create the worker and spawn it on the runtime
    pub fn spawn(
        orchestrator: Arc<SyncOrchestrator>,
        queue_capacity: usize,
        prune_after_cycle: bool,
    ) -> (SyncHandle, JoinHandle<()>) {
        let (worker, handle) = Self::new(orchestrator, queue_capacity, prune_after_cycle);
        let task = tokio::spawn(worker.run());
        (handle, task)
    }

    /// Consume commands until shutdown or every handle is dropped
    pub async fn run(mut self) {
        info!(
            prune_after_cycle = self.prune_after_cycle,
            failure_policy = ?self.orchestrator.failure_policy(),
            retention_count = self.orchestrator.retention_count(),
            "Sync worker started"
        );

        loop {
            let command = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                command = self.commands.recv() => match command {
                    Some(command) => command,
                    None => break,
                },
            };

            self.status.write().await.is_running = true;
            self.execute(command).await;
            self.status.write().await.is_running = false;
        }

        info!("Sync worker stopped");
    }

    async fn execute(&self, command: SyncCommand) {
        match command {
            SyncCommand::RunCycle { trigger, reply } => {
                let result = self.run_cycle(trigger).await;
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                } else if let Err(e) = result {
                    warn!(
                        trigger = ?trigger,
                        error = %e,
                        fatal = e.is_fatal_for_cycle(),
                        "Background sync cycle failed"
                    );
                }
            }
            SyncCommand::UploadLatest { kind, reply } => {
                let result = self.orchestrator.upload_most_recent_photo(kind).await;
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                } else if let Err(e) = result {
                    warn!(kind = ?kind, error = %e, "Snapshot upload failed");
                }
            }
            SyncCommand::EnforceRetention { reply } => {
                let _ = reply.send(self.orchestrator.enforce_retention().await);
            }
        }
    }

    async fn run_cycle(&self, trigger: SyncTrigger) -> Result<SyncReport> {
        {
            let mut status = self.status.write().await;
            status.last_trigger = Some(trigger);
            status.last_started_at = Some(Utc::now());
        }

        let cancel = self.shutdown.child_token();
        let mut result = self.orchestrator.run_sync_cycle(trigger, &cancel).await;

        if let Ok(report) = &mut result {
            if self.prune_after_cycle && !report.cancelled {
                match self.orchestrator.enforce_retention().await {
                    Ok(retention) => report.retention = Some(retention),
                    Err(e) => {
                        warn!(cycle_id = %report.cycle_id, error = %e, "Retention after cycle failed")
                    }
                }
            }
        }

        self.status.write().await.record(&result);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera_client::{CameraClient, CameraConfig, ProbePolicy};
    use crate::dedup_store::MemoryDedupStore;
    use crate::remote_store::MemoryRemoteStore;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn camera_mock() -> MockServer {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/props"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/photos"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "errCode": 200,
                "errMsg": "OK",
                "dirs": [{"name": "100RICOH", "files": ["R001.JPG", "R002.JPG", "R003.JPG"]}]
            })))
            .mount(&mock)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/v1/photos/100RICOH/R00\d\.JPG$"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(vec![0xFF, 0xD8])
                    .set_delay(Duration::from_millis(20)),
            )
            .mount(&mock)
            .await;
        mock
    }

    fn orchestrator(
        mock: &MockServer,
        remote: Arc<MemoryRemoteStore>,
        retain: usize,
    ) -> Arc<SyncOrchestrator> {
        let camera = CameraClient::new(CameraConfig {
            base_url: mock.uri(),
            probe: ProbePolicy {
                attempts: 2,
                timeout: Duration::from_millis(500),
                delay: Duration::from_millis(5),
            },
            ..CameraConfig::default()
        })
        .unwrap();

        Arc::new(SyncOrchestrator::new(
            Arc::new(camera),
            remote,
            Arc::new(MemoryDedupStore::new()),
            retain,
        ))
    }

    #[tokio::test]
    async fn test_concurrent_requests_do_not_double_upload() {
        let mock = camera_mock().await;
        let remote = Arc::new(MemoryRemoteStore::new("http://store"));
        let (handle, _task) = SyncWorker::spawn(orchestrator(&mock, remote.clone(), 20), 8, false);

        let (a, b) = tokio::join!(
            handle.run_cycle(SyncTrigger::Manual),
            handle.run_cycle(SyncTrigger::Periodic)
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(a.uploaded.len() + b.uploaded.len(), 3);
        assert_eq!(a.skipped + b.skipped, 3);

        let downloads = mock
            .received_requests()
            .await
            .unwrap()
            .into_iter()
            .filter(|r| r.url.path().starts_with("/v1/photos/100RICOH/"))
            .count();
        assert_eq!(downloads, 3);

        let status = handle.status().await;
        assert_eq!(status.total_uploaded, 3);
        assert_eq!(status.consecutive_failures, 0);
        assert!(!status.is_running);
    }

    #[tokio::test]
    async fn test_prune_after_cycle_attaches_retention() {
        let mock = camera_mock().await;
        let remote = Arc::new(MemoryRemoteStore::new("http://store"));
        let (handle, _task) = SyncWorker::spawn(orchestrator(&mock, remote.clone(), 2), 8, true);

        let report = handle.run_cycle(SyncTrigger::Startup).await.unwrap();

        let retention = report.retention.expect("retention report");
        assert_eq!(retention.retained.len(), 2);
        assert_eq!(retention.deleted.len(), 1);
        assert_eq!(remote.len().await, 2);
    }

    #[tokio::test]
    async fn test_trigger_rejected_when_queue_full() {
        let mock = camera_mock().await;
        let remote = Arc::new(MemoryRemoteStore::new("http://store"));
        // worker not started, so nothing drains the queue
        let (_worker, handle) = SyncWorker::new(orchestrator(&mock, remote, 20), 1, false);

        handle.trigger_cycle(SyncTrigger::Periodic).unwrap();
        assert!(matches!(
            handle.trigger_cycle(SyncTrigger::Periodic),
            Err(Error::Busy(_))
        ));
    }

    #[tokio::test]
    async fn test_shutdown_stops_worker() {
        let mock = camera_mock().await;
        let remote = Arc::new(MemoryRemoteStore::new("http://store"));
        let (handle, task) = SyncWorker::spawn(orchestrator(&mock, remote, 20), 8, false);

        handle.shutdown();
        task.await.unwrap();

        assert!(matches!(
            handle.run_cycle(SyncTrigger::Manual).await,
            Err(Error::Internal(_))
        ));
    }

    #[tokio::test]
    async fn test_shutdown_finishes_file_in_flight() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/props"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/photos"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "errorCode": 200,
                "errorMessage": "",
                "dirs": [{"name": "100RICOH", "files": ["R001.JPG", "R002.JPG", "R003.JPG", "R004.JPG"]}]
            })))
            .mount(&mock)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/v1/photos/100RICOH/R00\d\.JPG$"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(vec![0xFF, 0xD8])
                    .set_delay(Duration::from_millis(200)),
            )
            .mount(&mock)
            .await;

        let remote = Arc::new(MemoryRemoteStore::new("http://store"));
        let (handle, task) = SyncWorker::spawn(orchestrator(&mock, remote.clone(), 1), 8, true);

        let cycle = tokio::spawn({
            let handle = handle.clone();
            async move { handle.run_cycle(SyncTrigger::Manual).await }
        });
        tokio::time::sleep(Duration::from_millis(300)).await;
        handle.shutdown();

        let report = cycle.await.unwrap().unwrap();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("worker stops after shutdown")
            .unwrap();

        assert!(report.cancelled);
        assert!((1..4).contains(&report.uploaded.len()));
        // every started upload completed and nothing was pruned
        assert_eq!(remote.len().await, report.uploaded.len());
        assert!(report.retention.is_none());
    }

    #[tokio::test]
    async fn test_status_records_fatal_error() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/props"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock)
            .await;

        let remote = Arc::new(MemoryRemoteStore::new("http://store"));
        let (handle, _task) = SyncWorker::spawn(orchestrator(&mock, remote, 20), 8, true);

        let result = handle.run_cycle(SyncTrigger::Periodic).await;
        assert!(matches!(result, Err(Error::ServerUnreachable { attempts: 2, .. })));

        let status = handle.status().await;
        assert_eq!(status.consecutive_failures, 1);
        assert_eq!(status.last_trigger, Some(SyncTrigger::Periodic));
        assert!(status.last_error.is_some());
    }
}
