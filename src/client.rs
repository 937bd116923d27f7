use std::sync::Arc;

use garde::Validate;

use crate::config::ClientConfig;
use crate::models::feedback::Feedback;
use crate::models::job::{JobSnapshot, JobStatus};
use crate::models::report::AnalysisReport;
use crate::models::upload::ImagePayload;
use crate::services::api::{AnalysisApi, ApiError, HttpAnalysisApi};
use crate::services::persistence::{FileSnapshotStore, SnapshotStore, StoreError};
use crate::services::poller::{JobOutcome, PollHandle, PollerConfig, PollerEngine, UpdateFn};
use crate::services::projector::{self, ProjectorConfig};
use crate::session::Session;

/// Caller-facing terminal notification for one analysis.
#[derive(Debug, Clone)]
pub enum AnalysisUpdate {
    Completed(AnalysisReport),
    Failed { message: String },
    TimedOut,
}

/// End-to-end client for the analysis service: submit, poll, persist, project.
///
/// Owns the single durable current-job slot. Starting a new analysis discards
/// the previous job; at most one polling session runs at a time.
pub struct AnalysisClient {
    api: Arc<dyn AnalysisApi>,
    store: Arc<dyn SnapshotStore>,
    engine: PollerEngine,
    projector_config: ProjectorConfig,
}

impl AnalysisClient {
    pub fn new(config: &ClientConfig) -> Self {
        let api: Arc<dyn AnalysisApi> = Arc::new(HttpAnalysisApi::new(&config.api_base_url));
        let store: Arc<dyn SnapshotStore> =
            Arc::new(FileSnapshotStore::new(&config.snapshot_path));
        Self::with_parts(api, store, config)
    }

    /// Assemble a client from explicit collaborators. This is the seam used
    /// by tests and by embedders with their own transport or storage.
    pub fn with_parts(
        api: Arc<dyn AnalysisApi>,
        store: Arc<dyn SnapshotStore>,
        config: &ClientConfig,
    ) -> Self {
        let engine = PollerEngine::new(
            Arc::clone(&api),
            Arc::clone(&store),
            PollerConfig {
                interval: config.poll_interval(),
                max_consecutive_failures: config.max_consecutive_failures,
            },
        );
        Self {
            api,
            store,
            engine,
            projector_config: ProjectorConfig {
                top_findings: config.top_findings,
                remainder_epsilon: config.remainder_epsilon,
            },
        }
    }

    /// Validate and submit an image, persist the accepted job, and start
    /// polling for its result.
    ///
    /// Any previous job is discarded first. On submission failure the slot is
    /// left cleared so the next startup does not resume a phantom job;
    /// a rejected credential is reported as [`ApiError::Unauthorized`] so the
    /// caller can route to re-authentication.
    pub async fn start_analysis<F>(
        &self,
        payload: ImagePayload,
        session: &Session,
        on_update: F,
    ) -> Result<PollHandle, ApiError>
    where
        F: Fn(AnalysisUpdate) + Send + Sync + 'static,
    {
        self.engine.cancel_active();
        if let Err(e) = self.store.clear().await {
            tracing::warn!(error = %e, "Could not clear previous job snapshot");
        }

        payload.detect_kind()?;

        let job_id = self.api.submit(&payload, session).await?;
        metrics::counter!("analysis_jobs_submitted").increment(1);

        let snapshot = JobSnapshot::in_flight(&job_id, JobStatus::Pending);
        if let Err(e) = self.store.save(&snapshot).await {
            tracing::warn!(job_id = %job_id, error = %e, "Could not persist accepted job");
        }

        Ok(self.spawn_poll(job_id, session.clone(), on_update))
    }

    /// Resume polling for a job persisted by a previous run.
    ///
    /// Returns `None` when there is nothing resumable: no snapshot, a corrupt
    /// one, or a job already in a terminal state. The resumed session starts
    /// with a fresh failure budget.
    pub async fn resume<F>(&self, session: &Session, on_update: F) -> Option<PollHandle>
    where
        F: Fn(AnalysisUpdate) + Send + Sync + 'static,
    {
        let snapshot = self.store.load().await?;
        if !snapshot.is_resumable() {
            return None;
        }
        tracing::info!(job_id = %snapshot.job_id, "Resuming polling for persisted job");
        Some(self.spawn_poll(snapshot.job_id, session.clone(), on_update))
    }

    /// Re-project the persisted result of an already-completed job.
    pub async fn load_report(&self) -> Option<AnalysisReport> {
        let snapshot = self.store.load().await?;
        if snapshot.status != JobStatus::Completed {
            return None;
        }
        let result = snapshot.result?;
        Some(projector::project(&result, &self.projector_config))
    }

    /// Stop the active polling session, if any. The persisted snapshot is
    /// kept, so the job can still be resumed later.
    pub fn cancel(&self) {
        self.engine.cancel_active();
    }

    /// Drop the current job entirely: stop polling and clear the slot.
    pub async fn discard(&self) -> Result<(), StoreError> {
        self.engine.cancel_active();
        self.store.clear().await
    }

    /// Send clinician feedback, attributed to the session's username when the
    /// token carries one. Delivery is fire-and-forget: network failures are
    /// logged, never surfaced. Validation failures are surfaced immediately,
    /// before anything touches the wire.
    pub fn send_feedback(
        &self,
        session: &Session,
        rating: u8,
        comment: impl Into<String>,
    ) -> Result<(), garde::Report> {
        let username = session
            .username()
            .unwrap_or_else(|| "anonymous".to_string());
        let feedback = Feedback::new(username, rating, comment);
        feedback.validate()?;

        let api = Arc::clone(&self.api);
        tokio::spawn(async move {
            match api.send_feedback(&feedback).await {
                Ok(()) => tracing::debug!(rating = feedback.rating, "Feedback delivered"),
                Err(e) => tracing::warn!(error = %e, "Feedback delivery failed"),
            }
        });
        Ok(())
    }

    fn spawn_poll<F>(&self, job_id: String, session: Session, on_update: F) -> PollHandle
    where
        F: Fn(AnalysisUpdate) + Send + Sync + 'static,
    {
        let projector_config = self.projector_config.clone();
        let callback: UpdateFn = Box::new(move |outcome| {
            let update = match outcome {
                JobOutcome::Completed { result } => {
                    AnalysisUpdate::Completed(projector::project(&result, &projector_config))
                }
                JobOutcome::Failed { message } => AnalysisUpdate::Failed { message },
                JobOutcome::TimedOut => AnalysisUpdate::TimedOut,
            };
            on_update(update);
        });
        self.engine.start(job_id, session, callback)
    }
}
