use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::models::job::{Job, JobStatus};
use crate::services::api::AnalysisApi;
use crate::services::persistence::SnapshotStore;
use crate::services::projector;
use crate::session::Session;

/// Cadence and give-up policy for a polling session.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Time between successive status queries.
    pub interval: Duration,
    /// Consecutive failed queries tolerated before declaring the server lost.
    /// A single blip never terminates a session; only sustained
    /// unreachability does.
    pub max_consecutive_failures: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_consecutive_failures: 20,
        }
    }
}

/// Terminal outcome of a polling session, delivered to the caller at most
/// once. Cancellation produces no delivery at all.
#[derive(Debug, Clone)]
pub enum JobOutcome {
    /// The server finished the job; raw result payload attached.
    Completed { result: serde_json::Value },
    /// The server reported authoritative failure. Not retried.
    Failed { message: String },
    /// The failure ceiling was reached without a verdict from the server.
    TimedOut,
}

/// Callback receiving the terminal outcome of a polling session.
pub type UpdateFn = Box<dyn Fn(JobOutcome) + Send + Sync + 'static>;

struct ActiveSession {
    poll_id: Uuid,
    job_id: String,
    token: CancellationToken,
}

/// Handle to a running polling session.
#[derive(Debug)]
pub struct PollHandle {
    job_id: String,
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl PollHandle {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Stop the session immediately. Any response already in transit is
    /// discarded, and no update will be delivered after this returns.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the polling task to wind down.
    pub async fn finished(self) {
        let _ = self.task.await;
    }
}

/// Drives the status-query loop for submitted jobs.
///
/// At most one polling session is active per engine; starting a new session
/// supersedes the previous one, cancelling it and revoking its ability to
/// emit updates or write snapshots.
pub struct PollerEngine {
    api: Arc<dyn AnalysisApi>,
    store: Arc<dyn SnapshotStore>,
    config: PollerConfig,
    active: Arc<Mutex<Option<ActiveSession>>>,
}

impl PollerEngine {
    pub fn new(
        api: Arc<dyn AnalysisApi>,
        store: Arc<dyn SnapshotStore>,
        config: PollerConfig,
    ) -> Self {
        Self {
            api,
            store,
            config,
            active: Arc::new(Mutex::new(None)),
        }
    }

    /// Begin polling `job_id`, delivering the terminal outcome through
    /// `on_update`. The failure counter starts at zero for every session,
    /// including resumed ones.
    pub fn start(
        &self,
        job_id: impl Into<String>,
        session: Session,
        on_update: UpdateFn,
    ) -> PollHandle {
        let job_id = job_id.into();
        let poll_id = Uuid::new_v4();
        let token = CancellationToken::new();

        {
            let mut active = self.active.lock().expect("poller registry poisoned");
            if let Some(previous) = active.take() {
                tracing::debug!(
                    job_id = %previous.job_id,
                    "Superseding active polling session"
                );
                previous.token.cancel();
            }
            *active = Some(ActiveSession {
                poll_id,
                job_id: job_id.clone(),
                token: token.clone(),
            });
        }

        tracing::info!(job_id = %job_id, poll_id = %poll_id, "Polling started");

        let poll_session = PollSession {
            api: Arc::clone(&self.api),
            store: Arc::clone(&self.store),
            config: self.config.clone(),
            session,
            token: token.clone(),
            registry: Arc::clone(&self.active),
            poll_id,
        };
        let task = tokio::spawn(poll_session.run(job_id.clone(), on_update));

        PollHandle {
            job_id,
            token,
            task,
        }
    }

    /// Cancel whichever session is currently active, if any.
    pub fn cancel_active(&self) {
        let mut active = self.active.lock().expect("poller registry poisoned");
        if let Some(session) = active.take() {
            tracing::info!(job_id = %session.job_id, "Polling cancelled");
            session.token.cancel();
        }
    }

    pub fn active_job_id(&self) -> Option<String> {
        self.active
            .lock()
            .expect("poller registry poisoned")
            .as_ref()
            .map(|session| session.job_id.clone())
    }
}

/// One polling session. Queries do not overlap: a slow response delays the
/// next query, and ticks missed in the meantime are skipped rather than
/// replayed in a burst.
struct PollSession {
    api: Arc<dyn AnalysisApi>,
    store: Arc<dyn SnapshotStore>,
    config: PollerConfig,
    session: Session,
    token: CancellationToken,
    registry: Arc<Mutex<Option<ActiveSession>>>,
    poll_id: Uuid,
}

impl PollSession {
    async fn run(self, job_id: String, on_update: UpdateFn) {
        let mut job = Job::new(&job_id);
        let mut ticker = tokio::time::interval_at(
            tokio::time::Instant::now() + self.config.interval,
            self.config.interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let outcome = loop {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => break None,
                _ = ticker.tick() => {}
            }

            // A cancellation landing while the request is in flight discards
            // the response instead of delivering it.
            let fetched = tokio::select! {
                biased;
                _ = self.token.cancelled() => break None,
                result = self.api.fetch_status(&job.id, &self.session) => result,
            };

            match fetched {
                Ok(report) => {
                    job.consecutive_failures = 0;
                    match report.status.parse::<JobStatus>() {
                        Ok(JobStatus::Completed) => {
                            job.status = JobStatus::Completed;
                            let result = report.result.unwrap_or(serde_json::Value::Null);
                            job.result = Some(result.clone());
                            break Some(JobOutcome::Completed { result });
                        }
                        Ok(JobStatus::Failed) => {
                            job.status = JobStatus::Failed;
                            let message = projector::humanize_failure(report.error.as_deref());
                            job.error = Some(message.clone());
                            break Some(JobOutcome::Failed { message });
                        }
                        Ok(next) => {
                            if job.status != next {
                                job.status = next;
                                self.save_snapshot(&job).await;
                            }
                            tracing::debug!(job_id = %job.id, status = %next, "Job still in flight");
                        }
                        Err(_) => {
                            tracing::debug!(
                                job_id = %job.id,
                                status = %report.status,
                                "Unrecognized status, continuing to poll"
                            );
                        }
                    }
                }
                Err(e) => {
                    job.consecutive_failures += 1;
                    metrics::counter!("analysis_poll_failures").increment(1);
                    tracing::warn!(
                        job_id = %job.id,
                        attempt = job.consecutive_failures,
                        ceiling = self.config.max_consecutive_failures,
                        error = %e,
                        "Status query failed"
                    );
                    if job.consecutive_failures >= self.config.max_consecutive_failures {
                        break Some(JobOutcome::TimedOut);
                    }
                }
            }
        };

        self.deregister();

        let Some(outcome) = outcome else {
            tracing::info!(job_id = %job.id, "Polling session ended by cancellation");
            return;
        };

        match &outcome {
            JobOutcome::Completed { .. } => {
                metrics::counter!("analysis_jobs_completed").increment(1);
                self.save_snapshot(&job).await;
                tracing::info!(job_id = %job.id, "Analysis completed");
            }
            JobOutcome::Failed { message } => {
                metrics::counter!("analysis_jobs_failed").increment(1);
                self.save_snapshot(&job).await;
                tracing::warn!(job_id = %job.id, error = %message, "Analysis failed");
            }
            JobOutcome::TimedOut => {
                // The in-flight snapshot stays put so the job can be resumed
                // once the server is reachable again.
                metrics::counter!("analysis_jobs_timed_out").increment(1);
                tracing::error!(job_id = %job.id, "Server unreachable, polling stopped");
            }
        }

        if !self.token.is_cancelled() {
            on_update(outcome);
        }
    }

    /// Remove this session from the registry, but never clear a successor's
    /// slot.
    fn deregister(&self) {
        let mut active = self.registry.lock().expect("poller registry poisoned");
        if active.as_ref().is_some_and(|a| a.poll_id == self.poll_id) {
            *active = None;
        }
    }

    /// Snapshot writes are gated on the session still owning the write path;
    /// a superseded or cancelled session must not clobber the slot.
    async fn save_snapshot(&self, job: &Job) {
        if self.token.is_cancelled() {
            return;
        }
        if let Err(e) = self.store.save(&job.snapshot()).await {
            tracing::warn!(job_id = %job.id, error = %e, "Snapshot save failed");
        }
    }
}
