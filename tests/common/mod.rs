//! Scripted test doubles for the analysis API and snapshot store.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use medscan_client::models::feedback::Feedback;
use medscan_client::models::upload::ImagePayload;
use medscan_client::services::api::{AnalysisApi, ApiError, StatusReport};
use medscan_client::services::persistence::{SnapshotStore, StoreError};
use medscan_client::{AnalysisUpdate, JobSnapshot, Session};

/// One scripted answer to a status query.
#[derive(Debug, Clone)]
pub enum PollStep {
    /// Successful query reporting the given status and no payload.
    Status(&'static str),
    /// Successful query reporting completion with the given result payload.
    Completed(serde_json::Value),
    /// Successful query reporting authoritative job failure.
    JobFailed(&'static str),
    /// Transient failure (network error / non-success HTTP).
    Unreachable,
}

#[derive(Debug, Clone)]
enum SubmitScript {
    Accept(String),
    Unauthorized,
    Reject(String),
}

/// Analysis API double driven by a fixed script of poll outcomes.
///
/// Once the script runs dry, further queries keep reporting `pending`; every
/// call is counted either way.
pub struct ScriptedApi {
    submit_script: SubmitScript,
    submit_calls: AtomicUsize,
    steps: Mutex<VecDeque<PollStep>>,
    status_calls: AtomicUsize,
    status_delay: Option<Duration>,
    feedback: Mutex<Vec<Feedback>>,
}

impl ScriptedApi {
    pub fn accepting(task_id: &str) -> Self {
        Self::with_submit(SubmitScript::Accept(task_id.to_string()))
    }

    pub fn rejecting_unauthorized() -> Self {
        Self::with_submit(SubmitScript::Unauthorized)
    }

    pub fn rejecting(message: &str) -> Self {
        Self::with_submit(SubmitScript::Reject(message.to_string()))
    }

    fn with_submit(submit_script: SubmitScript) -> Self {
        Self {
            submit_script,
            submit_calls: AtomicUsize::new(0),
            steps: Mutex::new(VecDeque::new()),
            status_calls: AtomicUsize::new(0),
            status_delay: None,
            feedback: Mutex::new(Vec::new()),
        }
    }

    pub fn with_steps(mut self, steps: Vec<PollStep>) -> Self {
        self.steps = Mutex::new(steps.into());
        self
    }

    /// Make every status query take this long to answer, so a test can land
    /// a cancellation while a response is in transit.
    pub fn with_status_delay(mut self, delay: Duration) -> Self {
        self.status_delay = Some(delay);
        self
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn recorded_feedback(&self) -> Vec<Feedback> {
        self.feedback.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnalysisApi for ScriptedApi {
    async fn submit(&self, _payload: &ImagePayload, _session: &Session) -> Result<String, ApiError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        match &self.submit_script {
            SubmitScript::Accept(task_id) => Ok(task_id.clone()),
            SubmitScript::Unauthorized => Err(ApiError::Unauthorized),
            SubmitScript::Reject(message) => Err(ApiError::Submission(message.clone())),
        }
    }

    async fn fetch_status(
        &self,
        _job_id: &str,
        _session: &Session,
    ) -> Result<StatusReport, ApiError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.status_delay {
            tokio::time::sleep(delay).await;
        }

        let step = self.steps.lock().unwrap().pop_front();
        match step.unwrap_or(PollStep::Status("pending")) {
            PollStep::Status(status) => Ok(StatusReport {
                status: status.to_string(),
                result: None,
                error: None,
            }),
            PollStep::Completed(result) => Ok(StatusReport {
                status: "completed".to_string(),
                result: Some(result),
                error: None,
            }),
            PollStep::JobFailed(error) => Ok(StatusReport {
                status: "failed".to_string(),
                result: None,
                error: Some(error.to_string()),
            }),
            PollStep::Unreachable => Err(ApiError::StatusQuery(503)),
        }
    }

    async fn send_feedback(&self, feedback: &Feedback) -> Result<(), ApiError> {
        self.feedback.lock().unwrap().push(feedback.clone());
        Ok(())
    }
}

/// In-memory single-slot snapshot store.
#[derive(Default)]
pub struct MemoryStore {
    slot: Mutex<Option<JobSnapshot>>,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn preloaded(snapshot: JobSnapshot) -> Self {
        Self {
            slot: Mutex::new(Some(snapshot)),
            saves: AtomicUsize::new(0),
        }
    }

    pub fn snapshot(&self) -> Option<JobSnapshot> {
        self.slot.lock().unwrap().clone()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn save(&self, snapshot: &JobSnapshot) -> Result<(), StoreError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        *self.slot.lock().unwrap() = Some(snapshot.clone());
        Ok(())
    }

    async fn load(&self) -> Option<JobSnapshot> {
        self.slot.lock().unwrap().clone()
    }

    async fn clear(&self) -> Result<(), StoreError> {
        *self.slot.lock().unwrap() = None;
        Ok(())
    }
}

/// Thread-safe collector for updates delivered through the poll callback.
#[derive(Clone, Default)]
pub struct UpdateLog {
    updates: Arc<Mutex<Vec<AnalysisUpdate>>>,
}

impl UpdateLog {
    pub fn recorder(&self) -> impl Fn(AnalysisUpdate) + Send + Sync + 'static {
        let updates = Arc::clone(&self.updates);
        move |update| updates.lock().unwrap().push(update)
    }

    pub fn updates(&self) -> Vec<AnalysisUpdate> {
        self.updates.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.updates.lock().unwrap().len()
    }
}

/// Collector for raw engine outcomes, for tests that drive the poller
/// directly.
#[derive(Clone, Default)]
pub struct OutcomeLog {
    outcomes: Arc<Mutex<Vec<medscan_client::JobOutcome>>>,
}

impl OutcomeLog {
    pub fn recorder(&self) -> medscan_client::UpdateFn {
        let outcomes = Arc::clone(&self.outcomes);
        Box::new(move |outcome| outcomes.lock().unwrap().push(outcome))
    }

    pub fn outcomes(&self) -> Vec<medscan_client::JobOutcome> {
        self.outcomes.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.outcomes.lock().unwrap().len()
    }
}

/// Minimal PNG signature, enough for format sniffing.
pub const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

pub fn png_payload() -> ImagePayload {
    ImagePayload::new("scan.png", PNG_MAGIC.to_vec())
}

/// Route library logs through the test harness; safe to call repeatedly.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_test_writer()
        .try_init();
}

/// Unsigned JWT whose payload carries the given `sub` claim.
pub fn session_for(username: &str) -> Session {
    use base64::Engine;
    let b64 = base64::engine::general_purpose::URL_SAFE_NO_PAD;
    let header = b64.encode(b"{\"alg\":\"none\"}");
    let payload = b64.encode(format!("{{\"sub\":\"{username}\"}}"));
    Session::new(format!("{header}.{payload}.sig"))
}
