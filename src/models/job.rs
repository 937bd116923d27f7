use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Status of an analysis job on the remote inference service.
///
/// The wire values are server-defined; anything the server sends that does
/// not parse into one of these is treated as "still in flight" by the poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// An analysis job tracked by the polling engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Opaque identifier assigned by the server at submission.
    pub id: String,
    pub status: JobStatus,
    pub submitted_at: DateTime<Utc>,
    /// Failed status queries since the last successful one. Reset to zero by
    /// any successful query.
    pub consecutive_failures: u32,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl Job {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: JobStatus::Pending,
            submitted_at: Utc::now(),
            consecutive_failures: 0,
            result: None,
            error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            status: self.status,
            job_id: self.id.clone(),
            result: self.result.clone(),
            saved_at: Utc::now(),
        }
    }
}

/// The minimal durable record of the current job, written wholesale to the
/// local snapshot slot on every transition worth surviving a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub status: JobStatus,
    pub job_id: String,
    pub result: Option<serde_json::Value>,
    pub saved_at: DateTime<Utc>,
}

impl JobSnapshot {
    pub fn in_flight(job_id: impl Into<String>, status: JobStatus) -> Self {
        Self {
            status,
            job_id: job_id.into(),
            result: None,
            saved_at: Utc::now(),
        }
    }

    /// Whether a freshly loaded snapshot warrants a new polling session.
    pub fn is_resumable(&self) -> bool {
        matches!(self.status, JobStatus::Pending | JobStatus::Processing)
    }
}
