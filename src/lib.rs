//! MedScan Analysis Client
//!
//! Client library for the MedScan medical-imaging inference API. It covers
//! the full client-side lifecycle of an analysis job: validating and
//! submitting an image, polling the job status with tolerance for transient
//! server loss, persisting the in-flight job so a restart can resume it, and
//! projecting the loosely-typed result payload into a display-ready report.

pub mod client;
pub mod config;
pub mod models;
pub mod services;
pub mod session;

pub use client::{AnalysisClient, AnalysisUpdate};
pub use config::ClientConfig;
pub use models::feedback::Feedback;
pub use models::job::{Job, JobSnapshot, JobStatus};
pub use models::report::{AnalysisReport, ConfidenceBand, Finding};
pub use models::upload::{ImageKind, ImagePayload, UploadError};
pub use services::api::{AnalysisApi, ApiError, HttpAnalysisApi, StatusReport};
pub use services::persistence::{FileSnapshotStore, SnapshotStore, StoreError};
pub use services::poller::{JobOutcome, PollHandle, PollerConfig, PollerEngine, UpdateFn};
pub use services::projector::{project, ProjectorConfig};
pub use session::Session;

/// Register metric descriptions with the installed recorder.
///
/// Optional; call once at startup from applications that export metrics.
pub fn describe_metrics() {
    metrics::describe_counter!(
        "analysis_jobs_submitted",
        "Analysis jobs accepted by the server"
    );
    metrics::describe_counter!(
        "analysis_jobs_completed",
        "Analysis jobs that reached a completed result"
    );
    metrics::describe_counter!(
        "analysis_jobs_failed",
        "Analysis jobs the server reported as failed"
    );
    metrics::describe_counter!(
        "analysis_jobs_timed_out",
        "Polling sessions abandoned after sustained server loss"
    );
    metrics::describe_counter!(
        "analysis_poll_failures",
        "Individual status queries that failed"
    );
}
