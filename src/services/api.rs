use async_trait::async_trait;
use reqwest::multipart;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::models::feedback::Feedback;
use crate::models::upload::{ImagePayload, UploadError};
use crate::session::Session;

/// Raw status payload from `GET /result/{task_id}`.
///
/// `status` stays a string here: the server owns that vocabulary, and the
/// poller must keep waiting on values it has never seen rather than choke on
/// them.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusReport {
    pub status: String,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubmitReceipt {
    task_id: String,
}

/// Error body shape used by the analysis service.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Remote analysis service operations used by the client.
///
/// Seam for tests and alternative transports; the production implementation
/// is [`HttpAnalysisApi`].
#[async_trait]
pub trait AnalysisApi: Send + Sync {
    /// Submit an image for analysis, returning the server-assigned job id.
    async fn submit(&self, payload: &ImagePayload, session: &Session) -> Result<String, ApiError>;

    /// Fetch the current status of a job.
    async fn fetch_status(&self, job_id: &str, session: &Session)
        -> Result<StatusReport, ApiError>;

    /// Deliver clinician feedback. Callers treat this as fire-and-forget.
    async fn send_feedback(&self, feedback: &Feedback) -> Result<(), ApiError>;
}

/// HTTP client for the analysis service.
pub struct HttpAnalysisApi {
    http: reqwest::Client,
    base_url: String,
}

impl HttpAnalysisApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    /// Pull the server-provided message out of an error response, falling
    /// back to the HTTP status line.
    async fn error_message(response: reqwest::Response) -> String {
        let status = response.status();
        match response.json::<ErrorBody>().await {
            Ok(body) => body
                .detail
                .or(body.message)
                .unwrap_or_else(|| format!("Server error: {status}")),
            Err(_) => format!("Server error: {status}"),
        }
    }
}

#[async_trait]
impl AnalysisApi for HttpAnalysisApi {
    async fn submit(&self, payload: &ImagePayload, session: &Session) -> Result<String, ApiError> {
        let part = multipart::Part::bytes(payload.bytes.clone())
            .file_name(payload.file_name.clone())
            .mime_str(payload.mime_type())?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .http
            .post(format!("{}/analyze", self.base_url))
            .bearer_auth(session.bearer_token())
            .multipart(form)
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized);
        }
        if !response.status().is_success() {
            return Err(ApiError::Submission(Self::error_message(response).await));
        }

        let receipt: SubmitReceipt = response.json().await?;
        tracing::info!(job_id = %receipt.task_id, "Analysis job accepted");
        Ok(receipt.task_id)
    }

    async fn fetch_status(
        &self,
        job_id: &str,
        session: &Session,
    ) -> Result<StatusReport, ApiError> {
        let response = self
            .http
            .get(format!("{}/result/{}", self.base_url, job_id))
            .bearer_auth(session.bearer_token())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ApiError::StatusQuery(response.status().as_u16()));
        }

        Ok(response.json().await?)
    }

    async fn send_feedback(&self, feedback: &Feedback) -> Result<(), ApiError> {
        self.http
            .post(format!("{}/feedback", self.base_url))
            .json(feedback)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Credential rejected; the caller should route to re-authentication.
    #[error("Credential rejected by the analysis service")]
    Unauthorized,

    /// The service refused to create a job.
    #[error("Submission rejected: {0}")]
    Submission(String),

    /// Payload failed client-side validation before any network call.
    #[error("Invalid upload: {0}")]
    InvalidUpload(#[from] UploadError),

    /// A status query came back with a non-success HTTP code. Transient from
    /// the poller's point of view.
    #[error("Status query failed with HTTP {0}")]
    StatusQuery(u16),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}
