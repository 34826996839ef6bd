use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use image::DynamicImage;
use reqwest::{Client, RequestBuilder};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use gn_core::error::{Error, Result};
use gn_core::{GenerationJob, JobStatus, PromptSpec};
use crate::generator::schemas::{
    CompletedJob, JobStatusResponse, PollOutcome, PollResponse, SubmitRequest, SubmitResponse,
};

pub mod schemas;
pub mod sleeper;

pub use sleeper::{Sleeper, TokioSleeper};

const GENERATE_SKYBOX: &str = "generateSkyboxImage";
const GET_SKYBOX: &str = "getSkyboxImage";
const API_KEY_HEADER: &str = "x-api-key";

/// Default timeout for a single HTTP request
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for the skybox generation service
pub struct GenerationClient {
    http: Client,
    base_url: String,
    api_token: Option<String>,
    request_timeout: Duration,
    sleeper: Arc<dyn Sleeper>,
}

impl GenerationClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_token: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            sleeper: Arc::new(TokioSleeper),
        })
    }

    /// Opaque token sent with service requests
    pub fn with_api_token(mut self, token: Option<String>) -> Self {
        self.api_token = token;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Replaces the primitive used to wait between polls
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Starts generation and returns the queued job
    pub async fn submit(&self, prompt: &PromptSpec) -> Result<GenerationJob> {
        if prompt.query().trim().is_empty() {
            return Err(Error::BadRequest("prompt query is empty".into()));
        }

        let body = SubmitRequest { prompt: prompt.render() };
        let response = self
            .authorize(self.http.post(self.endpoint(GENERATE_SKYBOX)))
            .json(&body)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = format!("HTTP {}: {}", status, text);
            return Err(if status.is_client_error() {
                Error::BadRequest(message)
            } else {
                Error::Network(message)
            });
        }

        let created: SubmitResponse = response
            .json()
            .await
            .map_err(|e| Error::Network(format!("unexpected submit response: {}", e)))?;

        info!("Submitted skybox job {} ({})", created.id, prompt.style());
        Ok(GenerationJob::new(created.id))
    }

    /// Issues a single status request
    pub async fn poll(&self, id: &str) -> Result<PollResponse> {
        let response = self
            .authorize(self.http.get(self.endpoint(GET_SKYBOX)))
            .query(&[("id", id)])
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(network_error)?;

        let code = response.status().as_u16();
        let bytes = response.bytes().await.map_err(network_error)?;

        let body = if bytes.is_empty() {
            None
        } else {
            match serde_json::from_slice::<JobStatusResponse>(&bytes) {
                Ok(body) => Some(body),
                Err(e) => {
                    warn!("Unreadable status body for job {} (HTTP {}): {}", id, code, e);
                    None
                }
            }
        };

        Ok(PollResponse { code, body })
    }

    /// Polls until the job reaches a terminal state.
    ///
    /// Every transient response uses up one of `max_retries`; the loop waits
    /// `poll_interval` before polling again. A transient response with no
    /// budget left ends in `Timeout`.
    pub async fn wait_for_completion(
        &self,
        job: &mut GenerationJob,
        max_retries: u32,
        poll_interval: Duration,
        cancel: &CancellationToken,
    ) -> Result<CompletedJob> {
        let mut remaining = max_retries;

        loop {
            let response = until_cancelled(cancel, self.poll(job.id())).await?;
            let progress = response.body.as_ref().and_then(|b| b.progress);
            job.record_progress(progress);

            debug!(
                "Job {} poll {}: HTTP {} status {:?} progress {:?}",
                job.id(), job.retries() + 1, response.code, response.status(), progress
            );

            match response.classify() {
                PollOutcome::Pending => {
                    job.advance(JobStatus::Processing);
                    job.record_retry();

                    if remaining == 0 {
                        job.advance(JobStatus::TimedOut);
                        warn!("Skybox job {} did not finish after {} polls", job.id(), job.retries());
                        return Err(Error::Timeout { retries: max_retries });
                    }
                    remaining -= 1;

                    until_cancelled(cancel, async {
                        self.sleeper.sleep(poll_interval).await;
                        Ok(())
                    }).await?;
                }
                PollOutcome::Complete { file_url } => {
                    job.advance(JobStatus::Complete);
                    info!("Skybox job {} complete", job.id());
                    return Ok(CompletedJob::new(job.id(), file_url, response.body));
                }
                PollOutcome::Failed { status } => {
                    job.advance(JobStatus::Failed);
                    warn!("Skybox job {} failed (HTTP {}, status {:?})", job.id(), response.code, status);
                    return Err(Error::RemoteFailure { status });
                }
            }
        }
    }

    /// Looks up a job that already finished
    pub async fn fetch_completed(&self, id: &str) -> Result<CompletedJob> {
        if id.trim().is_empty() {
            return Err(Error::InvalidInput("job id is empty".into()));
        }

        let response = self.poll(id).await?;
        match response.classify() {
            PollOutcome::Complete { file_url } => Ok(CompletedJob::new(id, file_url, response.body)),
            PollOutcome::Pending => Err(Error::RemoteFailure { status: Some("processing".into()) }),
            PollOutcome::Failed { status } => Err(Error::RemoteFailure { status }),
        }
    }

    /// Downloads and decodes the image at `url`
    pub async fn download_image(&self, url: &str) -> Result<DynamicImage> {
        let response = self
            .http
            .get(url)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| Error::Download(format!("{}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Download(format!("HTTP {} for {}", status, url)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Download(format!("{}: {}", url, e)))?;

        let image = image::load_from_memory(&bytes)
            .map_err(|e| Error::Download(format!("could not decode {}: {}", url, e)))?;

        info!("Downloaded {}x{} panorama ({} bytes)", image.width(), image.height(), bytes.len());
        Ok(image)
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/{}", self.base_url, name)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => request.header(API_KEY_HEADER, token),
            None => request,
        }
    }
}

/// Runs `future` unless `cancel` fires first, in which case the future is dropped
pub(crate) async fn until_cancelled<T>(
    cancel: &CancellationToken,
    future: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        result = future => result,
    }
}

fn network_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Network(format!("request timed out: {}", e))
    } else if e.is_connect() {
        Error::Network(format!("connection failed: {}", e))
    } else {
        Error::Network(e.to_string())
    }
}
