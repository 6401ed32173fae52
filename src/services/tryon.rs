//! Try-on job orchestrator.
//!
//! Drives one request through the remote workflow:
//! preprocess → submit → poll until terminal → resolve image → persist.
//! State is local to the request; concurrent requests never share anything
//! but the result directory, where vendor-unique job ids keep writes apart.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use tokio::time::Instant;

use crate::models::job::{JobStatus, RemoteJob, SubmittedJob};
use crate::models::tryon::TryOnResult;
use crate::services::image::{self, ImageError};
use crate::services::storage::{ResultStore, StoreError};
use crate::services::vendor::{self, Asset, VendorApi, VendorError};

#[derive(Debug, thiserror::Error)]
pub enum TryOnError {
    #[error(transparent)]
    Image(#[from] ImageError),

    #[error(transparent)]
    Vendor(#[from] VendorError),

    #[error("try-on job failed: {reason}")]
    JobFailed { reason: String },

    #[error("try-on job succeeded but returned no image reference")]
    MissingResult,

    #[error("timed out waiting for the try-on job to finish")]
    Timeout,

    #[error("failed to decode inline result image: {0}")]
    BadInlineImage(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct TryOnService {
    vendor: Arc<dyn VendorApi>,
    store: ResultStore,
    default_model: String,
    poll_interval: Duration,
    poll_timeout: Duration,
}

impl TryOnService {
    pub fn new(
        vendor: Arc<dyn VendorApi>,
        store: ResultStore,
        default_model: String,
        poll_interval: Duration,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            vendor,
            store,
            default_model,
            poll_interval,
            poll_timeout,
        }
    }

    /// Run one try-on request end to end.
    ///
    /// No step is retried: a submission failure aborts immediately, and a
    /// terminal vendor failure or timeout surfaces to the caller, who
    /// decides whether to resubmit.
    pub async fn generate(
        &self,
        person_bytes: &[u8],
        garment_bytes: &[u8],
        model: Option<&str>,
    ) -> Result<TryOnResult, TryOnError> {
        let started = std::time::Instant::now();
        metrics::counter!("tryon_jobs_total").increment(1);

        let result = self.run(person_bytes, garment_bytes, model).await;
        match &result {
            Ok(outcome) => {
                metrics::counter!("tryon_jobs_completed").increment(1);
                metrics::histogram!("tryon_processing_seconds")
                    .record(started.elapsed().as_secs_f64());
                tracing::info!(
                    job_id = %outcome.job_id,
                    model = %outcome.model,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "try-on completed"
                );
            }
            Err(e) => {
                metrics::counter!("tryon_jobs_failed").increment(1);
                tracing::warn!(error = %e, "try-on failed");
            }
        }
        result
    }

    async fn run(
        &self,
        person_bytes: &[u8],
        garment_bytes: &[u8],
        model: Option<&str>,
    ) -> Result<TryOnResult, TryOnError> {
        let model = vendor::normalize_model(model, &self.default_model);
        tracing::info!(model = %model, "try-on request");

        // Validation happens before any vendor traffic.
        let (person_jpeg, person_mime) = image::prepare(person_bytes)?;
        let (garment_jpeg, garment_mime) = image::prepare(garment_bytes)?;

        let person = Asset {
            file_name: "person.jpg",
            bytes: person_jpeg,
            mime: person_mime,
        };
        let garment = Asset {
            file_name: "garment.jpg",
            bytes: garment_jpeg,
            mime: garment_mime,
        };

        let submitted = self.vendor.submit(&person, &garment, &model).await?;
        tracing::debug!(job_id = %submitted.job_id, "job submitted, polling");

        let job = self.wait_for_completion(&submitted).await?;
        let image_bytes = self.resolve_result(&job).await?;

        let path = self.store.save(&job.job_id, &image_bytes, "png").await?;
        let image_url = self.store.url_for(&path);
        let image_base64 = base64::engine::general_purpose::STANDARD.encode(&image_bytes);

        Ok(TryOnResult {
            prompt: format!("dashscope outfitanyone {model}"),
            job_id: job.job_id,
            image_bytes,
            image_base64,
            image_url,
            model,
        })
    }

    /// Poll at a fixed interval until the job is terminal or the overall
    /// bound elapses. The sleep suspends this task only; other requests
    /// keep progressing on the runtime.
    async fn wait_for_completion(&self, submitted: &SubmittedJob) -> Result<RemoteJob, TryOnError> {
        let deadline = Instant::now() + self.poll_timeout;
        loop {
            let job = self.vendor.poll(submitted).await?;
            match job.status {
                JobStatus::Succeeded => return Ok(job),
                JobStatus::Failed | JobStatus::Canceled | JobStatus::Unknown => {
                    let reason = job
                        .reason
                        .unwrap_or_else(|| format!("job ended in status {:?}", job.status));
                    return Err(TryOnError::JobFailed { reason });
                }
                JobStatus::Pending | JobStatus::Running => {
                    if Instant::now() >= deadline {
                        return Err(TryOnError::Timeout);
                    }
                    tracing::debug!(job_id = %job.job_id, status = ?job.status, "job not terminal yet");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }

    /// Resolve the succeeded job's image reference: prefer the direct URL,
    /// fall back to inline base64; neither present is a hard failure
    /// (the vendor already declared the job terminal).
    async fn resolve_result(&self, job: &RemoteJob) -> Result<Vec<u8>, TryOnError> {
        if let Some(url) = &job.image_url {
            tracing::debug!(job_id = %job.job_id, "downloading result image");
            return Ok(self.vendor.download(url).await?);
        }
        if let Some(inline) = &job.image_base64 {
            return base64::engine::general_purpose::STANDARD
                .decode(inline.trim())
                .map_err(|e| TryOnError::BadInlineImage(e.to_string()));
        }
        Err(TryOnError::MissingResult)
    }
}
