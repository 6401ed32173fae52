//! Try-on vendor HTTP client.
//!
//! Every interaction with the remote try-on provider lives here, behind the
//! [`VendorApi`] trait. Two wire shapes are supported: the DashScope
//! OutfitAnyone flow (upload policy → object-store upload → async task
//! submission → task polling) and a direct single-endpoint multipart
//! submission. The profile is chosen from configuration at construction;
//! callers never branch on it.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart;
use serde::Deserialize;

use crate::config::{AppConfig, VendorProfile};
use crate::models::job::{JobStatus, RemoteJob, SubmittedJob};

/// Model variants the vendor accepts.
pub const SUPPORTED_MODELS: &[&str] = &["aitryon", "aitryon-plus"];

/// Global HTTP client (lazily initialized, reused for every vendor call).
static HTTP_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

/// Get or initialize the shared HTTP client.
///
/// Per-request timeouts are set at the call sites; they are deliberately
/// stricter than the orchestrator's overall polling bound so a stuck call
/// fails fast.
fn http_client() -> &'static reqwest::Client {
    HTTP_CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new())
    })
}

#[derive(Debug, thiserror::Error)]
pub enum VendorError {
    #[error("vendor API key is not configured")]
    Auth,

    #[error("vendor returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("malformed vendor response: {0}")]
    MalformedResponse(String),

    #[error("vendor request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("vendor configuration error: {0}")]
    Config(String),
}

/// One normalized image ready for submission.
#[derive(Debug, Clone)]
pub struct Asset {
    pub file_name: &'static str,
    pub bytes: Vec<u8>,
    pub mime: &'static str,
}

/// Short-lived signed credentials for a direct object-store upload.
/// Lives for a single job submission, never persisted.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadPolicy {
    pub upload_dir: String,
    pub upload_host: String,
    pub oss_access_key_id: String,
    pub signature: String,
    pub policy: String,
    pub x_oss_object_acl: String,
    pub x_oss_forbid_overwrite: String,
}

/// The vendor contract the orchestrator drives.
#[async_trait]
pub trait VendorApi: Send + Sync {
    /// Submit both assets as one try-on job. Any upload/submission failure
    /// aborts the whole request; nothing is retried here.
    async fn submit(
        &self,
        person: &Asset,
        garment: &Asset,
        model: &str,
    ) -> Result<SubmittedJob, VendorError>;

    /// A single status check. Repetition is the orchestrator's job.
    async fn poll(&self, job: &SubmittedJob) -> Result<RemoteJob, VendorError>;

    /// Fetch the generated image from the URL the vendor reported.
    async fn download(&self, url: &str) -> Result<Vec<u8>, VendorError> {
        let response = http_client()
            .get(url)
            .timeout(Duration::from_secs(60))
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.bytes().await?.to_vec())
    }
}

/// Build the vendor client matching the configured profile.
pub fn from_config(config: &AppConfig) -> Result<Arc<dyn VendorApi>, VendorError> {
    match config.vendor_profile {
        VendorProfile::Policy => Ok(Arc::new(PolicyVendorClient::new(
            config.dashscope_api_key.clone(),
            config.vendor_base_url.clone(),
        ))),
        VendorProfile::Direct => {
            let submit_url = config
                .vendor_direct_url
                .clone()
                .ok_or_else(|| {
                    VendorError::Config("VENDOR_DIRECT_URL is required for the direct profile".to_string())
                })?;
            Ok(Arc::new(DirectVendorClient::new(
                config.dashscope_api_key.clone(),
                submit_url,
            )))
        }
    }
}

/// Resolve the model variant to use. Blank or unrecognized names fall back
/// to the configured default with a warning, never an error; mobile clients
/// ship stale variant lists.
pub fn normalize_model(requested: Option<&str>, default: &str) -> String {
    let name = requested.unwrap_or(default).trim();
    let name = if name.is_empty() { default } else { name };
    if SUPPORTED_MODELS.contains(&name) {
        name.to_string()
    } else {
        tracing::warn!(requested = %name, fallback = %default, "unsupported try-on model, using default");
        default.to_string()
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, VendorError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(VendorError::Http {
        status: status.as_u16(),
        body,
    })
}

/// Task envelope shared by submission and polling responses.
#[derive(Debug, Default, Deserialize)]
struct TaskResponse {
    #[serde(default)]
    output: Option<TaskOutput>,
}

#[derive(Debug, Default, Deserialize)]
struct TaskOutput {
    task_id: Option<String>,
    task_status: Option<String>,
    image_url: Option<String>,
    image_base64: Option<String>,
    code: Option<String>,
    message: Option<String>,
}

impl TaskResponse {
    fn into_remote_job(self, job_id: &str) -> RemoteJob {
        let output = self.output.unwrap_or_default();
        let status = output
            .task_status
            .as_deref()
            .map(JobStatus::from_vendor)
            .unwrap_or(JobStatus::Unknown);
        RemoteJob {
            job_id: job_id.to_string(),
            status,
            image_url: output.image_url,
            image_base64: output.image_base64,
            reason: failure_reason(output.code, output.message),
        }
    }
}

/// Keep the vendor's reported failure reason intact for the caller.
fn failure_reason(code: Option<String>, message: Option<String>) -> Option<String> {
    match (code, message) {
        (Some(code), Some(message)) => Some(format!("{code}: {message}")),
        (Some(code), None) => Some(code),
        (None, Some(message)) => Some(message),
        (None, None) => None,
    }
}

// ─── Policy profile (DashScope OutfitAnyone) ─────────────────────────────

pub struct PolicyVendorClient {
    api_key: Option<String>,
    base_url: String,
}

impl PolicyVendorClient {
    pub fn new(api_key: Option<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key,
            base_url: base_url.into(),
        }
    }

    fn api_key(&self) -> Result<&str, VendorError> {
        self.api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or(VendorError::Auth)
    }

    /// Fetch short-lived signed upload credentials for `model`.
    pub async fn get_upload_policy(&self, model: &str) -> Result<UploadPolicy, VendorError> {
        let url = format!("{}/api/v1/uploads", self.base_url);
        let response = http_client()
            .get(&url)
            .bearer_auth(self.api_key()?)
            .query(&[("action", "getPolicy"), ("model", model)])
            .timeout(Duration::from_secs(30))
            .send()
            .await?;
        let response = check_status(response).await?;

        #[derive(Deserialize)]
        struct PolicyResponse {
            data: Option<UploadPolicy>,
        }

        let body: PolicyResponse = response
            .json()
            .await
            .map_err(|e| VendorError::MalformedResponse(e.to_string()))?;
        body.data
            .ok_or_else(|| VendorError::MalformedResponse("policy response missing data".to_string()))
    }

    /// Direct-to-object-store multipart upload using the policy's signed
    /// fields. Returns the `oss://` reference the task submission expects.
    pub async fn upload_asset(
        &self,
        policy: &UploadPolicy,
        file_name: &str,
        bytes: Vec<u8>,
        mime: &str,
    ) -> Result<String, VendorError> {
        let key = format!("{}/{}", policy.upload_dir, file_name);
        let part = multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime)?;
        let form = multipart::Form::new()
            .text("OSSAccessKeyId", policy.oss_access_key_id.clone())
            .text("Signature", policy.signature.clone())
            .text("policy", policy.policy.clone())
            .text("x-oss-object-acl", policy.x_oss_object_acl.clone())
            .text("x-oss-forbid-overwrite", policy.x_oss_forbid_overwrite.clone())
            .text("key", key.clone())
            .text("success_action_status", "200")
            .part("file", part);

        let response = http_client()
            .post(&policy.upload_host)
            .multipart(form)
            .timeout(Duration::from_secs(60))
            .send()
            .await?;
        check_status(response).await?;
        Ok(format!("oss://{key}"))
    }

    /// Submit the async image-synthesis task. Fails when the response omits
    /// a task id.
    pub async fn create_task(
        &self,
        person_ref: &str,
        garment_ref: &str,
        model: &str,
    ) -> Result<String, VendorError> {
        let url = format!(
            "{}/api/v1/services/aigc/image2image/image-synthesis",
            self.base_url
        );
        let payload = serde_json::json!({
            "model": model,
            "input": {
                "person_image_url": person_ref,
                "top_garment_url": garment_ref,
            },
            "parameters": {
                "resolution": -1,
                "restore_face": true,
            },
        });

        let response = http_client()
            .post(&url)
            .bearer_auth(self.api_key()?)
            .header("X-DashScope-Async", "enable")
            .header("X-DashScope-OssResourceResolve", "enable")
            .json(&payload)
            .timeout(Duration::from_secs(60))
            .send()
            .await?;
        let response = check_status(response).await?;

        let body: TaskResponse = response
            .json()
            .await
            .map_err(|e| VendorError::MalformedResponse(e.to_string()))?;
        let output = body.output.unwrap_or_default();
        let task_id = output
            .task_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                VendorError::MalformedResponse("submission response missing task_id".to_string())
            })?;

        tracing::info!(
            task_id = %task_id,
            status = output.task_status.as_deref().unwrap_or("unknown"),
            "try-on task created"
        );
        Ok(task_id)
    }

    /// One status check against the vendor's task endpoint.
    pub async fn poll_task(&self, task_id: &str) -> Result<RemoteJob, VendorError> {
        let url = format!("{}/api/v1/tasks/{}", self.base_url, task_id);
        let response = http_client()
            .get(&url)
            .bearer_auth(self.api_key()?)
            .timeout(Duration::from_secs(30))
            .send()
            .await?;
        let response = check_status(response).await?;
        let body: TaskResponse = response
            .json()
            .await
            .map_err(|e| VendorError::MalformedResponse(e.to_string()))?;
        Ok(body.into_remote_job(task_id))
    }
}

#[async_trait]
impl VendorApi for PolicyVendorClient {
    async fn submit(
        &self,
        person: &Asset,
        garment: &Asset,
        model: &str,
    ) -> Result<SubmittedJob, VendorError> {
        // One policy covers both uploads for this submission.
        let policy = self.get_upload_policy(model).await?;
        let person_ref = self
            .upload_asset(&policy, person.file_name, person.bytes.clone(), person.mime)
            .await?;
        let garment_ref = self
            .upload_asset(&policy, garment.file_name, garment.bytes.clone(), garment.mime)
            .await?;
        let job_id = self.create_task(&person_ref, &garment_ref, model).await?;
        Ok(SubmittedJob {
            job_id,
            status_url: None,
        })
    }

    async fn poll(&self, job: &SubmittedJob) -> Result<RemoteJob, VendorError> {
        self.poll_task(&job.job_id).await
    }
}

// ─── Direct profile ──────────────────────────────────────────────────────

/// Vendor shape where a single multipart POST returns the job id and a
/// status-check URL; no separate policy/object-store step.
pub struct DirectVendorClient {
    api_key: Option<String>,
    submit_url: String,
}

impl DirectVendorClient {
    pub fn new(api_key: Option<String>, submit_url: impl Into<String>) -> Self {
        Self {
            api_key,
            submit_url: submit_url.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DirectSubmitResponse {
    task_id: String,
    status_url: String,
}

#[async_trait]
impl VendorApi for DirectVendorClient {
    async fn submit(
        &self,
        person: &Asset,
        garment: &Asset,
        model: &str,
    ) -> Result<SubmittedJob, VendorError> {
        let person_part = multipart::Part::bytes(person.bytes.clone())
            .file_name(person.file_name.to_string())
            .mime_str(person.mime)?;
        let garment_part = multipart::Part::bytes(garment.bytes.clone())
            .file_name(garment.file_name.to_string())
            .mime_str(garment.mime)?;
        let form = multipart::Form::new()
            .part("person", person_part)
            .part("garment", garment_part)
            .text("model", model.to_string());

        let mut request = http_client()
            .post(&self.submit_url)
            .multipart(form)
            .timeout(Duration::from_secs(60));
        if let Some(key) = self.api_key.as_deref().filter(|k| !k.is_empty()) {
            request = request.bearer_auth(key);
        }

        let response = check_status(request.send().await?).await?;
        let body: DirectSubmitResponse = response
            .json()
            .await
            .map_err(|e| VendorError::MalformedResponse(e.to_string()))?;

        tracing::info!(task_id = %body.task_id, "try-on task created (direct)");
        Ok(SubmittedJob {
            job_id: body.task_id,
            status_url: Some(body.status_url),
        })
    }

    async fn poll(&self, job: &SubmittedJob) -> Result<RemoteJob, VendorError> {
        let status_url = job.status_url.as_deref().ok_or_else(|| {
            VendorError::MalformedResponse("direct job is missing its status URL".to_string())
        })?;
        let mut request = http_client()
            .get(status_url)
            .timeout(Duration::from_secs(30));
        if let Some(key) = self.api_key.as_deref().filter(|k| !k.is_empty()) {
            request = request.bearer_auth(key);
        }
        let response = check_status(request.send().await?).await?;
        let body: TaskResponse = response
            .json()
            .await
            .map_err(|e| VendorError::MalformedResponse(e.to_string()))?;
        Ok(body.into_remote_job(&job.job_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_known_model_passes_through() {
        assert_eq!(normalize_model(Some("aitryon-plus"), "aitryon"), "aitryon-plus");
        assert_eq!(normalize_model(Some("aitryon"), "aitryon-plus"), "aitryon");
    }

    #[test]
    fn test_normalize_unknown_model_falls_back() {
        assert_eq!(normalize_model(Some("dalle-9"), "aitryon"), "aitryon");
    }

    #[test]
    fn test_normalize_blank_or_missing_uses_default() {
        assert_eq!(normalize_model(None, "aitryon"), "aitryon");
        assert_eq!(normalize_model(Some(""), "aitryon"), "aitryon");
        assert_eq!(normalize_model(Some("   "), "aitryon"), "aitryon");
    }

    #[test]
    fn test_parse_succeeded_task_response() {
        let raw = r#"{
            "request_id": "abc",
            "output": {
                "task_id": "task-123",
                "task_status": "SUCCEEDED",
                "image_url": "https://cdn.example.com/result.png"
            }
        }"#;
        let parsed: TaskResponse = serde_json::from_str(raw).unwrap();
        let job = parsed.into_remote_job("task-123");
        assert_eq!(job.status, JobStatus::Succeeded);
        assert_eq!(job.image_url.as_deref(), Some("https://cdn.example.com/result.png"));
        assert!(job.reason.is_none());
    }

    #[test]
    fn test_parse_failed_task_response_keeps_reason() {
        let raw = r#"{
            "output": {
                "task_id": "task-9",
                "task_status": "FAILED",
                "code": "InvalidParameter.Image",
                "message": "person image resolution too low"
            }
        }"#;
        let parsed: TaskResponse = serde_json::from_str(raw).unwrap();
        let job = parsed.into_remote_job("task-9");
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(
            job.reason.as_deref(),
            Some("InvalidParameter.Image: person image resolution too low")
        );
    }

    #[test]
    fn test_parse_empty_response_is_unknown() {
        let parsed: TaskResponse = serde_json::from_str("{}").unwrap();
        let job = parsed.into_remote_job("task-0");
        assert_eq!(job.status, JobStatus::Unknown);
        assert!(job.reason.is_none());
    }

    #[test]
    fn test_upload_policy_deserializes_vendor_fields() {
        let raw = r#"{
            "policy": "eyJleHBpcmF0aW9uIjoi...",
            "signature": "sig==",
            "upload_dir": "dashscope-instant/123",
            "upload_host": "https://oss.example.com",
            "oss_access_key_id": "AK",
            "x_oss_object_acl": "public-read",
            "x_oss_forbid_overwrite": "false"
        }"#;
        let policy: UploadPolicy = serde_json::from_str(raw).unwrap();
        assert_eq!(policy.upload_dir, "dashscope-instant/123");
        assert_eq!(policy.oss_access_key_id, "AK");
    }

    #[test]
    fn test_missing_api_key_is_auth_error() {
        let client = PolicyVendorClient::new(None, "https://dashscope.aliyuncs.com");
        assert!(matches!(client.api_key(), Err(VendorError::Auth)));
        let client = PolicyVendorClient::new(Some(String::new()), "https://dashscope.aliyuncs.com");
        assert!(matches!(client.api_key(), Err(VendorError::Auth)));
    }
}
