use serde::Serialize;

/// Final artifact of a successful try-on flow. Write-once: created only
/// after the vendor job succeeded and its image reference resolved.
#[derive(Debug)]
pub struct TryOnResult {
    pub job_id: String,
    pub image_bytes: Vec<u8>,
    pub image_base64: String,
    /// Web-relative URL when the result landed under the static root.
    pub image_url: Option<String>,
    pub model: String,
    pub prompt: String,
}

/// Response body for POST /tryon. Field names match the mobile client
/// contract (camelCase).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TryOnResponse {
    pub job_id: String,
    pub result_image_base64: String,
    pub image_url: Option<String>,
    pub model: String,
    pub prompt: String,
    pub message: String,
}

/// Error body returned for every non-2xx response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}
