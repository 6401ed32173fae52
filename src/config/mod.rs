use serde::Deserialize;

/// Vendor endpoint shape selected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VendorProfile {
    /// Upload-policy + object-store upload + async task submission (DashScope).
    Policy,
    /// Single multipart submission endpoint returning a job id and status URL.
    Direct,
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// DashScope API key. Absence is surfaced when the vendor is first
    /// called, not at startup.
    #[serde(default)]
    pub dashscope_api_key: Option<String>,

    /// Vendor API base URL (policy profile).
    #[serde(default = "default_vendor_base_url")]
    pub vendor_base_url: String,

    /// Which vendor endpoint shape to speak.
    #[serde(default = "default_vendor_profile")]
    pub vendor_profile: VendorProfile,

    /// Submission endpoint for the direct profile.
    #[serde(default)]
    pub vendor_direct_url: Option<String>,

    /// Default try-on model variant (aitryon / aitryon-plus).
    #[serde(default = "default_tryon_model")]
    pub tryon_model: String,

    /// Directory where generated result images are written.
    #[serde(default = "default_tryon_result_dir")]
    pub tryon_result_dir: String,

    /// Web-servable root; results under it get a /static/... URL.
    #[serde(default = "default_static_root")]
    pub static_root: String,

    /// Seconds between job status polls.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Total seconds to wait for a job before giving up.
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_vendor_base_url() -> String {
    "https://dashscope.aliyuncs.com".to_string()
}

fn default_vendor_profile() -> VendorProfile {
    VendorProfile::Policy
}

fn default_tryon_model() -> String {
    "aitryon".to_string()
}

fn default_tryon_result_dir() -> String {
    "static/tryon_results".to_string()
}

fn default_static_root() -> String {
    "static".to_string()
}

fn default_poll_interval_secs() -> u64 {
    3
}

fn default_poll_timeout_secs() -> u64 {
    300
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }
}
