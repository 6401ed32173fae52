use serde::{Deserialize, Serialize};

/// Status of a try-on task on the vendor side.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Canceled,
    Unknown,
}

impl JobStatus {
    /// Map a vendor status string (e.g. DashScope `task_status`) onto the
    /// local enumeration. Unrecognized strings are treated as `Unknown`,
    /// which is terminal.
    pub fn from_vendor(status: &str) -> Self {
        match status.to_ascii_uppercase().as_str() {
            "PENDING" => JobStatus::Pending,
            "RUNNING" => JobStatus::Running,
            "SUCCEEDED" => JobStatus::Succeeded,
            "FAILED" => JobStatus::Failed,
            "CANCELED" => JobStatus::Canceled,
            _ => JobStatus::Unknown,
        }
    }

    /// A terminal status admits no further transition.
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Pending | JobStatus::Running)
    }
}

/// Handle returned by job submission. The direct profile carries the
/// status-check URL the vendor handed back; the policy profile polls by id.
#[derive(Debug, Clone)]
pub struct SubmittedJob {
    pub job_id: String,
    pub status_url: Option<String>,
}

/// One observation of a vendor-side task, as returned by a single poll.
#[derive(Debug, Clone)]
pub struct RemoteJob {
    pub job_id: String,
    pub status: JobStatus,
    /// Direct URL of the generated image, present on success.
    pub image_url: Option<String>,
    /// Inline base64 payload, present on success for some deployments.
    pub image_base64: Option<String>,
    /// Vendor-reported failure code/message, passed through verbatim.
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vendor_status_mapping() {
        assert_eq!(JobStatus::from_vendor("PENDING"), JobStatus::Pending);
        assert_eq!(JobStatus::from_vendor("RUNNING"), JobStatus::Running);
        assert_eq!(JobStatus::from_vendor("SUCCEEDED"), JobStatus::Succeeded);
        assert_eq!(JobStatus::from_vendor("FAILED"), JobStatus::Failed);
        assert_eq!(JobStatus::from_vendor("CANCELED"), JobStatus::Canceled);
        assert_eq!(JobStatus::from_vendor("UNKNOWN"), JobStatus::Unknown);
        // Lowercase input from the direct profile
        assert_eq!(JobStatus::from_vendor("succeeded"), JobStatus::Succeeded);
        // Anything unrecognized is Unknown
        assert_eq!(JobStatus::from_vendor("EXPLODED"), JobStatus::Unknown);
    }

    #[test]
    fn test_terminality() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Succeeded.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Canceled.is_terminal());
        assert!(JobStatus::Unknown.is_terminal());
    }
}
