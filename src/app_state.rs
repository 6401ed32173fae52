use std::path::PathBuf;
use std::sync::Arc;

use crate::services::tryon::TryOnService;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub tryon: Arc<TryOnService>,
    pub results_dir: PathBuf,
    pub vendor_configured: bool,
}

impl AppState {
    pub fn new(
        tryon: TryOnService,
        results_dir: impl Into<PathBuf>,
        vendor_configured: bool,
    ) -> Self {
        Self {
            tryon: Arc::new(tryon),
            results_dir: results_dir.into(),
            vendor_configured,
        }
    }
}
