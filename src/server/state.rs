//! Shared handler state

use crate::analysis::AnalysisService;
use crate::live::LiveSettings;
use std::sync::Arc;
use std::time::Instant;

/// Cloned into every handler; everything inside is shared.
#[derive(Debug, Clone)]
pub struct AppState {
    pub service: Arc<AnalysisService>,
    pub live: LiveSettings,
    pub started: Instant,
}

impl AppState {
    pub fn new(service: Arc<AnalysisService>, live: LiveSettings) -> Self {
        Self {
            service,
            live,
            started: Instant::now(),
        }
    }
}
