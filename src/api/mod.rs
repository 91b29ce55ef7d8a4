pub mod handlers;
pub mod routes;

pub use routes::*;

use crate::ingest::ReadingProcessor;
use crate::messaging::MessagingService;
use std::sync::Arc;
use std::time::Instant;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub processor: ReadingProcessor,
    pub messaging: Option<Arc<MessagingService>>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(processor: ReadingProcessor) -> Self {
        Self {
            processor,
            messaging: None,
            started_at: Instant::now(),
        }
    }

    /// Report bus connectivity in readiness checks
    pub fn with_messaging(mut self, messaging: Arc<MessagingService>) -> Self {
        self.messaging = Some(messaging);
        self
    }
}
