use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::client::TaskRemote;
use crate::core::task::ParsedTask;
use crate::error::SyncError;

pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(500);

/// Trailing-edge debounce for free-text parsing. Each `submit` supersedes
/// every earlier one; a superseded call resolves to `Ok(None)` whether it was
/// still waiting out the quiet period or already talking to the server.
pub struct ParseDebouncer {
    remote: Arc<dyn TaskRemote>,
    quiet: Duration,
    generation: AtomicU64,
}

impl ParseDebouncer {
    pub fn new(remote: Arc<dyn TaskRemote>, quiet: Duration) -> Self {
        Self {
            remote,
            quiet,
            generation: AtomicU64::new(0),
        }
    }

    pub async fn submit(&self, text: &str) -> Result<Option<ParsedTask>, SyncError> {
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if text.trim().is_empty() {
            return Ok(None);
        }

        tokio::time::sleep(self.quiet).await;
        if !self.is_current(ticket) {
            return Ok(None);
        }

        log::debug!("Parsing task text ({} chars)", text.len());
        let result = self.remote.parse_task(text).await;
        if !self.is_current(ticket) {
            log::debug!("Discarding stale parse result #{}", ticket);
            return Ok(None);
        }
        result.map(Some)
    }

    /// Supersede anything in flight without starting a new request.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    fn is_current(&self, ticket: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == ticket
    }
}
