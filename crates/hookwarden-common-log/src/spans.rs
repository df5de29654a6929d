//! Span constructors shared across crates.

use tracing::{info_span, Span};

/// Span for one webhook delivery handled by one plugin.
pub fn plugin_span(plugin: &str, event: &str, delivery: &str) -> Span {
    info_span!("plugin", plugin = %plugin, event = %event, delivery = %delivery)
}

/// Span for work on one cached repository.
pub fn repo_span(owner: &str, repo: &str) -> Span {
    info_span!("repo", owner = %owner, repo = %repo)
}

/// Timing utility for operations.
pub struct Timer {
    start: std::time::Instant,
    operation: &'static str,
}

impl Timer {
    /// Start a new timer.
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: std::time::Instant::now(),
            operation,
        }
    }

    /// Complete the timer and record duration.
    pub fn finish(self) {
        let duration = self.start.elapsed();
        tracing::debug!(
            operation = %self.operation,
            duration_ms = %duration.as_millis(),
            "operation completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spans_carry_names() {
        let span = plugin_span("teams-sync", "push", "abc-123");
        // Without a subscriber spans are disabled but still constructible.
        let _enter = span.enter();
        let repo = repo_span("acme", "platform");
        drop(repo);
    }

    #[test]
    fn test_timer_finish() {
        let timer = Timer::start("clone");
        timer.finish();
    }
}
