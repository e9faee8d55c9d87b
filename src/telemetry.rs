//! Telemetry utilities for request timing and tracing spans.

use std::time::Instant;

/// Guard for timing request handling and recording metrics.
///
/// Records route latency when dropped.
pub struct RequestTimer {
    route: &'static str,
    start: Instant,
}

impl RequestTimer {
    /// Start timing a request.
    pub fn new(route: &'static str) -> Self {
        Self {
            route,
            start: Instant::now(),
        }
    }
}

impl Drop for RequestTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        crate::metrics::record_request(self.route, duration);
    }
}

/// Standardized span constructors for hub observability.
pub mod spans {
    use tracing::{Span, info_span};

    /// Create a span for an authenticated site ingest.
    pub fn site_ingest(site_id: i64, topic: &str) -> Span {
        info_span!("site_ingest", site_id = site_id, topic = %topic)
    }

    /// Create a span for a realtime viewer connection.
    pub fn live_connection(channel: &str, connection: &str) -> Span {
        info_span!("live_connection", channel = %channel, connection = %connection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer_records_on_drop() {
        crate::metrics::init();
        {
            let _timer = RequestTimer::new("login");
        }
        let output = crate::metrics::gather_metrics();
        assert!(output.contains("hub_request_duration_seconds"));
    }
}
