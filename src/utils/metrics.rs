use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::time::Instant;

/// Counters kept over one mirroring run
#[derive(Debug, Clone)]
pub struct MirrorStats {
    /// Start time of the run
    pub started_at: DateTime<Utc>,

    /// Files written to the mirror, error pages included
    pub saved: usize,

    /// Links short-circuited because their output already existed
    pub skipped: usize,

    /// Links that failed and were skipped
    pub failed: usize,

    /// Error pages written in place of too-deep links
    pub error_pages: usize,

    /// Bytes written to disk
    pub bytes_written: usize,

    /// Redirect hops followed
    pub redirects: usize,

    /// HTTP status code counts
    pub status_codes: BTreeMap<u16, usize>,

    /// Fetch durations in milliseconds, summed
    pub fetch_millis: u64,
}

impl Default for MirrorStats {
    fn default() -> Self {
        Self::new()
    }
}

impl MirrorStats {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            saved: 0,
            skipped: 0,
            failed: 0,
            error_pages: 0,
            bytes_written: 0,
            redirects: 0,
            status_codes: BTreeMap::new(),
            fetch_millis: 0,
        }
    }

    /// Record one completed HTTP exchange
    pub fn record_response(&mut self, status_code: u16, duration_ms: u64) {
        *self.status_codes.entry(status_code).or_default() += 1;
        self.fetch_millis += duration_ms;
    }

    pub fn record_saved(&mut self, bytes: usize) {
        self.saved += 1;
        self.bytes_written += bytes;
    }

    pub fn elapsed_seconds(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }

    /// One-line summary for the end of a run
    pub fn summary(&self) -> String {
        let codes = self
            .status_codes
            .iter()
            .map(|(code, count)| format!("{}x{}", code, count))
            .collect::<Vec<_>>()
            .join(" ");

        format!(
            "saved {} files ({} bytes), skipped {}, failed {}, error pages {}, \
             redirects {}, status [{}] in {}s",
            self.saved,
            self.bytes_written,
            self.skipped,
            self.failed,
            self.error_pages,
            self.redirects,
            codes,
            self.elapsed_seconds()
        )
    }
}

/// Request timer for measuring fetch durations
pub struct RequestTimer {
    start: Instant,
}

impl RequestTimer {
    pub fn start() -> Self {
        Self { start: Instant::now() }
    }

    /// End timing and get the duration in milliseconds
    pub fn end(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}
