use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crate::pipeline::DocumentSummary;

pub struct Metrics {
    // Counters
    total_requests: AtomicUsize,
    successful_requests: AtomicUsize,
    failed_requests: AtomicUsize,

    // Timing (in microseconds)
    total_document_time_us: AtomicU64,

    // Counts
    documents_processed: AtomicUsize,
    documents_cached: AtomicUsize,
    documents_skipped: AtomicUsize,
    documents_failed: AtomicUsize,
    tables_mined: AtomicUsize,
    tables_unclassified: AtomicUsize,
    tables_failed: AtomicUsize,
    records_found: AtomicUsize,
    relations_emitted: AtomicUsize,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            total_requests: AtomicUsize::new(0),
            successful_requests: AtomicUsize::new(0),
            failed_requests: AtomicUsize::new(0),
            total_document_time_us: AtomicU64::new(0),
            documents_processed: AtomicUsize::new(0),
            documents_cached: AtomicUsize::new(0),
            documents_skipped: AtomicUsize::new(0),
            documents_failed: AtomicUsize::new(0),
            tables_mined: AtomicUsize::new(0),
            tables_unclassified: AtomicUsize::new(0),
            tables_failed: AtomicUsize::new(0),
            records_found: AtomicUsize::new(0),
            relations_emitted: AtomicUsize::new(0),
        })
    }

    pub fn record_request(&self, success: bool) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successful_requests.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_document(&self, duration: Duration, summary: &DocumentSummary) {
        self.total_document_time_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        self.documents_processed.fetch_add(1, Ordering::Relaxed);
        self.tables_mined.fetch_add(summary.tables, Ordering::Relaxed);
        self.tables_unclassified.fetch_add(summary.tables_unclassified, Ordering::Relaxed);
        self.tables_failed.fetch_add(summary.tables_failed, Ordering::Relaxed);
        self.records_found.fetch_add(summary.records, Ordering::Relaxed);
        self.relations_emitted.fetch_add(summary.relations, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.documents_cached.fetch_add(1, Ordering::Relaxed);
    }

    /// Documents left unprocessed after cancellation.
    pub fn record_skipped(&self) {
        self.documents_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.documents_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            successful_requests: self.successful_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            avg_document_time_ms: self.avg_time_ms(&self.total_document_time_us, &self.documents_processed),
            documents_processed: self.documents_processed.load(Ordering::Relaxed),
            documents_cached: self.documents_cached.load(Ordering::Relaxed),
            documents_skipped: self.documents_skipped.load(Ordering::Relaxed),
            documents_failed: self.documents_failed.load(Ordering::Relaxed),
            tables_mined: self.tables_mined.load(Ordering::Relaxed),
            tables_unclassified: self.tables_unclassified.load(Ordering::Relaxed),
            tables_failed: self.tables_failed.load(Ordering::Relaxed),
            records_found: self.records_found.load(Ordering::Relaxed),
            relations_emitted: self.relations_emitted.load(Ordering::Relaxed),
        }
    }

    fn avg_time_ms(&self, total_us: &AtomicU64, count: &AtomicUsize) -> f64 {
        let total = total_us.load(Ordering::Relaxed) as f64;
        let cnt = count.load(Ordering::Relaxed) as f64;
        if cnt > 0.0 {
            total / cnt / 1000.0 // Convert to ms
        } else {
            0.0
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: usize,
    pub successful_requests: usize,
    pub failed_requests: usize,
    pub avg_document_time_ms: f64,
    pub documents_processed: usize,
    pub documents_cached: usize,
    pub documents_skipped: usize,
    pub documents_failed: usize,
    pub tables_mined: usize,
    pub tables_unclassified: usize,
    pub tables_failed: usize,
    pub records_found: usize,
    pub relations_emitted: usize,
}

pub struct TimedOperation {
    start: Instant,
}

impl TimedOperation {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_counts_accumulate() {
        let metrics = Metrics::new();
        let summary = DocumentSummary {
            document_id: "PMC1".to_string(),
            records: 3,
            relations: 2,
            tables: 2,
            tables_unclassified: 1,
            tables_failed: 0,
        };
        metrics.record_document(Duration::from_millis(4), &summary);
        metrics.record_document(Duration::from_millis(2), &summary);
        metrics.record_request(true);
        metrics.record_request(false);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.documents_processed, 2);
        assert_eq!(snapshot.relations_emitted, 4);
        assert_eq!(snapshot.tables_unclassified, 2);
        assert_eq!(snapshot.failed_requests, 1);
        assert!((snapshot.avg_document_time_ms - 3.0).abs() < 1e-9);
    }
}
