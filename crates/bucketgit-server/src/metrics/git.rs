//! Git service metrics.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use metrics::{counter, gauge};

/// Describes the git metrics. Call once at startup.
pub fn register_git_metrics() {
    metrics::describe_counter!("bucketgit_fetch_total", "Completed upload-pack requests");
    metrics::describe_counter!("bucketgit_fetch_objects_total", "Objects sent by fetches");
    metrics::describe_counter!("bucketgit_push_total", "Completed receive-pack requests");
    metrics::describe_counter!(
        "bucketgit_ref_updates_total",
        "Reference updates by result (ok or rejected)"
    );
    metrics::describe_counter!(
        "bucketgit_objects_written_total",
        "Objects written by pushes"
    );
    metrics::describe_counter!(
        "bucketgit_policy_reloads_total",
        "Access policy reloads by result"
    );
    metrics::describe_gauge!("bucketgit_registry_handles", "Cached repository handles");
    metrics::describe_counter!(
        "bucketgit_credential_cache_hits_total",
        "Credential checks answered from the cache"
    );
    metrics::describe_counter!(
        "bucketgit_credential_cache_misses_total",
        "Credential checks that needed bcrypt"
    );
}

/// Records git service metrics.
///
/// Credential cache lookups are also counted locally so tests and logs can
/// read them without a recorder installed.
#[derive(Debug, Clone, Default)]
pub struct GitMetrics {
    credential_hits: Arc<AtomicU64>,
    credential_misses: Arc<AtomicU64>,
}

impl GitMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_fetch(&self, objects_sent: usize) {
        counter!("bucketgit_fetch_total").increment(1);
        counter!("bucketgit_fetch_objects_total").increment(objects_sent as u64);
    }

    pub fn record_push(&self, accepted: usize, rejected: usize, objects_written: usize) {
        counter!("bucketgit_push_total").increment(1);
        counter!("bucketgit_ref_updates_total", "result" => "ok").increment(accepted as u64);
        counter!("bucketgit_ref_updates_total", "result" => "rejected").increment(rejected as u64);
        counter!("bucketgit_objects_written_total").increment(objects_written as u64);
    }

    pub fn record_policy_reload(&self, result: &'static str) {
        counter!("bucketgit_policy_reloads_total", "result" => result).increment(1);
    }

    pub fn update_registry_handles(&self, handles: usize) {
        gauge!("bucketgit_registry_handles").set(handles as f64);
    }

    pub fn record_credential_lookup(&self, hit: bool) {
        if hit {
            self.credential_hits.fetch_add(1, Ordering::Relaxed);
            counter!("bucketgit_credential_cache_hits_total").increment(1);
        } else {
            self.credential_misses.fetch_add(1, Ordering::Relaxed);
            counter!("bucketgit_credential_cache_misses_total").increment(1);
        }
    }

    pub fn credential_hits(&self) -> u64 {
        self.credential_hits.load(Ordering::Relaxed)
    }

    pub fn credential_misses(&self) -> u64 {
        self.credential_misses.load(Ordering::Relaxed)
    }

    /// Share of credential checks answered from the cache.
    pub fn credential_hit_rate(&self) -> f64 {
        let hits = self.credential_hits() as f64;
        let total = hits + self.credential_misses() as f64;
        if total == 0.0 { 0.0 } else { hits / total }
    }
}
