//! Server statistics: request counter, uptime and memory usage.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use sysinfo::{Pid, System};

/// Memory usage of this process and the host.
#[derive(Debug, Clone, Serialize)]
pub struct MemoryStats {
    pub process_memory_bytes: u64,
    pub process_memory_mb: f64,
    pub system_total_bytes: u64,
    pub system_used_bytes: u64,
}

/// Snapshot returned by `GET /stats`.
#[derive(Debug, Clone, Serialize)]
pub struct ServerStats {
    pub uptime_seconds: u64,
    /// RFC 3339, UTC.
    pub started_at: String,
    pub total_requests: u64,
    pub cpu_count: usize,
    pub os: String,
    pub arch: String,
    pub memory: MemoryStats,
}

/// Shared counters for the HTTP server. Cloning shares the same counters.
#[derive(Clone)]
pub struct StatsService {
    inner: Arc<StatsInner>,
}

struct StatsInner {
    started: Instant,
    started_at: DateTime<Utc>,
    requests: AtomicU64,
}

impl StatsService {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(StatsInner {
                started: Instant::now(),
                started_at: Utc::now(),
                requests: AtomicU64::new(0),
            }),
        }
    }

    /// Count one handled request.
    pub fn record_request(&self) {
        self.inner.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_requests(&self) -> u64 {
        self.inner.requests.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> ServerStats {
        ServerStats {
            uptime_seconds: self.inner.started.elapsed().as_secs(),
            started_at: self
                .inner
                .started_at
                .to_rfc3339_opts(SecondsFormat::Secs, true),
            total_requests: self.total_requests(),
            cpu_count: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            memory: memory_stats(),
        }
    }
}

impl Default for StatsService {
    fn default() -> Self {
        Self::new()
    }
}

/// Read current process and system memory.
pub fn memory_stats() -> MemoryStats {
    let mut sys = System::new();
    sys.refresh_memory();

    let pid = Pid::from_u32(std::process::id());
    sys.refresh_processes(sysinfo::ProcessesToUpdate::Some(&[pid]), true);

    let process_memory = sys.process(pid).map(|p| p.memory()).unwrap_or(0);

    MemoryStats {
        process_memory_bytes: process_memory,
        process_memory_mb: process_memory as f64 / (1024.0 * 1024.0),
        system_total_bytes: sys.total_memory(),
        system_used_bytes: sys.used_memory(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_stats() {
        let stats = memory_stats();
        assert!(stats.process_memory_bytes > 0);
        assert!(stats.system_total_bytes > 0);
    }

    #[test]
    fn test_counter_shared_between_clones() {
        let stats = StatsService::new();
        let clone = stats.clone();

        stats.record_request();
        clone.record_request();

        assert_eq!(stats.total_requests(), 2);
        assert_eq!(clone.snapshot().total_requests, 2);
    }

    #[test]
    fn test_started_at_is_rfc3339() {
        let snapshot = StatsService::new().snapshot();
        assert!(DateTime::parse_from_rfc3339(&snapshot.started_at).is_ok());
        assert!(snapshot.cpu_count >= 1);
    }
}
