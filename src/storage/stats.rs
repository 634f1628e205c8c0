//! Device statistics tracking.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics tracked per device.
///
/// All fields are atomic for lock-free, thread-safe updates, so the copy
/// phase can bump counters without taking any lock.
///
/// # Memory Ordering
/// We use `Ordering::Relaxed` for all operations. Counters are independent
/// and only need to be eventually consistent.
///
/// # Example
/// ```
/// use brickdisk::DeviceStats;
/// use std::sync::atomic::Ordering;
///
/// let stats = DeviceStats::new();
/// stats.pages_allocated.fetch_add(3, Ordering::Relaxed);
/// stats.pages_freed.fetch_add(1, Ordering::Relaxed);
/// assert_eq!(stats.snapshot().resident_pages(), 2);
/// ```
#[derive(Debug)]
pub struct DeviceStats {
    /// Pages inserted into the store.
    pub pages_allocated: AtomicU64,

    /// Pages removed from the store.
    pub pages_freed: AtomicU64,

    /// Allocations refused by the allocator.
    pub alloc_failures: AtomicU64,

    /// `ensure` calls that allocated a page but lost the insert race.
    pub insert_races: AtomicU64,

    /// Read requests completed.
    pub reads: AtomicU64,

    /// Write requests completed.
    pub writes: AtomicU64,

    /// Discard requests completed.
    pub discards: AtomicU64,

    /// Requests completed with an error.
    pub failed_requests: AtomicU64,
}

impl DeviceStats {
    /// Create a new stats tracker with all counters at zero.
    pub fn new() -> Self {
        Self {
            pages_allocated: AtomicU64::new(0),
            pages_freed: AtomicU64::new(0),
            alloc_failures: AtomicU64::new(0),
            insert_races: AtomicU64::new(0),
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            discards: AtomicU64::new(0),
            failed_requests: AtomicU64::new(0),
        }
    }

    /// Get a snapshot of current statistics.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            pages_allocated: self.pages_allocated.load(Ordering::Relaxed),
            pages_freed: self.pages_freed.load(Ordering::Relaxed),
            alloc_failures: self.alloc_failures.load(Ordering::Relaxed),
            insert_races: self.insert_races.load(Ordering::Relaxed),
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            discards: self.discards.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        self.pages_allocated.store(0, Ordering::Relaxed);
        self.pages_freed.store(0, Ordering::Relaxed);
        self.alloc_failures.store(0, Ordering::Relaxed);
        self.insert_races.store(0, Ordering::Relaxed);
        self.reads.store(0, Ordering::Relaxed);
        self.writes.store(0, Ordering::Relaxed);
        self.discards.store(0, Ordering::Relaxed);
        self.failed_requests.store(0, Ordering::Relaxed);
    }
}

impl Default for DeviceStats {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time snapshot of device statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub pages_allocated: u64,
    pub pages_freed: u64,
    pub alloc_failures: u64,
    pub insert_races: u64,
    pub reads: u64,
    pub writes: u64,
    pub discards: u64,
    pub failed_requests: u64,
}

impl StatsSnapshot {
    /// Pages allocated and not yet freed.
    ///
    /// Only exact while no counters are reset.
    pub fn resident_pages(&self) -> u64 {
        self.pages_allocated.saturating_sub(self.pages_freed)
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Stats {{ pages: {}, reads: {}, writes: {}, discards: {}, failed: {} }}",
            self.resident_pages(),
            self.reads,
            self.writes,
            self.discards,
            self.failed_requests
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = DeviceStats::new();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn test_stats_snapshot() {
        let stats = DeviceStats::new();
        stats.pages_allocated.fetch_add(7, Ordering::Relaxed);
        stats.pages_freed.fetch_add(3, Ordering::Relaxed);
        stats.reads.fetch_add(2, Ordering::Relaxed);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.pages_allocated, 7);
        assert_eq!(snapshot.resident_pages(), 4);
        assert_eq!(snapshot.reads, 2);
    }

    #[test]
    fn test_stats_reset() {
        let stats = DeviceStats::new();
        stats.writes.fetch_add(100, Ordering::Relaxed);

        stats.reset();

        assert_eq!(stats.writes.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_stats_display() {
        let stats = DeviceStats::new();
        stats.pages_allocated.fetch_add(5, Ordering::Relaxed);
        stats.writes.fetch_add(20, Ordering::Relaxed);
        stats.failed_requests.fetch_add(1, Ordering::Relaxed);

        let display = format!("{}", stats.snapshot());

        assert!(display.contains("pages: 5"));
        assert!(display.contains("writes: 20"));
        assert!(display.contains("failed: 1"));
    }
}
