//! Per-sink and per-source counters.
//!
//! Counter sets are plain atomics. `snapshot()` copies them into a `Copy`
//! struct; `delta_since` subtracts two snapshots, saturating at zero.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

macro_rules! counter_set {
    (
        $(#[$meta:meta])*
        $name:ident => $snapshot:ident { $($(#[$fmeta:meta])* $field:ident),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Default)]
        pub struct $name {
            $($(#[$fmeta])* pub $field: AtomicU64,)+
        }

        impl $name {
            pub fn snapshot(&self) -> $snapshot {
                $snapshot {
                    $($field: self.$field.load(Ordering::Relaxed),)+
                }
            }
        }

        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        pub struct $snapshot {
            $(pub $field: u64,)+
        }

        impl $snapshot {
            pub fn delta_since(&self, older: &Self) -> Self {
                Self {
                    $($field: self.$field.saturating_sub(older.$field),)+
                }
            }
        }
    };
}

counter_set! {
    /// Write-path counters.
    SinkCounters => SinkCountersSnapshot {
        n_page_committed,
        /// Sealed bytes written for pages.
        sz_write_payload,
        /// Uncompressed bytes handed to the page codec.
        sz_zip,
        time_wall_zip,
        time_cpu_zip,
        time_wall_write,
        time_cpu_write,
    }
}

counter_set! {
    /// Read-path counters.
    SourceCounters => SourceCountersSnapshot {
        /// Single-key reads.
        n_read,
        /// Batched reads.
        n_read_v,
        sz_read_payload,
        /// Bytes produced by decompression.
        sz_unzip,
        n_cluster_loaded,
        n_page_loaded,
        n_page_populated,
        /// Populated pages whose buffers were freed.
        n_page_released,
        time_wall_read,
        time_cpu_read,
        time_wall_unzip,
        time_cpu_unzip,
    }
}

#[inline]
pub(crate) fn add(counter: &AtomicU64, v: u64) {
    counter.fetch_add(v, Ordering::Relaxed);
}

/// Adds the wall and process CPU time of its lifetime to two counters.
pub struct PhaseTimer<'a> {
    wall: &'a AtomicU64,
    cpu: &'a AtomicU64,
    start_wall: Instant,
    start_cpu: Option<u64>,
}

impl<'a> PhaseTimer<'a> {
    pub fn start(wall: &'a AtomicU64, cpu: &'a AtomicU64) -> Self {
        Self {
            wall,
            cpu,
            start_wall: Instant::now(),
            start_cpu: process_cpu_nanos(),
        }
    }
}

impl Drop for PhaseTimer<'_> {
    fn drop(&mut self) {
        add(self.wall, self.start_wall.elapsed().as_nanos() as u64);
        if let (Some(start), Some(end)) = (self.start_cpu, process_cpu_nanos()) {
            add(self.cpu, end.saturating_sub(start));
        }
    }
}

#[cfg(unix)]
fn process_cpu_nanos() -> Option<u64> {
    let mut ts = std::mem::MaybeUninit::<libc::timespec>::uninit();
    // SAFETY: `ts` is a valid out-pointer for clock_gettime.
    let rc = unsafe { libc::clock_gettime(libc::CLOCK_PROCESS_CPUTIME_ID, ts.as_mut_ptr()) };
    if rc != 0 {
        return None;
    }
    // SAFETY: clock_gettime succeeded and initialized `ts`.
    let ts = unsafe { ts.assume_init() };
    Some(ts.tv_sec as u64 * 1_000_000_000 + ts.tv_nsec as u64)
}

#[cfg(not(unix))]
fn process_cpu_nanos() -> Option<u64> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer_accumulates_on_drop() {
        let counters = SourceCounters::default();
        {
            let _t = PhaseTimer::start(&counters.time_wall_unzip, &counters.time_cpu_unzip);
            let mut x = 0u64;
            for i in 0..100_000u64 {
                x = x.wrapping_mul(31).wrapping_add(i);
            }
            std::hint::black_box(x);
        }
        assert!(counters.snapshot().time_wall_unzip > 0);
    }

    #[test]
    fn delta_saturates() {
        let counters = SinkCounters::default();
        add(&counters.n_page_committed, 3);
        let before = counters.snapshot();
        add(&counters.n_page_committed, 2);
        let after = counters.snapshot();
        assert_eq!(after.delta_since(&before).n_page_committed, 2);
        assert_eq!(before.delta_since(&after).n_page_committed, 0);
    }
}
