// ── Concurrency gate + write lock ──
//
// Every request holds a gate permit while in flight; mutating requests
// additionally hold the write lock. Both are released by dropping the
// `GatePermit`, so every exit path of the executor releases them.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tokio::sync::{Mutex, MutexGuard, Semaphore, SemaphorePermit};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::error::Error;

/// Counting gate bounding in-flight requests, plus the write lock that
/// serializes mutating requests independently of the gate capacity.
pub struct ConcurrencyGate {
    permits: Semaphore,
    write_lock: Mutex<()>,
    counters: Counters,
}

#[derive(Default)]
struct Counters {
    gate_acquired: AtomicU64,
    gate_released: AtomicU64,
    write_acquired: AtomicU64,
    write_released: AtomicU64,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

/// Snapshot of gate and write-lock activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GateStats {
    pub gate_acquired: u64,
    pub gate_released: u64,
    pub write_acquired: u64,
    pub write_released: u64,
    /// Requests currently holding a gate permit.
    pub in_flight: usize,
    /// Highest `in_flight` value observed since construction.
    pub peak_in_flight: usize,
}

impl ConcurrencyGate {
    pub fn new(capacity: usize) -> Result<Self, Error> {
        if capacity == 0 {
            return Err(Error::Config {
                message: "gate capacity must be at least 1".into(),
            });
        }
        Ok(Self {
            permits: Semaphore::new(capacity),
            write_lock: Mutex::new(()),
            counters: Counters::default(),
        })
    }

    /// Acquire a gate permit, then the write lock if `mutating`.
    ///
    /// Both waits abort with [`Error::Cancelled`] when `cancel` fires; a gate
    /// permit already taken is returned before the error propagates.
    pub async fn acquire(
        &self,
        mutating: bool,
        cancel: &CancellationToken,
    ) -> Result<GatePermit<'_>, Error> {
        let permit = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(Error::Cancelled),
            permit = self.permits.acquire() => permit.map_err(|_| Error::Cancelled)?,
        };
        self.record_gate_acquired();

        let mut guard = GatePermit {
            gate: self,
            write: None,
            _permit: permit,
        };

        if mutating {
            let write = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(Error::Cancelled),
                write = self.write_lock.lock() => write,
            };
            self.counters.write_acquired.fetch_add(1, Ordering::AcqRel);
            guard.write = Some(write);
        }

        trace!(mutating, "gate acquired");
        Ok(guard)
    }

    /// Stop admitting requests. Pending and future acquisitions fail with
    /// [`Error::Cancelled`]; permits already held are unaffected.
    pub fn close(&self) {
        self.permits.close();
    }

    pub fn stats(&self) -> GateStats {
        let c = &self.counters;
        GateStats {
            gate_acquired: c.gate_acquired.load(Ordering::Acquire),
            gate_released: c.gate_released.load(Ordering::Acquire),
            write_acquired: c.write_acquired.load(Ordering::Acquire),
            write_released: c.write_released.load(Ordering::Acquire),
            in_flight: c.in_flight.load(Ordering::Acquire),
            peak_in_flight: c.peak_in_flight.load(Ordering::Acquire),
        }
    }

    fn record_gate_acquired(&self) {
        let c = &self.counters;
        c.gate_acquired.fetch_add(1, Ordering::AcqRel);
        let now = c.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        c.peak_in_flight.fetch_max(now, Ordering::AcqRel);
    }
}

/// RAII guard for one admitted request.
pub struct GatePermit<'a> {
    gate: &'a ConcurrencyGate,
    write: Option<MutexGuard<'a, ()>>,
    _permit: SemaphorePermit<'a>,
}

impl GatePermit<'_> {
    pub fn holds_write_lock(&self) -> bool {
        self.write.is_some()
    }
}

impl Drop for GatePermit<'_> {
    fn drop(&mut self) {
        let c = &self.gate.counters;
        if self.write.take().is_some() {
            c.write_released.fetch_add(1, Ordering::AcqRel);
        }
        c.in_flight.fetch_sub(1, Ordering::AcqRel);
        c.gate_released.fetch_add(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn permits_are_counted_and_released() {
        let gate = ConcurrencyGate::new(1).unwrap();
        let cancel = CancellationToken::new();

        {
            let permit = gate.acquire(true, &cancel).await.unwrap();
            assert!(permit.holds_write_lock());
            assert_eq!(gate.stats().in_flight, 1);
        }
        {
            let permit = gate.acquire(false, &cancel).await.unwrap();
            assert!(!permit.holds_write_lock());
        }

        let stats = gate.stats();
        assert_eq!(stats.gate_acquired, 2);
        assert_eq!(stats.gate_released, 2);
        assert_eq!(stats.write_acquired, 1);
        assert_eq!(stats.write_released, 1);
        assert_eq!(stats.in_flight, 0);
        assert_eq!(stats.peak_in_flight, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn saturated_gate_blocks_until_release() {
        let gate = Arc::new(ConcurrencyGate::new(2).unwrap());
        let cancel = CancellationToken::new();
        let mut handles = Vec::new();

        for _ in 0..6 {
            let gate = Arc::clone(&gate);
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move {
                let _permit = gate.acquire(false, &cancel).await.unwrap();
                tokio::time::sleep(Duration::from_millis(50)).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let stats = gate.stats();
        assert_eq!(stats.peak_in_flight, 2);
        assert_eq!(stats.gate_acquired, 6);
        assert_eq!(stats.gate_released, 6);
    }

    #[tokio::test(start_paused = true)]
    async fn writes_serialize_even_with_spare_gate_capacity() {
        let gate = Arc::new(ConcurrencyGate::new(4).unwrap());
        let writers = Arc::new(AtomicUsize::new(0));
        let overlap = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();

        for _ in 0..4 {
            let gate = Arc::clone(&gate);
            let writers = Arc::clone(&writers);
            let overlap = Arc::clone(&overlap);
            handles.push(tokio::spawn(async move {
                let _permit = gate.acquire(true, &CancellationToken::new()).await.unwrap();
                if writers.fetch_add(1, Ordering::SeqCst) > 0 {
                    overlap.fetch_add(1, Ordering::SeqCst);
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
                writers.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(overlap.load(Ordering::SeqCst), 0);
        assert_eq!(gate.stats().write_released, 4);
    }

    #[tokio::test]
    async fn cancelled_wait_does_not_leak_a_permit() {
        let gate = ConcurrencyGate::new(1).unwrap();
        let held = gate.acquire(true, &CancellationToken::new()).await.unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = gate.acquire(false, &cancel).await;
        assert!(matches!(result, Err(Error::Cancelled)));

        drop(held);
        let stats = gate.stats();
        assert_eq!(stats.gate_acquired, stats.gate_released);
        assert_eq!(stats.write_acquired, stats.write_released);
    }

    #[tokio::test]
    async fn closed_gate_rejects_new_requests() {
        let gate = ConcurrencyGate::new(1).unwrap();
        gate.close();
        let result = gate.acquire(false, &CancellationToken::new()).await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[test]
    fn zero_capacity_is_invalid() {
        assert!(ConcurrencyGate::new(0).is_err());
    }
}
