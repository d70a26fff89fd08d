//! Upload progress reporting and caller-initiated abort.
//!
//! A `ProgressReporter` turns byte counts into whole percentages and hands
//! them to a callback in non-decreasing order, skipping repeats. Closing it
//! is a barrier: once `close` returns no callback is running and none will
//! start, unless `close` was called from inside the callback itself, in
//! which case that invocation is the last one.
//!
//! An `AbortHandle` closes every reporter attached to it before `abort`
//! returns. Transfers attach their reporter themselves.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::ThreadId;

use tokio::sync::watch;

pub type ProgressFn = dyn Fn(u8) + Send + Sync;

struct ProgressState {
    callback: Option<Box<ProgressFn>>,
    closed: AtomicBool,
    /// Last emitted percentage. Never held across the callback.
    last: Mutex<Option<u8>>,
    /// Held for the whole callback invocation; `close` waits on it.
    gate: Mutex<()>,
    /// Thread currently inside the callback, for reentrant calls.
    reporting_thread: Mutex<Option<ThreadId>>,
}

#[derive(Clone)]
pub struct ProgressReporter {
    inner: Arc<ProgressState>,
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("has_callback", &self.inner.callback.is_some())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl ProgressReporter {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(u8) + Send + Sync + 'static,
    {
        Self::with_callback(Some(Box::new(callback)))
    }

    /// A reporter that tracks state but notifies nobody.
    pub fn silent() -> Self {
        Self::with_callback(None)
    }

    fn with_callback(callback: Option<Box<ProgressFn>>) -> Self {
        Self {
            inner: Arc::new(ProgressState {
                callback,
                closed: AtomicBool::new(false),
                last: Mutex::new(None),
                gate: Mutex::new(()),
                reporting_thread: Mutex::new(None),
            }),
        }
    }

    /// Report `loaded` of `total` bytes. Unknown totals (0) are ignored,
    /// mirroring non-length-computable transfer events.
    pub fn report_bytes(&self, loaded: u64, total: u64) {
        if total == 0 {
            return;
        }
        let percent = (loaded as f64 / total as f64 * 100.0).round().clamp(0.0, 100.0);
        self.report_percent(percent as u8);
    }

    /// Report a percentage; values above 100 are clamped, values not above
    /// the last emitted one are dropped.
    ///
    /// The callback may itself call back into this reporter (or a clone).
    pub fn report_percent(&self, percent: u8) {
        let percent = percent.min(100);

        if self.inside_callback() {
            // This thread already holds the gate.
            self.emit(percent);
            return;
        }

        let _gate = self.inner.gate.lock().unwrap_or_else(PoisonError::into_inner);
        self.set_reporting_thread(Some(std::thread::current().id()));
        self.emit(percent);
        self.set_reporting_thread(None);
    }

    fn emit(&self, percent: u8) {
        if self.is_closed() || !self.advance(percent) {
            return;
        }
        if let Some(callback) = &self.inner.callback {
            callback(percent);
        }
    }

    /// Record `percent` as the last emitted value if it moves forward.
    fn advance(&self, percent: u8) -> bool {
        let mut last = self.inner.last.lock().unwrap_or_else(PoisonError::into_inner);
        if matches!(*last, Some(prev) if percent <= prev) {
            return false;
        }
        *last = Some(percent);
        true
    }

    /// Last percentage handed to the callback.
    pub fn last_reported(&self) -> Option<u8> {
        *self.inner.last.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Stop all further callbacks. Blocks until an in-flight callback on
    /// another thread has returned.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        if !self.inside_callback() {
            // Wait out any callback that passed the closed check before we set it.
            drop(self.inner.gate.lock());
        }
    }

    /// A reporter whose 0-100 range maps onto `start..=end` of this one.
    pub fn scaled(&self, start: u8, end: u8) -> ProgressReporter {
        let parent = self.clone();
        let span = end.saturating_sub(start) as f64;
        ProgressReporter::new(move |percent| {
            let mapped = start as f64 + percent as f64 * span / 100.0;
            parent.report_percent(mapped.round() as u8);
        })
    }

    fn inside_callback(&self) -> bool {
        let current = std::thread::current().id();
        *self
            .inner
            .reporting_thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            == Some(current)
    }

    fn set_reporting_thread(&self, thread: Option<ThreadId>) {
        *self
            .inner
            .reporting_thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = thread;
    }
}

/// Caller-held cancellation handle for a transfer. Clones share state.
#[derive(Debug, Clone)]
pub struct AbortHandle {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
    reporters: Arc<Mutex<Vec<ProgressReporter>>>,
}

impl Default for AbortHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl AbortHandle {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
            reporters: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A handle with `reporter` already attached.
    pub fn linked(reporter: &ProgressReporter) -> Self {
        let handle = Self::new();
        handle.attach(reporter);
        handle
    }

    /// Silence `reporter` when this handle aborts, or right away if it
    /// already has.
    pub fn attach(&self, reporter: &ProgressReporter) {
        self.reporters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(reporter.clone());
        // Checked after registering so a concurrent `abort` cannot miss it.
        if self.is_aborted() {
            reporter.close();
        }
    }

    /// Abort the transfer. After this returns, no progress callback of an
    /// attached reporter fires again.
    pub fn abort(&self) {
        self.tx.send_replace(true);
        let reporters = self
            .reporters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for reporter in &reporters {
            reporter.close();
        }
    }

    pub fn is_aborted(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once `abort` has been called.
    pub async fn aborted(&self) {
        let mut rx = self.rx.clone();
        // Sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|aborted| *aborted).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn recording() -> (ProgressReporter, Arc<Mutex<Vec<u8>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let reporter = ProgressReporter::new(move |p| sink.lock().unwrap().push(p));
        (reporter, seen)
    }

    #[test]
    fn byte_progress_rounds_to_percent() {
        let (reporter, seen) = recording();
        reporter.report_bytes(1, 3);
        reporter.report_bytes(2, 3);
        reporter.report_bytes(3, 3);
        assert_eq!(*seen.lock().unwrap(), vec![33, 67, 100]);
    }

    #[test]
    fn drops_repeats_and_regressions() {
        let (reporter, seen) = recording();
        for p in [10, 10, 5, 40, 39, 40, 100] {
            reporter.report_percent(p);
        }
        assert_eq!(*seen.lock().unwrap(), vec![10, 40, 100]);
        assert_eq!(reporter.last_reported(), Some(100));
    }

    #[test]
    fn unknown_total_reports_nothing() {
        let (reporter, seen) = recording();
        reporter.report_bytes(10, 0);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn clamps_above_hundred() {
        let (reporter, seen) = recording();
        reporter.report_bytes(150, 100);
        reporter.report_percent(250);
        assert_eq!(*seen.lock().unwrap(), vec![100]);
    }

    #[test]
    fn no_callbacks_after_abort() {
        let (reporter, seen) = recording();
        let handle = AbortHandle::linked(&reporter);
        reporter.report_percent(20);
        handle.abort();
        reporter.report_percent(60);
        assert_eq!(*seen.lock().unwrap(), vec![20]);
        assert!(handle.is_aborted());
    }

    #[test]
    fn abort_from_inside_callback_does_not_deadlock() {
        let handle_slot: Arc<Mutex<Option<AbortHandle>>> = Arc::new(Mutex::new(None));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (slot, sink) = (handle_slot.clone(), seen.clone());
        let reporter = ProgressReporter::new(move |p| {
            sink.lock().unwrap().push(p);
            if p >= 50 {
                if let Some(h) = slot.lock().unwrap().as_ref() {
                    h.abort();
                }
            }
        });
        *handle_slot.lock().unwrap() = Some(AbortHandle::linked(&reporter));

        for p in [25, 50, 75] {
            reporter.report_percent(p);
        }
        assert_eq!(*seen.lock().unwrap(), vec![25, 50]);
    }

    #[test]
    fn callback_can_read_and_report_on_its_own_reporter() {
        let own: Arc<std::sync::OnceLock<ProgressReporter>> = Arc::new(std::sync::OnceLock::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (slot, sink) = (own.clone(), seen.clone());
        let reporter = ProgressReporter::new(move |p| {
            let me = slot.get().unwrap();
            sink.lock().unwrap().push((p, me.last_reported()));
            if p == 10 {
                me.report_percent(50);
            }
        });
        own.set(reporter.clone()).unwrap();

        let (done_tx, done_rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            reporter.report_percent(10);
            reporter.report_percent(30);
            done_tx.send(()).unwrap();
        });
        done_rx
            .recv_timeout(Duration::from_secs(2))
            .expect("callback re-entering its reporter deadlocked");
        assert_eq!(*seen.lock().unwrap(), vec![(10, Some(10)), (50, Some(50))]);
    }

    #[test]
    fn close_waits_for_in_flight_callback() {
        let finished = Arc::new(AtomicBool::new(false));
        let (started_tx, started_rx) = std::sync::mpsc::channel();
        let started_tx = Mutex::new(started_tx);
        let done = finished.clone();
        let reporter = ProgressReporter::new(move |_| {
            started_tx.lock().unwrap().send(()).unwrap();
            std::thread::sleep(Duration::from_millis(100));
            done.store(true, Ordering::SeqCst);
        });

        let worker = reporter.clone();
        let thread = std::thread::spawn(move || worker.report_percent(10));
        started_rx.recv().unwrap();
        reporter.close();
        assert!(finished.load(Ordering::SeqCst));
        thread.join().unwrap();
    }

    #[test]
    fn abort_closes_reporters_attached_later() {
        let handle = AbortHandle::new();
        handle.abort();
        let (reporter, seen) = recording();
        handle.clone().attach(&reporter);
        reporter.report_percent(40);
        assert!(reporter.is_closed());
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn abort_closes_every_attached_reporter() {
        let handle = AbortHandle::new();
        let (first, first_seen) = recording();
        let (second, second_seen) = recording();
        handle.attach(&first);
        handle.clone().attach(&second);
        handle.abort();
        first.report_percent(10);
        second.report_percent(10);
        assert!(first_seen.lock().unwrap().is_empty());
        assert!(second_seen.lock().unwrap().is_empty());
    }

    #[test]
    fn scaled_reporter_maps_into_parent_range() {
        let (reporter, seen) = recording();
        let child = reporter.scaled(30, 70);
        child.report_percent(0);
        child.report_percent(50);
        child.report_percent(100);
        assert_eq!(*seen.lock().unwrap(), vec![30, 50, 70]);
    }

    #[tokio::test]
    async fn aborted_future_resolves_after_abort() {
        let handle = AbortHandle::new();
        let waiter = handle.clone();
        let task = tokio::spawn(async move { waiter.aborted().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.abort();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("abort not observed")
            .unwrap();
    }

    #[tokio::test]
    async fn aborted_future_ready_when_already_aborted() {
        let handle = AbortHandle::new();
        handle.abort();
        tokio::time::timeout(Duration::from_millis(100), handle.aborted())
            .await
            .expect("should resolve immediately");
    }
}
