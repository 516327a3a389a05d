// SPDX-License-Identifier: Apache-2.0

//! Listener lifecycle and the real-time drain loop.
//!
//! An [`IrqListener`] owns one device handle, one mapped view, one worker
//! thread, one running flag, and one callback - acquired together in
//! `start`, released together by `stop` (and on drop). The worker thread
//! takes ownership of the mapping, so every exit path - clean stop, fatal
//! wait error, panic unwind - releases the handle and the view.
//!
//! The drain loop delivers records to the callback synchronously, in strict
//! publish order, on the (possibly SCHED_FIFO) worker thread. The callback
//! contract is: fast and non-blocking. Anything slower belongs behind a
//! [`crate::spsc`] hop.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::config::ListenerConfig;
use crate::device::{DeviceRegion, Readiness};
use crate::error::ListenerError;
use crate::event::IrqEvent;
use crate::ring::RingConsumer;
use crate::rt;

/// Callback invoked once per drained record, on the drain thread.
pub type EventCallback = Box<dyn FnMut(IrqEvent) + Send>;

/// Per-listener counters, readable from any thread.
///
/// Loss is producer overrun detected after the fact: the producer's
/// sequence increments by exactly 1 per record, so any jump observed while
/// draining is records overwritten before this listener got to them. The
/// transport cannot recover them - the counter exists so the application
/// layer can report that loss occurred.
#[derive(Debug, Default)]
pub struct ListenerStats {
    delivered: AtomicU64,
    dropped: AtomicU64,
    attached: AtomicBool,
}

impl ListenerStats {
    /// Records handed to the callback since `start`.
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Records lost to producer overrun, inferred from sequence gaps.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Whether the drain thread has completed its first-attach
    /// resynchronization and is serving the ring.
    pub fn attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }
}

/// User-space endpoint of the event transport.
pub struct IrqListener {
    config: ListenerConfig,
    running: Arc<AtomicBool>,
    stats: Arc<ListenerStats>,
    worker: Option<JoinHandle<()>>,
}

impl IrqListener {
    /// Create an idle listener. Nothing is opened until [`start`].
    ///
    /// [`start`]: IrqListener::start
    pub fn new(config: ListenerConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(ListenerStats::default()),
            worker: None,
        }
    }

    /// Create an idle listener for the given device node, defaults otherwise.
    pub fn with_device(path: impl Into<std::path::PathBuf>) -> Self {
        Self::new(ListenerConfig {
            device_path: path.into(),
            ..ListenerConfig::default()
        })
    }

    /// Shared view of this listener's counters.
    pub fn stats(&self) -> Arc<ListenerStats> {
        Arc::clone(&self.stats)
    }

    /// Whether a drain thread has been launched and not yet stopped.
    ///
    /// Note that a fatal wait error leaves this true with a dead thread;
    /// `stop` followed by `start` is the recovery path.
    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Attach to the device and launch the drain thread.
    ///
    /// Fails with [`ListenerError::AlreadyRunning`] if a drain thread
    /// exists. Attach failures (open, map) are returned without leaving
    /// partial state behind. Returns once the thread is launched; cursor
    /// resynchronization and priority elevation happen on the drain thread
    /// itself.
    pub fn start(
        &mut self,
        callback: impl FnMut(IrqEvent) + Send + 'static,
    ) -> Result<(), ListenerError> {
        if self.worker.is_some() {
            return Err(ListenerError::AlreadyRunning);
        }

        let region = DeviceRegion::open(&self.config.device_path)?;

        self.running.store(true, Ordering::Release);

        let running = Arc::clone(&self.running);
        let stats = Arc::clone(&self.stats);
        let config = self.config.clone();
        let callback: EventCallback = Box::new(callback);

        let spawn_result = std::thread::Builder::new()
            .name("irq-drain".to_string())
            .spawn(move || drain_loop(region, config, running, stats, callback));

        match spawn_result {
            Ok(handle) => {
                self.worker = Some(handle);
                tracing::debug!(
                    device = %self.config.device_path.display(),
                    "Listener started"
                );
                Ok(())
            }
            Err(source) => {
                // The closure never ran; the region it captured is dropped,
                // which releases the mapping and the handle.
                self.running.store(false, Ordering::Release);
                Err(ListenerError::Spawn { source })
            }
        }
    }

    /// Stop the drain thread and release the device.
    ///
    /// Idempotent: a no-op when not running, safe to call from teardown
    /// paths and more than once. Blocks until the thread observes the
    /// cleared flag and exits - at most one poll-timeout period when idle.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("Drain thread panicked during shutdown");
            }
            self.stats.attached.store(false, Ordering::Release);
            tracing::debug!(
                device = %self.config.device_path.display(),
                "Listener stopped"
            );
        }
    }
}

impl Drop for IrqListener {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Worker thread body. Owns the mapped region for its whole lifetime.
fn drain_loop(
    region: DeviceRegion,
    config: ListenerConfig,
    running: Arc<AtomicBool>,
    stats: Arc<ListenerStats>,
    mut callback: EventCallback,
) {
    if config.realtime {
        rt::promote_to_realtime();
    }
    if let Some(cpu) = config.pin_cpu {
        if let Err(error) = rt::pin_current_thread(cpu) {
            tracing::warn!(cpu = cpu, error = %error, "Failed to pin drain thread");
        }
    }

    // SAFETY: the mapping lives until this function returns, and this
    // thread holds the only consumer handle for it.
    let mut consumer = unsafe { RingConsumer::from_raw(region.ring()) };

    // Drop whatever was published before we attached; a fresh listener
    // never replays stale records.
    let skipped = consumer.resync();
    if skipped > 0 {
        tracing::debug!(skipped = skipped, "Dropped pre-attach backlog");
    }
    stats.attached.store(true, Ordering::Release);

    let mut last_sequence: u32 = 0;

    while running.load(Ordering::Acquire) {
        match region.wait_readable(config.poll_timeout) {
            Ok(Readiness::Ready) => {
                consumer.drain(|event| {
                    if last_sequence != 0 {
                        let step = event.sequence.wrapping_sub(last_sequence);
                        if step > 1 {
                            stats
                                .dropped
                                .fetch_add(u64::from(step - 1), Ordering::Relaxed);
                        }
                    }
                    last_sequence = event.sequence;
                    stats.delivered.fetch_add(1, Ordering::Relaxed);
                    callback(event);
                });
            }
            Ok(Readiness::TimedOut) | Ok(Readiness::Interrupted) => {
                // Timeout: re-check the running flag. Interrupted: retry.
            }
            Err(error) => {
                tracing::error!(
                    device = %region.path().display(),
                    error = %error,
                    "Readiness wait failed; drain loop exiting"
                );
                break;
            }
        }
    }
    // Region drops here: unmap + close on every exit path.
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_without_start_is_noop() {
        let mut listener = IrqListener::new(ListenerConfig::default());
        listener.stop();
        listener.stop();
        assert!(!listener.is_running());
    }

    #[test]
    fn test_start_missing_device_reports_attach_failure() {
        let mut listener = IrqListener::with_device("/dev/irqstream-does-not-exist");
        let err = listener.start(|_| {}).expect_err("device is absent");
        assert!(matches!(err, ListenerError::Transport(_)));
        assert!(!listener.is_running());
        // Failed start leaves the instance reusable.
        listener.stop();
    }

    #[test]
    fn test_stats_start_at_zero() {
        let listener = IrqListener::new(ListenerConfig::default());
        let stats = listener.stats();
        assert_eq!(stats.delivered(), 0);
        assert_eq!(stats.dropped(), 0);
    }
}
