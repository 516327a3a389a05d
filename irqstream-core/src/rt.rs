// SPDX-License-Identifier: Apache-2.0

//! Best-effort real-time scheduling for the drain thread.
//!
//! Elevation is a capability-checked side effect, not a correctness
//! requirement: the drain loop is correct at any priority, only latency
//! suffers without it. Failures here are logged and tolerated, never fatal.

use nix::sched::{sched_setaffinity, CpuSet};
use nix::unistd::Pid;

/// Outcome of a promotion attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtOutcome {
    /// SCHED_FIFO at the given priority.
    Elevated(i32),
    /// Insufficient privilege; running at default scheduling.
    Degraded,
}

/// Promote the calling thread to SCHED_FIFO at the maximum priority for
/// that class. Requires CAP_SYS_NICE (typically root).
pub fn promote_to_realtime() -> RtOutcome {
    // SAFETY: sched_get_priority_max is a pure query.
    let priority = unsafe { libc::sched_get_priority_max(libc::SCHED_FIFO) };
    if priority < 0 {
        tracing::warn!(
            error = %std::io::Error::last_os_error(),
            "Could not query SCHED_FIFO priority range; continuing at default priority"
        );
        return RtOutcome::Degraded;
    }

    let param = libc::sched_param {
        sched_priority: priority,
    };
    // SAFETY: param outlives the call; pid 0 targets the calling thread.
    let rc = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if rc == 0 {
        tracing::debug!(priority = priority, "Drain thread promoted to SCHED_FIFO");
        RtOutcome::Elevated(priority)
    } else {
        tracing::warn!(
            error = %std::io::Error::last_os_error(),
            "Failed to set SCHED_FIFO priority (needs CAP_SYS_NICE); continuing at default priority"
        );
        RtOutcome::Degraded
    }
}

/// Pin the calling thread to a single CPU.
///
/// Useful when the producer's interrupt is pinned to an isolated core and
/// the drain thread should sit beside it. Same best-effort policy as
/// [`promote_to_realtime`]; callers log and continue on failure.
pub fn pin_current_thread(cpu: usize) -> Result<(), nix::Error> {
    if cpu >= num_cpus::get() {
        return Err(nix::Error::EINVAL);
    }

    let mut cpuset = CpuSet::new();
    cpuset.set(cpu)?;
    // Pid 0: the calling thread.
    sched_setaffinity(Pid::from_raw(0), &cpuset)?;

    tracing::debug!(cpu = cpu, "Drain thread pinned to CPU");
    Ok(())
}
