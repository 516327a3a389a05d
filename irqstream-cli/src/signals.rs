// SPDX-License-Identifier: Apache-2.0

//! SIGINT handling for the foreground front ends.

use std::sync::atomic::{AtomicBool, Ordering};

use nix::sys::signal::{self, SigHandler, Signal};

static STOP: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_sigint(_signum: libc::c_int) {
    STOP.store(true, Ordering::Release);
}

/// Install the Ctrl+C handler. Returns the flag that flips once on SIGINT.
pub fn install() -> Result<&'static AtomicBool, nix::Error> {
    // SAFETY: the handler only stores to a static atomic, which is
    // async-signal-safe.
    unsafe { signal::signal(Signal::SIGINT, SigHandler::Handler(handle_sigint))? };
    Ok(&STOP)
}
