// SPDX-License-Identifier: Apache-2.0

//! `irqstream watch` - print each event as it arrives.
//!
//! The real-time callback only pushes into the bounded queue; formatting and
//! stdout happen here on the main thread. A full queue drops the newest
//! record rather than stalling the drain loop.

use std::error::Error;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use irqstream_core::{spsc, Config, IrqEvent, IrqListener};

pub fn execute(config: &Config) -> Result<(), Box<dyn Error>> {
    let stop = crate::signals::install()?;

    let (mut tx, mut rx) = spsc::channel::<IrqEvent>(config.queue_depth);

    let mut listener = IrqListener::new(config.listener.clone());
    let stats = listener.stats();
    listener.start(move |event| {
        let _ = tx.send(event);
    })?;

    println!(
        "Listening on {} | Ctrl+C to stop",
        config.listener.device_path.display()
    );
    println!("{:<12} {:<20} {}", "SEQUENCE", "TIMESTAMP (ns)", "PIN");

    while !stop.load(Ordering::Acquire) {
        match rx.recv() {
            Some(event) => {
                println!(
                    "{:<12} {:<20} {}",
                    event.sequence, event.timestamp_ns, event.pin_state
                );
            }
            // Queue empty: back off briefly instead of spinning.
            None => thread::sleep(Duration::from_millis(1)),
        }
    }

    listener.stop();
    println!(
        "\n{} delivered, {} lost to overrun",
        stats.delivered(),
        stats.dropped()
    );

    Ok(())
}
