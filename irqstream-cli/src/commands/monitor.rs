// SPDX-License-Identifier: Apache-2.0

//! `irqstream monitor` - live counts-per-second readout.
//!
//! The callback does one relaxed counter increment; the main thread wakes on
//! one-second boundaries, swaps the counter out, and redraws a single line.
//! Color thresholds follow the expected signal bands: green up to 10 kHz,
//! yellow to 50 kHz, red beyond.

use std::error::Error;
use std::io::{stdout, Write};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::cursor::MoveToColumn;
use crossterm::execute;
use crossterm::style::Stylize;
use crossterm::terminal::{Clear, ClearType};
use irqstream_core::{Config, IrqListener};

pub fn execute(config: &Config, dashboard: bool) -> Result<(), Box<dyn Error>> {
    if dashboard {
        return crate::tui::run_dashboard(config);
    }

    let stop = crate::signals::install()?;

    // Pulse counter owned by this invocation, shared only with its callback.
    let pulses = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&pulses);

    let mut listener = IrqListener::new(config.listener.clone());
    let stats = listener.stats();
    listener.start(move |_| {
        counter.fetch_add(1, Ordering::Relaxed);
    })?;

    println!(
        "Listening on {} | Ctrl+C to stop",
        config.listener.device_path.display()
    );

    // Align the readout to one-second boundaries.
    let mut next_tick = Instant::now() + Duration::from_secs(1);
    while !stop.load(Ordering::Acquire) {
        let now = Instant::now();
        if now < next_tick {
            // Short naps keep Ctrl+C responsive within the tick.
            thread_sleep_capped(next_tick - now);
            continue;
        }
        next_tick += Duration::from_secs(1);

        let cps = pulses.swap(0, Ordering::Relaxed);
        let value = format!("{cps:>8}");
        let styled = if cps > 50_000 {
            value.red()
        } else if cps > 10_000 {
            value.yellow()
        } else {
            value.green()
        };

        execute!(stdout(), MoveToColumn(0), Clear(ClearType::CurrentLine))?;
        print!(" Live CPS: {} Hz", styled.bold());
        stdout().flush()?;
    }

    listener.stop();
    println!(
        "\n{} delivered, {} lost to overrun",
        stats.delivered(),
        stats.dropped()
    );

    Ok(())
}

fn thread_sleep_capped(remaining: Duration) {
    std::thread::sleep(remaining.min(Duration::from_millis(50)));
}
