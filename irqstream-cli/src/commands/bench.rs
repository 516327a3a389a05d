// SPDX-License-Identifier: Apache-2.0

//! `irqstream bench` - capture inter-event deltas for jitter analysis.
//!
//! Records stream through the bounded queue into a delta vector; producer
//! loss shows up as sequence gaps and is counted, never interpolated. The
//! raw deltas go to a `.dat` file for offline analysis, with an optional
//! JSON summary on stdout.

use std::error::Error;
use std::fs::File;
use std::io::{stdout, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};

use chrono::Local;
use irqstream_core::{spsc, Config, IrqEvent, IrqListener};
use serde::Serialize;

/// Summary of one capture run.
#[derive(Debug, Serialize)]
struct BenchSummary {
    samples: usize,
    dropped_events: u64,
    min_ns: u64,
    max_ns: u64,
    mean_ns: u64,
    p50_ns: u64,
    p99_ns: u64,
}

pub fn execute(
    config: &Config,
    duration: Option<u64>,
    output: Option<PathBuf>,
    json: bool,
) -> Result<(), Box<dyn Error>> {
    let stop = crate::signals::install()?;

    let (mut tx, mut rx) = spsc::channel::<IrqEvent>(config.queue_depth);

    let mut listener = IrqListener::new(config.listener.clone());
    listener.start(move |event| {
        let _ = tx.send(event);
    })?;

    match duration {
        Some(secs) => println!("[Running] Capturing for {secs} s..."),
        None => println!("[Running] Capturing... Ctrl+C to stop"),
    }

    let deadline = duration.map(|secs| Instant::now() + Duration::from_secs(secs));
    let mut deltas: Vec<u64> = Vec::with_capacity(1_000_000);
    let mut last_timestamp = 0u64;
    let mut last_counter = 0u32;
    let mut dropped_events = 0u64;
    let mut last_progress = Instant::now();

    loop {
        if stop.load(Ordering::Acquire) {
            break;
        }
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                break;
            }
        }

        match rx.recv() {
            Some(event) => {
                if last_counter != 0 {
                    let step = event.sequence.wrapping_sub(last_counter);
                    if step > 1 {
                        dropped_events += u64::from(step - 1);
                    }
                }
                last_counter = event.sequence;

                if last_timestamp != 0 {
                    deltas.push(event.timestamp_ns.saturating_sub(last_timestamp));
                }
                last_timestamp = event.timestamp_ns;

                // Rate-limited progress line; stdout stays off the hot path.
                if last_progress.elapsed() >= Duration::from_millis(250) {
                    print!(
                        "\r[Running] Captured: {} | Dropped: {}",
                        deltas.len(),
                        dropped_events
                    );
                    stdout().flush()?;
                    last_progress = Instant::now();
                }
            }
            None => thread::sleep(Duration::from_micros(10)),
        }
    }
    println!();

    listener.stop();

    let path = output.unwrap_or_else(default_output_path);
    write_deltas(&path, &deltas, dropped_events)?;
    println!("[Done] {} samples written to {}", deltas.len(), path.display());

    if json {
        if let Some(summary) = summarize(&deltas, dropped_events) {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        } else {
            println!("{{}}");
        }
    } else if let Some(summary) = summarize(&deltas, dropped_events) {
        println!(
            "[Stats] min {} ns | p50 {} ns | p99 {} ns | max {} ns | dropped {}",
            summary.min_ns, summary.p50_ns, summary.p99_ns, summary.max_ns, summary.dropped_events
        );
    }

    Ok(())
}

fn default_output_path() -> PathBuf {
    PathBuf::from(
        Local::now()
            .format("deltaevents_%H-%M-%S_%d-%m-%Y.dat")
            .to_string(),
    )
}

/// One delta per line, with a comment trailer analysis scripts can key on.
fn write_deltas(path: &Path, deltas: &[u64], dropped: u64) -> Result<(), std::io::Error> {
    let mut out = BufWriter::new(File::create(path)?);
    for delta in deltas {
        writeln!(out, "{delta}")?;
    }
    writeln!(out, "# Total_Samples: {}", deltas.len())?;
    writeln!(out, "# Hardware_Dropped_Events: {dropped}")?;
    out.flush()
}

fn summarize(deltas: &[u64], dropped_events: u64) -> Option<BenchSummary> {
    if deltas.is_empty() {
        return None;
    }

    let mut sorted = deltas.to_vec();
    sorted.sort_unstable();

    let sum: u128 = sorted.iter().map(|&d| u128::from(d)).sum();
    Some(BenchSummary {
        samples: sorted.len(),
        dropped_events,
        min_ns: sorted[0],
        max_ns: sorted[sorted.len() - 1],
        mean_ns: (sum / sorted.len() as u128) as u64,
        p50_ns: percentile(&sorted, 50),
        p99_ns: percentile(&sorted, 99),
    })
}

fn percentile(sorted: &[u64], pct: usize) -> u64 {
    let idx = (sorted.len() - 1) * pct / 100;
    sorted[idx]
}
