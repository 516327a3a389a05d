// SPDX-License-Identifier: Apache-2.0

//! TUI dashboard for the monitor command.

mod app;

pub use app::run_dashboard;
