// SPDX-License-Identifier: Apache-2.0

//! CLI command modules.

pub mod bench;
pub mod monitor;
pub mod watch;
