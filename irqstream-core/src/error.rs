// SPDX-License-Identifier: Apache-2.0

//! Custom error types for irqstream.
//!
//! This module defines explicit enum error types as per coding guidelines.
//! No `Box<dyn Error>`, no `anyhow::Result` - all errors are strongly typed.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for the irqstream event transport.
/// All errors are explicit variants - no catch-all or generic handling.
#[derive(Debug, Error)]
pub enum IrqStreamError {
    // =========================================================================
    // Transport Errors - Attach & Readiness Failures
    // =========================================================================
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    // =========================================================================
    // Listener Lifecycle Errors
    // =========================================================================
    #[error("Listener error: {0}")]
    Listener(#[from] ListenerError),

    // =========================================================================
    // Configuration Errors - Fail-Fast on Invalid Config
    // =========================================================================
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Transport errors - failures on the device handle or the shared mapping.
///
/// Attach failures (`Open`, `Map`) are reported synchronously from `start`
/// and leave no partial state behind. `Wait` covers non-benign readiness
/// errors, which are fatal to the drain loop only.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Failed to open device {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to map event ring: {reason}")]
    Map { reason: String },

    #[error("Readiness wait failed: {source}")]
    Wait {
        #[source]
        source: std::io::Error,
    },

    #[error("Backing region too small: {actual} bytes, need {required}")]
    RegionTooSmall { actual: usize, required: usize },
}

/// Listener lifecycle errors.
///
/// `AlreadyRunning` is deliberately distinct from attach failures so callers
/// can tell "retry later" apart from "producer module not loaded".
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("Listener is already running")]
    AlreadyRunning,

    #[error("Failed to spawn drain thread: {source}")]
    Spawn {
        #[source]
        source: std::io::Error,
    },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Configuration errors. Invalid fields refuse startup; there is no partial
/// or best-effort config.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Configuration parse error: {message}")]
    Parse { message: String },

    #[error("Invalid field value: {field} = {value} - {reason}")]
    InvalidFieldValue {
        field: &'static str,
        value: String,
        reason: String,
    },
}

/// Result type alias using IrqStreamError.
pub type IrqStreamResult<T> = Result<T, IrqStreamError>;
