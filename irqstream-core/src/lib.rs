// SPDX-License-Identifier: Apache-2.0

//! Irqstream Core Library
//!
//! User-space side of a low-latency hardware event transport: the shared
//! ring buffer protocol, the listener that maps the producer's device node,
//! the real-time drain loop, and the downstream decoupling queue. The
//! privileged producer (interrupt wiring, device registration) lives
//! outside this crate and is reached only through the shared-memory
//! contract in [`ring`] and [`event`].

pub mod config;
pub mod device;
pub mod error;
pub mod event;
pub mod listener;
pub mod ring;
pub mod rt;
pub mod sim;
pub mod spsc;

// Re-export commonly used types
pub use config::{Config, ConfigLoader, ListenerConfig, DEFAULT_DEVICE_PATH};
pub use error::{ConfigError, IrqStreamError, IrqStreamResult, ListenerError, TransportError};
pub use event::IrqEvent;
pub use listener::{IrqListener, ListenerStats};
pub use ring::{EventRing, RingConsumer, RingProducer, RING_CAPACITY};
