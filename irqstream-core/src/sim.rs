// SPDX-License-Identifier: Apache-2.0

//! Simulated privileged producer for tests and benches.
//!
//! Publishes records exactly as the interrupt-context producer does: slot
//! write, then a Release store on `head`, with the sequence starting at 1
//! and incrementing by exactly 1 per record. A regular file stands in for
//! the device node - `poll(2)` reports a regular file readable immediately,
//! and `MAP_SHARED` gives every mapper of the file the same memory, so a
//! listener pointed at the backing file runs its wait/drain loop unchanged
//! against records published here.

use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::ptr::NonNull;

use crate::device::page_round_up;
use crate::error::TransportError;
use crate::event::IrqEvent;
use crate::ring::{EventRing, RingProducer};

/// Stand-in for the kernel-side producer, backed by a mapped regular file.
pub struct SimulatedProducer {
    fd: i32,
    ptr: NonNull<u8>,
    map_len: usize,
    producer: RingProducer,
    sequence: u32,
    clock_ns: u64,
}

// SAFETY: owns its fd and mapping exclusively; the ring protocol orders the
// shared contents.
unsafe impl Send for SimulatedProducer {}

impl SimulatedProducer {
    /// Create (or truncate) the backing file at `path`, sized and zeroed the
    /// way the real producer allocates its region, and map it.
    ///
    /// The caller owns the path; point a listener at the same path to attach.
    pub fn create(path: &Path) -> Result<Self, TransportError> {
        let c_path =
            CString::new(path.as_os_str().as_bytes()).map_err(|_| TransportError::Open {
                path: path.to_path_buf(),
                source: std::io::Error::from_raw_os_error(libc::EINVAL),
            })?;

        // SAFETY: c_path is a valid NUL-terminated string.
        let fd = unsafe {
            libc::open(
                c_path.as_ptr(),
                libc::O_RDWR | libc::O_CREAT | libc::O_TRUNC,
                0o600 as libc::c_uint,
            )
        };
        if fd < 0 {
            return Err(TransportError::Open {
                path: path.to_path_buf(),
                source: std::io::Error::last_os_error(),
            });
        }

        let map_len = page_round_up(EventRing::BYTE_SIZE);

        // ftruncate extends with zero bytes: head = tail = 0, the empty ring.
        // SAFETY: fd is a valid descriptor opened above.
        if unsafe { libc::ftruncate(fd, map_len as libc::off_t) } < 0 {
            let errno = std::io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(TransportError::Map {
                reason: format!("ftruncate failed: {}", errno),
            });
        }

        // SAFETY: fd is valid, map_len is page-rounded, offset 0 is valid.
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                map_len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            let errno = std::io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(TransportError::Map {
                reason: format!("mmap failed: {}", errno),
            });
        }

        let ptr = NonNull::new(ptr as *mut u8).expect("mmap returned null but not MAP_FAILED");

        // SAFETY: the mapping is valid for the life of this struct, and this
        // is its only producer handle.
        let producer = unsafe { RingProducer::from_raw(ptr.cast()) };

        Ok(Self {
            fd,
            ptr,
            map_len,
            producer,
            sequence: 0,
            clock_ns: 0,
        })
    }

    /// Publish the next record. The sequence auto-increments from 1; the
    /// timestamp is a synthetic monotonic clock advancing 1 us per record.
    pub fn publish(&mut self) -> u32 {
        self.clock_ns += 1_000;
        self.publish_at(self.clock_ns, 0)
    }

    /// Publish the next record with an explicit timestamp and line state.
    pub fn publish_at(&mut self, timestamp_ns: u64, pin_state: u32) -> u32 {
        self.sequence = self.sequence.wrapping_add(1);
        self.producer.publish(IrqEvent {
            timestamp_ns,
            sequence: self.sequence,
            pin_state,
        });
        self.sequence
    }

    /// Publish `n` records back-to-back.
    pub fn publish_burst(&mut self, n: u32) {
        for _ in 0..n {
            self.publish();
        }
    }

    /// Simulate overrun the way a consumer observes it: burn sequence
    /// numbers without publishing the records that carried them.
    pub fn skip_sequences(&mut self, n: u32) {
        self.sequence = self.sequence.wrapping_add(n);
    }

    /// The consumer cursor as published through the shared mapping. Lets a
    /// test wait for a listener to attach (resync moves tail to head).
    pub fn published_tail(&self) -> u32 {
        self.producer.published_tail()
    }

    /// Records published so far.
    pub fn head(&self) -> u32 {
        self.producer.head()
    }
}

impl Drop for SimulatedProducer {
    fn drop(&mut self) {
        // SAFETY: ptr/map_len were set by the successful mmap in create.
        unsafe {
            libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, self.map_len);
            libc::close(self.fd);
        }
    }
}
