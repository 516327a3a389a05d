// SPDX-License-Identifier: Apache-2.0

//! Character-device transport: handle, zero-copy mapping, readiness wait.
//!
//! The privileged producer registers a device node and backs it with the
//! shared ring; this module opens that node, maps the page-rounded region,
//! and waits for "records available" with a bounded `poll(2)`.
//! All unsafe operations are encapsulated with errno translation.

use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::time::Duration;

use crate::error::TransportError;
use crate::ring::EventRing;

/// Result of one bounded readiness wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// `head` has advanced past `tail`; records can be drained.
    Ready,
    /// The timeout elapsed with nothing published.
    TimedOut,
    /// The wait was cut short by a signal. Benign; retry.
    Interrupted,
}

/// Round `len` up to the next multiple of the system page size.
///
/// Must agree with how the producer sized its allocation, or the mapping
/// is refused by the kernel side.
pub fn page_round_up(len: usize) -> usize {
    // SAFETY: sysconf is a pure query.
    let page = unsafe { libc::sysconf(libc::_SC_PAGESIZE) } as usize;
    (len + page - 1) & !(page - 1)
}

/// An open device handle plus the mapped view of the shared ring.
///
/// The region's memory is owned by the producer side; this struct holds a
/// borrowed, shared-lifetime view that ends when the handle is closed.
/// Handle and mapping are acquired together in [`DeviceRegion::open`] and
/// released together on drop.
#[derive(Debug)]
pub struct DeviceRegion {
    path: PathBuf,
    fd: i32,
    ptr: NonNull<u8>,
    map_len: usize,
}

// SAFETY: the region is a plain fd + pointer pair; synchronization of the
// mapped contents is the ring protocol's job.
unsafe impl Send for DeviceRegion {}

impl DeviceRegion {
    /// Open the producer's device node and map the shared ring.
    ///
    /// Opened read-write: the consumer publishes `tail` through the mapping.
    /// On mapping failure the already-opened fd is closed before returning,
    /// so no partial state escapes.
    pub fn open(path: &Path) -> Result<Self, TransportError> {
        let c_path =
            CString::new(path.as_os_str().as_bytes()).map_err(|_| TransportError::Open {
                path: path.to_path_buf(),
                source: std::io::Error::from_raw_os_error(libc::EINVAL),
            })?;

        // SAFETY: c_path is a valid NUL-terminated string.
        let fd = unsafe { libc::open(c_path.as_ptr(), libc::O_RDWR) };
        if fd < 0 {
            return Err(TransportError::Open {
                path: path.to_path_buf(),
                source: std::io::Error::last_os_error(),
            });
        }

        let map_len = page_round_up(EventRing::BYTE_SIZE);

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
            // SAFETY: fd was opened above and is not yet owned by anything.
            unsafe { libc::close(fd) };
            return Err(TransportError::Map {
                reason: format!("mmap failed: {}", errno),
            });
        }

        let ptr = NonNull::new(ptr as *mut u8).expect("mmap returned null but not MAP_FAILED");

        tracing::debug!(path = %path.display(), map_len = map_len, "Mapped event ring");

        Ok(Self {
            path: path.to_path_buf(),
            fd,
            ptr,
            map_len,
        })
    }

    /// The mapped ring. Valid exactly as long as this region is alive.
    pub fn ring(&self) -> NonNull<EventRing> {
        self.ptr.cast()
    }

    /// Device node this region was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Length of the mapping in bytes (page-rounded).
    pub fn map_len(&self) -> usize {
        self.map_len
    }

    /// Bounded wait for readable data on the device.
    ///
    /// The producer's poll hook reports readable while `head != tail`, so
    /// this returns [`Readiness::Ready`] whenever records are pending. The
    /// timeout exists so callers can re-check their run flag; it is not an
    /// error condition.
    pub fn wait_readable(&self, timeout: Duration) -> Result<Readiness, TransportError> {
        let mut pfd = libc::pollfd {
            fd: self.fd,
            events: libc::POLLIN,
            revents: 0,
        };
        let timeout_ms = timeout.as_millis().min(i32::MAX as u128) as i32;

        // SAFETY: pfd is a valid pollfd for the duration of the call.
        let ret = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
        if ret < 0 {
            let errno = std::io::Error::last_os_error();
            if errno.raw_os_error() == Some(libc::EINTR) {
                return Ok(Readiness::Interrupted);
            }
            return Err(TransportError::Wait { source: errno });
        }
        if ret == 0 {
            return Ok(Readiness::TimedOut);
        }
        Ok(Readiness::Ready)
    }
}

impl Drop for DeviceRegion {
    fn drop(&mut self) {
        // SAFETY: ptr and map_len were set by the successful mmap in open.
        let result = unsafe { libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, self.map_len) };
        if result < 0 {
            tracing::error!(
                path = %self.path.display(),
                error = %std::io::Error::last_os_error(),
                "Failed to unmap event ring"
            );
        }

        // SAFETY: fd was opened during open.
        unsafe { libc::close(self.fd) };

        tracing::debug!(path = %self.path.display(), "Released device region");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_round_up() {
        let page = unsafe { libc::sysconf(libc::_SC_PAGESIZE) } as usize;
        assert_eq!(page_round_up(1), page);
        assert_eq!(page_round_up(page), page);
        assert_eq!(page_round_up(page + 1), 2 * page);
    }

    #[test]
    fn test_open_missing_device_fails_cleanly() {
        let err = DeviceRegion::open(Path::new("/dev/irqstream-does-not-exist"))
            .expect_err("open of a missing node must fail");
        match err {
            TransportError::Open { path, .. } => {
                assert_eq!(path, Path::new("/dev/irqstream-does-not-exist"));
            }
            other => panic!("expected Open error, got {other:?}"),
        }
    }

    #[test]
    fn test_open_maps_file_backed_region() {
        // A regular file stands in for the device node; MAP_SHARED gives the
        // same memory to every mapper of the file.
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("ring");
        let map_len = page_round_up(EventRing::BYTE_SIZE);
        std::fs::write(&path, vec![0u8; map_len]).expect("seed backing file");

        let region = DeviceRegion::open(&path).expect("open file-backed region");
        assert_eq!(region.map_len(), map_len);

        // Regular files always poll readable.
        let readiness = region
            .wait_readable(Duration::from_millis(10))
            .expect("poll on regular file");
        assert_eq!(readiness, Readiness::Ready);
    }
}
