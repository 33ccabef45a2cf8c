// ============================================
// File: crates/tunlink-common/src/fd.rs
// ============================================
//! # Owned Descriptor Handle
//!
//! ## Creation Reason
//! Every kernel resource the bridge hands out (TUN device, listening socket,
//! accepted connection) is a file descriptor. This module provides the single
//! owned representation for them, so that closing happens exactly once.
//!
//! ## Main Functionality
//! - `DescriptorHandle`: move-only owned fd wrapper
//! - Explicit `close()` surfacing the OS error
//! - `into_raw()` for transferring ownership across an API boundary
//!
//! ## Ownership Model
//! A handle is exclusively owned by one logical owner at a time. Transfers
//! are explicit and single-directional: `into_raw()` hands the descriptor to
//! the caller and disarms the destructor. Because the type is not `Clone`,
//! double-close is unrepresentable.
//!
//! ## ⚠️ Important Note for Next Developer
//! - Never call `libc::close` on a raw fd elsewhere in the workspace
//! - `as_raw_fd()` borrows; the fd is only valid while the handle lives
//!
//! ## Last Modified
//! v0.1.0 - Initial handle implementation

use std::fs::File;
use std::io;
use std::os::unix::io::{AsRawFd, IntoRawFd, RawFd};

use nix::libc;
use tracing::debug;

use crate::error::{CommonError, Result};

// ============================================
// DescriptorHandle
// ============================================

/// An owned OS file descriptor with exclusive-ownership semantics.
///
/// # Lifecycle
/// A `DescriptorHandle` is either valid-and-owned or consumed. It is consumed
/// by [`close`](Self::close) (explicit, error-reporting), by
/// [`into_raw`](Self::into_raw) (ownership transfer), or by `Drop`
/// (best-effort close).
///
/// # Example
/// ```no_run
/// use std::fs::File;
/// use tunlink_common::DescriptorHandle;
///
/// let file = File::open("/dev/null")?;
/// let handle = DescriptorHandle::from(file);
/// handle.close()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct DescriptorHandle {
    /// The wrapped raw descriptor.
    fd: RawFd,
}

impl DescriptorHandle {
    /// Wraps a raw descriptor, assuming exclusive ownership of it.
    ///
    /// # Safety
    /// `fd` must be an open file descriptor that no other owner will close.
    #[must_use]
    pub const unsafe fn from_raw(fd: RawFd) -> Self {
        Self { fd }
    }

    /// Returns the raw descriptor without transferring ownership.
    ///
    /// The returned value is only valid while this handle is alive.
    #[must_use]
    pub const fn as_raw_fd(&self) -> RawFd {
        self.fd
    }

    /// Releases ownership of the descriptor to the caller.
    ///
    /// The destructor will not run; the caller is now responsible for
    /// closing the descriptor.
    #[must_use]
    pub fn into_raw(self) -> RawFd {
        let fd = self.fd;
        std::mem::forget(self);
        fd
    }

    /// Closes the descriptor, reporting any OS error.
    ///
    /// # Errors
    /// Returns `CommonError::Io` if the underlying `close(2)` fails.
    pub fn close(self) -> Result<()> {
        let fd = self.into_raw();
        let rc = unsafe { libc::close(fd) };
        if rc < 0 {
            return Err(CommonError::io(
                format!("close fd {fd}"),
                io::Error::last_os_error(),
            ));
        }
        Ok(())
    }
}

impl Drop for DescriptorHandle {
    fn drop(&mut self) {
        let rc = unsafe { libc::close(self.fd) };
        if rc < 0 {
            debug!(fd = self.fd, "close on drop failed: {}", io::Error::last_os_error());
        }
    }
}

impl AsRawFd for DescriptorHandle {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl From<File> for DescriptorHandle {
    /// Takes over the descriptor owned by an open `File`.
    fn from(file: File) -> Self {
        // IntoRawFd hands us sole ownership.
        unsafe { Self::from_raw(file.into_raw_fd()) }
    }
}

impl std::fmt::Debug for DescriptorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DescriptorHandle").field("fd", &self.fd).finish()
    }
}

// ============================================
// Tests
// ============================================
