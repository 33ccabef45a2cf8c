// ============================================
// File: crates/tunlink-transport/src/unix.rs
// ============================================
//! # Unix-Domain Socket Server
//!
//! ## Creation Reason
//! Provides the listening side of the bridge's local IPC surface: a
//! stream-type Unix-domain socket bound to either a filesystem path or an
//! abstract-namespace name, with blocking accept.
//!
//! ## Main Functionality
//! - `SocketAddress`: tagged path/abstract address with text-form parsing
//! - `UnixListener`: create + bind + listen, blocking single accept
//!
//! ## Address Forms
//! | Form | Filesystem entry | Discriminator |
//! |----------|------------------|--------------------|
//! | Path | yes (unlinked before bind) | ordinary text |
//! | Abstract | no | leading NUL byte |
//!
//! The raw `sockaddr_un` buffer convention (leading NUL byte, offset-1 copy)
//! only exists at the syscall boundary; everything above it works with the
//! tagged variant.
//!
//! ## ⚠️ Important Note for Next Developer
//! - Path-form addresses are unlinked before bind to avoid "address in use"
//!   from stale socket files
//! - The address length passed to bind is exact, so abstract names are
//!   length-delimited and reachable from standard-library clients
//! - Accept blocks the calling thread; unblock it by closing the listener
//!   from another thread (surfaces as an accept failure)
//!
//! ## Last Modified
//! v0.1.0 - Initial Unix socket server implementation

use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::PathBuf;
use std::ptr;

use nix::libc;
use tracing::{debug, info};

use tunlink_common::DescriptorHandle;

use crate::error::{Result, TransportError};

// ============================================
// Constants
// ============================================

/// Default listen backlog, the queue depth for not-yet-accepted connections.
pub const DEFAULT_BACKLOG: libc::c_int = 5;

// ============================================
// SocketAddress
// ============================================

/// A Unix-domain socket address.
///
/// Exactly one of the two forms is used per bind:
/// - `Path`: a filesystem path, visible as a socket file
/// - `Abstract`: a Linux abstract-namespace name with no filesystem presence
///
/// # Text Form
/// [`SocketAddress::parse`] applies the leading-NUL convention used by the
/// bridge's external interface: `"\0name"` designates the abstract name
/// `name`, anything else is a filesystem path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketAddress {
    /// Filesystem-path address (bounded to the platform's `sun_path` size).
    Path(PathBuf),
    /// Abstract-namespace name, not filesystem-visible, never unlinked.
    Abstract(String),
}

impl SocketAddress {
    /// Parses the text form of an address.
    ///
    /// A leading NUL byte (or an empty string, whose first byte is the
    /// terminator in the original wire convention) selects the abstract
    /// namespace; the remaining bytes are the abstract name.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        match text.strip_prefix('\0') {
            Some(name) => Self::Abstract(name.to_owned()),
            None if text.is_empty() => Self::Abstract(String::new()),
            None => Self::Path(PathBuf::from(text)),
        }
    }

    /// Builds the raw address record and its exact length.
    ///
    /// Path form: copied NUL-terminated, truncated to capacity - 1.
    /// Abstract form: byte 0 stays NUL as the namespace discriminator, the
    /// name is copied from offset 1, truncated to capacity - 2.
    fn to_raw(&self) -> (libc::sockaddr_un, libc::socklen_t) {
        let mut addr: libc::sockaddr_un = unsafe { std::mem::zeroed() };
        addr.sun_family = libc::AF_UNIX as libc::sa_family_t;

        let capacity = addr.sun_path.len();
        let base = std::mem::size_of::<libc::sa_family_t>();

        let used = match self {
            Self::Path(path) => {
                let bytes = path.as_os_str().as_bytes();
                let copy_len = bytes.len().min(capacity - 1);
                for (i, &byte) in bytes[..copy_len].iter().enumerate() {
                    addr.sun_path[i] = byte as libc::c_char;
                }
                // Account for the terminating NUL.
                copy_len + 1
            }
            Self::Abstract(name) => {
                let bytes = name.as_bytes();
                let copy_len = bytes.len().min(capacity - 2);
                for (i, &byte) in bytes[..copy_len].iter().enumerate() {
                    addr.sun_path[i + 1] = byte as libc::c_char;
                }
                // The leading NUL discriminator plus the name.
                copy_len + 1
            }
        };

        #[allow(clippy::cast_possible_truncation)]
        let len = (base + used) as libc::socklen_t;
        (addr, len)
    }
}

impl std::fmt::Display for SocketAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Path(path) => write!(f, "{}", path.display()),
            Self::Abstract(name) => write!(f, "@{name}"),
        }
    }
}

// ============================================
// UnixListener
// ============================================

/// A bound, listening Unix-domain stream socket.
///
/// # Lifecycle
/// Created by [`bind`](Self::bind) or [`create`](Self::create); the listener
/// owns its descriptor and closes it on drop. Accepted connections are
/// independent descriptors with their own lifecycle.
///
/// # Example
/// ```no_run
/// use tunlink_transport::unix::{SocketAddress, UnixListener, DEFAULT_BACKLOG};
///
/// let addr = SocketAddress::Path("/run/tunlink.sock".into());
/// let listener = UnixListener::bind(&addr, DEFAULT_BACKLOG)?;
/// let connection = listener.accept_one()?;
/// # Ok::<(), tunlink_transport::error::TransportError>(())
/// ```
pub struct UnixListener {
    /// Owned listening descriptor.
    handle: DescriptorHandle,
    /// Address the socket is bound to.
    address: SocketAddress,
}

impl UnixListener {
    /// Creates, binds, and listens on a Unix-domain stream socket.
    ///
    /// For path-form addresses any stale filesystem entry at the path is
    /// unlinked first (failure ignored), so a leftover socket file from a
    /// crashed process does not cause an "address in use" bind failure.
    ///
    /// # Errors
    /// - `SocketCreateFailed`: the socket could not be created
    /// - `BindFailed` / `ListenFailed`: the kernel rejected the request; the
    ///   created descriptor is closed before returning, never handed out in
    ///   an unusable state
    pub fn bind(address: &SocketAddress, backlog: libc::c_int) -> Result<Self> {
        let fd = unsafe { libc::socket(libc::AF_UNIX, libc::SOCK_STREAM, 0) };
        if fd < 0 {
            return Err(TransportError::socket_create_failed(
                &io::Error::last_os_error(),
            ));
        }

        // From here on the handle owns the descriptor; every early return
        // closes it.
        let handle = unsafe { DescriptorHandle::from_raw(fd) };

        if let SocketAddress::Path(path) = address {
            // Stale socket files survive their owning process; a failed
            // unlink only matters if bind subsequently fails.
            if std::fs::remove_file(path).is_ok() {
                debug!("Removed stale socket file: {}", path.display());
            }
        }

        let (raw, len) = address.to_raw();

        let rc = unsafe {
            libc::bind(
                handle.as_raw_fd(),
                ptr::addr_of!(raw).cast::<libc::sockaddr>(),
                len,
            )
        };
        if rc < 0 {
            return Err(TransportError::bind_failed(
                address.to_string(),
                &io::Error::last_os_error(),
            ));
        }

        let rc = unsafe { libc::listen(handle.as_raw_fd(), backlog) };
        if rc < 0 {
            return Err(TransportError::listen_failed(
                address.to_string(),
                &io::Error::last_os_error(),
            ));
        }

        info!("Unix listener bound on {}", address);

        Ok(Self {
            handle,
            address: address.clone(),
        })
    }

    /// Creates a listener from the text form of an address, with the
    /// default backlog.
    ///
    /// # Errors
    /// Same as [`bind`](Self::bind).
    pub fn create(address_text: &str) -> Result<Self> {
        Self::bind(&SocketAddress::parse(address_text), DEFAULT_BACKLOG)
    }

    /// Accepts a single connection, blocking until a peer connects.
    ///
    /// The returned descriptor is distinct from and independent of the
    /// listener's lifecycle.
    ///
    /// # Errors
    /// Returns `AcceptFailed` if the underlying accept call fails (e.g.
    /// interrupted, descriptor limits, listener closed from another thread).
    pub fn accept_one(&self) -> Result<DescriptorHandle> {
        let fd = unsafe {
            libc::accept(self.handle.as_raw_fd(), ptr::null_mut(), ptr::null_mut())
        };
        if fd < 0 {
            return Err(TransportError::accept_failed(&io::Error::last_os_error()));
        }

        debug!(fd, "Accepted connection on {}", self.address);
        Ok(unsafe { DescriptorHandle::from_raw(fd) })
    }

    /// Returns the address the listener is bound to.
    #[must_use]
    pub const fn address(&self) -> &SocketAddress {
        &self.address
    }

    /// Transfers the listening descriptor to the caller.
    ///
    /// The caller becomes responsible for closing it; a path-form socket
    /// file is not unlinked by this crate afterwards.
    #[must_use]
    pub fn into_handle(self) -> DescriptorHandle {
        self.handle
    }
}

impl AsRawFd for UnixListener {
    fn as_raw_fd(&self) -> RawFd {
        self.handle.as_raw_fd()
    }
}

impl std::fmt::Debug for UnixListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnixListener")
            .field("fd", &self.handle.as_raw_fd())
            .field("address", &self.address)
            .finish()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::os::unix::net::UnixStream;
    use std::path::Path;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn unique_path(tag: &str) -> PathBuf {
        static COUNTER: AtomicU32 = AtomicU32::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!(
            "tunlink-{}-{}-{}.sock",
            tag,
            std::process::id(),
            n
        ))
    }

    fn unique_abstract(tag: &str) -> String {
        static COUNTER: AtomicU32 = AtomicU32::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        format!("tunlink-{}-{}-{}", tag, std::process::id(), n)
    }

    #[test]
    fn test_parse_path_form() {
        let addr = SocketAddress::parse("/run/tunlink.sock");
        assert_eq!(addr, SocketAddress::Path(PathBuf::from("/run/tunlink.sock")));
    }

    #[test]
    fn test_parse_abstract_form() {
        let addr = SocketAddress::parse("\0bridge");
        assert_eq!(addr, SocketAddress::Abstract("bridge".into()));

        // Empty text selects the abstract namespace in the original wire
        // convention (its first byte is the terminator).
        let addr = SocketAddress::parse("");
        assert_eq!(addr, SocketAddress::Abstract(String::new()));
    }

    #[test]
    fn test_raw_address_path_form() {
        let addr = SocketAddress::Path(PathBuf::from("/tmp/t.sock"));
        let (raw, len) = addr.to_raw();

        assert_eq!(raw.sun_family, libc::AF_UNIX as libc::sa_family_t);
        assert_eq!(raw.sun_path[0] as u8, b'/');
        // family + path + terminating NUL
        let base = std::mem::size_of::<libc::sa_family_t>();
        assert_eq!(len as usize, base + "/tmp/t.sock".len() + 1);
    }

    #[test]
    fn test_raw_address_abstract_form() {
        let addr = SocketAddress::Abstract("bridge".into());
        let (raw, len) = addr.to_raw();

        // Byte 0 is the namespace discriminator, name starts at offset 1.
        assert_eq!(raw.sun_path[0], 0);
        assert_eq!(raw.sun_path[1] as u8, b'b');
        let base = std::mem::size_of::<libc::sa_family_t>();
        assert_eq!(len as usize, base + 1 + "bridge".len());
    }

    #[test]
    fn test_raw_address_truncates_overlong_path() {
        let capacity = {
            let addr: libc::sockaddr_un = unsafe { std::mem::zeroed() };
            addr.sun_path.len()
        };

        let long = "x".repeat(capacity + 50);
        let addr = SocketAddress::Path(PathBuf::from(&long));
        let (raw, len) = addr.to_raw();

        let base = std::mem::size_of::<libc::sa_family_t>();
        assert_eq!(len as usize, base + capacity);
        // Last slot is the terminating NUL.
        assert_eq!(raw.sun_path[capacity - 1], 0);
    }

    #[test]
    fn test_bind_creates_socket_file() {
        let path = unique_path("bind");
        let addr = SocketAddress::Path(path.clone());

        let listener = UnixListener::bind(&addr, DEFAULT_BACKLOG).expect("bind");
        assert!(path.exists(), "socket file should exist after bind");

        drop(listener);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_bind_over_stale_socket_file() {
        let path = unique_path("stale");
        let addr = SocketAddress::Path(path.clone());

        // First bind leaves a socket file behind once the listener is gone
        // (closing the descriptor does not unlink the path).
        let listener = UnixListener::bind(&addr, DEFAULT_BACKLOG).expect("first bind");
        drop(listener);
        assert!(path.exists(), "stale socket file should remain");

        // Rebinding must succeed rather than fail with "address in use".
        let listener = UnixListener::bind(&addr, DEFAULT_BACKLOG).expect("rebind over stale file");
        drop(listener);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_abstract_bind_has_no_filesystem_entry() {
        let name = unique_abstract("abs");
        let addr = SocketAddress::Abstract(name.clone());

        let _listener = UnixListener::bind(&addr, DEFAULT_BACKLOG).expect("abstract bind");
        assert!(
            !Path::new(&name).exists(),
            "abstract address must not create a filesystem entry"
        );
        assert!(!std::env::temp_dir().join(&name).exists());
    }

    #[test]
    fn test_accept_returns_distinct_descriptors() {
        let path = unique_path("accept");
        let listener =
            UnixListener::bind(&SocketAddress::Path(path.clone()), DEFAULT_BACKLOG).expect("bind");

        // Queued in the backlog; accept picks them up in order.
        let client_a = UnixStream::connect(&path).expect("first connect");
        let client_b = UnixStream::connect(&path).expect("second connect");

        let conn_a = listener.accept_one().expect("first accept");
        let conn_b = listener.accept_one().expect("second accept");

        assert_ne!(conn_a.as_raw_fd(), conn_b.as_raw_fd());
        assert_ne!(conn_a.as_raw_fd(), listener.as_raw_fd());

        drop((client_a, client_b));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_accept_blocks_until_client_connects() {
        let path = unique_path("block");
        let listener =
            UnixListener::bind(&SocketAddress::Path(path.clone()), DEFAULT_BACKLOG).expect("bind");

        let connect_path = path.clone();
        let client = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            UnixStream::connect(&connect_path).expect("connect")
        });

        let started = std::time::Instant::now();
        let _conn = listener.accept_one().expect("accept");
        assert!(
            started.elapsed() >= Duration::from_millis(50),
            "accept should have blocked until the client connected"
        );

        client.join().expect("client thread");
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_abstract_listener_is_reachable() {
        use std::os::linux::net::SocketAddrExt;

        let name = unique_abstract("reach");
        let listener = UnixListener::create(&format!("\0{name}")).expect("abstract create");

        let peer = std::os::unix::net::SocketAddr::from_abstract_name(name.as_bytes())
            .expect("abstract client addr");
        let _client = UnixStream::connect_addr(&peer).expect("abstract connect");

        let conn = listener.accept_one().expect("accept");
        assert!(conn.as_raw_fd() >= 0);
    }
}
