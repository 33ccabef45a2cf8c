// ============================================
// File: crates/tunlink-transport/src/creds.rs
// ============================================
//! # Peer Credential Inspection
//!
//! ## Creation Reason
//! Lets a server decide what a connected local peer is allowed to do by
//! retrieving the process/user/group identity the kernel recorded for the
//! connection.
//!
//! ## Main Functionality
//! - `PeerCredentials`: pid/uid/gid snapshot of the remote endpoint
//! - `peer_credentials()`: the `SO_PEERCRED` socket-option query
//!
//! ## Semantics
//! Credentials are recorded by the kernel at connect time for Unix-domain
//! sockets on the same kernel. The query is a point-in-time read: it is not
//! refreshed if the peer later changes user or group.
//!
//! ## ⚠️ Important Note for Next Developer
//! - Only meaningful on connected Unix-domain sockets
//! - `SO_PEERCRED` is Linux-specific
//!
//! ## Last Modified
//! v0.1.0 - Initial credential query implementation

#![cfg(target_os = "linux")]

use std::io;
use std::mem;

use nix::libc;
use tracing::debug;

use tunlink_common::DescriptorHandle;

use crate::error::{Result, TransportError};

// ============================================
// PeerCredentials
// ============================================

/// Identity of the process on the other end of a connected Unix-domain
/// socket, as recorded by the kernel at connect time.
///
/// Read-only snapshot; not automatically refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerCredentials {
    /// Process ID of the peer.
    pub pid: libc::pid_t,
    /// Effective user ID of the peer at connect time.
    pub uid: libc::uid_t,
    /// Effective group ID of the peer at connect time.
    pub gid: libc::gid_t,
}

// ============================================
// Credential Query
// ============================================

/// Retrieves the peer credentials of a connected Unix-domain socket.
///
/// # Errors
/// Returns `CredentialQueryFailed` if the socket-option query fails (e.g.
/// the descriptor is not a Unix-domain socket, or the platform does not
/// support the option).
pub fn peer_credentials(connection: &DescriptorHandle) -> Result<PeerCredentials> {
    let mut ucred: libc::ucred = unsafe { mem::zeroed() };
    #[allow(clippy::cast_possible_truncation)]
    let mut len = mem::size_of::<libc::ucred>() as libc::socklen_t;

    let rc = unsafe {
        libc::getsockopt(
            connection.as_raw_fd(),
            libc::SOL_SOCKET,
            libc::SO_PEERCRED,
            std::ptr::addr_of_mut!(ucred).cast(),
            &mut len,
        )
    };
    if rc < 0 {
        return Err(TransportError::credential_query_failed(
            &io::Error::last_os_error(),
        ));
    }

    debug!(
        pid = ucred.pid,
        uid = ucred.uid,
        gid = ucred.gid,
        "Queried peer credentials"
    );

    Ok(PeerCredentials {
        pid: ucred.pid,
        uid: ucred.uid,
        gid: ucred.gid,
    })
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs::File;
    use std::os::unix::net::UnixStream;

    use crate::unix::{SocketAddress, UnixListener, DEFAULT_BACKLOG};

    #[test]
    fn test_peer_credentials_of_same_process_connection() {
        let path = std::env::temp_dir().join(format!("tunlink-creds-{}.sock", std::process::id()));
        let listener =
            UnixListener::bind(&SocketAddress::Path(path.clone()), DEFAULT_BACKLOG).expect("bind");

        let _client = UnixStream::connect(&path).expect("connect");
        let conn = listener.accept_one().expect("accept");

        let creds = peer_credentials(&conn).expect("peer credentials");

        // The peer is this very process.
        assert_eq!(creds.pid as u32, std::process::id());
        assert_eq!(creds.uid, unsafe { libc::getuid() });
        assert_eq!(creds.gid, unsafe { libc::getgid() });

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_peer_credentials_rejects_non_socket() {
        let handle = DescriptorHandle::from(File::open("/dev/null").expect("open"));
        let err = peer_credentials(&handle).expect_err("non-socket must fail");
        assert!(matches!(err, TransportError::CredentialQueryFailed { .. }));
    }
}
