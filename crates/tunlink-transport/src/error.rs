// ============================================
// File: crates/tunlink-transport/src/error.rs
// ============================================
//! # Transport Error Types
//!
//! ## Creation Reason
//! Defines error types specific to the resource bridge: TUN device
//! allocation, Unix-domain socket setup, accept, and credential queries.
//!
//! ## Main Functionality
//! - `TransportError`: Primary error enum for bridge operations
//! - Convenience constructors capturing errno text
//! - Categorization of transient vs fatal errors
//!
//! ## Error Categories
//! 1. **Resource-open failures**: control device or socket creation failed
//! 2. **Configuration failures**: ioctl/bind/listen rejected the request
//! 3. **Accept failures**: transient, per-connection, non-fatal to the loop
//! 4. **Credential failures**: peer-credential option unsupported or failed
//!
//! ## ⚠️ Important Note for Next Developer
//! - Resource-open and configuration failures are never retried internally
//! - Accept failures must stay non-fatal inside the dispatch loop
//! - Always capture `io::Error::last_os_error()` at the failing syscall
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use std::io;

use thiserror::Error;

use tunlink_common::error::CommonError;

// ============================================
// Result Type Alias
// ============================================

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

// ============================================
// TransportError
// ============================================

/// Resource-bridge error types.
///
/// # Categories
/// - **Open**: acquiring the kernel resource failed
/// - **Config**: the kernel rejected the configuration request
/// - **Accept**: a single accept call failed (transient)
/// - **Creds**: the peer-credential query failed
#[derive(Error, Debug)]
pub enum TransportError {
    // ========================================
    // Resource-Open Failures
    // ========================================

    /// Failed to open the tunnel control device.
    #[error("Failed to open control device '{path}': {reason}")]
    DeviceOpenFailed {
        /// Device node we tried to open
        path: String,
        /// Why opening failed (errno text)
        reason: String,
    },

    /// Failed to create a Unix-domain socket.
    #[error("Failed to create socket: {reason}")]
    SocketCreateFailed {
        /// Why creation failed (errno text)
        reason: String,
    },

    // ========================================
    // Configuration Failures
    // ========================================

    /// The interface-configuration ioctl rejected the request.
    #[error("Failed to set up TUN device '{name}': {reason}")]
    TunSetupFailed {
        /// Requested device name (may be empty for kernel-assigned)
        name: String,
        /// Why setup failed (errno text)
        reason: String,
    },

    /// Failed to bind the socket to its address.
    #[error("Failed to bind to {addr}: {reason}")]
    BindFailed {
        /// Address we tried to bind to
        addr: String,
        /// Why binding failed (errno text)
        reason: String,
    },

    /// Failed to put the bound socket into listening state.
    #[error("Failed to listen on {addr}: {reason}")]
    ListenFailed {
        /// Address the socket is bound to
        addr: String,
        /// Why listen failed (errno text)
        reason: String,
    },

    // ========================================
    // Per-Connection Failures
    // ========================================

    /// A single accept call failed.
    ///
    /// Transient by contract: the dispatch loop reports this and keeps
    /// running.
    #[error("Failed to accept connection: {reason}")]
    AcceptFailed {
        /// Why accept failed (errno text)
        reason: String,
    },

    /// The peer-credential socket option query failed.
    #[error("Failed to query peer credentials: {reason}")]
    CredentialQueryFailed {
        /// Why the query failed (errno text)
        reason: String,
    },

    // ========================================
    // System Errors
    // ========================================

    /// Permission denied for operation.
    #[error("Permission denied: {operation}")]
    PermissionDenied {
        /// What operation was denied
        operation: String,
    },

    // ========================================
    // Wrapped Errors
    // ========================================

    /// I/O error from the system.
    #[error("I/O error: {context}")]
    Io {
        /// What was happening when the error occurred
        context: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Error from common crate.
    #[error(transparent)]
    Common(#[from] CommonError),
}

impl TransportError {
    // ========================================
    // Convenience Constructors
    // ========================================

    /// Creates a `DeviceOpenFailed` error from the current errno.
    pub fn device_open_failed(path: impl Into<String>, err: &io::Error) -> Self {
        Self::DeviceOpenFailed {
            path: path.into(),
            reason: err.to_string(),
        }
    }

    /// Creates a `SocketCreateFailed` error from the current errno.
    pub fn socket_create_failed(err: &io::Error) -> Self {
        Self::SocketCreateFailed {
            reason: err.to_string(),
        }
    }

    /// Creates a `TunSetupFailed` error.
    pub fn tun_setup_failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TunSetupFailed {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `BindFailed` error from the current errno.
    pub fn bind_failed(addr: impl Into<String>, err: &io::Error) -> Self {
        Self::BindFailed {
            addr: addr.into(),
            reason: err.to_string(),
        }
    }

    /// Creates a `ListenFailed` error from the current errno.
    pub fn listen_failed(addr: impl Into<String>, err: &io::Error) -> Self {
        Self::ListenFailed {
            addr: addr.into(),
            reason: err.to_string(),
        }
    }

    /// Creates an `AcceptFailed` error from the current errno.
    pub fn accept_failed(err: &io::Error) -> Self {
        Self::AcceptFailed {
            reason: err.to_string(),
        }
    }

    /// Creates a `CredentialQueryFailed` error from the current errno.
    pub fn credential_query_failed(err: &io::Error) -> Self {
        Self::CredentialQueryFailed {
            reason: err.to_string(),
        }
    }

    /// Creates an `Io` error with context.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    // ========================================
    // Error Classification
    // ========================================

    /// Returns `true` if this error is transient and the operation may
    /// be attempted again without reconfiguring anything.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::AcceptFailed { .. } => true,
            Self::Io { source, .. } => matches!(
                source.kind(),
                io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted | io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }

    /// Returns `true` if this error likely requires elevated privileges.
    #[must_use]
    pub const fn requires_privileges(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied { .. } | Self::DeviceOpenFailed { .. }
        )
    }

    /// Returns `true` if the triggering operation must be treated as a hard
    /// failure by the caller (no partial success).
    #[must_use]
    pub const fn is_fatal_to_operation(&self) -> bool {
        matches!(
            self,
            Self::DeviceOpenFailed { .. }
                | Self::SocketCreateFailed { .. }
                | Self::TunSetupFailed { .. }
                | Self::BindFailed { .. }
                | Self::ListenFailed { .. }
        )
    }
}

// ============================================
// Error Conversions
// ============================================

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        Self::Io {
            context: "unspecified I/O operation".into(),
            source: err,
        }
    }
}

// ============================================
// Tests
// ============================================
