// ============================================
// File: crates/tunlink-transport/src/lib.rs
// ============================================
//! # TunLink Transport
//!
//! ## Creation Reason
//! This crate owns every kernel-facing resource of the bridge: tunnel
//! device allocation, Unix-domain socket servers, peer-credential
//! inspection, and the accept dispatch loop. It exists so consumers can
//! acquire and serve these resources through safe, owned handles without
//! touching raw syscalls themselves.
//!
//! ## Main Functionality
//! - **TUN allocation**: `/dev/net/tun` + `TUNSETIFF`, kernel-assigned names
//! - **Unix sockets**: filesystem-path and abstract-namespace listeners
//! - **Peer credentials**: `SO_PEERCRED` identity of a connected local peer
//! - **Dispatch loop**: run-until-stopped accept/handle/close cycle
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────┐
//! │         bridge consumer             │
//! │   (control plane, packet plane)     │
//! └──────┬───────────────┬──────────────┘
//!        │               │
//! ┌──────▼──────┐ ┌──────▼──────────────┐
//! │  tun (fd)   │ │ unix + dispatch     │
//! │ TunDevice   │ │ UnixListener, loop, │
//! │             │ │ peer credentials    │
//! └──────┬──────┘ └──────┬──────────────┘
//!        │               │
//! ┌──────▼───────────────▼──────────────┐
//! │        tunlink-common               │
//! │   DescriptorHandle, CommonError     │
//! └─────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Raw descriptors cross API boundaries only inside [`DescriptorHandle`]
//! 2. Syscall failures are captured at the failing call with errno text
//! 3. Per-connection failures never take down the listener
//!
//! ## ⚠️ Important Note for Next Developer
//! - TUN allocation and `SO_PEERCRED` are Linux-only; the socket and
//!   dispatch modules build on any Unix
//! - All operations are synchronous and blocking
//!
//! ## Last Modified
//! v0.1.0 - Initial transport implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod creds;
pub mod dispatch;
pub mod error;
pub mod tun;
pub mod unix;

// Re-export commonly used types
pub use error::{Result, TransportError};

pub use dispatch::{run_accept_loop, run_accept_loop_with_cancel, CancelToken};
pub use tun::{TunFlags, TunMode};
pub use unix::{SocketAddress, UnixListener, DEFAULT_BACKLOG};

#[cfg(target_os = "linux")]
pub use creds::{peer_credentials, PeerCredentials};
#[cfg(target_os = "linux")]
pub use tun::TunDevice;

pub use tunlink_common::DescriptorHandle;
