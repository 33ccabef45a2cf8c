// ============================================
// File: crates/tunlink-transport/src/tun/mod.rs
// ============================================
//! # TUN Device Module
//!
//! ## Creation Reason
//! Provides allocation of kernel point-to-point tunnel interfaces, returning
//! the descriptor a userspace process uses to exchange raw packets with the
//! kernel.
//!
//! ## Main Functionality
//! - `TunMode` / `TunFlags`: typed allocation flags (tunnel vs tap, packet
//!   information headers)
//! - `linux`: the `/dev/net/tun` + `TUNSETIFF` implementation
//!
//! ## What is a TUN Device?
//! A TUN device is a virtual network interface that delivers and accepts raw
//! packets to/from a userspace process via a file descriptor instead of
//! physical hardware.
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │                  User Space                   │
//! │        ┌─────────────────────────────┐        │
//! │        │     bridge consumer         │        │
//! │        └──────────────┬──────────────┘        │
//! │                       │ read/write fd         │
//! ├───────────────────────┼───────────────────────┤
//! │                  Kernel Space                 │
//! │        ┌──────────────▼──────────────┐        │
//! │        │     TUN Device (tun0)       │        │
//! │        │  Virtual Network Interface  │        │
//! │        └─────────────────────────────┘        │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Allocation requires root or CAP_NET_ADMIN
//! - Interface names are limited to 15 characters on Linux
//! - The interface disappears when the returned descriptor is closed
//!   (unless made persistent elsewhere)
//!
//! ## Last Modified
//! v0.1.0 - Initial TUN module structure

// Platform-specific implementation
#[cfg(target_os = "linux")]
pub mod linux;

#[cfg(target_os = "linux")]
pub use linux::TunDevice;

// ============================================
// TunMode
// ============================================

/// Tunnel operating mode.
///
/// Selects what the kernel hands the process through the descriptor:
/// raw IP packets (`Tun`) or Ethernet frames (`Tap`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunMode {
    /// Layer-3 tunnel: raw IP packets, no Ethernet headers.
    Tun,
    /// Layer-2 tap: full Ethernet frames.
    Tap,
}

// ============================================
// TunFlags
// ============================================

/// Allocation-time flags for a tunnel interface.
///
/// Fixed at allocation time; the kernel bitmask is derived from this value
/// only at the ioctl boundary.
///
/// # Example
/// ```
/// use tunlink_transport::tun::{TunFlags, TunMode};
///
/// let flags = TunFlags::new(TunMode::Tun).with_packet_info(false);
/// assert_eq!(flags.mode(), TunMode::Tun);
/// assert!(!flags.packet_info());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TunFlags {
    mode: TunMode,
    packet_info: bool,
}

impl TunFlags {
    /// Creates flags for the given mode, without packet-information headers.
    #[must_use]
    pub const fn new(mode: TunMode) -> Self {
        Self {
            mode,
            packet_info: false,
        }
    }

    /// Sets whether the kernel prepends a packet-information header to each
    /// frame.
    #[must_use]
    pub const fn with_packet_info(mut self, packet_info: bool) -> Self {
        self.packet_info = packet_info;
        self
    }

    /// Returns the selected mode.
    #[must_use]
    pub const fn mode(&self) -> TunMode {
        self.mode
    }

    /// Returns `true` if packet-information headers are requested.
    #[must_use]
    pub const fn packet_info(&self) -> bool {
        self.packet_info
    }
}

impl Default for TunFlags {
    /// Layer-3 tunnel without packet-information headers.
    fn default() -> Self {
        Self::new(TunMode::Tun)
    }
}

// ============================================
// Tests
// ============================================
