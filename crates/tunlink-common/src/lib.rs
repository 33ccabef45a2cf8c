// ============================================
// File: crates/tunlink-common/src/lib.rs
// ============================================
//! # Tunlink Common - Shared Foundation Library
//!
//! ## Creation Reason
//! Provides foundational types shared across all tunlink crates: the base
//! error enum and the owned file-descriptor handle every kernel resource in
//! the bridge is expressed through.
//!
//! ## Main Functionality
//! - [`error`]: Common error types and result aliases
//! - [`fd`]: Move-only owned descriptor handle with explicit close
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              tunlink-transport                      │
//! │                    │                                │
//! │                    ▼                                │
//! │             tunlink-common  ◄── You are here        │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dependencies
//! - No internal crate dependencies (leaf node)
//! - Minimal external dependencies for maximum compatibility
//!
//! ## ⚠️ Important Note for Next Developer
//! - This crate is the foundation - changes affect everything
//! - Keep dependencies minimal
//! - `DescriptorHandle` is the only place a raw fd may be closed
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod fd;

// Re-export commonly used items at crate root
pub use error::{CommonError, Result};
pub use fd::DescriptorHandle;
