//! Core library for the PPPoE client
//!
//! This crate provides the fundamental types, error handling and
//! cancellation primitives shared by the packet codecs and the
//! session-setup machinery.

pub mod context;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use context::{CancelHandle, Context};
pub use error::{Error, Result};
pub use types::MacAddr;
