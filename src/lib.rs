//! alertdispatch - An alert notification dispatch engine
//!
//! This library turns a batch of alert state changes into at most one
//! notification per configured channel, rendering provider-specific payloads
//! from a shared template set and delivering them through a pluggable
//! transport.

pub mod cli;
pub mod config;
pub mod core;
pub mod dispatch;
pub mod error;
pub mod notification;
pub mod summary;
pub mod template;
pub mod transport;

// Re-export core types for convenience
pub use core::*;
pub use dispatch::{DispatchSettings, Dispatcher};
pub use error::{FailureReason, NotifyError};
