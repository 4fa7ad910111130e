//! # kestrel-common
//!
//! Common errors, configuration, and memory accounting for the Kestrel
//! execution core.
//!
//! This crate provides the foundational pieces shared by every operator:
//!
//! - **Errors**: Unified error handling with `KestrelError`
//! - **Config**: Execution configuration structures
//! - **Constants**: Batch-size limits and memory defaults
//! - **Memory**: A bounded, byte-accounting `BufferAllocator`
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use kestrel_common::config::ExecConfig;
//! use kestrel_common::error::KestrelResult;
//! use kestrel_common::memory::BufferAllocator;
//!
//! fn example() -> KestrelResult<()> {
//!     let config = ExecConfig::default();
//!     let allocator = Arc::new(BufferAllocator::new(config.memory_limit_bytes));
//!     let reservation = allocator.reserve(1024)?;
//!     assert_eq!(reservation.size(), 1024);
//!     Ok(())
//! }
//! # example().unwrap();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod constants;
pub mod error;
pub mod memory;

// Re-export commonly used items at the crate root
pub use constants::*;
pub use error::{ErrorCategory, ErrorCode, KestrelError, KestrelResult};
