//! # vifplug Common
//!
//! Shared utilities for the vifplug components.
//!
//! ## Logging
//!
//! ```rust
//! use vifplug_common::init_logging;
//!
//! init_logging("info").unwrap();
//! tracing::info!(bridge = "qbr1234", "Bridge created");
//! ```

pub mod logging;

pub use logging::{init_logging, init_logging_json, is_valid_level, LOG_LEVELS};
