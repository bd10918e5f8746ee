//! gpuq-core: Core types for the gpuq dispatcher
//!
//! This crate provides the fundamental types used throughout the gpuq system:
//! - Job descriptors and launch disciplines
//! - Device telemetry snapshots
//! - Per-job records and the completion report
//! - Configuration types
//! - Error handling

pub mod config;
pub mod device;
pub mod error;
pub mod job;
pub mod report;

pub use config::*;
pub use device::*;
pub use error::*;
pub use job::*;
pub use report::*;
