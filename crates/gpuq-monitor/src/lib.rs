//! gpuq-monitor: Device telemetry and free-device selection
//!
//! This crate provides the device-facing half of the dispatcher:
//! - `DeviceMonitor` trait and its NVML implementation
//! - The free-device selection policy

pub mod monitor;
pub mod select;

pub use monitor::{DeviceMonitor, NvmlMonitor};
pub use select::{select_free, select_free_excluding};
