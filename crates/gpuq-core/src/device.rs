//! Device telemetry snapshot types

use serde::{Deserialize, Serialize};

/// Environment variable restricting which devices a child process can see
pub const DEVICE_VISIBILITY_VAR: &str = "CUDA_VISIBLE_DEVICES";

/// Point-in-time telemetry for a single accelerator device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceState {
    /// Physical device index
    pub index: u32,
    /// Compute utilization percentage (0-100)
    pub utilization_compute: u32,
    /// Memory-bandwidth utilization percentage (0-100)
    pub utilization_memory: u32,
    /// Number of processes currently using the device
    pub running_process_count: u32,
}

impl DeviceState {
    /// A device is eligible for dispatch only when nothing is using it:
    /// zero running processes and zero observed utilization.
    pub fn is_idle(&self) -> bool {
        self.running_process_count == 0
            && self.utilization_compute == 0
            && self.utilization_memory == 0
    }
}

/// Ordered per-device telemetry, one entry per physical index.
///
/// A snapshot is a point-in-time read and is never cached across polls;
/// staleness is bounded by the poll interval.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    /// Device states, ordered by physical index
    pub devices: Vec<DeviceState>,
}

impl DeviceSnapshot {
    /// Number of devices on the host
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Number of devices currently idle
    pub fn idle_count(&self) -> usize {
        self.devices.iter().filter(|d| d.is_idle()).count()
    }
}

/// Remove the device-visibility variable from the dispatcher's own
/// environment. Called once at process start so the dispatcher itself
/// never counts as a device consumer; the variable is only ever set in
/// child environments after this.
pub fn clear_own_device_visibility() {
    std::env::remove_var(DEVICE_VISIBILITY_VAR);
}
