//! NVML-backed device telemetry.
//!
//! [`NvmlMonitor`] wraps the NVIDIA Management Library to enumerate
//! devices and read, per device, current compute/memory utilization and
//! the number of processes using it. Initialization failure is fatal
//! (`MonitorInit`): the dispatcher cannot make placement decisions
//! without telemetry and must abort startup. Query failures during a
//! poll are transient (`MonitorQuery`) and the caller retries the whole
//! cycle after its normal backoff.

use async_trait::async_trait;
use nvml_wrapper::error::NvmlError;
use nvml_wrapper::Nvml;
use tracing::info;

use gpuq_core::{DeviceSnapshot, DeviceState, DispatchError, DispatchResult};

/// Source of device telemetry snapshots
#[async_trait]
pub trait DeviceMonitor: Send + Sync {
    /// Read a fresh snapshot of every device on the host.
    ///
    /// Snapshots are never cached; each call re-reads the hardware.
    async fn snapshot(&self) -> DispatchResult<DeviceSnapshot>;
}

/// Device monitor backed by an NVML session
pub struct NvmlMonitor {
    nvml: Nvml,
}

impl NvmlMonitor {
    /// Establish the NVML telemetry session.
    ///
    /// Fails with [`DispatchError::MonitorInit`] when the library cannot
    /// be loaded or initialized (no NVIDIA runtime, permission denied,
    /// driver mismatch). This is fatal and is not retried.
    pub fn init() -> DispatchResult<Self> {
        match Nvml::init() {
            Ok(nvml) => {
                info!("NVML telemetry session established");
                Ok(Self { nvml })
            }
            Err(e) => Err(DispatchError::MonitorInit(e.to_string())),
        }
    }

    fn read_device(&self, index: u32) -> Result<DeviceState, NvmlError> {
        let device = self.nvml.device_by_index(index)?;
        let utilization = device.utilization_rates()?;
        let processes = device.running_compute_processes()?;

        Ok(DeviceState {
            index,
            utilization_compute: utilization.gpu,
            utilization_memory: utilization.memory,
            running_process_count: processes.len() as u32,
        })
    }
}

#[async_trait]
impl DeviceMonitor for NvmlMonitor {
    async fn snapshot(&self) -> DispatchResult<DeviceSnapshot> {
        let count = self
            .nvml
            .device_count()
            .map_err(|e| DispatchError::MonitorQuery(e.to_string()))?;

        let mut devices = Vec::with_capacity(count as usize);
        for index in 0..count {
            let state = self
                .read_device(index)
                .map_err(|e| DispatchError::MonitorQuery(format!("device {}: {}", index, e)))?;
            devices.push(state);
        }

        Ok(DeviceSnapshot { devices })
    }
}
