//! Free-device selection policy

use std::collections::HashSet;

use gpuq_core::DeviceSnapshot;

/// Pick the lowest-indexed idle device from a snapshot.
///
/// Pure function over the snapshot; no state is retained between calls.
/// The lowest-index tie-break is a deliberate deterministic policy, not
/// a load-balancing one: it packs work onto low-index devices first.
pub fn select_free(snapshot: &DeviceSnapshot) -> Option<u32> {
    snapshot
        .devices
        .iter()
        .find(|d| d.is_idle())
        .map(|d| d.index)
}

/// Same policy, restricted to devices not in `reserved`.
///
/// Used by the reservation ledger so that selection and reservation
/// happen under one lock.
pub fn select_free_excluding(snapshot: &DeviceSnapshot, reserved: &HashSet<u32>) -> Option<u32> {
    snapshot
        .devices
        .iter()
        .find(|d| d.is_idle() && !reserved.contains(&d.index))
        .map(|d| d.index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpuq_core::DeviceState;

    fn device(index: u32, compute: u32, memory: u32, procs: u32) -> DeviceState {
        DeviceState {
            index,
            utilization_compute: compute,
            utilization_memory: memory,
            running_process_count: procs,
        }
    }

    fn snapshot(devices: Vec<DeviceState>) -> DeviceSnapshot {
        DeviceSnapshot { devices }
    }

    #[test]
    fn test_lowest_index_wins() {
        let snap = snapshot(vec![
            device(0, 95, 80, 3),
            device(1, 0, 0, 0),
            device(2, 0, 0, 0),
        ]);
        assert_eq!(select_free(&snap), Some(1));
    }

    #[test]
    fn test_deterministic() {
        let snap = snapshot(vec![device(0, 0, 0, 0), device(1, 0, 0, 0)]);
        for _ in 0..10 {
            assert_eq!(select_free(&snap), Some(0));
        }
    }

    #[test]
    fn test_exhaustion() {
        let snap = snapshot(vec![device(0, 10, 0, 1), device(1, 0, 5, 0)]);
        assert_eq!(select_free(&snap), None);
    }

    #[test]
    fn test_empty_snapshot() {
        assert_eq!(select_free(&snapshot(vec![])), None);
    }

    #[test]
    fn test_partial_occupancy_is_not_idle() {
        // A device with zero utilization but a resident process is busy.
        let snap = snapshot(vec![device(0, 0, 0, 1), device(1, 0, 0, 0)]);
        assert_eq!(select_free(&snap), Some(1));
    }

    #[test]
    fn test_excluding_reserved() {
        let snap = snapshot(vec![device(0, 0, 0, 0), device(1, 0, 0, 0)]);
        let mut reserved = HashSet::new();
        assert_eq!(select_free_excluding(&snap, &reserved), Some(0));

        reserved.insert(0);
        assert_eq!(select_free_excluding(&snap, &reserved), Some(1));

        reserved.insert(1);
        assert_eq!(select_free_excluding(&snap, &reserved), None);
    }
}
