//! Device reservation ledger.
//!
//! Polling for a free device and binding a job to it must be one atomic
//! step: when two workers observe the same snapshot, only one may end up
//! launching onto the device it shows as idle. The ledger is the single
//! in-process arbiter for that transition: workers hand it a fresh
//! snapshot and it selects, records, and grants a device under one lock.

use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use tracing::debug;
use uuid::Uuid;

use gpuq_core::{DeviceSnapshot, LaunchDiscipline};
use gpuq_monitor::select_free_excluding;

struct Reservation {
    job_id: Uuid,
    discipline: LaunchDiscipline,
    claimed_at: Instant,
}

/// Arbiter granting at most one active reservation per device index
pub struct ReservationLedger {
    grace: Duration,
    reserved: Mutex<HashMap<u32, Reservation>>,
}

impl ReservationLedger {
    /// Create a ledger. `grace` bounds how long a detached reservation
    /// may be held while its device still looks idle.
    pub fn new(grace: Duration) -> Self {
        Self {
            grace,
            reserved: Mutex::new(HashMap::new()),
        }
    }

    /// Atomically select and reserve a device from the snapshot.
    ///
    /// Applies the free-device policy excluding indices already reserved
    /// by other workers, so concurrent claims over the same snapshot
    /// grant at most one worker per device.
    pub async fn claim(
        &self,
        snapshot: &DeviceSnapshot,
        job_id: Uuid,
        discipline: LaunchDiscipline,
    ) -> Option<u32> {
        let mut reserved = self.reserved.lock().await;
        Self::reconcile(&mut reserved, snapshot, self.grace);

        let taken: HashSet<u32> = reserved.keys().copied().collect();
        let index = select_free_excluding(snapshot, &taken)?;

        reserved.insert(
            index,
            Reservation {
                job_id,
                discipline,
                claimed_at: Instant::now(),
            },
        );
        debug!(device = index, job_id = %job_id, "Device reserved");
        Some(index)
    }

    /// Release a reservation explicitly. Used by the attached discipline
    /// after child exit, and by any discipline after a failed launch.
    pub async fn release(&self, index: u32) {
        if self.reserved.lock().await.remove(&index).is_some() {
            debug!(device = index, "Reservation released");
        }
    }

    /// Number of reservations currently held
    pub async fn reserved_count(&self) -> usize {
        self.reserved.lock().await.len()
    }

    /// Drop detached reservations whose purpose is served.
    ///
    /// A detached reservation is held until the device is observed
    /// non-idle (the child is consuming it, and the eligibility
    /// predicate now excludes the device on its own) or until the grace
    /// period expires with the device still idle (the child exited or
    /// died before ever touching it). Attached reservations are only
    /// released explicitly.
    fn reconcile(
        reserved: &mut HashMap<u32, Reservation>,
        snapshot: &DeviceSnapshot,
        grace: Duration,
    ) {
        reserved.retain(|index, reservation| {
            if reservation.discipline != LaunchDiscipline::Detached {
                return true;
            }
            let idle = snapshot
                .devices
                .iter()
                .find(|d| d.index == *index)
                .map(|d| d.is_idle())
                .unwrap_or(false);

            if !idle {
                debug!(device = index, job_id = %reservation.job_id, "Device busy, detached reservation served");
                false
            } else if reservation.claimed_at.elapsed() >= grace {
                debug!(device = index, job_id = %reservation.job_id, "Detached reservation expired while device stayed idle");
                false
            } else {
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpuq_core::DeviceState;
    use std::sync::Arc;

    fn device(index: u32, busy: bool) -> DeviceState {
        DeviceState {
            index,
            utilization_compute: if busy { 80 } else { 0 },
            utilization_memory: if busy { 40 } else { 0 },
            running_process_count: if busy { 1 } else { 0 },
        }
    }

    fn snapshot(devices: Vec<DeviceState>) -> DeviceSnapshot {
        DeviceSnapshot { devices }
    }

    fn ledger() -> ReservationLedger {
        ReservationLedger::new(Duration::from_secs(300))
    }

    #[tokio::test]
    async fn test_claim_and_release() {
        let ledger = ledger();
        let snap = snapshot(vec![device(0, false)]);

        let granted = ledger
            .claim(&snap, Uuid::new_v4(), LaunchDiscipline::Attached)
            .await;
        assert_eq!(granted, Some(0));
        assert_eq!(
            ledger
                .claim(&snap, Uuid::new_v4(), LaunchDiscipline::Attached)
                .await,
            None
        );

        ledger.release(0).await;
        assert_eq!(
            ledger
                .claim(&snap, Uuid::new_v4(), LaunchDiscipline::Attached)
                .await,
            Some(0)
        );
    }

    #[tokio::test]
    async fn test_concurrent_claims_grant_one() {
        // Both tasks hold the same snapshot showing the single idle
        // device before either reserves. Exactly one claim may win.
        let ledger = Arc::new(ledger());
        let snap = Arc::new(snapshot(vec![device(0, false), device(1, true)]));
        let barrier = Arc::new(tokio::sync::Barrier::new(2));

        let mut tasks = Vec::new();
        for _ in 0..2 {
            let ledger = ledger.clone();
            let snap = snap.clone();
            let barrier = barrier.clone();
            tasks.push(tokio::spawn(async move {
                barrier.wait().await;
                ledger
                    .claim(&snap, Uuid::new_v4(), LaunchDiscipline::Attached)
                    .await
            }));
        }

        let mut grants = Vec::new();
        for task in tasks {
            grants.push(task.await.unwrap());
        }
        grants.sort();
        assert_eq!(grants, vec![None, Some(0)]);
    }

    #[tokio::test]
    async fn test_lowest_unreserved_index() {
        let ledger = ledger();
        let snap = snapshot(vec![device(0, false), device(1, false), device(2, false)]);

        assert_eq!(
            ledger
                .claim(&snap, Uuid::new_v4(), LaunchDiscipline::Attached)
                .await,
            Some(0)
        );
        assert_eq!(
            ledger
                .claim(&snap, Uuid::new_v4(), LaunchDiscipline::Attached)
                .await,
            Some(1)
        );
    }

    #[tokio::test]
    async fn test_detached_reservation_released_when_device_busy() {
        let ledger = ledger();
        let idle = snapshot(vec![device(0, false), device(1, true)]);

        assert_eq!(
            ledger
                .claim(&idle, Uuid::new_v4(), LaunchDiscipline::Detached)
                .await,
            Some(0)
        );
        assert_eq!(ledger.reserved_count().await, 1);

        // Next poll sees the child consuming the device; the
        // reservation has served its purpose and the predicate itself
        // now excludes the device.
        let busy = snapshot(vec![device(0, true), device(1, true)]);
        assert_eq!(
            ledger
                .claim(&busy, Uuid::new_v4(), LaunchDiscipline::Detached)
                .await,
            None
        );
        assert_eq!(ledger.reserved_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_detached_reservation_expires_after_grace() {
        let ledger = ReservationLedger::new(Duration::from_secs(300));
        let snap = snapshot(vec![device(0, false)]);

        assert_eq!(
            ledger
                .claim(&snap, Uuid::new_v4(), LaunchDiscipline::Detached)
                .await,
            Some(0)
        );

        // Device never shows activity: before the grace elapses the
        // reservation still blocks the device, afterwards it is
        // reclaimed.
        tokio::time::advance(Duration::from_secs(299)).await;
        assert_eq!(
            ledger
                .claim(&snap, Uuid::new_v4(), LaunchDiscipline::Detached)
                .await,
            None
        );

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(
            ledger
                .claim(&snap, Uuid::new_v4(), LaunchDiscipline::Detached)
                .await,
            Some(0)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_attached_reservation_never_expires() {
        let ledger = ReservationLedger::new(Duration::from_secs(300));
        let snap = snapshot(vec![device(0, false)]);

        assert_eq!(
            ledger
                .claim(&snap, Uuid::new_v4(), LaunchDiscipline::Attached)
                .await,
            Some(0)
        );

        tokio::time::advance(Duration::from_secs(3600)).await;
        assert_eq!(
            ledger
                .claim(&snap, Uuid::new_v4(), LaunchDiscipline::Attached)
                .await,
            None
        );
    }
}
