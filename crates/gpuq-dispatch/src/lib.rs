//! gpuq-dispatch: Job queue, device reservation, and dispatch workers
//!
//! This crate contains the control plane of the dispatcher:
//! - FIFO `JobQueue` with a shutdown sentinel
//! - `ReservationLedger`, the arbiter making select-and-bind atomic
//! - `DispatchWorker` state machine
//! - `Supervisor` owning the workers for one run

pub mod queue;
pub mod reservation;
pub mod supervisor;
pub mod worker;

pub use queue::{JobQueue, QueueItem};
pub use reservation::ReservationLedger;
pub use supervisor::Supervisor;
pub use worker::DispatchWorker;
