pub mod coordinator;
pub mod fetch;
pub mod job;
pub mod lock;
pub mod queue;
pub mod worker;

pub use coordinator::{IntakeCoordinator, IntakeOutcome};
pub use job::{Cohort, ProcessingJob};
pub use worker::{run_worker_pool, ProcessingOutcome, SwapWorker};
