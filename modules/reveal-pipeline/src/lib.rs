pub mod gateway;
pub mod identification;
pub mod notify;
pub mod organization_client;
pub mod pipeline;
pub mod prefilter;
pub mod resolver;
pub mod retry;
pub mod scheduler;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;
pub mod types;

pub use pipeline::{build_scheduler, JobKind, RevealDeps, RevealPipeline, StageJob};
pub use scheduler::{Job, JobScheduler};
pub use types::{NotifyStats, StageStats};
