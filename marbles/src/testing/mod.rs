//! Helpers for writing marble tests.

mod generator;

pub use generator::{DiagramGenConfig, DiagramGenerator};

use crate::config::TimeConfig;
use crate::scheduler::{RunError, Scheduler};

/// Run a marble test on a fresh scheduler.
///
/// `test` wires up streams and assertions; the scheduler is then drained on
/// a current-thread tokio runtime and the combined assertion outcome
/// returned. Must not be called from inside another tokio runtime.
///
/// # Errors
///
/// Returns [`RunError::AssertionsFailed`] if any assertion failed, or
/// [`RunError::Runtime`] if the runtime could not be built.
pub fn with_time(config: TimeConfig, test: impl FnOnce(&Scheduler)) -> Result<(), RunError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let scheduler = Scheduler::new(config);
        test(&scheduler);
        scheduler.run().await
    })
}
