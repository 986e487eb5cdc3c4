use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::foundation::error::{WaveError, WaveResult};

/// Shared cancellation flag, checked by the pipelines at every checkpoint.
///
/// Clones observe the same flag; cancelling is irreversible.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(WaveError::Cancelled)` once cancelled.
    pub fn check(&self) -> WaveResult<()> {
        if self.is_cancelled() {
            Err(WaveError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Pipeline checkpoint: fail if cancelled, and yield to the runtime on every `every`-th step.
pub(crate) async fn checkpoint(cancel: &CancelToken, step: u64, every: u64) -> WaveResult<()> {
    cancel.check()?;
    if every > 0 && step.is_multiple_of(every) {
        tokio::task::yield_now().await;
        cancel.check()?;
    }
    Ok(())
}
