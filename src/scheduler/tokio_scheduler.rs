//! Scheduler over tokio's current-thread runtime.

use futures::future::LocalBoxFuture;

use super::{Duration, Scheduler, SleepProvider};
use crate::error::RxError;

/// Spawns with `tokio::task::spawn_local`, so it must be used from inside a
/// `tokio::task::LocalSet`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioScheduler;

impl SleepProvider for TokioScheduler {
  type SleepFuture = tokio::time::Sleep;

  #[inline]
  fn sleep(&self, duration: Duration) -> Self::SleepFuture { tokio::time::sleep(duration) }
}

impl Scheduler for TokioScheduler {
  fn spawn_local_obj(&self, task: LocalBoxFuture<'static, ()>) -> Result<(), RxError> {
    tokio::task::spawn_local(task);
    Ok(())
  }
}
