//! Schedulers: where spawned work runs and how time passes.
//!
//! Operators never reach for a global executor or clock. Anything that
//! spawns a task or sleeps (`create_async`, `from_iter`, `interval`,
//! `delay`, [`FrameClock`]) takes a [`Scheduler`] value, so the same stream
//! runs on a `LocalPool`, on tokio's `LocalSet`, or on the virtual clock of
//! [`TestScheduler`].

use std::{cell::Cell, future::Future, rc::Rc};

use futures::{
  future::{AbortHandle, Abortable, LocalBoxFuture},
  FutureExt,
};

use crate::{error::RxError, subscription::SubscriptionLike};

pub use std::time::Duration;

mod frame;
#[cfg(feature = "timer")]
mod local;
mod test_scheduler;
#[cfg(feature = "tokio-scheduler")]
mod tokio_scheduler;

pub use frame::FrameClock;
#[cfg(feature = "timer")]
pub use local::LocalScheduler;
pub use test_scheduler::{TestScheduler, VirtualSleep};
#[cfg(feature = "tokio-scheduler")]
pub use tokio_scheduler::TokioScheduler;

/// Source of timers.
pub trait SleepProvider {
  type SleepFuture: Future<Output = ()> + 'static;

  /// A future resolving once `duration` has passed. The deadline is fixed
  /// when this is called, not when the future is first polled.
  fn sleep(&self, duration: Duration) -> Self::SleepFuture;
}

/// A single-threaded executor handle.
pub trait Scheduler: SleepProvider + Clone + 'static {
  /// Hand a task to the executor.
  fn spawn_local_obj(&self, task: LocalBoxFuture<'static, ()>) -> Result<(), RxError>;

  /// Spawn `task` and return a handle that aborts it when unsubscribed. An
  /// aborted task is dropped at its next suspension point.
  fn spawn<F>(&self, task: F) -> Result<TaskHandle, RxError>
  where
    F: Future<Output = ()> + 'static,
  {
    let (abort, registration) = AbortHandle::new_pair();
    let finished = Rc::new(Cell::new(false));
    let flag = finished.clone();
    let task = Abortable::new(task, registration);
    self.spawn_local_obj(
      async move {
        if task.await.is_ok() {
          flag.set(true);
        }
      }
      .boxed_local(),
    )?;
    Ok(TaskHandle { abort, finished })
  }
}

/// A handle for a spawned task. Unsubscribing it aborts the task.
#[derive(Clone, Debug)]
pub struct TaskHandle {
  abort: AbortHandle,
  finished: Rc<Cell<bool>>,
}

impl TaskHandle {
  /// Returns true once the task ran to completion.
  #[inline]
  pub fn is_finished(&self) -> bool { self.finished.get() }
}

impl SubscriptionLike for TaskHandle {
  #[inline]
  fn unsubscribe(&mut self) { self.abort.abort() }

  #[inline]
  fn is_closed(&self) -> bool { self.finished.get() || self.abort.is_aborted() }
}
