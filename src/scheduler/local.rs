//! Scheduler over a `futures` [`LocalPool`](futures::executor::LocalPool).

use futures::{
  executor::LocalSpawner,
  future::LocalBoxFuture,
  task::LocalSpawn,
  FutureExt,
};

use super::{Duration, Scheduler, SleepProvider};
use crate::error::RxError;

/// Spawns onto a `LocalPool` and sleeps on `futures-time` timers.
///
/// ```rust
/// use futures::executor::LocalPool;
/// use rxflow::prelude::*;
/// use rxflow::scheduler::LocalScheduler;
///
/// let mut pool = LocalPool::new();
/// let scheduler = LocalScheduler::new(pool.spawner());
/// let _subscription = from_iter::<_, _, RxError>(0..3, scheduler).subscribe_next(|v| println!("{v}"));
/// pool.run();
/// ```
#[derive(Clone)]
pub struct LocalScheduler {
  spawner: LocalSpawner,
}

impl LocalScheduler {
  pub fn new(spawner: LocalSpawner) -> Self { LocalScheduler { spawner } }
}

impl SleepProvider for LocalScheduler {
  type SleepFuture = LocalBoxFuture<'static, ()>;

  fn sleep(&self, duration: Duration) -> Self::SleepFuture {
    futures_time::task::sleep(duration.into()).map(|_| ()).boxed_local()
  }
}

impl Scheduler for LocalScheduler {
  fn spawn_local_obj(&self, task: LocalBoxFuture<'static, ()>) -> Result<(), RxError> {
    self.spawner.spawn_local_obj(task.into())?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use std::{cell::RefCell, rc::Rc};

  use futures::executor::LocalPool;

  use super::*;

  #[rxflow_macro::test]
  fn sleeps_on_real_time() {
    let mut pool = LocalPool::new();
    let scheduler = LocalScheduler::new(pool.spawner());
    let log = Rc::new(RefCell::new(vec![]));
    let (l, s) = (log.clone(), scheduler.clone());
    scheduler
      .spawn(async move {
        s.sleep(Duration::from_millis(5)).await;
        l.borrow_mut().push("woke");
      })
      .unwrap();
    pool.run();
    assert_eq!(*log.borrow(), vec!["woke"]);
  }
}
