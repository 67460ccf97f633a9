use crate::{
  error::RxError,
  observable::{create_async::create_async, Observable},
  scheduler::{Duration, Scheduler, SleepProvider},
  subscriber::Subscriber,
};

/// Creates an observable which will fire at `period` intervals, emitting an
/// increasing counter starting at zero.
///
/// Each tick waits for the acknowledgment of the previous value, so a slow
/// consumer stretches the interval instead of building a backlog. The
/// stream never completes on its own.
pub fn interval<SD, Err>(period: Duration, scheduler: SD) -> impl Observable<Item = usize, Err = Err> + Clone
where
  SD: Scheduler,
  Err: From<RxError> + 'static,
{
  let timer = scheduler.clone();
  create_async(scheduler, move |subscriber: Subscriber<usize, Err>| {
    let timer = timer.clone();
    async move {
      let mut tick = 0;
      while !subscriber.is_closed() {
        timer.sleep(period).await;
        subscriber.next(tick).await?;
        tick += 1;
      }
      Ok::<(), Err>(())
    }
  })
}
