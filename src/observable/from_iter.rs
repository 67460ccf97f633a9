use crate::{
  error::RxError,
  observable::{create_async::create_async, Observable},
  scheduler::Scheduler,
  subscriber::Subscriber,
};

/// Creates an observable that produces values from an iterator.
///
/// Every value waits for the acknowledgment of the previous one, and the
/// stream completes after the last value. Iteration stops early once the
/// subscriber is closed.
///
/// # Examples
///
/// ```
/// use rxflow::prelude::*;
/// use rxflow::scheduler::TestScheduler;
///
/// let scheduler = TestScheduler::new();
/// from_iter::<_, _, RxError>(vec![0, 1, 2, 3], scheduler.clone())
///   .subscribe_next(|v| println!("{v},"));
/// scheduler.run_until_stalled();
///
/// // print log:
/// // 0
/// // 1
/// // 2
/// // 3
/// ```
pub fn from_iter<I, SD, Err>(iter: I, scheduler: SD) -> impl Observable<Item = I::Item, Err = Err> + Clone
where
  I: IntoIterator + Clone + 'static,
  I::Item: 'static,
  SD: Scheduler,
  Err: From<RxError> + 'static,
{
  create_async(scheduler, move |subscriber: Subscriber<I::Item, Err>| {
    let iter = iter.clone();
    async move {
      for value in iter {
        if subscriber.is_closed() {
          break;
        }
        subscriber.next(value).await?;
      }
      subscriber.complete();
      Ok::<(), Err>(())
    }
  })
}

/// Creates an observable producing a single value, then completing.
pub fn of<Item, SD, Err>(value: Item, scheduler: SD) -> impl Observable<Item = Item, Err = Err> + Clone
where
  Item: Clone + 'static,
  SD: Scheduler,
  Err: From<RxError> + 'static,
{
  from_iter(std::iter::once(value), scheduler)
}
