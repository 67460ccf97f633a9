use std::{future::Future, marker::PhantomData, panic::AssertUnwindSafe, rc::Rc};

use futures::FutureExt;

use crate::{
  error::RxError,
  observable::Observable,
  observer::Observer,
  scheduler::Scheduler,
  subscriber::Subscriber,
  subscription::Subscription,
};

/// Observable driven by an asynchronous producer spawned on `scheduler`.
///
/// The producer's future runs as one task per subscription; unsubscribing
/// aborts it at its next suspension point. An `Err` return is delivered as
/// the stream's error, and so is a panic, converted to
/// [`RxError::ProducerPanicked`]. The producer is responsible for calling
/// `complete`.
///
/// ```rust
/// use rxflow::prelude::*;
/// use rxflow::scheduler::TestScheduler;
///
/// let scheduler = TestScheduler::new();
/// create_async(scheduler.clone(), |subscriber: Subscriber<i32, RxError>| async move {
///   subscriber.next(1).await?;
///   subscriber.next(2).await?;
///   subscriber.complete();
///   Ok(())
/// })
/// .subscribe_next(|v| println!("{v}"));
/// scheduler.run_until_stalled();
/// ```
pub fn create_async<SD, F, Fut, Item, Err>(scheduler: SD, producer: F) -> CreateAsync<SD, F, Item, Err>
where
  SD: Scheduler,
  F: Fn(Subscriber<Item, Err>) -> Fut,
  Fut: Future<Output = Result<(), Err>> + 'static,
{
  CreateAsync { scheduler, producer: Rc::new(producer), _marker: PhantomData }
}

pub struct CreateAsync<SD, F, Item, Err> {
  scheduler: SD,
  producer: Rc<F>,
  _marker: PhantomData<fn() -> (Item, Err)>,
}

impl<SD: Clone, F, Item, Err> Clone for CreateAsync<SD, F, Item, Err> {
  fn clone(&self) -> Self {
    CreateAsync {
      scheduler: self.scheduler.clone(),
      producer: self.producer.clone(),
      _marker: PhantomData,
    }
  }
}

impl<SD, F, Fut, Item, Err> Observable for CreateAsync<SD, F, Item, Err>
where
  SD: Scheduler,
  F: Fn(Subscriber<Item, Err>) -> Fut,
  Fut: Future<Output = Result<(), Err>> + 'static,
  Item: 'static,
  Err: From<RxError> + 'static,
{
  type Item = Item;
  type Err = Err;

  fn actual_subscribe<O>(self, observer: O) -> Subscription
  where
    O: Observer<Item, Err> + 'static,
  {
    let subscription = Subscription::default();
    let subscriber = Subscriber::new(observer, subscription.clone());
    let producing = (self.producer)(subscriber.clone());
    let task_subscriber = subscriber.clone();
    let task = async move {
      match AssertUnwindSafe(producing).catch_unwind().await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => task_subscriber.error(err),
        Err(payload) => {
          let err = RxError::from_panic(payload);
          tracing::error!(error = %err, "async producer panicked");
          task_subscriber.error(err.into());
        }
      }
    };
    match self.scheduler.spawn(task) {
      Ok(handle) => subscription.add(handle),
      Err(err) => {
        tracing::warn!(error = %err, "could not spawn async producer");
        subscriber.error(err.into());
      }
    }
    subscription
  }
}
