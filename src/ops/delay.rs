use futures::{
  future::{join_all, LocalBoxFuture, Shared},
  FutureExt,
};

use crate::{
  error::RxError,
  observable::Observable,
  observer::{Ack, Observer},
  queue::Queue,
  rc::{MutRc, RcDerefMut},
  scheduler::{Duration, Scheduler, SleepProvider},
  subscription::Subscription,
};

/// Forwards every value once its own timer elapsed.
///
/// The timer of a value starts when it arrives, and its acknowledgment
/// resolves only after the destination acknowledged it. Deliveries go
/// through a [`Queue`], so they reach the destination in arrival order.
/// Completion is forwarded `delay` after it arrived and after every pending
/// delivery; errors are forwarded at once.
#[derive(Debug, Clone)]
pub struct DelayOp<S, SD> {
  pub(crate) source: S,
  pub(crate) delay: Duration,
  pub(crate) scheduler: SD,
}

type Delivery = Shared<LocalBoxFuture<'static, ()>>;

impl<S, SD> Observable for DelayOp<S, SD>
where
  S: Observable,
  S::Item: 'static,
  S::Err: From<RxError> + 'static,
  SD: Scheduler,
{
  type Item = S::Item;
  type Err = S::Err;

  fn actual_subscribe<O>(self, observer: O) -> Subscription
  where
    O: Observer<S::Item, S::Err> + 'static,
  {
    let Self { source, delay, scheduler } = self;
    let subscription = Subscription::default();
    let observer = DelayObserver {
      queue: Queue::new(observer),
      delay,
      scheduler,
      in_flight: MutRc::own(Vec::new()),
      subscription: subscription.clone(),
    };
    subscription.add(source.actual_subscribe(observer));
    subscription
  }
}

pub struct DelayObserver<O, SD> {
  queue: Queue<O>,
  delay: Duration,
  scheduler: SD,
  in_flight: MutRc<Vec<Delivery>>,
  subscription: Subscription,
}

impl<O, SD, Item, Err> Observer<Item, Err> for DelayObserver<O, SD>
where
  O: Observer<Item, Err> + 'static,
  SD: Scheduler,
  Item: 'static,
  Err: From<RxError> + 'static,
{
  fn next(&mut self, value: Item) -> Ack<Err> {
    if Observer::<Item, Err>::is_closed(self) {
      return Ack::ready();
    }

    let sleep = self.scheduler.sleep(self.delay);
    let mut queue = self.queue.clone();
    let subscription = self.subscription.clone();
    let delivery = async move {
      sleep.await;
      if !subscription.is_closed() {
        let _ = queue.next(value).await;
      }
    }
    .boxed_local()
    .shared();

    {
      let mut in_flight = self.in_flight.rc_deref_mut();
      in_flight.retain(|d| d.peek().is_none());
      in_flight.push(delivery.clone());
    }

    match self.scheduler.spawn(delivery.clone()) {
      Ok(handle) => self.subscription.add(handle),
      Err(err) => {
        tracing::warn!(error = %err, "delayed delivery not spawned; it runs when acknowledged")
      }
    }
    Ack::new(delivery.map(Ok))
  }

  fn error(self, err: Err) {
    Observer::<Item, Err>::error(self.queue, err);
    self.subscription.unsubscribe();
  }

  fn complete(self) {
    let DelayObserver { queue, delay, scheduler, in_flight, subscription } = self;
    let sleep = scheduler.sleep(delay);
    let finishing = queue.clone();
    let task = async move {
      sleep.await;
      let pending: Vec<Delivery> = in_flight.rc_deref_mut().drain(..).collect();
      join_all(pending).await;
      finishing.flushed().await;
      Observer::<Item, Err>::complete(finishing);
    };
    match scheduler.spawn(task) {
      Ok(handle) => subscription.add(handle),
      Err(err) => {
        tracing::warn!(error = %err, "delayed completion not spawned");
        Observer::<Item, Err>::error(queue, err.into());
      }
    }
  }

  fn is_closed(&self) -> bool {
    self.subscription.is_closed() || Observer::<Item, Err>::is_closed(&self.queue)
  }
}

#[cfg(test)]
mod tests {
  use std::{cell::RefCell, rc::Rc};

  use crate::{
    prelude::*,
    scheduler::{Duration, TestScheduler},
  };

  type Log = Rc<RefCell<Vec<(String, Duration)>>>;

  fn record<S>(source: S, scheduler: &TestScheduler) -> (Log, Subscription)
  where
    S: Observable<Item = i32, Err = RxError>,
  {
    let log = Log::default();
    let (n, e, c) = (log.clone(), log.clone(), log.clone());
    let (sn, se, sc) = (scheduler.clone(), scheduler.clone(), scheduler.clone());
    let subscription = source.subscribe_all(
      move |v| n.borrow_mut().push((format!("next {v}"), sn.now())),
      move |err| e.borrow_mut().push((format!("error {err}"), se.now())),
      move || c.borrow_mut().push(("complete".to_string(), sc.now())),
    );
    (log, subscription)
  }

  fn ms(v: u64) -> Duration { Duration::from_millis(v) }

  #[rxflow_macro::test]
  fn burst_is_shifted_in_time() {
    let scheduler = TestScheduler::new();
    let source = create(|subscriber: Subscriber<i32, RxError>| {
      let _ = subscriber.next(1);
      let _ = subscriber.next(2);
      let _ = subscriber.next(3);
      subscriber.complete();
    })
    .delay(ms(100), scheduler.clone());
    let (log, _subscription) = record(source, &scheduler);

    scheduler.advance_by(ms(99));
    assert!(log.borrow().is_empty());
    scheduler.advance_by(ms(1));
    assert_eq!(
      *log.borrow(),
      vec![
        ("next 1".to_string(), ms(100)),
        ("next 2".to_string(), ms(100)),
        ("next 3".to_string(), ms(100)),
        ("complete".to_string(), ms(100)),
      ]
    );
  }

  #[rxflow_macro::test]
  fn acknowledged_producer_is_paced_by_the_delay() {
    let scheduler = TestScheduler::new();
    let source = from_iter(vec![1, 2], scheduler.clone()).delay(ms(50), scheduler.clone());
    let (log, _subscription) = record(source, &scheduler);

    scheduler.flush();
    assert_eq!(
      *log.borrow(),
      vec![
        ("next 1".to_string(), ms(50)),
        ("next 2".to_string(), ms(100)),
        ("complete".to_string(), ms(150)),
      ]
    );
  }

  #[rxflow_macro::test]
  fn errors_are_not_delayed() {
    let scheduler = TestScheduler::new();
    let source = create(|subscriber: Subscriber<i32, RxError>| {
      let _ = subscriber.next(1);
      subscriber.error(RxError::Spawn("gone".into()));
    })
    .delay(ms(100), scheduler.clone());
    let (log, subscription) = record(source, &scheduler);

    assert_eq!(
      *log.borrow(),
      vec![("error failed to spawn task: gone".to_string(), ms(0))]
    );
    assert!(subscription.is_closed());
    scheduler.flush();
    assert_eq!(log.borrow().len(), 1);
  }

  #[rxflow_macro::test]
  fn unsubscribe_cancels_pending_values() {
    let scheduler = TestScheduler::new();
    let source = create(|subscriber: Subscriber<i32, RxError>| {
      let _ = subscriber.next(1);
    })
    .delay(ms(100), scheduler.clone());
    let (log, subscription) = record(source, &scheduler);

    scheduler.advance_by(ms(50));
    subscription.unsubscribe();
    scheduler.flush();
    assert!(log.borrow().is_empty());
  }
}
