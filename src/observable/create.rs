use std::{
  marker::PhantomData,
  panic::{catch_unwind, AssertUnwindSafe},
  rc::Rc,
};

use crate::{
  error::RxError,
  observable::Observable,
  observer::Observer,
  subscriber::Subscriber,
  subscription::{Subscription, SubscriptionLike},
};

/// Observable created from a producer function.
///
/// The producer runs once per subscription. It receives a [`Subscriber`] to
/// push values and terminal signals into, and returns a teardown that runs
/// when the subscription ends (`()` for none). A panic in the producer is
/// caught and delivered as [`RxError::ProducerPanicked`] through `error`.
///
/// ```rust
/// use rxflow::prelude::*;
///
/// create(|subscriber: Subscriber<i32, ()>| {
///   let _ = subscriber.next(1);
///   let _ = subscriber.next(2);
///   subscriber.complete();
/// })
/// .subscribe_next(|v| println!("{v}"));
/// ```
pub fn create<F, U, Item, Err>(producer: F) -> Create<F, Item, Err>
where
  F: Fn(Subscriber<Item, Err>) -> U,
  U: SubscriptionLike,
  Err: From<RxError>,
{
  Create { producer: Rc::new(producer), _marker: PhantomData }
}

/// Like [`create`], for producers that can fail before they set anything
/// up. An `Err` return is delivered as the stream's error.
pub fn try_create<F, U, Item, Err>(producer: F) -> TryCreate<F, Item, Err>
where
  F: Fn(Subscriber<Item, Err>) -> Result<U, Err>,
  U: SubscriptionLike,
  Err: From<RxError>,
{
  TryCreate { producer: Rc::new(producer), _marker: PhantomData }
}

pub struct Create<F, Item, Err> {
  producer: Rc<F>,
  _marker: PhantomData<fn() -> (Item, Err)>,
}

impl<F, Item, Err> Clone for Create<F, Item, Err> {
  fn clone(&self) -> Self { Create { producer: self.producer.clone(), _marker: PhantomData } }
}

impl<F, U, Item, Err> Observable for Create<F, Item, Err>
where
  F: Fn(Subscriber<Item, Err>) -> U,
  U: SubscriptionLike + 'static,
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
    match catch_unwind(AssertUnwindSafe(|| (self.producer)(subscriber.clone()))) {
      Ok(teardown) => subscription.add(teardown),
      Err(payload) => panicked(&subscriber, payload),
    }
    subscription
  }
}

pub struct TryCreate<F, Item, Err> {
  producer: Rc<F>,
  _marker: PhantomData<fn() -> (Item, Err)>,
}

impl<F, Item, Err> Clone for TryCreate<F, Item, Err> {
  fn clone(&self) -> Self { TryCreate { producer: self.producer.clone(), _marker: PhantomData } }
}

impl<F, U, Item, Err> Observable for TryCreate<F, Item, Err>
where
  F: Fn(Subscriber<Item, Err>) -> Result<U, Err>,
  U: SubscriptionLike + 'static,
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
    match catch_unwind(AssertUnwindSafe(|| (self.producer)(subscriber.clone()))) {
      Ok(Ok(teardown)) => subscription.add(teardown),
      Ok(Err(err)) => subscriber.error(err),
      Err(payload) => panicked(&subscriber, payload),
    }
    subscription
  }
}

fn panicked<Item, Err>(subscriber: &Subscriber<Item, Err>, payload: Box<dyn std::any::Any + Send>)
where
  Item: 'static,
  Err: From<RxError> + 'static,
{
  let err = RxError::from_panic(payload);
  tracing::error!(error = %err, "producer panicked");
  subscriber.error(err.into());
}

#[cfg(test)]
mod tests {
  use std::{cell::RefCell, rc::Rc};

  use crate::{prelude::*, subscription::ClosureSubscription};

  #[rxflow_macro::test]
  fn test_create_emits_values() {
    let result = Rc::new(RefCell::new(Vec::new()));
    let result_clone = result.clone();

    create(|subscriber: Subscriber<i32, ()>| {
      let _ = subscriber.next(1);
      let _ = subscriber.next(2);
      let _ = subscriber.next(3);
      subscriber.complete();
    })
    .subscribe_next(move |v| result_clone.borrow_mut().push(v));

    assert_eq!(*result.borrow(), vec![1, 2, 3]);
  }

  #[rxflow_macro::test]
  fn test_teardown_runs_after_complete() {
    let log = Rc::new(RefCell::new(vec![]));
    let (l, t) = (log.clone(), log.clone());
    create(move |subscriber: Subscriber<i32, ()>| {
      let t = t.clone();
      let _ = subscriber.next(1);
      subscriber.complete();
      ClosureSubscription::new(move || t.borrow_mut().push("teardown".to_string()))
    })
    .subscribe_all(
      move |v| l.borrow_mut().push(format!("next {v}")),
      |_| {},
      || {},
    );
    assert_eq!(*log.borrow(), vec!["next 1", "teardown"]);
  }

  #[rxflow_macro::test]
  fn test_producer_sees_closed_subscriber() {
    let observed = Rc::new(RefCell::new(vec![]));
    let o = observed.clone();
    create(move |subscriber: Subscriber<i32, ()>| {
      o.borrow_mut().push(subscriber.is_closed());
      subscriber.subscription().unsubscribe();
      o.borrow_mut().push(subscriber.is_closed());
    })
    .subscribe_next(|_| {});
    assert_eq!(*observed.borrow(), vec![false, true]);
  }

  #[rxflow_macro::test]
  fn test_try_create_failure_becomes_error() {
    let errors = Rc::new(RefCell::new(vec![]));
    let e = errors.clone();
    let subscription = try_create(|_: Subscriber<i32, String>| -> Result<(), String> {
      Err("no resource".to_string())
    })
    .subscribe_all(|_| {}, move |err| e.borrow_mut().push(err), || {});
    assert_eq!(*errors.borrow(), vec!["no resource".to_string()]);
    assert!(subscription.is_closed());
  }

  #[rxflow_macro::test]
  fn test_panicking_producer_becomes_error() {
    let log = Rc::new(RefCell::new(vec![]));
    let (n, e) = (log.clone(), log.clone());
    let subscription = create(|subscriber: Subscriber<i32, String>| -> () {
      let _ = subscriber.next(1);
      panic!("setup failed");
    })
    .subscribe_all(
      move |v| n.borrow_mut().push(format!("next {v}")),
      move |err| e.borrow_mut().push(format!("error {err}")),
      || {},
    );
    assert_eq!(*log.borrow(), vec!["next 1", "error producer panicked: setup failed"]);
    assert!(subscription.is_closed());
  }

  #[rxflow_macro::test]
  fn test_panicking_try_create_becomes_error() {
    let errors = Rc::new(RefCell::new(vec![]));
    let e = errors.clone();
    try_create(|_: Subscriber<i32, RxError>| -> Result<(), RxError> { panic!("no driver") })
      .subscribe_all(|_| {}, move |err| e.borrow_mut().push(err), || {});
    assert_eq!(*errors.borrow(), vec![RxError::ProducerPanicked("no driver".into())]);
  }
}
