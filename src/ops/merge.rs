use std::{cell::Cell, rc::Rc};

use crate::{
  observable::Observable,
  observer::{Ack, Observer},
  queue::Queue,
  subscription::Subscription,
};

/// Interleave the values of every source, in arrival order.
///
/// All sources are subscribed at subscribe time. The result completes once
/// every source completed and errors with the first error, unsubscribing the
/// sources still running. Values reach the destination one at a time
/// through a [`Queue`]. Merging no source completes immediately.
///
/// ```rust
/// use rxflow::prelude::*;
/// use rxflow::scheduler::TestScheduler;
///
/// let scheduler = TestScheduler::new();
/// let evens = from_iter::<_, _, RxError>(vec![0, 2], scheduler.clone());
/// let odds = from_iter(vec![1, 3], scheduler.clone());
/// merge([evens, odds]).subscribe_next(|v| println!("{v}"));
/// scheduler.run_until_stalled();
/// ```
pub fn merge<I>(sources: I) -> Merge<I::Item>
where
  I: IntoIterator,
  I::Item: Observable,
{
  Merge { sources: sources.into_iter().collect() }
}

#[derive(Clone)]
pub struct Merge<S> {
  pub(crate) sources: Vec<S>,
}

impl<S> Observable for Merge<S>
where
  S: Observable,
  S::Item: 'static,
  S::Err: 'static,
{
  type Item = S::Item;
  type Err = S::Err;

  fn actual_subscribe<O>(self, observer: O) -> Subscription
  where
    O: Observer<S::Item, S::Err> + 'static,
  {
    let subscription = Subscription::default();
    let downstream = Queue::new(observer);
    if self.sources.is_empty() {
      Observer::<S::Item, S::Err>::complete(downstream);
      subscription.unsubscribe();
      return subscription;
    }

    let remaining = Rc::new(Cell::new(self.sources.len()));
    for source in self.sources {
      if subscription.is_closed() {
        break;
      }
      let observer = MergeObserver {
        downstream: downstream.clone(),
        remaining: remaining.clone(),
        subscription: subscription.clone(),
      };
      subscription.add(source.actual_subscribe(observer));
    }
    subscription
  }
}

pub struct MergeObserver<O> {
  downstream: Queue<O>,
  remaining: Rc<Cell<usize>>,
  subscription: Subscription,
}

impl<O, Item, Err> Observer<Item, Err> for MergeObserver<O>
where
  O: Observer<Item, Err> + 'static,
  Item: 'static,
  Err: 'static,
{
  #[inline]
  fn next(&mut self, value: Item) -> Ack<Err> { self.downstream.next(value) }

  fn error(self, err: Err) {
    if self.subscription.is_closed() {
      return;
    }
    Observer::<Item, Err>::error(self.downstream, err);
    self.subscription.unsubscribe();
  }

  fn complete(self) {
    let remaining = self.remaining.get().saturating_sub(1);
    self.remaining.set(remaining);
    tracing::trace!(remaining, "merged source completed");
    if remaining == 0 && !self.subscription.is_closed() {
      Observer::<Item, Err>::complete(self.downstream);
      self.subscription.unsubscribe();
    }
  }

  fn is_closed(&self) -> bool {
    self.subscription.is_closed() || Observer::<Item, Err>::is_closed(&self.downstream)
  }
}

#[cfg(test)]
mod tests {
  use std::{cell::RefCell, rc::Rc};

  use futures::channel::oneshot;

  use crate::{observable::BoxedObservable, observer::FnObserver, prelude::*};

  type Slot = Rc<RefCell<Option<Subscriber<i32, String>>>>;

  /// A source whose subscriber is handed to the test.
  fn manual() -> (impl Observable<Item = i32, Err = String> + Clone, Slot) {
    let slot = Slot::default();
    let s = slot.clone();
    let source = create(move |subscriber: Subscriber<i32, String>| {
      *s.borrow_mut() = Some(subscriber);
    });
    (source, slot)
  }

  fn subscriber(slot: &Slot) -> Subscriber<i32, String> {
    slot.borrow().clone().expect("source not subscribed")
  }

  fn logged<S>(source: S) -> (Rc<RefCell<Vec<String>>>, Subscription)
  where
    S: Observable<Item = i32, Err = String>,
  {
    let log = Rc::new(RefCell::new(vec![]));
    let (n, e, c) = (log.clone(), log.clone(), log.clone());
    let subscription = source.subscribe_all(
      move |v| n.borrow_mut().push(format!("next {v}")),
      move |err| e.borrow_mut().push(format!("error {err}")),
      move || c.borrow_mut().push("complete".to_string()),
    );
    (log, subscription)
  }

  #[rxflow_macro::test]
  fn completes_after_every_source() {
    let (a, slot_a) = manual();
    let (b, slot_b) = manual();
    let (log, subscription) = logged(merge([a, b]));
    let (a, b) = (subscriber(&slot_a), subscriber(&slot_b));

    let _ = a.next(1);
    let _ = b.next(2);
    a.complete();
    assert!(!subscription.is_closed());
    let _ = b.next(3);
    b.complete();

    assert_eq!(*log.borrow(), vec!["next 1", "next 2", "next 3", "complete"]);
    assert!(subscription.is_closed());
  }

  #[rxflow_macro::test]
  fn first_error_unsubscribes_the_rest() {
    let (a, slot_a) = manual();
    let (b, slot_b) = manual();
    let (log, subscription) = logged(a.merge(b));
    let (a, b) = (subscriber(&slot_a), subscriber(&slot_b));

    a.error("a failed".into());
    assert!(b.is_closed());
    b.clone().error("b failed".into());
    let _ = b.next(1);

    assert_eq!(*log.borrow(), vec!["error a failed"]);
    assert!(subscription.is_closed());
  }

  #[rxflow_macro::test]
  fn unsubscribe_reaches_every_source() {
    let (a, slot_a) = manual();
    let (b, slot_b) = manual();
    let (log, subscription) = logged(merge([a, b]));

    subscription.unsubscribe();
    assert!(subscriber(&slot_a).is_closed());
    assert!(subscriber(&slot_b).is_closed());
    let _ = subscriber(&slot_a).next(1);
    assert!(log.borrow().is_empty());
  }

  #[rxflow_macro::test]
  fn no_source_completes_at_once() {
    let (log, subscription) = logged(merge(Vec::<BoxedObservable<i32, String>>::new()));
    assert_eq!(*log.borrow(), vec!["complete"]);
    assert!(subscription.is_closed());
  }

  #[rxflow_macro::test]
  async fn values_wait_for_the_previous_acknowledgment() {
    let (a, slot_a) = manual();
    let (b, slot_b) = manual();
    let seen = Rc::new(RefCell::new(vec![]));
    let (tx, rx) = oneshot::channel::<()>();
    let gate = RefCell::new(Some(rx));
    let s = seen.clone();
    merge([a, b]).subscribe(FnObserver::new(move |v: i32| {
      s.borrow_mut().push(v);
      let rx = gate.borrow_mut().take();
      Ack::<String>::new(async move {
        if let Some(rx) = rx {
          let _ = rx.await;
        }
        Ok(())
      })
    }));

    let first = subscriber(&slot_a).next(1);
    let second = subscriber(&slot_b).next(2);
    assert_eq!(*seen.borrow(), vec![1]);

    let _ = tx.send(());
    first.await.unwrap();
    second.await.unwrap();
    assert_eq!(*seen.borrow(), vec![1, 2]);
  }
}
