use crate::{
  observable::Observable,
  observer::{Ack, Observer},
  subscription::Subscription,
};

#[derive(Clone)]
pub struct FilterOp<S, F> {
  pub(crate) source: S,
  pub(crate) predicate: F,
}

impl<S, F> Observable for FilterOp<S, F>
where
  S: Observable,
  F: FnMut(&S::Item) -> bool + 'static,
{
  type Item = S::Item;
  type Err = S::Err;

  fn actual_subscribe<O>(self, observer: O) -> Subscription
  where
    O: Observer<S::Item, S::Err> + 'static,
  {
    self
      .source
      .actual_subscribe(FilterObserver { observer, predicate: self.predicate })
  }
}

pub struct FilterObserver<O, F> {
  observer: O,
  predicate: F,
}

impl<O, F, Item, Err> Observer<Item, Err> for FilterObserver<O, F>
where
  O: Observer<Item, Err>,
  F: FnMut(&Item) -> bool,
{
  fn next(&mut self, value: Item) -> Ack<Err> {
    if (self.predicate)(&value) {
      self.observer.next(value)
    } else {
      Ack::ready()
    }
  }

  #[inline]
  fn error(self, err: Err) { self.observer.error(err) }

  #[inline]
  fn complete(self) { self.observer.complete() }

  #[inline]
  fn is_closed(&self) -> bool { self.observer.is_closed() }
}

#[cfg(test)]
mod tests {
  use std::{cell::RefCell, rc::Rc};

  use crate::prelude::*;

  #[rxflow_macro::test]
  fn keeps_matching_values() {
    let log = Rc::new(RefCell::new(vec![]));
    let (n, c) = (log.clone(), log.clone());
    create(|subscriber: Subscriber<i32, ()>| {
      for v in 0..6 {
        assert!(subscriber.next(v).is_ready());
      }
      subscriber.complete();
    })
    .filter(|v| v % 2 == 0)
    .subscribe_all(
      move |v| n.borrow_mut().push(format!("next {v}")),
      |_| {},
      move || c.borrow_mut().push("complete".to_string()),
    );
    assert_eq!(*log.borrow(), vec!["next 0", "next 2", "next 4", "complete"]);
  }
}
