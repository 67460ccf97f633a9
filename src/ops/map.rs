use crate::{
  observable::Observable,
  observer::{Ack, Observer},
  subscription::Subscription,
};

#[derive(Clone)]
pub struct MapOp<S, F> {
  pub(crate) source: S,
  pub(crate) func: F,
}

impl<S, F, Out> Observable for MapOp<S, F>
where
  S: Observable,
  F: FnMut(S::Item) -> Out + 'static,
{
  type Item = Out;
  type Err = S::Err;

  fn actual_subscribe<O>(self, observer: O) -> Subscription
  where
    O: Observer<Out, S::Err> + 'static,
  {
    self
      .source
      .actual_subscribe(MapObserver { observer, func: self.func })
  }
}

pub struct MapObserver<O, F> {
  observer: O,
  func: F,
}

impl<O, F, Item, Out, Err> Observer<Item, Err> for MapObserver<O, F>
where
  O: Observer<Out, Err>,
  F: FnMut(Item) -> Out,
{
  #[inline]
  fn next(&mut self, value: Item) -> Ack<Err> { self.observer.next((self.func)(value)) }

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

  fn source() -> impl Observable<Item = i32, Err = ()> + Clone {
    create(|subscriber: Subscriber<i32, ()>| {
      for v in 0..3 {
        let _ = subscriber.next(v);
      }
      subscriber.complete();
    })
  }

  #[rxflow_macro::test]
  fn primitive_type() {
    let seen = Rc::new(RefCell::new(vec![]));
    let s = seen.clone();
    source()
      .map(|v| v * 2)
      .subscribe_next(move |v| s.borrow_mut().push(v));
    assert_eq!(*seen.borrow(), vec![0, 2, 4]);
  }

  #[rxflow_macro::test]
  fn map_types_mixed() {
    let seen = Rc::new(RefCell::new(vec![]));
    let s = seen.clone();
    source()
      .map(|v| format!("#{v}"))
      .map(|label| label.len())
      .subscribe_next(move |v| s.borrow_mut().push(v));
    assert_eq!(*seen.borrow(), vec![2, 2, 2]);
  }

  #[rxflow_macro::test]
  fn stateful_mapper() {
    let seen = Rc::new(RefCell::new(vec![]));
    let s = seen.clone();
    let mut total = 0;
    source()
      .map(move |v| {
        total += v;
        total
      })
      .subscribe_next(move |v| s.borrow_mut().push(v));
    assert_eq!(*seen.borrow(), vec![0, 1, 3]);
  }
}
