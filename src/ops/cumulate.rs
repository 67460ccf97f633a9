use crate::{
  observable::Observable,
  observer::{Ack, Observer},
  subscription::Subscription,
};

/// Emits, on every value, everything seen so far as a fresh `Vec`.
///
/// Each emission is its own allocation; nothing handed downstream is ever
/// mutated afterwards.
#[derive(Clone)]
pub struct CumulateOp<S> {
  pub(crate) source: S,
}

impl<S> Observable for CumulateOp<S>
where
  S: Observable,
  S::Item: Clone + 'static,
{
  type Item = Vec<S::Item>;
  type Err = S::Err;

  fn actual_subscribe<O>(self, observer: O) -> Subscription
  where
    O: Observer<Vec<S::Item>, S::Err> + 'static,
  {
    self
      .source
      .actual_subscribe(CumulateObserver { observer, acc: Vec::new() })
  }
}

pub struct CumulateObserver<O, Item> {
  observer: O,
  acc: Vec<Item>,
}

impl<O, Item, Err> Observer<Item, Err> for CumulateObserver<O, Item>
where
  O: Observer<Vec<Item>, Err>,
  Item: Clone,
{
  fn next(&mut self, value: Item) -> Ack<Err> {
    self.acc.push(value);
    self.observer.next(self.acc.clone())
  }

  #[inline]
  fn error(self, err: Err) { self.observer.error(err) }

  #[inline]
  fn complete(self) { self.observer.complete() }

  #[inline]
  fn is_closed(&self) -> bool { self.observer.is_closed() }
}
