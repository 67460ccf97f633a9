use crate::{
  observable::Observable,
  observer::{Ack, Observer},
  subscription::Subscription,
};

/// Suppresses a value when it does not differ from the one before it.
///
/// `differs(previous, candidate)` decides; the first value always passes.
/// Only the previous value is retained, and it is replaced by every
/// candidate whether or not the candidate was forwarded.
#[derive(Clone)]
pub struct DistinctOp<S, C> {
  pub(crate) source: S,
  pub(crate) differs: C,
}

impl<S, C> Observable for DistinctOp<S, C>
where
  S: Observable,
  S::Item: Clone + 'static,
  C: FnMut(&S::Item, &S::Item) -> bool + 'static,
{
  type Item = S::Item;
  type Err = S::Err;

  fn actual_subscribe<O>(self, observer: O) -> Subscription
  where
    O: Observer<S::Item, S::Err> + 'static,
  {
    self.source.actual_subscribe(DistinctObserver {
      observer,
      differs: self.differs,
      previous: None,
    })
  }
}

pub struct DistinctObserver<O, C, Item> {
  observer: O,
  differs: C,
  previous: Option<Item>,
}

impl<O, C, Item, Err> Observer<Item, Err> for DistinctObserver<O, C, Item>
where
  O: Observer<Item, Err>,
  C: FnMut(&Item, &Item) -> bool,
  Item: Clone,
{
  fn next(&mut self, value: Item) -> Ack<Err> {
    let emit = match &self.previous {
      Some(previous) => (self.differs)(previous, &value),
      None => true,
    };
    self.previous = Some(value.clone());
    if emit { self.observer.next(value) } else { Ack::ready() }
  }

  #[inline]
  fn error(self, err: Err) { self.observer.error(err) }

  #[inline]
  fn complete(self) { self.observer.complete() }

  #[inline]
  fn is_closed(&self) -> bool { self.observer.is_closed() }
}
