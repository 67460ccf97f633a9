use crate::{
  observable::Observable,
  observer::{Ack, Observer},
  subscription::Subscription,
};

/// Package an observable and an observer as one handle.
///
/// Nothing is buffered: subscribing subscribes `source`, and every signal
/// sent to the duplex goes straight to `sink`. Completing or erroring the
/// duplex also unsubscribes every subscription made through it.
pub fn duplex<S, O>(source: S, sink: O) -> Duplex<S, O> {
  Duplex { source, sink, links: Subscription::default() }
}

#[derive(Clone)]
pub struct Duplex<S, O> {
  source: S,
  sink: O,
  links: Subscription,
}

impl<S, O> Duplex<S, O> {
  #[inline]
  pub fn source(&self) -> &S { &self.source }

  #[inline]
  pub fn sink(&self) -> &O { &self.sink }

  #[inline]
  pub fn sink_mut(&mut self) -> &mut O { &mut self.sink }

  /// Returns true once the duplex's sink was completed or errored.
  #[inline]
  pub fn is_finished(&self) -> bool { self.links.is_closed() }
}

impl<S: Observable, O> Observable for Duplex<S, O> {
  type Item = S::Item;
  type Err = S::Err;

  fn actual_subscribe<Ob>(self, observer: Ob) -> Subscription
  where
    Ob: Observer<S::Item, S::Err> + 'static,
  {
    let subscription = self.source.actual_subscribe(observer);
    self.links.add(subscription.clone());
    subscription
  }
}

impl<S, O, Item, Err> Observer<Item, Err> for Duplex<S, O>
where
  O: Observer<Item, Err>,
{
  #[inline]
  fn next(&mut self, value: Item) -> Ack<Err> { self.sink.next(value) }

  fn error(self, err: Err) {
    self.sink.error(err);
    self.links.unsubscribe();
  }

  fn complete(self) {
    self.sink.complete();
    self.links.unsubscribe();
  }

  #[inline]
  fn is_closed(&self) -> bool { self.links.is_closed() || self.sink.is_closed() }
}
