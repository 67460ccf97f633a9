//! The producer-facing side of a subscription.

use futures::FutureExt;

use crate::{
  observer::{Ack, BoxedObserver, Observer, SharedObserver},
  queue::Queue,
  subscription::{ClosureSubscription, Subscription},
};

/// Implements the Observer trait on behalf of a subscription. While the
/// Observer is the public API for consuming the values of an Observable, all
/// Observers get converted to a Subscriber, in order to provide Subscription
/// capabilities.
///
/// A `Subscriber` is a cheap handle: clones reach the same observer and the
/// same subscription. It ignores `next` once closed, delivers at most one
/// terminal signal, and unsubscribes right after delivering it. If the
/// observer rejects a value (its acknowledgment resolves to `Err`), the
/// error is routed to that same observer and the subscription is torn down.
pub struct Subscriber<Item, Err> {
  observer: SharedObserver<BoxedObserver<Item, Err>>,
  subscription: Subscription,
}

impl<Item, Err> Clone for Subscriber<Item, Err> {
  fn clone(&self) -> Self {
    Subscriber { observer: self.observer.clone(), subscription: self.subscription.clone() }
  }
}

impl<Item: 'static, Err: 'static> Subscriber<Item, Err> {
  /// Wrap `observer`. Unsubscribing `subscription` drops the observer
  /// without notifying it.
  pub fn new<O>(observer: O, subscription: Subscription) -> Self
  where
    O: Observer<Item, Err> + 'static,
  {
    let observer = SharedObserver::new(Box::new(observer) as BoxedObserver<Item, Err>);
    let disposer = observer.clone();
    subscription.add(ClosureSubscription::new(move || disposer.dispose()));
    Subscriber { observer, subscription }
  }

  /// Deliver `value`; a no-op once closed.
  ///
  /// A `next` issued while the observer is still inside its own `next`
  /// (a synchronous feedback loop) is dropped with a warning and
  /// acknowledged at once. Route feedback through a
  /// [`channel`](crate::channel::channel) sink instead: its queue holds the
  /// value until the running delivery returns.
  pub fn next(&self, value: Item) -> Ack<Err> {
    if self.is_closed() {
      return Ack::ready();
    }
    let mut ack = self.observer.emit(value);
    match (&mut ack).now_or_never() {
      Some(Ok(())) => Ack::ready(),
      Some(Err(err)) => {
        self.fail(err);
        Ack::ready()
      }
      None => {
        let this = self.clone();
        Ack::new(async move {
          if let Err(err) = ack.await {
            this.fail(err);
          }
          Ok(())
        })
      }
    }
  }

  pub fn error(&self, err: Err) {
    if self.subscription.is_closed() {
      return;
    }
    Observer::<Item, Err>::error(self.observer.clone(), err);
    self.subscription.unsubscribe();
  }

  pub fn complete(&self) {
    if self.subscription.is_closed() {
      return;
    }
    Observer::<Item, Err>::complete(self.observer.clone());
    self.subscription.unsubscribe();
  }

  #[inline]
  pub fn is_closed(&self) -> bool {
    self.subscription.is_closed() || Observer::<Item, Err>::is_closed(&self.observer)
  }

  #[inline]
  pub fn subscription(&self) -> &Subscription { &self.subscription }

  /// A subscriber over the same subscription whose deliveries go through an
  /// ordering [`Queue`].
  pub fn queued(self) -> Self {
    let subscription = self.subscription.clone();
    Subscriber::new(Queue::new(self), subscription)
  }

  fn fail(&self, err: Err) {
    tracing::debug!("observer rejected a value; routing the failure to its error handler");
    self.error(err);
  }
}

impl<Item: 'static, Err: 'static> Observer<Item, Err> for Subscriber<Item, Err> {
  #[inline]
  fn next(&mut self, value: Item) -> Ack<Err> { Subscriber::next(self, value) }

  #[inline]
  fn error(self, err: Err) { Subscriber::error(&self, err) }

  #[inline]
  fn complete(self) { Subscriber::complete(&self) }

  #[inline]
  fn is_closed(&self) -> bool { Subscriber::is_closed(self) }
}
