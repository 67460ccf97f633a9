//! Observables and the chaining surface over them.
//!
//! An [`Observable`] is a value describing a stream. Subscribing consumes
//! it and starts one independent execution; to subscribe again, clone it
//! first (producers are held behind `Rc`, so clones are cheap).

use crate::{
  observer::{BoxedObserver, FnObserver, IntoAck, Observer},
  ops::{
    cumulate::CumulateOp,
    delay::DelayOp,
    distinct::DistinctOp,
    filter::FilterOp,
    map::MapOp,
    merge::Merge,
    switch_map::SwitchMapOp,
  },
  scheduler::{Duration, Scheduler},
  subscriber::Subscriber,
  subscription::Subscription,
};

mod create;
mod create_async;
mod from_iter;
mod interval;
mod trivial;

pub use create::{create, try_create, Create, TryCreate};
pub use create_async::{create_async, CreateAsync};
pub use from_iter::{from_iter, of};
pub use interval::interval;
pub use trivial::{empty, never, throw_err};

/// A representation of any set of values over any amount of time. This is
/// the most basic building block of rxflow.
pub trait Observable: Sized {
  type Item;
  type Err;

  /// Start an execution that delivers to `observer`. Prefer
  /// [`ObservableExt::subscribe`], which also guards the observer.
  fn actual_subscribe<O>(self, observer: O) -> Subscription
  where
    O: Observer<Self::Item, Self::Err> + 'static;
}

/// Operators and subscribe helpers, available on every [`Observable`].
pub trait ObservableExt: Observable {
  /// Invokes an execution of an Observable and registers an Observer for the
  /// notifications it will emit.
  ///
  /// The observer is wrapped in a [`Subscriber`]: it sees nothing after a
  /// terminal signal or after the returned subscription is unsubscribed.
  fn subscribe<O>(self, observer: O) -> Subscription
  where
    O: Observer<Self::Item, Self::Err> + 'static,
    Self::Item: 'static,
    Self::Err: 'static,
  {
    let subscription = Subscription::default();
    let subscriber = Subscriber::new(observer, subscription.clone());
    subscription.add(self.actual_subscribe(subscriber));
    subscription
  }

  /// Subscribe with a `next` handler only. `next` may return `()`, a
  /// `Result<(), Err>`, or an [`Ack`](crate::observer::Ack).
  fn subscribe_next<N, R>(self, next: N) -> Subscription
  where
    N: FnMut(Self::Item) -> R + 'static,
    R: IntoAck<Self::Err>,
    Self::Item: 'static,
    Self::Err: 'static,
  {
    self.subscribe(FnObserver::new(next))
  }

  /// Subscribe with all three handlers.
  ///
  /// * `error`: A handler for a terminal event resulting from an error.
  /// * `complete`: A handler for a terminal event resulting from successful
  ///   completion.
  fn subscribe_all<N, R, E, C>(self, next: N, error: E, complete: C) -> Subscription
  where
    N: FnMut(Self::Item) -> R + 'static,
    R: IntoAck<Self::Err>,
    E: FnMut(Self::Err) + 'static,
    C: FnMut() + 'static,
    Self::Item: 'static,
    Self::Err: 'static,
  {
    self.subscribe(
      FnObserver::new(next)
        .on_error(error)
        .on_complete(complete),
    )
  }

  /// Transform every value with `f`.
  #[inline]
  fn map<F, Out>(self, f: F) -> MapOp<Self, F>
  where
    F: FnMut(Self::Item) -> Out,
  {
    MapOp { source: self, func: f }
  }

  /// Forward only the values matching `predicate`; rejected values are
  /// acknowledged immediately.
  #[inline]
  fn filter<F>(self, predicate: F) -> FilterOp<Self, F>
  where
    F: FnMut(&Self::Item) -> bool,
  {
    FilterOp { source: self, predicate }
  }

  /// Suppress consecutive duplicates, comparing with `PartialEq`.
  #[inline]
  fn distinct(self) -> DistinctOp<Self, fn(&Self::Item, &Self::Item) -> bool>
  where
    Self::Item: PartialEq + Clone,
  {
    DistinctOp { source: self, differs: <Self::Item as PartialEq>::ne }
  }

  /// Suppress values for which `differs(previous, candidate)` is false. The
  /// first value is always forwarded, and the previous value is updated to
  /// every candidate, forwarded or not.
  #[inline]
  fn distinct_by<C>(self, differs: C) -> DistinctOp<Self, C>
  where
    C: FnMut(&Self::Item, &Self::Item) -> bool,
    Self::Item: Clone,
  {
    DistinctOp { source: self, differs }
  }

  /// Forward every value `delay` after it arrived. Completion follows the
  /// last value; errors are forwarded at once.
  #[inline]
  fn delay<SD: Scheduler>(self, delay: Duration, scheduler: SD) -> DelayOp<Self, SD> {
    DelayOp { source: self, delay, scheduler }
  }

  /// Emit every value so far, as a fresh `Vec`, on each new value.
  #[inline]
  fn cumulate(self) -> CumulateOp<Self>
  where
    Self::Item: Clone,
  {
    CumulateOp { source: self }
  }

  /// Interleave the values of `self` and `other`.
  fn merge<S>(self, other: S) -> Merge<BoxedObservable<Self::Item, Self::Err>>
  where
    S: Observable<Item = Self::Item, Err = Self::Err> + 'static,
    Self: 'static,
    Self::Item: 'static,
    Self::Err: 'static,
  {
    Merge { sources: vec![self.box_it(), other.box_it()] }
  }

  /// Map every value to an inner observable and mirror only the most recent
  /// one. By default the result completes when `self` completes; see
  /// [`SwitchMapOp::complete_after_inner`].
  #[inline]
  fn switch_map<F, Inner>(self, f: F) -> SwitchMapOp<Self, F>
  where
    F: FnMut(Self::Item) -> Inner,
    Inner: Observable<Err = Self::Err>,
  {
    SwitchMapOp::new(self, f)
  }

  /// [`switch_map`](ObservableExt::switch_map) over a source whose values
  /// already are observables.
  #[inline]
  fn switch_all(self) -> SwitchMapOp<Self, fn(Self::Item) -> Self::Item>
  where
    Self::Item: Observable<Err = Self::Err>,
  {
    SwitchMapOp::new(self, identity::<Self::Item> as fn(Self::Item) -> Self::Item)
  }

  /// Erase the concrete type.
  #[inline]
  fn box_it(self) -> BoxedObservable<Self::Item, Self::Err>
  where
    Self: 'static,
    Self::Item: 'static,
    Self::Err: 'static,
  {
    BoxedObservable(Box::new(self))
  }
}

impl<T: Observable> ObservableExt for T {}

fn identity<T>(v: T) -> T { v }

// ============================================================================
// BoxedObservable
// ============================================================================

/// Object-safe mirror of [`Observable`].
pub trait DynObservable<Item, Err> {
  fn box_subscribe(self: Box<Self>, observer: BoxedObserver<Item, Err>) -> Subscription;
}

impl<T> DynObservable<T::Item, T::Err> for T
where
  T: Observable,
  T::Item: 'static,
  T::Err: 'static,
{
  fn box_subscribe(self: Box<Self>, observer: BoxedObserver<T::Item, T::Err>) -> Subscription {
    (*self).actual_subscribe(observer)
  }
}

pub struct BoxedObservable<Item, Err>(Box<dyn DynObservable<Item, Err>>);

impl<Item: 'static, Err: 'static> Observable for BoxedObservable<Item, Err> {
  type Item = Item;
  type Err = Err;

  fn actual_subscribe<O>(self, observer: O) -> Subscription
  where
    O: Observer<Item, Err> + 'static,
  {
    self.0.box_subscribe(Box::new(observer))
  }
}
