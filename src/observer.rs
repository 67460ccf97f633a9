//! Observer trait and implementations
//!
//! The Observer trait defines the consumer of data in the reactive pattern.
//! It provides three methods: next (for values), error (for errors), and
//! complete (for stream completion). Every `next` hands back an [`Ack`], the
//! acknowledgment a well-behaved producer awaits before emitting again.

use std::{
  fmt::{Debug, Formatter},
  future::Future,
  pin::Pin,
  task::{Context, Poll},
};

use futures::future::LocalBoxFuture;

mod shared;
pub use shared::SharedObserver;

// ============================================================================
// Ack
// ============================================================================

/// Acknowledgment of a single `next` call.
///
/// Resolves to `Ok(())` once the consumer has fully processed the value
/// (including anything further downstream), or to `Err(err)` if the consumer
/// failed. Producers that respect backpressure `.await` it before emitting
/// the following value.
#[must_use = "a producer that drops acknowledgments ignores backpressure"]
pub struct Ack<Err>(AckState<Err>);

enum AckState<Err> {
  Done(Option<Result<(), Err>>),
  Pending(LocalBoxFuture<'static, Result<(), Err>>),
}

impl<Err> Ack<Err> {
  /// An acknowledgment that is already resolved.
  #[inline]
  pub fn ready() -> Self { Ack(AckState::Done(Some(Ok(())))) }

  /// An acknowledgment that is already rejected.
  #[inline]
  pub fn failed(err: Err) -> Self { Ack(AckState::Done(Some(Err(err)))) }

  #[inline]
  pub fn from_result(result: Result<(), Err>) -> Self { Ack(AckState::Done(Some(result))) }

  /// Wrap the remaining asynchronous work of a delivery.
  pub fn new<F>(future: F) -> Self
  where
    F: Future<Output = Result<(), Err>> + 'static,
  {
    Ack(AckState::Pending(Box::pin(future)))
  }

  /// Returns true if the acknowledgment resolved without any asynchronous
  /// work left.
  #[inline]
  pub fn is_ready(&self) -> bool { matches!(self.0, AckState::Done(_)) }
}

// `Ack` never pin-projects into its state: the pending future is already
// boxed and the resolved result is moved out by value.
impl<Err> Unpin for Ack<Err> {}

impl<Err> Future for Ack<Err> {
  type Output = Result<(), Err>;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    match &mut self.get_mut().0 {
      AckState::Done(result) => Poll::Ready(result.take().unwrap_or(Ok(()))),
      AckState::Pending(future) => future.as_mut().poll(cx),
    }
  }
}

impl<Err> Debug for Ack<Err> {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Ack")
      .field("ready", &self.is_ready())
      .finish()
  }
}

impl<Err> From<Result<(), Err>> for Ack<Err> {
  #[inline]
  fn from(result: Result<(), Err>) -> Self { Ack::from_result(result) }
}

/// Conversion of a `next` handler's return value into an acknowledgment.
///
/// Lets closure observers return `()`, a `Result<(), Err>`, or an explicit
/// [`Ack`] for asynchronous work.
pub trait IntoAck<Err> {
  fn into_ack(self) -> Ack<Err>;
}

impl<Err> IntoAck<Err> for () {
  #[inline]
  fn into_ack(self) -> Ack<Err> { Ack::ready() }
}

impl<Err> IntoAck<Err> for Result<(), Err> {
  #[inline]
  fn into_ack(self) -> Ack<Err> { Ack::from_result(self) }
}

impl<Err> IntoAck<Err> for Ack<Err> {
  #[inline]
  fn into_ack(self) -> Ack<Err> { self }
}

// ============================================================================
// Observer Trait
// ============================================================================

/// Observer trait: The consumer of data in reactive programming
///
/// An Observer receives values, errors, and completion notifications from
/// an Observable.
pub trait Observer<Item, Err> {
  /// Receive the next value from the observable.
  ///
  /// The returned [`Ack`] resolves once the value has been processed. A
  /// closed observer returns [`Ack::ready`] without doing anything.
  fn next(&mut self, value: Item) -> Ack<Err>;

  /// Handle an error from the observable
  ///
  /// This consumes the observer, as no more values can be emitted after an
  /// error
  fn error(self, err: Err);

  /// Handle completion of the observable
  ///
  /// This consumes the observer, as no more values can be emitted after
  /// completion
  fn complete(self);

  /// Checks if the observer is closed.
  ///
  /// Sources use this to stop producing early once nobody is listening.
  fn is_closed(&self) -> bool;
}

// ============================================================================
// DynObserver Trait - Object-safe Observer
// ============================================================================

/// Helper trait to enable object-safe Observers (Box<dyn Observer>)
///
/// Standard Observer trait is not object-safe because `error` and `complete`
/// take `self` by value. DynObserver mirrors the interface but adapts it for
/// vtables.
pub trait DynObserver<Item, Err> {
  fn box_next(&mut self, value: Item) -> Ack<Err>;
  fn box_error(self: Box<Self>, err: Err);
  fn box_complete(self: Box<Self>);
  fn box_is_closed(&self) -> bool;
}

impl<T, Item, Err> DynObserver<Item, Err> for T
where
  T: Observer<Item, Err>,
{
  fn box_next(&mut self, value: Item) -> Ack<Err> { self.next(value) }
  fn box_error(self: Box<Self>, err: Err) { self.error(err) }
  fn box_complete(self: Box<Self>) { self.complete() }
  fn box_is_closed(&self) -> bool { self.is_closed() }
}

/// Boxed observer, used wherever observers of different types must be stored
/// side by side.
pub type BoxedObserver<Item, Err> = Box<dyn DynObserver<Item, Err>>;

impl<Item, Err> Observer<Item, Err> for BoxedObserver<Item, Err> {
  #[inline]
  fn next(&mut self, value: Item) -> Ack<Err> { (**self).box_next(value) }

  #[inline]
  fn error(self, err: Err) { self.box_error(err) }

  #[inline]
  fn complete(self) { self.box_complete() }

  #[inline]
  fn is_closed(&self) -> bool { (**self).box_is_closed() }
}

// ============================================================================
// FnObserver - Closure adapter
// ============================================================================

/// Placeholder for a callback that was not provided.
#[derive(Clone, Copy, Debug, Default)]
pub struct Noop;

pub trait OnNext<Item, Err> {
  fn on_next(&mut self, value: Item) -> Ack<Err>;
}

impl<F, Item, Err, R> OnNext<Item, Err> for F
where
  F: FnMut(Item) -> R,
  R: IntoAck<Err>,
{
  #[inline]
  fn on_next(&mut self, value: Item) -> Ack<Err> { self(value).into_ack() }
}

impl<Item, Err> OnNext<Item, Err> for Noop {
  #[inline]
  fn on_next(&mut self, _: Item) -> Ack<Err> { Ack::ready() }
}

pub trait OnError<Err> {
  fn on_error(&mut self, err: Err);
}

impl<F, Err> OnError<Err> for F
where
  F: FnMut(Err),
{
  #[inline]
  fn on_error(&mut self, err: Err) { self(err) }
}

impl<Err> OnError<Err> for Noop {
  #[inline]
  fn on_error(&mut self, _: Err) {}
}

pub trait OnComplete {
  fn on_complete(&mut self);
}

impl<F> OnComplete for F
where
  F: FnMut(),
{
  #[inline]
  fn on_complete(&mut self) { self() }
}

impl OnComplete for Noop {
  #[inline]
  fn on_complete(&mut self) {}
}

/// An observer assembled from closures. Callbacks that are not supplied are
/// [`Noop`]s.
///
/// ```rust
/// use rxflow::prelude::*;
///
/// let observer = FnObserver::new(|v: i32| println!("{v}"))
///   .on_error(|e: String| eprintln!("{e}"))
///   .on_complete(|| println!("done"));
/// # let _ = observer;
/// ```
#[derive(Clone, Default)]
pub struct FnObserver<N = Noop, E = Noop, C = Noop> {
  next: N,
  error: E,
  complete: C,
}

impl<N> FnObserver<N> {
  pub fn new(next: N) -> Self { FnObserver { next, error: Noop, complete: Noop } }
}

impl<N, E, C> FnObserver<N, E, C> {
  pub fn on_next<N2>(self, next: N2) -> FnObserver<N2, E, C> {
    FnObserver { next, error: self.error, complete: self.complete }
  }

  pub fn on_error<E2>(self, error: E2) -> FnObserver<N, E2, C> {
    FnObserver { next: self.next, error, complete: self.complete }
  }

  pub fn on_complete<C2>(self, complete: C2) -> FnObserver<N, E, C2> {
    FnObserver { next: self.next, error: self.error, complete }
  }
}

impl<Item, Err, N, E, C> Observer<Item, Err> for FnObserver<N, E, C>
where
  N: OnNext<Item, Err>,
  E: OnError<Err>,
  C: OnComplete,
{
  #[inline]
  fn next(&mut self, value: Item) -> Ack<Err> { self.next.on_next(value) }

  #[inline]
  fn error(mut self, err: Err) { self.error.on_error(err) }

  #[inline]
  fn complete(mut self) { self.complete.on_complete() }

  #[inline]
  fn is_closed(&self) -> bool { false }
}

// ============================================================================
// Option observer
// ============================================================================

/// Option observer - None ignores all events, Some delegates to inner
impl<O, Item, Err> Observer<Item, Err> for Option<O>
where
  O: Observer<Item, Err>,
{
  fn next(&mut self, value: Item) -> Ack<Err> {
    match self {
      Some(inner) => inner.next(value),
      None => Ack::ready(),
    }
  }

  fn error(self, err: Err) {
    if let Some(inner) = self {
      inner.error(err);
    }
  }

  fn complete(self) {
    if let Some(inner) = self {
      inner.complete();
    }
  }

  fn is_closed(&self) -> bool { self.as_ref().is_none_or(Observer::is_closed) }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
  use std::{cell::RefCell, rc::Rc};

  use futures::FutureExt;

  use super::*;

  struct TestObserver {
    values: Vec<i32>,
  }

  impl Observer<i32, ()> for TestObserver {
    fn next(&mut self, value: i32) -> Ack<()> {
      self.values.push(value);
      Ack::ready()
    }

    fn error(self, _: ()) {}

    fn complete(self) {}

    fn is_closed(&self) -> bool { false }
  }

  #[rxflow_macro::test]
  fn test_observer_trait() {
    let mut obs = TestObserver { values: vec![] };
    assert!(obs.next(1).is_ready());
    assert!(obs.next(2).is_ready());
    assert_eq!(obs.values, vec![1, 2]);
    assert!(!obs.is_closed());
  }

  #[rxflow_macro::test]
  async fn ack_variants_resolve() {
    assert_eq!(Ack::<()>::ready().await, Ok(()));
    assert_eq!(Ack::failed("bad").await, Err("bad"));

    let ack = Ack::<()>::new(async { Ok(()) });
    assert!(!ack.is_ready());
    assert_eq!(ack.await, Ok(()));
  }

  #[rxflow_macro::test]
  fn pending_ack_is_lazy() {
    let ran = Rc::new(RefCell::new(false));
    let r = ran.clone();
    let ack = Ack::<()>::new(async move {
      *r.borrow_mut() = true;
      Ok(())
    });
    assert!(!*ran.borrow());
    assert_eq!(ack.now_or_never(), Some(Ok(())));
    assert!(*ran.borrow());
  }

  #[rxflow_macro::test]
  fn fn_observer_fills_missing_callbacks() {
    let seen = Rc::new(RefCell::new(vec![]));
    let s = seen.clone();
    let mut observer = FnObserver::new(move |v: i32| s.borrow_mut().push(v));
    assert!(Observer::<i32, ()>::next(&mut observer, 1).is_ready());
    Observer::<i32, ()>::error(observer.clone(), ());
    Observer::<i32, ()>::complete(observer);
    assert_eq!(*seen.borrow(), vec![1]);

    // Entirely partial observer: every callback is a no-op.
    let mut partial: FnObserver = FnObserver::default();
    assert!(Observer::<i32, String>::next(&mut partial, 1).is_ready());
    Observer::<i32, String>::error(partial, "ignored".into());
  }

  #[rxflow_macro::test]
  fn fn_observer_next_may_fail() {
    let mut observer = FnObserver::new(|v: i32| if v > 1 { Err("too big") } else { Ok(()) });
    assert_eq!(Observer::<i32, &str>::next(&mut observer, 1).now_or_never(), Some(Ok(())));
    assert_eq!(Observer::<i32, &str>::next(&mut observer, 2).now_or_never(), Some(Err("too big")));
  }

  #[rxflow_macro::test]
  fn boxed_observer_delegates() {
    let done = Rc::new(RefCell::new(false));
    let d = done.clone();
    let mut boxed: BoxedObserver<i32, ()> =
      Box::new(FnObserver::new(|_: i32| {}).on_complete(move || *d.borrow_mut() = true));
    assert!(!boxed.is_closed());
    assert!(boxed.next(1).is_ready());
    boxed.complete();
    assert!(*done.borrow());
  }

  #[rxflow_macro::test]
  fn none_observer_is_closed() {
    let mut none: Option<TestObserver> = None;
    assert!(none.is_closed());
    assert!(none.next(1).is_ready());
  }
}
