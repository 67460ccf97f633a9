//! Subscription handles and teardown bookkeeping.
//!
//! A [`Subscription`] owns the teardown actions of one running execution of
//! an observable. Unsubscribing marks it closed first and only then runs the
//! teardowns, each exactly once.

use std::{
  any::Any,
  fmt::{Debug, Formatter},
};

use smallvec::SmallVec;

use crate::rc::{MutRc, RcDeref, RcDerefMut};

/// Anything that can be torn down.
pub trait SubscriptionLike {
  /// This allows deregistering a stream before it has finished receiving all
  /// events (i.e. before complete is called).
  fn unsubscribe(&mut self);

  fn is_closed(&self) -> bool;
}

impl Debug for Box<dyn SubscriptionLike> {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Box<dyn SubscriptionLike>")
      .field("is_closed", &self.is_closed())
      .finish()
  }
}

/// Producers without anything to release return `()`.
impl SubscriptionLike for () {
  #[inline]
  fn unsubscribe(&mut self) {}

  #[inline]
  fn is_closed(&self) -> bool { true }
}

impl<S: SubscriptionLike> SubscriptionLike for Option<S> {
  fn unsubscribe(&mut self) {
    if let Some(mut s) = self.take() {
      s.unsubscribe();
    }
  }

  fn is_closed(&self) -> bool { self.as_ref().is_none_or(SubscriptionLike::is_closed) }
}

impl<T: ?Sized> SubscriptionLike for Box<T>
where
  T: SubscriptionLike,
{
  #[inline]
  fn unsubscribe(&mut self) {
    let s = &mut **self;
    s.unsubscribe()
  }

  #[inline]
  fn is_closed(&self) -> bool {
    let s = &**self;
    s.is_closed()
  }
}

// ============================================================================
// ClosureSubscription
// ============================================================================

/// Runs a closure on the first unsubscribe.
pub struct ClosureSubscription<F: FnOnce()>(Option<F>);

impl<F: FnOnce()> ClosureSubscription<F> {
  pub fn new(teardown: F) -> Self { ClosureSubscription(Some(teardown)) }
}

impl<F: FnOnce()> SubscriptionLike for ClosureSubscription<F> {
  fn unsubscribe(&mut self) {
    if let Some(teardown) = self.0.take() {
      teardown();
    }
  }

  #[inline]
  fn is_closed(&self) -> bool { self.0.is_none() }
}

// ============================================================================
// Subscription
// ============================================================================

/// Cloneable handle to the teardowns of one subscription. All clones share
/// the same closed flag.
#[derive(Clone, Default)]
pub struct Subscription(MutRc<Inner>);

#[derive(Default)]
struct Inner {
  closed: bool,
  teardown: SmallVec<[Box<dyn SubscriptionLike>; 1]>,
}

impl Subscription {
  pub fn new() -> Self { Self::default() }

  /// Register a teardown. Adding to an already closed subscription runs the
  /// teardown immediately; adding a subscription to itself is ignored.
  pub fn add<S: SubscriptionLike + 'static>(&self, subscription: S) {
    if self.is_same(&subscription) {
      return;
    }
    let mut subscription = subscription;
    if self.is_closed() {
      subscription.unsubscribe();
      return;
    }
    let mut inner = self.0.rc_deref_mut();
    inner.teardown.retain(|t| !t.is_closed());
    inner.teardown.push(Box::new(subscription));
  }

  /// Close the subscription and run every teardown once. Calling it again
  /// does nothing.
  pub fn unsubscribe(&self) {
    let teardown = {
      let mut inner = self.0.rc_deref_mut();
      if inner.closed {
        return;
      }
      inner.closed = true;
      std::mem::take(&mut inner.teardown)
    };
    for mut t in teardown {
      t.unsubscribe();
    }
  }

  #[inline]
  pub fn is_closed(&self) -> bool { self.0.rc_deref().closed }

  /// Number of live teardowns currently registered.
  pub fn teardown_size(&self) -> usize { self.0.rc_deref().teardown.len() }

  /// Activates "RAII" behavior for this subscription. That means
  /// `unsubscribe()` will be called automatically as soon as the returned
  /// value goes out of scope.
  ///
  /// **Attention:** If you don't assign the return value to a variable,
  /// `unsubscribe()` is called immediately, which is probably not what you
  /// want!
  pub fn unsubscribe_when_dropped(self) -> SubscriptionGuard<Self> { SubscriptionGuard(self) }

  fn is_same(&self, other: &dyn Any) -> bool {
    other
      .downcast_ref::<Self>()
      .is_some_and(|other| self.0.ptr_eq(&other.0))
  }
}

impl SubscriptionLike for Subscription {
  #[inline]
  fn unsubscribe(&mut self) { Subscription::unsubscribe(self) }

  #[inline]
  fn is_closed(&self) -> bool { Subscription::is_closed(self) }
}

impl Debug for Subscription {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let inner = self.0.rc_deref();
    f.debug_struct("Subscription")
      .field("closed", &inner.closed)
      .field("teardown_count", &inner.teardown.len())
      .finish()
  }
}

/// An RAII implementation of a "scoped subscribed" of a subscription.
/// When this structure is dropped (falls out of scope), the subscription will
/// be unsubscribed.
///
/// If you want to drop it immediately, wrap it in its own scope
#[derive(Debug)]
#[must_use]
pub struct SubscriptionGuard<T: SubscriptionLike>(pub(crate) T);

impl<T: SubscriptionLike> SubscriptionGuard<T> {
  /// Wraps an existing subscription with a guard to enable RAII behavior for
  /// it.
  pub fn new(subscription: T) -> SubscriptionGuard<T> { SubscriptionGuard(subscription) }
}

impl<T: SubscriptionLike> Drop for SubscriptionGuard<T> {
  #[inline]
  fn drop(&mut self) { self.0.unsubscribe() }
}

#[cfg(test)]
mod tests {
  use std::{cell::Cell, rc::Rc};

  use super::*;

  fn counter() -> (Rc<Cell<u32>>, impl SubscriptionLike + 'static) {
    let runs = Rc::new(Cell::new(0));
    let r = runs.clone();
    (runs, ClosureSubscription::new(move || r.set(r.get() + 1)))
  }

  #[rxflow_macro::test]
  fn add_teardowns() {
    let local = Subscription::default();
    local.add(Subscription::default());
    assert_eq!(local.teardown_size(), 1);
    local.add(Subscription::default());
    assert_eq!(local.teardown_size(), 2);
    local.add(local.clone());
    assert_eq!(local.teardown_size(), 2);
  }

  #[rxflow_macro::test]
  fn closed_teardowns_are_pruned() {
    let local = Subscription::default();
    let child = Subscription::default();
    local.add(child.clone());
    child.unsubscribe();
    local.add(Subscription::default());
    assert_eq!(local.teardown_size(), 1);
  }

  #[rxflow_macro::test]
  fn unsubscribe_is_idempotent() {
    let local = Subscription::default();
    let (runs, teardown) = counter();
    local.add(teardown);
    local.unsubscribe();
    local.clone().unsubscribe();
    assert!(local.is_closed());
    assert_eq!(runs.get(), 1);
  }

  #[rxflow_macro::test]
  fn closed_before_teardown_runs() {
    let local = Subscription::default();
    let seen = Rc::new(Cell::new(false));
    let (s, l) = (seen.clone(), local.clone());
    local.add(ClosureSubscription::new(move || s.set(l.is_closed())));
    local.unsubscribe();
    assert!(seen.get());
  }

  #[rxflow_macro::test]
  fn add_after_close_runs_immediately() {
    let local = Subscription::default();
    local.unsubscribe();
    let (runs, teardown) = counter();
    local.add(teardown);
    assert_eq!(runs.get(), 1);
    assert_eq!(local.teardown_size(), 0);
  }

  #[rxflow_macro::test]
  fn guard_unsubscribes_on_drop() {
    let local = Subscription::default();
    let (runs, teardown) = counter();
    local.add(teardown);
    {
      let _guard = local.clone().unsubscribe_when_dropped();
    }
    assert!(local.is_closed());
    assert_eq!(runs.get(), 1);
  }
}
