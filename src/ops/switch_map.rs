//! SwitchMap operator
//!
//! Maps each value of the source to an inner observable and mirrors only the
//! most recent one. Subscribing a new inner unsubscribes the previous one
//! synchronously; its values still waiting in the delivery queue are dropped
//! when their turn comes.
//!
//! Behavior summary:
//! - Values reach the destination one at a time, in arrival order.
//! - An inner completing only clears it; the next source value starts a new
//!   one.
//! - The result completes when the source completes, even if an inner is
//!   still running (that inner is unsubscribed). Call
//!   [`SwitchMapOp::complete_after_inner`] to wait for the current inner
//!   instead.
//! - Errors from the source or the current inner are forwarded immediately
//!   and tear down both.
//!
//! ```rust
//! use rxflow::prelude::*;
//! use rxflow::scheduler::{Duration, TestScheduler};
//!
//! let scheduler = TestScheduler::new();
//! let timer = scheduler.clone();
//! from_iter::<_, _, RxError>(vec![1, 2], scheduler.clone())
//!   .switch_map(move |v| of(v * 10, timer.clone()).delay(Duration::from_millis(5), timer.clone()))
//!   .complete_after_inner()
//!   .subscribe_next(|v| println!("{v}"));
//! scheduler.flush();
//! ```

use crate::{
  observable::Observable,
  observer::{Ack, Observer},
  queue::Queue,
  rc::{MutRc, RcDeref, RcDerefMut},
  subscription::{ClosureSubscription, Subscription},
};

#[derive(Clone)]
pub struct SwitchMapOp<S, F> {
  source: S,
  func: F,
  wait_inner: bool,
}

impl<S, F> SwitchMapOp<S, F> {
  pub(crate) fn new(source: S, func: F) -> Self { SwitchMapOp { source, func, wait_inner: false } }

  /// Complete only once the source completed and the current inner, if
  /// any, completed too.
  pub fn complete_after_inner(mut self) -> Self {
    self.wait_inner = true;
    self
  }
}

#[derive(Default)]
struct SwitchState {
  generation: u64,
  inner: Option<Subscription>,
  inner_active: bool,
  outer_done: bool,
}

type State = MutRc<SwitchState>;

impl<S, F, Inner> Observable for SwitchMapOp<S, F>
where
  S: Observable,
  F: FnMut(S::Item) -> Inner + 'static,
  Inner: Observable<Err = S::Err>,
  Inner::Item: 'static,
  S::Err: 'static,
{
  type Item = Inner::Item;
  type Err = S::Err;

  fn actual_subscribe<O>(self, observer: O) -> Subscription
  where
    O: Observer<Inner::Item, S::Err> + 'static,
  {
    let subscription = Subscription::default();
    let state = State::default();
    let teardown = state.clone();
    subscription.add(ClosureSubscription::new(move || {
      let inner = teardown.rc_deref_mut().inner.take();
      if let Some(inner) = inner {
        inner.unsubscribe();
      }
    }));

    let outer = OuterObserver {
      func: self.func,
      downstream: Queue::new(LatestGate { observer, state: state.clone() }),
      state,
      subscription: subscription.clone(),
      wait_inner: self.wait_inner,
    };
    subscription.add(self.source.actual_subscribe(outer));
    subscription
  }
}

// ============================================================================
// LatestGate
// ============================================================================

/// Drops values tagged with a generation other than the current one.
pub struct LatestGate<O> {
  observer: O,
  state: State,
}

impl<O, Item, Err> Observer<(u64, Item), Err> for LatestGate<O>
where
  O: Observer<Item, Err>,
{
  fn next(&mut self, (generation, value): (u64, Item)) -> Ack<Err> {
    if self.state.rc_deref().generation != generation {
      return Ack::ready();
    }
    self.observer.next(value)
  }

  #[inline]
  fn error(self, err: Err) { self.observer.error(err) }

  #[inline]
  fn complete(self) { self.observer.complete() }

  #[inline]
  fn is_closed(&self) -> bool { self.observer.is_closed() }
}

// ============================================================================
// Outer / inner observers
// ============================================================================

pub struct OuterObserver<F, O> {
  func: F,
  downstream: Queue<LatestGate<O>>,
  state: State,
  subscription: Subscription,
  wait_inner: bool,
}

impl<F, O, Item, Inner> Observer<Item, Inner::Err> for OuterObserver<F, O>
where
  F: FnMut(Item) -> Inner,
  Inner: Observable,
  Inner::Item: 'static,
  Inner::Err: 'static,
  O: Observer<Inner::Item, Inner::Err> + 'static,
{
  fn next(&mut self, value: Item) -> Ack<Inner::Err> {
    if Observer::<Item, Inner::Err>::is_closed(self) {
      return Ack::ready();
    }
    let source = (self.func)(value);

    let (generation, previous) = {
      let mut state = self.state.rc_deref_mut();
      state.generation += 1;
      state.inner_active = true;
      (state.generation, state.inner.take())
    };
    if let Some(previous) = previous {
      tracing::trace!(generation, "switching to a new inner observable");
      previous.unsubscribe();
    }

    let inner = InnerObserver {
      generation,
      downstream: self.downstream.clone(),
      state: self.state.clone(),
      subscription: self.subscription.clone(),
      wait_inner: self.wait_inner,
    };
    let inner_subscription = source.actual_subscribe(inner);

    let current = {
      let mut state = self.state.rc_deref_mut();
      let current = state.generation == generation && !self.subscription.is_closed();
      if current {
        state.inner = Some(inner_subscription.clone());
      }
      current
    };
    if !current {
      inner_subscription.unsubscribe();
    }
    Ack::ready()
  }

  fn error(self, err: Inner::Err) {
    if self.subscription.is_closed() {
      return;
    }
    Observer::<(u64, Inner::Item), Inner::Err>::error(self.downstream, err);
    self.subscription.unsubscribe();
  }

  fn complete(self) {
    let idle = {
      let mut state = self.state.rc_deref_mut();
      state.outer_done = true;
      !state.inner_active
    };
    if (idle || !self.wait_inner) && !self.subscription.is_closed() {
      Observer::<(u64, Inner::Item), Inner::Err>::complete(self.downstream);
      self.subscription.unsubscribe();
    }
  }

  fn is_closed(&self) -> bool { self.subscription.is_closed() }
}

pub struct InnerObserver<O> {
  generation: u64,
  downstream: Queue<LatestGate<O>>,
  state: State,
  subscription: Subscription,
  wait_inner: bool,
}

impl<O> InnerObserver<O> {
  fn is_current(&self) -> bool { self.state.rc_deref().generation == self.generation }
}

impl<O, Item, Err> Observer<Item, Err> for InnerObserver<O>
where
  O: Observer<Item, Err> + 'static,
  Item: 'static,
  Err: 'static,
{
  fn next(&mut self, value: Item) -> Ack<Err> {
    if !self.is_current() {
      return Ack::ready();
    }
    self.downstream.next((self.generation, value))
  }

  fn error(self, err: Err) {
    if !self.is_current() || self.subscription.is_closed() {
      return;
    }
    Observer::<(u64, Item), Err>::error(self.downstream, err);
    self.subscription.unsubscribe();
  }

  fn complete(self) {
    let finish = {
      let mut state = self.state.rc_deref_mut();
      if state.generation != self.generation {
        return;
      }
      state.inner = None;
      state.inner_active = false;
      self.wait_inner && state.outer_done
    };
    if finish && !self.subscription.is_closed() {
      Observer::<(u64, Item), Err>::complete(self.downstream);
      self.subscription.unsubscribe();
    }
  }

  fn is_closed(&self) -> bool {
    !self.is_current() || self.subscription.is_closed()
  }
}
