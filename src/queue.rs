//! Ordering queue.
//!
//! [`Queue`] serializes calls to an observer whose `next` may resolve out of
//! order: call N+1 starts only after the acknowledgment of call N resolved,
//! and always in call order. When nothing is in flight the call starts
//! synchronously.
//!
//! The queue has no executor of its own. Its deliveries advance whenever any
//! acknowledgment it handed out, [`Queue::flushed`], or [`Queue::drive`] is
//! polled or called, and the delivery that finishes starts its successor
//! right away. A producer that drops its acknowledgments therefore still
//! sees a value parked behind a pending one delivered as soon as the earlier
//! acknowledgment is awaited by anyone. Every task waiting on the queue is
//! woken when the running delivery can make progress.

use std::{
  collections::VecDeque,
  future::Future,
  mem,
  sync::{Arc, Mutex},
  task::{Context, Poll, Waker},
};

use futures::{
  future::{poll_fn, LocalBoxFuture},
  task::{waker_ref, ArcWake},
  FutureExt,
};

use crate::{
  observer::{Ack, Observer, SharedObserver},
  rc::{MutRc, MutWeak, RcDeref, RcDerefMut},
  subscriber::Subscriber,
};

pub struct Queue<O> {
  observer: SharedObserver<O>,
  chain: MutRc<Chain>,
  wakers: Arc<Wakers>,
}

/// Deliveries of one queue. Entry `n` (in call order) is finished once
/// `finished > n`.
#[derive(Default)]
struct Chain {
  waiting: VecDeque<LocalBoxFuture<'static, ()>>,
  running: Option<LocalBoxFuture<'static, ()>>,
  issued: u64,
  finished: u64,
  driving: bool,
}

/// Tasks waiting on a queue. The running delivery is polled with this list
/// as its waker, so whichever task is woken drives the chain forward.
#[derive(Default)]
struct Wakers(Mutex<Vec<Waker>>);

impl Wakers {
  fn register(&self, waker: &Waker) {
    if let Ok(mut wakers) = self.0.lock() {
      if !wakers.iter().any(|w| w.will_wake(waker)) {
        wakers.push(waker.clone());
      }
    }
  }

  fn wake_all(&self) {
    let wakers = match self.0.lock() {
      Ok(mut wakers) => mem::take(&mut *wakers),
      Err(_) => return,
    };
    for waker in wakers {
      waker.wake();
    }
  }
}

impl ArcWake for Wakers {
  fn wake_by_ref(arc_self: &Arc<Self>) { arc_self.wake_all() }
}

/// Clears the `driving` flag even if a delivery panics.
struct Driving<'a>(&'a MutRc<Chain>);

impl Drop for Driving<'_> {
  fn drop(&mut self) { self.0.rc_deref_mut().driving = false; }
}

/// Run deliveries until one is pending or none is left. A re-entrant call
/// returns at once; the outer loop picks up whatever was queued meanwhile.
fn drive(chain: &MutRc<Chain>, wakers: &Arc<Wakers>) {
  {
    let mut state = chain.rc_deref_mut();
    if state.driving {
      return;
    }
    state.driving = true;
  }
  let _driving = Driving(chain);
  let waker = waker_ref(wakers);
  let mut cx = Context::from_waker(&waker);
  let mut progressed = false;
  loop {
    let running = {
      let mut state = chain.rc_deref_mut();
      match state.running.take() {
        Some(running) => Some(running),
        None => state.waiting.pop_front(),
      }
    };
    let Some(mut delivery) = running else { break };
    match delivery.poll_unpin(&mut cx) {
      Poll::Ready(()) => {
        chain.rc_deref_mut().finished += 1;
        progressed = true;
      }
      Poll::Pending => {
        chain.rc_deref_mut().running = Some(delivery);
        break;
      }
    }
  }
  if progressed {
    wakers.wake_all();
  }
}

/// Resolves once at least `target` deliveries finished.
fn reached(
  chain: MutRc<Chain>,
  wakers: Arc<Wakers>,
  target: u64,
) -> impl Future<Output = ()> + 'static {
  poll_fn(move |cx| {
    wakers.register(cx.waker());
    drive(&chain, &wakers);
    if chain.rc_deref().finished >= target { Poll::Ready(()) } else { Poll::Pending }
  })
}

impl<O> Clone for Queue<O> {
  fn clone(&self) -> Self {
    Queue { observer: self.observer.clone(), chain: self.chain.clone(), wakers: self.wakers.clone() }
  }
}

impl<O> Queue<O> {
  pub fn new(observer: O) -> Self {
    Queue {
      observer: SharedObserver::new(observer),
      chain: MutRc::own(Chain::default()),
      wakers: Arc::default(),
    }
  }

  /// Resolves once every delivery queued so far has finished.
  pub fn flushed(&self) -> impl Future<Output = ()> + 'static {
    let target = self.chain.rc_deref().issued;
    reached(self.chain.clone(), self.wakers.clone(), target)
  }

  /// Push parked deliveries forward without awaiting any acknowledgment.
  pub fn drive(&self) { drive(&self.chain, &self.wakers) }

  /// A handle that drives this queue without keeping it alive.
  pub(crate) fn driver(&self) -> QueueDriver {
    QueueDriver { chain: self.chain.downgrade(), wakers: self.wakers.clone() }
  }
}

#[derive(Clone)]
pub(crate) struct QueueDriver {
  chain: MutWeak<Chain>,
  wakers: Arc<Wakers>,
}

impl QueueDriver {
  pub(crate) fn drive(&self) {
    if let Some(chain) = self.chain.upgrade() {
      drive(&chain, &self.wakers);
    }
  }
}

impl<O, Item, Err> Observer<Item, Err> for Queue<O>
where
  O: Observer<Item, Err> + 'static,
  Item: 'static,
  Err: 'static,
{
  fn next(&mut self, value: Item) -> Ack<Err> {
    if Observer::<Item, Err>::is_closed(&self.observer) {
      return Ack::ready();
    }

    let observer = self.observer.clone();
    let delivery = async move {
      if Observer::<Item, Err>::is_closed(&observer) {
        return;
      }
      if observer.emit::<Item, Err>(value).await.is_err() {
        tracing::debug!("queued delivery rejected; continuing with the next one");
      }
    }
    .boxed_local();

    let ticket = {
      let mut chain = self.chain.rc_deref_mut();
      chain.waiting.push_back(delivery);
      chain.issued += 1;
      chain.issued
    };
    drive(&self.chain, &self.wakers);
    if self.chain.rc_deref().finished >= ticket {
      Ack::ready()
    } else {
      Ack::new(reached(self.chain.clone(), self.wakers.clone(), ticket).map(Ok))
    }
  }

  #[inline]
  fn error(self, err: Err) { Observer::<Item, Err>::error(self.observer, err) }

  #[inline]
  fn complete(self) { Observer::<Item, Err>::complete(self.observer) }

  #[inline]
  fn is_closed(&self) -> bool { Observer::<Item, Err>::is_closed(&self.observer) }
}

/// Wrap a producer so the [`Subscriber`] it receives delivers through a
/// [`Queue`].
///
/// Useful for producers fed by callbacks that fire without awaiting the
/// previous acknowledgment: each value still reaches the observer only after
/// the one before it was acknowledged.
///
/// ```rust
/// use rxflow::prelude::*;
///
/// create(queued(|subscriber: Subscriber<&'static str, ()>| {
///   let _ = subscriber.next("connected");
///   let _ = subscriber.next("ready");
/// }))
/// .subscribe_next(|event| println!("{event}"));
/// ```
pub fn queued<Item, Err, F, U>(producer: F) -> impl Fn(Subscriber<Item, Err>) -> U
where
  F: Fn(Subscriber<Item, Err>) -> U,
  Item: 'static,
  Err: 'static,
{
  move |subscriber| producer(subscriber.queued())
}
