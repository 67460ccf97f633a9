//! A cloneable handle over a single observer.
//!
//! Operators that reach the same downstream from several places (queues,
//! merge branches, subscriber handles) share it through [`SharedObserver`].
//! The observer is moved out of its cell while one of its methods runs, so
//! user code never executes under a `RefCell` borrow. Terminal signals that
//! arrive while a `next` call is running are parked and delivered once that
//! call returns. A value that arrives while a `next` call is running is
//! dropped: the observer cannot take it without re-entering itself.

use std::mem;

use super::{Ack, Observer};
use crate::rc::{MutRc, RcDeref, RcDerefMut};

pub struct SharedObserver<O>(MutRc<Slot<O>>);

struct Slot<O> {
  state: State<O>,
  /// Terminal signal raised while the observer was busy.
  pending: Option<Box<dyn FnOnce(O)>>,
  /// Disposed while busy: drop the observer once the running call returns.
  disposed: bool,
}

enum State<O> {
  Idle(O),
  Busy,
  Closed,
}

impl<O> Clone for SharedObserver<O> {
  #[inline]
  fn clone(&self) -> Self { SharedObserver(self.0.clone()) }
}

impl<O> SharedObserver<O> {
  pub fn new(observer: O) -> Self {
    SharedObserver(MutRc::own(Slot { state: State::Idle(observer), pending: None, disposed: false }))
  }

  /// Deliver a value through a shared reference. Returns a resolved
  /// acknowledgment without delivering when the observer is closed or busy.
  pub fn emit<Item, Err>(&self, value: Item) -> Ack<Err>
  where
    O: Observer<Item, Err>,
  {
    let taken = {
      let mut slot = self.0.rc_deref_mut();
      match mem::replace(&mut slot.state, State::Busy) {
        State::Idle(observer) => Some(observer),
        State::Busy => {
          tracing::warn!("re-entrant `next` on a busy observer ignored");
          None
        }
        State::Closed => {
          slot.state = State::Closed;
          None
        }
      }
    };
    let Some(mut observer) = taken else { return Ack::ready() };
    let ack = observer.next(value);
    self.restore(observer);
    ack
  }

  /// Drop the observer without notifying it. A terminal signal already
  /// parked behind a running call is still delivered.
  pub fn dispose(&self) {
    let dropped = {
      let mut slot = self.0.rc_deref_mut();
      match slot.state {
        State::Busy => {
          slot.disposed = true;
          None
        }
        _ => Some(mem::replace(&mut slot.state, State::Closed)),
      }
    };
    drop(dropped);
  }

  fn restore(&self, observer: O) {
    let (deliver, leftover) = {
      let mut slot = self.0.rc_deref_mut();
      if !matches!(slot.state, State::Busy) {
        (None, Some(observer))
      } else if let Some(pending) = slot.pending.take() {
        slot.state = State::Closed;
        (Some((pending, observer)), None)
      } else if slot.disposed {
        slot.state = State::Closed;
        (None, Some(observer))
      } else {
        slot.state = State::Idle(observer);
        (None, None)
      }
    };
    drop(leftover);
    if let Some((pending, observer)) = deliver {
      pending(observer);
    }
  }

  fn terminate(&self, signal: impl FnOnce(O) + 'static) {
    let observer = {
      let mut slot = self.0.rc_deref_mut();
      match mem::replace(&mut slot.state, State::Closed) {
        State::Idle(observer) => Some(observer),
        State::Busy => {
          slot.state = State::Busy;
          if slot.pending.is_none() {
            slot.pending = Some(Box::new(signal));
          }
          return;
        }
        State::Closed => None,
      }
    };
    if let Some(observer) = observer {
      signal(observer);
    }
  }

  fn closed_with<Item, Err>(&self) -> bool
  where
    O: Observer<Item, Err>,
  {
    let slot = self.0.rc_deref();
    match &slot.state {
      State::Idle(observer) => observer.is_closed(),
      State::Busy => slot.pending.is_some() || slot.disposed,
      State::Closed => true,
    }
  }
}

impl<O, Item, Err> Observer<Item, Err> for SharedObserver<O>
where
  O: Observer<Item, Err>,
  Item: 'static,
  Err: 'static,
{
  #[inline]
  fn next(&mut self, value: Item) -> Ack<Err> { self.emit(value) }

  fn error(self, err: Err) {
    self.terminate(move |observer: O| Observer::<Item, Err>::error(observer, err))
  }

  fn complete(self) { self.terminate(|observer: O| Observer::<Item, Err>::complete(observer)) }

  #[inline]
  fn is_closed(&self) -> bool { self.closed_with::<Item, Err>() }
}
