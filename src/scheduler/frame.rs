//! Frame ticks shared by every waiter.
//!
//! A [`FrameClock`] keeps at most one pending "next frame" future. Everyone
//! asking for the next frame while it is pending waits on that same future;
//! once it fires the slot is reset and the following request arms a new
//! one, `period` after the request.

use std::{cell::Cell, future::Future, rc::Rc};

use futures::{
  future::{LocalBoxFuture, Shared},
  FutureExt,
};

use super::{Duration, Scheduler, SleepProvider};
use crate::{
  error::RxError,
  observable::{create_async, Observable},
  rc::{MutRc, RcDeref, RcDerefMut},
  subscriber::Subscriber,
};

type Frame = Shared<LocalBoxFuture<'static, u64>>;

pub struct FrameClock<SD> {
  scheduler: SD,
  period: Duration,
  pending: MutRc<Option<Frame>>,
  count: Rc<Cell<u64>>,
}

impl<SD: Clone> Clone for FrameClock<SD> {
  fn clone(&self) -> Self {
    FrameClock {
      scheduler: self.scheduler.clone(),
      period: self.period,
      pending: self.pending.clone(),
      count: self.count.clone(),
    }
  }
}

impl<SD: Scheduler> FrameClock<SD> {
  pub fn new(scheduler: SD, period: Duration) -> Self {
    FrameClock { scheduler, period, pending: MutRc::own(None), count: Rc::new(Cell::new(0)) }
  }

  #[inline]
  pub fn period(&self) -> Duration { self.period }

  /// Number of frames fired so far.
  #[inline]
  pub fn frames_elapsed(&self) -> u64 { self.count.get() }

  /// Resolves with the frame number (starting at 1) of the next frame.
  pub fn next_frame(&self) -> impl Future<Output = u64> + 'static {
    let armed = self
      .pending
      .rc_deref()
      .clone()
      .filter(|frame| frame.peek().is_none());
    if let Some(frame) = armed {
      return frame;
    }

    let sleep = self.scheduler.sleep(self.period);
    let (slot, count) = (self.pending.clone(), self.count.clone());
    let frame = async move {
      sleep.await;
      slot.rc_deref_mut().take();
      let frame = count.get() + 1;
      count.set(frame);
      frame
    }
    .boxed_local()
    .shared();
    *self.pending.rc_deref_mut() = Some(frame.clone());
    frame
  }

  /// An observable emitting the number of every frame, waiting for each
  /// acknowledgment before asking for the next frame. Subscribers of the
  /// same clock share its ticks.
  pub fn frames<Err>(&self) -> impl Observable<Item = u64, Err = Err> + Clone
  where
    Err: From<RxError> + 'static,
  {
    let clock = self.clone();
    create_async(self.scheduler.clone(), move |subscriber: Subscriber<u64, Err>| {
      let clock = clock.clone();
      async move {
        while !subscriber.is_closed() {
          let frame = clock.next_frame().await;
          subscriber.next(frame).await?;
        }
        Ok::<(), Err>(())
      }
    })
  }
}

#[cfg(test)]
mod tests {
  use std::cell::RefCell;

  use super::*;
  use crate::{prelude::*, scheduler::TestScheduler};

  fn ms(v: u64) -> Duration { Duration::from_millis(v) }

  #[rxflow_macro::test]
  fn waiters_share_the_pending_frame() {
    let scheduler = TestScheduler::new();
    let clock = FrameClock::new(scheduler.clone(), ms(16));
    let seen = Rc::new(RefCell::new(vec![]));
    for _ in 0..2 {
      let (frame, s) = (clock.next_frame(), seen.clone());
      scheduler.spawn(async move { s.borrow_mut().push(frame.await) }).unwrap();
    }
    assert_eq!(scheduler.pending_timers(), 1);

    scheduler.advance_by(ms(16));
    assert_eq!(*seen.borrow(), vec![1, 1]);
    assert_eq!(clock.frames_elapsed(), 1);
  }

  #[rxflow_macro::test]
  fn fired_frame_resets_the_slot() {
    let scheduler = TestScheduler::new();
    let clock = FrameClock::new(scheduler.clone(), ms(10));
    let first = clock.next_frame();
    scheduler.advance_by(ms(10));
    assert_eq!(futures::executor::block_on(first), 1);

    scheduler.advance_by(ms(5));
    let second = clock.next_frame();
    let fired = Rc::new(Cell::new(None));
    let f = fired.clone();
    scheduler
      .spawn(async move {
        let frame = second.await;
        f.set(Some(frame));
      })
      .unwrap();
    scheduler.advance_by(ms(9));
    assert_eq!(fired.get(), None);
    scheduler.advance_by(ms(1));
    assert_eq!(fired.get(), Some(2));
    assert_eq!(scheduler.now(), ms(25));
  }

  #[rxflow_macro::test]
  fn frames_are_shared_between_subscribers() {
    let scheduler = TestScheduler::new();
    let clock = FrameClock::new(scheduler.clone(), ms(16));
    let (a, b) = (Rc::new(RefCell::new(vec![])), Rc::new(RefCell::new(vec![])));
    let (sa, sb) = (a.clone(), b.clone());
    let first = clock.frames::<RxError>().subscribe_next(move |f| sa.borrow_mut().push(f));
    let _second = clock.frames::<RxError>().subscribe_next(move |f| sb.borrow_mut().push(f));

    scheduler.advance_by(ms(48));
    assert_eq!(*a.borrow(), vec![1, 2, 3]);
    assert_eq!(*b.borrow(), vec![1, 2, 3]);

    first.unsubscribe();
    scheduler.advance_by(ms(16));
    assert_eq!(*a.borrow(), vec![1, 2, 3]);
    assert_eq!(*b.borrow(), vec![1, 2, 3, 4]);
  }
}
