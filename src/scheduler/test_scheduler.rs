//! Test Scheduler for deterministic testing of time-based operators.
//!
//! Provides virtual time that only advances when explicitly instructed,
//! enabling deterministic testing of `delay`, `interval`, frames, etc.
//!
//! # Usage
//!
//! ```rust
//! use rxflow::prelude::*;
//! use rxflow::scheduler::{Duration, TestScheduler};
//!
//! let scheduler = TestScheduler::new();
//! let _subscription = of::<_, _, RxError>(42, scheduler.clone())
//!   .delay(Duration::from_millis(100), scheduler.clone())
//!   .subscribe_next(|v| println!("{v}"));
//!
//! // Advance virtual time to trigger delayed emission
//! scheduler.advance_by(Duration::from_millis(100));
//!
//! // Or fire every pending timer
//! scheduler.flush();
//! ```
//!
//! Every `TestScheduler` owns its own `LocalPool` and virtual clock, so tests
//! running in parallel never share state. Clones share both.

use std::{
  cell::{Cell, RefCell},
  cmp::Ordering,
  collections::BinaryHeap,
  future::Future,
  pin::Pin,
  rc::{Rc, Weak},
  task::{Context, Poll, Waker},
};

use futures::{
  executor::{LocalPool, LocalSpawner},
  future::LocalBoxFuture,
  task::LocalSpawn,
};

use super::{Duration, Scheduler, SleepProvider};
use crate::{
  error::RxError,
  rc::{MutRc, RcDeref, RcDerefMut},
};

// ==================== Internal State ====================

#[derive(Default)]
struct VirtualClock {
  now: Duration,
  timers: BinaryHeap<Timer>,
  next_id: usize,
}

#[derive(Default)]
struct TimerSlot {
  fired: Cell<bool>,
  waker: RefCell<Option<Waker>>,
}

struct Timer {
  deadline: Duration,
  id: usize,
  slot: Weak<TimerSlot>,
}

impl PartialEq for Timer {
  fn eq(&self, other: &Self) -> bool { self.deadline == other.deadline && self.id == other.id }
}

impl Eq for Timer {}

impl PartialOrd for Timer {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl Ord for Timer {
  fn cmp(&self, other: &Self) -> Ordering {
    // Min-heap: earlier deadlines first, then FIFO by id
    other
      .deadline
      .cmp(&self.deadline)
      .then_with(|| other.id.cmp(&self.id))
  }
}

// ==================== TestScheduler ====================

/// A virtual time scheduler for deterministic testing.
#[derive(Clone)]
pub struct TestScheduler {
  pool: Rc<RefCell<LocalPool>>,
  spawner: LocalSpawner,
  clock: MutRc<VirtualClock>,
}

impl Default for TestScheduler {
  fn default() -> Self { Self::new() }
}

impl TestScheduler {
  pub fn new() -> Self {
    let pool = LocalPool::new();
    let spawner = pool.spawner();
    TestScheduler { pool: Rc::new(RefCell::new(pool)), spawner, clock: MutRc::default() }
  }

  /// Get the current virtual time, measured from the scheduler's creation.
  ///
  /// Virtual time only advances when explicitly instructed via `advance_by()`
  /// or `flush()`.
  pub fn now(&self) -> Duration { self.clock.rc_deref().now }

  /// Number of timers that are still waiting to fire.
  pub fn pending_timers(&self) -> usize {
    self
      .clock
      .rc_deref()
      .timers
      .iter()
      .filter(|t| t.slot.strong_count() > 0)
      .count()
  }

  /// Run every spawned task until none of them can make progress without
  /// time passing.
  pub fn run_until_stalled(&self) { self.pool.borrow_mut().run_until_stalled() }

  /// Advance virtual time by the specified duration, firing due timers.
  ///
  /// Timers fire in order of their deadline, with FIFO ordering for timers
  /// due at the same time. Tasks woken by a timer run before the next timer
  /// fires.
  pub fn advance_by(&self, duration: Duration) {
    let target = self.now() + duration;
    self.run_until_stalled();
    while let Some(timer) = self.pop_due(target) {
      if let Some(slot) = timer.slot.upgrade() {
        slot.fired.set(true);
        let waker = slot.waker.borrow_mut().take();
        if let Some(waker) = waker {
          waker.wake();
        }
      }
      self.run_until_stalled();
    }
    self.clock.rc_deref_mut().now = target;
    self.run_until_stalled();
  }

  /// Fire every pending timer, advancing time to each deadline in turn.
  ///
  /// Sources that keep re-arming a timer (such as `interval`) never let this
  /// return; use `advance_by` for them.
  pub fn flush(&self) {
    loop {
      self.run_until_stalled();
      let next = self.clock.rc_deref().timers.peek().map(|t| t.deadline);
      let Some(deadline) = next else { break };
      self.advance_by(deadline.saturating_sub(self.now()));
    }
  }

  fn pop_due(&self, target: Duration) -> Option<Timer> {
    let mut clock = self.clock.rc_deref_mut();
    if !clock.timers.peek().is_some_and(|t| t.deadline <= target) {
      return None;
    }
    let timer = clock.timers.pop()?;
    clock.now = clock.now.max(timer.deadline);
    Some(timer)
  }
}

impl SleepProvider for TestScheduler {
  type SleepFuture = VirtualSleep;

  fn sleep(&self, duration: Duration) -> VirtualSleep {
    let slot = Rc::new(TimerSlot::default());
    if duration.is_zero() {
      slot.fired.set(true);
    } else {
      let mut clock = self.clock.rc_deref_mut();
      let id = clock.next_id;
      clock.next_id += 1;
      let deadline = clock.now + duration;
      clock.timers.push(Timer { deadline, id, slot: Rc::downgrade(&slot) });
    }
    VirtualSleep { slot }
  }
}

impl Scheduler for TestScheduler {
  fn spawn_local_obj(&self, task: LocalBoxFuture<'static, ()>) -> Result<(), RxError> {
    self.spawner.spawn_local_obj(task.into())?;
    Ok(())
  }
}

/// Sleep on a [`TestScheduler`]'s virtual clock.
pub struct VirtualSleep {
  slot: Rc<TimerSlot>,
}

impl Future for VirtualSleep {
  type Output = ();

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
    if self.slot.fired.get() {
      Poll::Ready(())
    } else {
      *self.slot.waker.borrow_mut() = Some(cx.waker().clone());
      Poll::Pending
    }
  }
}
