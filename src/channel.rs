//! In-process channels and duplex handles.
//!
//! [`channel`] connects an observer end ([`ChannelSink`]) to an observable
//! end ([`ChannelSource`]). Every value pushed into the sink reaches every
//! current subscriber of the source, and the sink's acknowledgment resolves
//! once all of them acknowledged. While nobody is subscribed, values wait:
//! the acknowledgment stays pending until the first subscriber arrives, and
//! the waiting values are delivered to it as part of subscribing.
//!
//! ```rust
//! use rxflow::prelude::*;
//!
//! let Channel { source, mut sink } = channel::<i32, ()>();
//! source.subscribe_next(|v| println!("{v}"));
//! let _ = sink.next(1);
//! sink.complete();
//! ```

use std::mem;

use futures::{channel::oneshot, future::join_all, FutureExt};

use crate::{
  observable::Observable,
  observer::{Ack, Observer},
  queue::{Queue, QueueDriver},
  rc::{MutRc, RcDeref, RcDerefMut},
  subscriber::Subscriber,
  subscription::{ClosureSubscription, Subscription},
};

mod duplex;

pub use duplex::{duplex, Duplex};

/// Create a connected source/sink pair.
pub fn channel<Item, Err>() -> Channel<Item, Err>
where
  Item: Clone + 'static,
  Err: Clone + 'static,
{
  let state = MutRc::own(ChannelState {
    registry: Registry::default(),
    terminal: None,
    waiters: Vec::new(),
    sink: None,
  });
  let queue = Queue::new(Broadcast { state: state.clone() });
  state.rc_deref_mut().sink = Some(queue.driver());
  Channel { source: ChannelSource { state }, sink: ChannelSink { queue } }
}

pub struct Channel<Item, Err> {
  pub source: ChannelSource<Item, Err>,
  pub sink: ChannelSink<Item, Err>,
}

impl<Item, Err> Channel<Item, Err> {
  /// Package both ends as one [`Duplex`].
  pub fn into_duplex(self) -> Duplex<ChannelSource<Item, Err>, ChannelSink<Item, Err>> {
    duplex(self.source, self.sink)
  }
}

// ============================================================================
// Shared state
// ============================================================================

#[derive(Clone)]
enum Terminal<Err> {
  Error(Err),
  Complete,
}

struct ChannelState<Item, Err> {
  registry: Registry<Item, Err>,
  terminal: Option<Terminal<Err>>,
  waiters: Vec<oneshot::Sender<()>>,
  /// Pushes deliveries parked for a subscriber forward.
  sink: Option<QueueDriver>,
}

/// The subscribers currently attached to a channel, keyed by insertion id.
struct Registry<Item, Err> {
  next_id: usize,
  entries: Vec<(usize, Subscriber<Item, Err>)>,
}

impl<Item, Err> Default for Registry<Item, Err> {
  fn default() -> Self { Registry { next_id: 0, entries: Vec::new() } }
}

impl<Item, Err> Registry<Item, Err> {
  fn insert(&mut self, subscriber: Subscriber<Item, Err>) -> usize {
    let id = self.next_id;
    self.next_id += 1;
    self.entries.push((id, subscriber));
    id
  }

  fn remove(&mut self, id: usize) { self.entries.retain(|(i, _)| *i != id); }

  fn snapshot(&self) -> Vec<Subscriber<Item, Err>> {
    self.entries.iter().map(|(_, s)| s.clone()).collect()
  }

  fn drain(&mut self) -> Vec<Subscriber<Item, Err>> {
    self.entries.drain(..).map(|(_, s)| s).collect()
  }

  #[inline]
  fn len(&self) -> usize { self.entries.len() }

  #[inline]
  fn is_empty(&self) -> bool { self.entries.is_empty() }
}

// ============================================================================
// Source
// ============================================================================

/// The observable end of a [`channel`]. Clones subscribe to the same
/// channel; a subscriber arriving after the sink terminated receives the
/// terminal signal right away.
pub struct ChannelSource<Item, Err> {
  state: MutRc<ChannelState<Item, Err>>,
}

impl<Item, Err> Clone for ChannelSource<Item, Err> {
  fn clone(&self) -> Self { ChannelSource { state: self.state.clone() } }
}

impl<Item, Err> ChannelSource<Item, Err> {
  /// Number of subscribers currently attached.
  pub fn subscriber_count(&self) -> usize { self.state.rc_deref().registry.len() }
}

impl<Item, Err> Observable for ChannelSource<Item, Err>
where
  Item: Clone + 'static,
  Err: Clone + 'static,
{
  type Item = Item;
  type Err = Err;

  fn actual_subscribe<O>(self, observer: O) -> Subscription
  where
    O: Observer<Item, Err> + 'static,
  {
    let subscription = Subscription::default();
    let subscriber = Subscriber::new(observer, subscription.clone());

    let terminal = self.state.rc_deref().terminal.clone();
    match terminal {
      Some(Terminal::Error(err)) => subscriber.error(err),
      Some(Terminal::Complete) => subscriber.complete(),
      None => {
        let (id, waiters, sink) = {
          let mut state = self.state.rc_deref_mut();
          let id = state.registry.insert(subscriber);
          (id, mem::take(&mut state.waiters), state.sink.clone())
        };
        let state = self.state.clone();
        subscription.add(ClosureSubscription::new(move || {
          state.rc_deref_mut().registry.remove(id)
        }));
        if !waiters.is_empty() {
          for waiter in waiters {
            let _ = waiter.send(());
          }
          if let Some(sink) = sink {
            sink.drive();
          }
        }
      }
    }
    subscription
  }
}

// ============================================================================
// Sink
// ============================================================================

/// The observer end of a [`channel`]. Values are delivered in call order,
/// one at a time; clones push into the same channel.
pub struct ChannelSink<Item, Err> {
  queue: Queue<Broadcast<Item, Err>>,
}

impl<Item, Err> Clone for ChannelSink<Item, Err> {
  fn clone(&self) -> Self { ChannelSink { queue: self.queue.clone() } }
}

impl<Item, Err> Observer<Item, Err> for ChannelSink<Item, Err>
where
  Item: Clone + 'static,
  Err: Clone + 'static,
{
  #[inline]
  fn next(&mut self, value: Item) -> Ack<Err> { self.queue.next(value) }

  #[inline]
  fn error(self, err: Err) { Observer::<Item, Err>::error(self.queue, err) }

  #[inline]
  fn complete(self) { Observer::<Item, Err>::complete(self.queue) }

  #[inline]
  fn is_closed(&self) -> bool { Observer::<Item, Err>::is_closed(&self.queue) }
}

/// Fans one value out to every registered subscriber.
pub struct Broadcast<Item, Err> {
  state: MutRc<ChannelState<Item, Err>>,
}

impl<Item, Err> Broadcast<Item, Err> {
  fn terminate(self, terminal: Terminal<Err>) -> Vec<Subscriber<Item, Err>> {
    let mut state = self.state.rc_deref_mut();
    if state.terminal.is_some() {
      return Vec::new();
    }
    state.terminal = Some(terminal);
    // Dropping the senders releases any delivery still waiting for a
    // subscriber; it then finds the registry empty.
    state.waiters.clear();
    state.registry.drain()
  }
}

fn deliver<Item, Err>(subscribers: Vec<Subscriber<Item, Err>>, value: Item) -> Ack<Err>
where
  Item: Clone + 'static,
  Err: 'static,
{
  let pending: Vec<Ack<Err>> = subscribers
    .iter()
    .map(|subscriber| subscriber.next(value.clone()))
    .filter(|ack| !ack.is_ready())
    .collect();
  if pending.is_empty() {
    Ack::ready()
  } else {
    Ack::new(join_all(pending).map(|_| Ok(())))
  }
}

impl<Item, Err> Observer<Item, Err> for Broadcast<Item, Err>
where
  Item: Clone + 'static,
  Err: Clone + 'static,
{
  fn next(&mut self, value: Item) -> Ack<Err> {
    let waiting = {
      let mut state = self.state.rc_deref_mut();
      if !state.registry.is_empty() || state.terminal.is_some() {
        None
      } else {
        let (tx, rx) = oneshot::channel();
        state.waiters.push(tx);
        Some(rx)
      }
    };
    match waiting {
      None => {
        let subscribers = self.state.rc_deref().registry.snapshot();
        deliver(subscribers, value)
      }
      Some(attached) => {
        tracing::trace!("channel value waiting for a subscriber");
        let state = self.state.clone();
        Ack::new(async move {
          let _ = attached.await;
          let subscribers = state.rc_deref().registry.snapshot();
          deliver(subscribers, value).await
        })
      }
    }
  }

  fn error(self, err: Err) {
    for subscriber in self.terminate(Terminal::Error(err.clone())) {
      subscriber.error(err.clone());
    }
  }

  fn complete(self) {
    for subscriber in self.terminate(Terminal::Complete) {
      subscriber.complete();
    }
  }

  fn is_closed(&self) -> bool { self.state.rc_deref().terminal.is_some() }
}

#[cfg(test)]
mod tests {
  use std::{cell::RefCell, rc::Rc};

  use futures::{channel::oneshot, FutureExt};

  use crate::{observer::FnObserver, prelude::*};

  type Log = Rc<RefCell<Vec<String>>>;

  fn logged(source: ChannelSource<i32, String>, name: &'static str) -> (Log, Subscription) {
    let log = Log::default();
    let (n, e, c) = (log.clone(), log.clone(), log.clone());
    let subscription = source.subscribe_all(
      move |v| n.borrow_mut().push(format!("{name} next {v}")),
      move |err| e.borrow_mut().push(format!("{name} error {err}")),
      move || c.borrow_mut().push(format!("{name} complete")),
    );
    (log, subscription)
  }

  #[rxflow_macro::test]
  fn values_reach_every_subscriber() {
    let Channel { source, mut sink } = channel::<i32, String>();
    let (a, _sa) = logged(source.clone(), "a");
    let (b, _sb) = logged(source.clone(), "b");
    assert_eq!(source.subscriber_count(), 2);

    assert!(sink.next(1).is_ready());
    sink.complete();
    assert_eq!(*a.borrow(), vec!["a next 1", "a complete"]);
    assert_eq!(*b.borrow(), vec!["b next 1", "b complete"]);
    assert_eq!(source.subscriber_count(), 0);
  }

  #[rxflow_macro::test]
  async fn values_wait_for_the_first_subscriber() {
    let Channel { source, mut sink } = channel::<i32, String>();
    let first = sink.next(1);
    let second = sink.next(2);
    assert!(!first.is_ready());

    let (log, _subscription) = logged(source, "late");
    assert_eq!(*log.borrow(), vec!["late next 1", "late next 2"]);
    first.await.unwrap();
    second.await.unwrap();
  }

  #[rxflow_macro::test]
  fn subscribing_delivers_values_whose_acknowledgment_was_dropped() {
    let Channel { source, mut sink } = channel::<i32, String>();
    for v in 1..=3 {
      let _ = sink.next(v);
    }
    let (log, _subscription) = logged(source, "late");
    assert_eq!(*log.borrow(), vec!["late next 1", "late next 2", "late next 3"]);
  }

  #[rxflow_macro::test]
  async fn acknowledgment_waits_for_every_subscriber() {
    let Channel { source, mut sink } = channel::<i32, String>();
    let (tx, rx) = oneshot::channel::<()>();
    let gate = RefCell::new(Some(rx));
    let (fast, _sf) = logged(source.clone(), "fast");
    source.subscribe(FnObserver::new(move |_: i32| {
      let rx = gate.borrow_mut().take();
      Ack::<String>::new(async move {
        if let Some(rx) = rx {
          let _ = rx.await;
        }
        Ok(())
      })
    }));

    let mut ack = sink.next(1);
    assert_eq!(*fast.borrow(), vec!["fast next 1"]);
    assert!((&mut ack).now_or_never().is_none());
    let _ = tx.send(());
    ack.await.unwrap();
  }

  #[rxflow_macro::test]
  fn late_subscribers_see_the_terminal_signal() {
    let Channel { source, sink } = channel::<i32, String>();
    sink.clone().error("closed".into());
    sink.complete();
    let (log, subscription) = logged(source.clone(), "late");
    assert_eq!(*log.borrow(), vec!["late error closed"]);
    assert!(subscription.is_closed());
    assert_eq!(source.subscriber_count(), 0);
  }

  #[rxflow_macro::test]
  fn failing_subscriber_does_not_affect_siblings() {
    let Channel { source, mut sink } = channel::<i32, String>();
    let errors = Rc::new(RefCell::new(vec![]));
    let e = errors.clone();
    source.clone().subscribe(
      FnObserver::new(|v: i32| if v == 2 { Err(format!("rejected {v}")) } else { Ok(()) })
        .on_error(move |err: String| e.borrow_mut().push(err)),
    );
    let (log, _subscription) = logged(source.clone(), "ok");

    for v in 1..=3 {
      let _ = sink.next(v);
    }
    assert_eq!(*errors.borrow(), vec!["rejected 2"]);
    assert_eq!(*log.borrow(), vec!["ok next 1", "ok next 2", "ok next 3"]);
    assert_eq!(source.subscriber_count(), 1);
  }

  #[rxflow_macro::test]
  fn feedback_through_the_sink_waits_its_turn() {
    let Channel { source, mut sink } = channel::<i32, String>();
    let seen = Rc::new(RefCell::new(vec![]));
    let (s, mut echo) = (seen.clone(), sink.clone());
    source.subscribe_next(move |v| {
      s.borrow_mut().push(v);
      if v < 3 {
        let _ = echo.next(v + 1);
      }
    });
    assert!(sink.next(1).is_ready());
    assert_eq!(*seen.borrow(), vec![1, 2, 3]);
  }

  #[rxflow_macro::test]
  fn unsubscribed_observers_leave_the_registry() {
    let Channel { source, mut sink } = channel::<i32, String>();
    let (log, subscription) = logged(source.clone(), "a");
    subscription.unsubscribe();
    assert_eq!(source.subscriber_count(), 0);
    let _ = sink.next(1);
    assert!(log.borrow().is_empty());
  }
}
