//! Prelude module for convenient imports
//!
//! This module re-exports commonly used types and traits for easy access.

// Channels
pub use crate::channel::{channel, duplex, Channel, ChannelSink, ChannelSource, Duplex};
// Errors
pub use crate::error::RxError;
// Core traits and sources
pub use crate::observable::{
  create, create_async, empty, from_iter, interval, never, of, throw_err, try_create,
  BoxedObservable, Observable, ObservableExt,
};
// Observer side
pub use crate::observer::{Ack, BoxedObserver, FnObserver, IntoAck, Noop, Observer, SharedObserver};
// Operators
pub use crate::ops::{merge, switch_map::SwitchMapOp};
// Ordering queue
pub use crate::queue::{queued, Queue};
// Scheduler core types
pub use crate::scheduler::{Duration, FrameClock, Scheduler, SleepProvider, TaskHandle};
// Subscriptions
pub use crate::{
  subscriber::Subscriber,
  subscription::{ClosureSubscription, Subscription, SubscriptionGuard, SubscriptionLike},
};
