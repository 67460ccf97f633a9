use crate::{
  error::RxError,
  observable::{create::create, Observable},
  subscriber::Subscriber,
};

/// Creates an observable that produces no values.
///
/// Completes immediately. Never emits an error.
///
/// # Examples
/// ```
/// use rxflow::prelude::*;
///
/// empty::<i32, ()>().subscribe_next(|v| println!("{v},"));
///
/// // Result: no thing printed
/// ```
pub fn empty<Item, Err>() -> impl Observable<Item = Item, Err = Err> + Clone
where
  Item: 'static,
  Err: From<RxError> + 'static,
{
  create(|subscriber: Subscriber<Item, Err>| subscriber.complete())
}

/// Creates an observable that never emits anything.
///
/// Neither emits a value, nor completes, nor emits an error.
pub fn never<Item, Err>() -> impl Observable<Item = Item, Err = Err> + Clone
where
  Item: 'static,
  Err: From<RxError> + 'static,
{
  create(|_: Subscriber<Item, Err>| ())
}

/// Creates an observable that emits no items, just terminates with an error.
///
/// # Arguments
///
/// * `err` - An error to emit and terminate with
pub fn throw_err<Item, Err>(err: Err) -> impl Observable<Item = Item, Err = Err> + Clone
where
  Item: 'static,
  Err: Clone + From<RxError> + 'static,
{
  create(move |subscriber: Subscriber<Item, Err>| subscriber.error(err.clone()))
}
