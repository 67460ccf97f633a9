//! Crate-level failures.
//!
//! Stream errors are generic over the `Err` parameter of each observable.
//! `RxError` covers the failures the engine itself can run into; operators
//! that can hit them require `Err: From<RxError>` so the failure travels the
//! `error` channel instead of being lost.

use futures::task::SpawnError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RxError {
  /// The scheduler refused to run a task, usually because its executor has
  /// shut down.
  #[error("failed to spawn task: {0}")]
  Spawn(String),

  /// An asynchronous producer panicked. The panic payload is kept when it
  /// is a string.
  #[error("producer panicked: {0}")]
  ProducerPanicked(String),
}

impl From<SpawnError> for RxError {
  fn from(err: SpawnError) -> Self { RxError::Spawn(err.to_string()) }
}

/// Unit errors keep no detail.
impl From<RxError> for () {
  fn from(_: RxError) -> Self {}
}

impl From<RxError> for String {
  fn from(err: RxError) -> Self { err.to_string() }
}

impl RxError {
  pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
    let msg = if let Some(s) = payload.downcast_ref::<&str>() {
      (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
      s.clone()
    } else {
      "non-string panic payload".to_string()
    };
    RxError::ProducerPanicked(msg)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[rxflow_macro::test]
  fn panic_payloads_are_kept() {
    let err = RxError::from_panic(Box::new("boom"));
    assert_eq!(err, RxError::ProducerPanicked("boom".into()));
    assert_eq!(err.to_string(), "producer panicked: boom");

    let err = RxError::from_panic(Box::new(String::from("owned")));
    assert_eq!(err, RxError::ProducerPanicked("owned".into()));

    let err = RxError::from_panic(Box::new(42));
    assert_eq!(err, RxError::ProducerPanicked("non-string panic payload".into()));
  }

  #[rxflow_macro::test]
  fn spawn_errors_convert() {
    let err: RxError = SpawnError::shutdown().into();
    assert!(matches!(err, RxError::Spawn(_)));
  }
}
