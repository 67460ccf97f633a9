//! Operators. Each lives in its own module as an `XxxOp` observable paired
//! with the observer it installs upstream; they are reached through
//! [`ObservableExt`](crate::observable::ObservableExt).

pub mod cumulate;
pub mod delay;
pub mod distinct;
pub mod filter;
pub mod map;
pub mod merge;
pub mod switch_map;

pub use merge::merge;
