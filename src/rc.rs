//! Shared mutable cells for the single-threaded stream engine.
//!
//! Every piece of state that several observers or subscriptions need to see
//! lives in a [`MutRc`]. Borrows are always short: callers never hold one
//! across a call into user code or across an `.await`.

use std::{
  cell::{Ref, RefCell, RefMut},
  rc::{Rc, Weak},
};

pub trait RcDeref {
  type Target<'a>
  where
    Self: 'a;
  #[allow(clippy::needless_lifetimes)]
  fn rc_deref<'a>(&'a self) -> Self::Target<'a>;
}

pub trait RcDerefMut {
  type Target<'a>
  where
    Self: 'a;
  #[allow(clippy::needless_lifetimes)]
  fn rc_deref_mut<'a>(&'a self) -> Self::Target<'a>;
}

#[derive(Default)]
pub struct MutRc<T>(Rc<RefCell<T>>);

impl<T> MutRc<T> {
  pub fn own(t: T) -> Self { Self(Rc::new(RefCell::new(t))) }

  /// Returns true if both handles point at the same cell.
  #[inline]
  pub fn ptr_eq(&self, other: &Self) -> bool { Rc::ptr_eq(&self.0, &other.0) }

  /// A handle that does not keep the cell alive.
  #[inline]
  pub fn downgrade(&self) -> MutWeak<T> { MutWeak(Rc::downgrade(&self.0)) }
}

pub struct MutWeak<T>(Weak<RefCell<T>>);

impl<T> MutWeak<T> {
  #[inline]
  pub fn upgrade(&self) -> Option<MutRc<T>> { self.0.upgrade().map(MutRc) }
}

impl<T> Clone for MutWeak<T> {
  #[inline]
  fn clone(&self) -> Self { Self(self.0.clone()) }
}

impl<T> From<T> for MutRc<T> {
  #[inline]
  fn from(t: T) -> Self { Self::own(t) }
}

impl<T> RcDeref for MutRc<T> {
  type Target<'a>
    = Ref<'a, T>
  where
    Self: 'a;

  #[inline]
  #[allow(clippy::needless_lifetimes)]
  fn rc_deref<'a>(&'a self) -> Self::Target<'a> { self.0.borrow() }
}

impl<T> RcDerefMut for MutRc<T> {
  type Target<'a>
    = RefMut<'a, T>
  where
    Self: 'a;

  #[inline]
  #[allow(clippy::needless_lifetimes)]
  fn rc_deref_mut<'a>(&'a self) -> Self::Target<'a> { self.0.borrow_mut() }
}

impl<T> Clone for MutRc<T> {
  #[inline]
  fn clone(&self) -> Self { Self(self.0.clone()) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[rxflow_macro::test]
  fn clones_share_the_cell() {
    let a = MutRc::own(1);
    let b = a.clone();
    *b.rc_deref_mut() += 1;
    assert_eq!(*a.rc_deref(), 2);
    assert!(a.ptr_eq(&b));
    assert!(!a.ptr_eq(&MutRc::own(2)));
  }

  #[rxflow_macro::test]
  fn weak_handle_does_not_keep_the_cell() {
    let a = MutRc::own(1);
    let weak = a.downgrade();
    assert!(weak.upgrade().is_some_and(|b| b.ptr_eq(&a)));
    drop(a);
    assert!(weak.upgrade().is_none());
  }
}
