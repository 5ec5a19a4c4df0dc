//! Braid utilities.
//!
//! The workspace standardises on `parking_lot` locks; import them from here
//! so the choice is made in one place.

pub use parking_lot::{
    self, Condvar, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard,
};
