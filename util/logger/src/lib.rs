//! The logger facade for the braid workspace.
//!
//! Crates log through these macros rather than through `log` directly, so the
//! backing implementation can be swapped without touching call sites.

pub use log::{self as internal, Level, SetLoggerError};

#[macro_export]
macro_rules! trace {
    ($( $args:tt )*) => {
        $crate::internal::trace!($( $args )*);
    }
}

#[macro_export]
macro_rules! debug {
    ($( $args:tt )*) => {
        $crate::internal::debug!($( $args )*);
    }
}

#[macro_export]
macro_rules! info {
    ($( $args:tt )*) => {
        $crate::internal::info!($( $args )*);
    }
}

#[macro_export]
macro_rules! warn {
    ($( $args:tt )*) => {
        $crate::internal::warn!($( $args )*);
    }
}

#[macro_export]
macro_rules! error {
    ($( $args:tt )*) => {
        $crate::internal::error!($( $args )*);
    }
}
