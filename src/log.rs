//! Crate logging, every record is sent with the `fournil` target.
//!
//! Without the `log` feature the macros expand to nothing, so variables only read by a log call
//! are named with a leading underscore.
#![allow(unused, reason = "not every level is used")]

macro_rules! emit {
    ($level:ident, $($tt:tt)*) => {
        #[cfg(feature = "log")]
        ::log::$level!(target: "fournil", $($tt)*);
    };
}

macro_rules! info {
    ($($tt:tt)*) => { $crate::log::emit!(info, $($tt)*) };
}

macro_rules! debug {
    ($($tt:tt)*) => { $crate::log::emit!(debug, $($tt)*) };
}

macro_rules! warning {
    ($($tt:tt)*) => { $crate::log::emit!(warn, $($tt)*) };
}

macro_rules! error {
    ($($tt:tt)*) => { $crate::log::emit!(error, $($tt)*) };
}

pub(crate) use {debug, emit, error, info, warning};
