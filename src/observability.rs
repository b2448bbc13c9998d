//! Backend selection for the crate's logging macros, re-exported by the prelude as `debug!`,
//! `info!` and `warn!`.
//!
//! With the `tracing` feature events go to `tracing`. Otherwise, with `logging`, they go to
//! `log`. With neither feature the arguments are still type-checked and then discarded.

macro_rules! emit {
    ($level:ident, $($arg:tt)+) => {{
        #[cfg(feature = "tracing")]
        {
            ::tracing::$level!($($arg)+);
        }
        #[cfg(all(feature = "logging", not(feature = "tracing")))]
        {
            ::log::$level!($($arg)+);
        }
        #[cfg(not(any(feature = "tracing", feature = "logging")))]
        {
            let _ = format_args!($($arg)+);
        }
    }};
}

#[allow(unused_macros)]
macro_rules! log_debug {
    ($($arg:tt)+) => {
        $crate::observability::emit!(debug, $($arg)+)
    };
}

#[allow(unused_macros)]
macro_rules! log_info {
    ($($arg:tt)+) => {
        $crate::observability::emit!(info, $($arg)+)
    };
}

#[allow(unused_macros)]
macro_rules! log_warn {
    ($($arg:tt)+) => {
        $crate::observability::emit!(warn, $($arg)+)
    };
}

pub(crate) use {emit, log_debug, log_info, log_warn};
