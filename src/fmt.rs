//! # Logging Shim
//!
//! Crate-internal logging macros. On the target they forward to `defmt`
//! (shipped over RTT); on the host they only borrow their arguments so the
//! unit tests link without a global defmt logger.
//!
//! Format strings follow defmt syntax, e.g. `{=u32}` and `{}` for types
//! implementing `defmt::Format`.

#![allow(unused_macros)]

macro_rules! trace {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{
        #[cfg(target_os = "none")]
        ::defmt::trace!($fmt $(, $arg)*);
        #[cfg(not(target_os = "none"))]
        {
            $( let _ = &$arg; )*
        }
    }};
}

macro_rules! debug {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{
        #[cfg(target_os = "none")]
        ::defmt::debug!($fmt $(, $arg)*);
        #[cfg(not(target_os = "none"))]
        {
            $( let _ = &$arg; )*
        }
    }};
}

macro_rules! info {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{
        #[cfg(target_os = "none")]
        ::defmt::info!($fmt $(, $arg)*);
        #[cfg(not(target_os = "none"))]
        {
            $( let _ = &$arg; )*
        }
    }};
}

macro_rules! warn {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{
        #[cfg(target_os = "none")]
        ::defmt::warn!($fmt $(, $arg)*);
        #[cfg(not(target_os = "none"))]
        {
            $( let _ = &$arg; )*
        }
    }};
}

macro_rules! error {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{
        #[cfg(target_os = "none")]
        ::defmt::error!($fmt $(, $arg)*);
        #[cfg(not(target_os = "none"))]
        {
            $( let _ = &$arg; )*
        }
    }};
}
