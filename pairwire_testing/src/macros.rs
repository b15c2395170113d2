//! Assertion macros for driver-based tests.

/// Await a driver request and panic with the call site on failure.
#[macro_export]
macro_rules! request_expect {
    ($fut:expr) => {{
        $fut.await
            .expect(concat!("driver request failed at ", file!(), ":", line!()))
    }};
    ($fut:expr, $msg:expr) => {{
        let m = ::std::format!("{msg} at {}:{}", file!(), line!(), msg = $msg);
        $fut.await.expect(&m)
    }};
}

/// Await the next inbox message, panicking if the inbox closed.
#[macro_export]
macro_rules! recv_expect {
    ($fut:expr) => {{
        $fut.await
            .expect(concat!("inbox closed at ", file!(), ":", line!()))
    }};
}

pub use crate::{recv_expect, request_expect};
