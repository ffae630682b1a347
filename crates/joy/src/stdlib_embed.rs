//! Embedded standard library.
//!
//! The base and aggregate libraries are compiled into the binary, so the
//! interpreter is self-contained. They load at evaluator startup, base
//! library first.

/// The libraries executed at startup, in load order.
pub fn startup_libraries() -> [(&'static str, &'static str); 2] {
    [
        ("inilib", include_str!("stdlib/inilib.joy")),
        ("agglib", include_str!("stdlib/agglib.joy")),
    ]
}
