//! Built-in services.
//!
//! Domain modules (library, repairs, payments, courses, shop) live outside
//! this crate and register themselves the same way at startup.

pub mod echo;

pub use echo::EchoService;
