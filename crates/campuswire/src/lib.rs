//! Top-level facade crate for campuswire.
//!
//! Re-exports the protocol core, the server library, and the client façade
//! so users can depend on a single crate.

pub mod core {
    pub use campuswire_core::*;
}

pub mod server {
    pub use campuswire_server::*;
}

pub mod client {
    pub use campuswire_client::*;
}
