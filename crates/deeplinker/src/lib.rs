//! Deeplinker: short links that open the app when installed and survive an
//! install round trip when not.
//!
//! The binary wires the pieces together; this library exposes the HTTP
//! application so it can be exercised in-process.

pub mod server;

pub use server::{app, router, serve, AppState};
