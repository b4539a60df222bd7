//! Thin HTTP facade over the orchestrator's [`forge_orchestrator::JobFacade`].
//!
//! Carries no scheduling logic of its own: every route is a direct
//! translation of an HTTP verb/path onto a `JobFacade` call. No
//! authentication or TLS is layered on top.
//!
//! # Main types
//!
//! - [`GatewayServer`] — builds the `axum::Router` the binary serves.

/// Route handlers and the shared application state they close over.
pub mod router;
/// Gateway server builder.
pub mod server;

pub use server::GatewayServer;
