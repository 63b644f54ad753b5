//! Model Context Protocol bridging
//!
//! Body normalization, the single-slot session lifecycle, and the JSON-RPC
//! engine the dispatcher forwards envelopes to.

pub mod engine;
pub mod envelope;
pub mod rpc;
pub mod server;
pub mod session;
