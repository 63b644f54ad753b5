//! HTTP transport layer for the Model Context Protocol bridge
//!
//! Provides the method-polymorphic `/mcp` handler and the response sink the
//! protocol engine writes into.

pub mod handlers;
pub mod writer;
