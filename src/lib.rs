#![deny(missing_docs)]

//! Core library for the Reltio MCP server.

/// Best-effort activity logging to the tenant.
pub mod audit;
/// Environment-driven configuration management.
pub mod config;
/// Error taxonomy and the envelope returned to agents.
pub mod error;
/// Structured logging and tracing setup.
pub mod logging;
/// Model Context Protocol server implementation.
pub mod mcp;
/// Attribute and crosswalk normalization of Reltio payloads.
pub mod normalize;
/// Reltio REST client, authentication and URL building.
pub mod reltio;
/// Request validation combinators.
pub mod validation;
