//! Model Context Protocol (MCP) integration for Reltio.
//!
//! This module exposes the Reltio API to editors and agent hosts over stdio. The surface area
//! consists of:
//!
//! - Tools covering entities, potential matches, merges, relations, interactions, RDM lookups,
//!   users, activities and workflow tasks, plus `capabilities` and `health_check`.
//! - Resources: `reltio://health` and `reltio://settings`.
//!
//! Every tool answers with a `CallToolResult`; Reltio and validation failures travel inside it as
//! an error envelope so hosts can read the error code. Handlers, schemas, and formatting helpers
//! are kept in focused submodules to make tests and reviews small and targeted.

mod format;
mod handlers;
mod registry;
mod schemas;
mod server;

pub use server::ReltioMcpServer;
