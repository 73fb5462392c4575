//! Reltio REST API integration.

pub mod auth;
pub mod client;
pub mod types;

pub use auth::{AccessTokenSource, ClientCredentialsSource, StaticToken};
pub use client::{ApiCall, ReltioClient};
pub use types::ReltioError;
