//! SQL Studio Gateway Library
//!
//! A read-only gateway for SQL practice: learner queries are checked against
//! a keyword and pattern policy, run on a bounded session pool under a
//! statement budget, and recorded as attempt telemetry.

pub mod assignments;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod models;
pub mod transport;

pub use config::Config;
pub use error::{GatewayError, GatewayResult};
pub use gateway::QueryGateway;
