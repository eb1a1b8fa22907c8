/// Smart campus sensor dashboard core
///
/// Accounts and permissions, sessions, sensor feeds from the time-series
/// database, data freshness, and the JSON API that serves them.
pub mod account;
pub mod api;
pub mod audit;
pub mod auth;
pub mod config;
pub mod context;
pub mod error;
pub mod feeds;
pub mod freshness;
pub mod rate_limit;
pub mod sensors;
pub mod server;
pub mod session;

pub use config::DashboardConfig;
pub use context::AppContext;
pub use error::{DashboardError, DashboardResult};
