#![forbid(unsafe_code)]

pub mod admission;
pub mod agents;
pub mod auth;
pub mod config;
pub mod dispatch;
pub mod errors;
pub mod models;
pub mod persistence;
pub mod registry;
pub mod rpc;
pub mod safety;
pub mod server;
pub mod streaming;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
