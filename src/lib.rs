//! agendum: team task-scheduling backend with bearer-token sessions and
//! team-admin authorization.

pub mod config;
pub mod error;
pub mod identity;
pub mod models;
pub mod server;
pub mod storage;
