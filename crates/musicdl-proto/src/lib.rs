//! Shared model, wire protocol, configuration and persistence for the
//! musicdl client.

pub mod config;
pub mod history;
pub mod model;
pub mod platform;
pub mod protocol;
pub mod storage;
