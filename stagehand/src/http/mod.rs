//! HTTP clients

pub mod client;
pub mod github;
pub mod platform;
