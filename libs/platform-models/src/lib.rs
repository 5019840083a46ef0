//! Wire models shared by the stagehand deploy tool.

pub mod models;

pub use models::*;
