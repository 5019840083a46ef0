//! stagehand library
//!
//! Core modules for triggering and polling staging releases.

pub mod app;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod http;
pub mod logs;
pub mod models;
pub mod storage;
pub mod telemetry;
pub mod utils;
pub mod workers;
