//! Deployment module

pub mod fsm;
pub mod report;
pub mod retry;
