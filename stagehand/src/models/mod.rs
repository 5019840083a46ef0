//! Domain models

pub mod release;
