//! Domain layer: models and port traits, free of any I/O.

pub mod errors;
pub mod models;
pub mod ports;
