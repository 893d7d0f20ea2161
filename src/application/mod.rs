//! Application layer: wires domain ports, SQLite adapters, and services
//! into a running butler instance, and drives its background task loops.

pub mod daemon;

pub use daemon::{Daemon, DaemonHandles};
