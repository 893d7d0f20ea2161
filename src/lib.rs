//! Butler: an execution-control plane for per-operator "butler" daemons.
//!
//! A butler is a long-lived process hosting pluggable Modules behind an
//! Approval Gate, a cron/one-shot Scheduler, an inbound-event Switchboard,
//! and a Worker Spawner that launches short-lived LLM worker subprocesses.
//! This crate owns the control plane: state, approval semantics, and
//! lifecycle. Module business logic, the worker process itself, and the
//! Dashboard's presentation layer are out of scope.

pub mod adapters;
pub mod application;
pub mod cli;
pub mod dashboard;
pub mod domain;
pub mod services;
