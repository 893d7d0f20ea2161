//! Application services: the execution-control plane's behavior, built on
//! top of the domain's ports and models.

pub mod approval_gate;
pub mod config;
pub mod executor;
pub mod identity_resolver;
pub mod module_registry;
pub mod notifier;
pub mod redaction;
pub mod scheduler;
pub mod switchboard;
pub mod worker_spawner;

pub use approval_gate::{ApprovalGate, GateError, GateOutcome, GateResult, GatedToolPolicy};
pub use config::{ButlerConfig, ConfigError, ConfigResult, NotificationsConfig, RouteConfig};
pub use executor::{Executor, ExecutorError, ExecutorResult};
pub use identity_resolver::IdentityResolver;
pub use module_registry::ModuleRegistry;
pub use notifier::{NotificationChannel, Notifier};
pub use scheduler::{Scheduler, ScheduleTrigger, SchedulerError, SchedulerResult};
pub use switchboard::{InboundEvent, RoutedTrigger, Switchboard, SwitchboardError, SwitchboardResult};
pub use worker_spawner::{SpawnError, SpawnOutcome, SpawnRequest, SpawnResult, WorkerSpawner, WorkerSpawnerConfig};
