//! Port traits: the inward-facing boundary the domain exposes for adapters
//! to implement and services to depend on.

pub mod approval_event_repository;
pub mod approval_rule_repository;
pub mod clock;
pub mod contact_repository;
pub mod inbox_repository;
pub mod kv_store;
pub mod module;
pub mod pending_action_repository;
pub mod scheduled_task_repository;
pub mod session_repository;
pub mod tool_registry;

pub use approval_event_repository::ApprovalEventRepository;
pub use approval_rule_repository::ApprovalRuleRepository;
pub use clock::{Clock, FixedClock, SystemClock};
pub use contact_repository::{ContactChannelRepository, ContactRepository};
pub use inbox_repository::InboxRepository;
pub use kv_store::KvStore;
pub use module::{Module, ToolHandler, ToolOutcome};
pub use pending_action_repository::{ActionFilter, PendingActionRepository};
pub use scheduled_task_repository::ScheduledTaskRepository;
pub use session_repository::SessionRepository;
pub use tool_registry::ModuleRegistryLookup;
