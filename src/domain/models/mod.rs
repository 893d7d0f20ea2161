//! Domain models.
//!
//! Pure domain entities with business logic and validation rules. These
//! models are framework-agnostic and contain no infrastructure concerns.

pub mod approval;
pub mod contact;
pub mod inbox;
pub mod kv;
pub mod module;
pub mod schedule;
pub mod session;

pub use approval::{
    ActionStatus, ApprovalEvent, ApprovalEventType, ApprovalRule, ArgConstraint, ExecutionResult,
    PendingAction, RiskTier,
};
pub use contact::{Contact, ContactChannel, ResolvedIdentity, OWNER_ROLE};
pub use inbox::InboxRecord;
pub use kv::KvEntry;
pub use module::{ApprovalDefault, ToolDescriptor};
pub use schedule::{ScheduleRunResult, ScheduleSource, ScheduledTask};
pub use session::{Session, TriggerKind};
