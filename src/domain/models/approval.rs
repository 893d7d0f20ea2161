//! Approval gate domain models: pending actions, standing rules, and the
//! immutable audit event stream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Risk classification carried by rules and parked actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskTier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }

    /// Whether this tier requires the constraint-specificity + bounded-scope
    /// invariant on any rule that carries it.
    pub fn requires_bounded_rule(self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }
}

/// Status of a `PendingAction` in the approval pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
    Executed,
}

impl ActionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
            Self::Executed => "executed",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "expired" => Some(Self::Expired),
            "executed" => Some(Self::Executed),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Rejected | Self::Expired | Self::Executed)
    }

    /// Valid transitions from this status, per spec's state machine.
    pub fn valid_transitions(self) -> &'static [ActionStatus] {
        match self {
            Self::Pending => &[Self::Approved, Self::Rejected, Self::Expired],
            Self::Approved => &[Self::Executed],
            Self::Rejected | Self::Expired | Self::Executed => &[],
        }
    }

    pub fn can_transition_to(self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }
}

/// Result of running an approved action, persisted atomically with the
/// `approved -> executed` transition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionResult {
    pub success: bool,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub executed_at: DateTime<Utc>,
}

impl ExecutionResult {
    pub fn success(result: Value) -> Self {
        Self { success: true, result: Some(result), error: None, executed_at: Utc::now() }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self { success: false, result: None, error: Some(error.into()), executed_at: Utc::now() }
    }
}

/// An intercepted tool invocation awaiting (or past) a human decision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingAction {
    pub action_id: Uuid,
    pub tool_name: String,
    pub tool_args: Value,
    pub status: ActionStatus,
    pub requested_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub decided_by: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    pub execution_result: Option<ExecutionResult>,
    /// Set when an `ApprovalRule` auto-approved this action.
    pub rule_id: Option<Uuid>,
    pub agent_summary: Option<String>,
    pub session_id: Option<Uuid>,
    pub risk_tier: RiskTier,
    /// Set on restart when this action is `approved` but no `execution_result`
    /// was observed to persist (daemon crash between dispatch and completion).
    pub needs_reconciliation: bool,
}

impl PendingAction {
    pub fn new_pending(
        tool_name: impl Into<String>,
        tool_args: Value,
        expires_at: DateTime<Utc>,
        risk_tier: RiskTier,
        session_id: Option<Uuid>,
        agent_summary: Option<String>,
    ) -> Self {
        Self {
            action_id: Uuid::new_v4(),
            tool_name: tool_name.into(),
            tool_args,
            status: ActionStatus::Pending,
            requested_at: Utc::now(),
            expires_at,
            decided_by: None,
            decided_at: None,
            execution_result: None,
            rule_id: None,
            agent_summary,
            session_id,
            risk_tier,
            needs_reconciliation: false,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Matcher for a single tool argument carried by an `ApprovalRule`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind")]
pub enum ArgConstraint {
    #[serde(rename = "exact")]
    Exact { v: Value },
    #[serde(rename = "pattern")]
    Pattern { regex: String },
    #[serde(rename = "any")]
    Any,
}

/// Accepts both the tagged `{kind, ...}` shape and the legacy bare-value
/// forms named in §4.1: the literal string `"*"` deserializes to `Any`,
/// and any other scalar (`"555"`, `true`, `7`) deserializes to `Exact`.
impl<'de> Deserialize<'de> for ArgConstraint {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(tag = "kind")]
        enum Tagged {
            #[serde(rename = "exact")]
            Exact { v: Value },
            #[serde(rename = "pattern")]
            Pattern { regex: String },
            #[serde(rename = "any")]
            Any,
        }

        let value = Value::deserialize(deserializer)?;
        if value.get("kind").is_some() {
            return serde_json::from_value(value).map(|tagged| match tagged {
                Tagged::Exact { v } => Self::Exact { v },
                Tagged::Pattern { regex } => Self::Pattern { regex },
                Tagged::Any => Self::Any,
            }).map_err(serde::de::Error::custom);
        }
        if matches!(&value, Value::String(s) if s == "*") {
            return Ok(Self::Any);
        }
        Ok(Self::Exact { v: value })
    }
}

impl ArgConstraint {
    /// Specificity score used in rule precedence ordering: exact=3, pattern=2, any=0.
    pub fn specificity(&self) -> u32 {
        match self {
            Self::Exact { .. } => 3,
            Self::Pattern { .. } => 2,
            Self::Any => 0,
        }
    }

    pub fn matches(&self, value: Option<&Value>) -> bool {
        match self {
            Self::Any => true,
            Self::Exact { v } => value == Some(v),
            Self::Pattern { regex } => {
                let Some(value) = value.and_then(Value::as_str) else { return false };
                regex::Regex::new(regex).is_ok_and(|re| re.is_match(value))
            }
        }
    }
}

/// An operator-declared auto-approval pattern over `(tool_name, arg_constraints)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApprovalRule {
    pub rule_id: Uuid,
    pub tool_name: String,
    /// Keyed per-argument constraint. An empty map matches any invocation.
    pub arg_constraints: HashMap<String, ArgConstraint>,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub max_uses: Option<u64>,
    pub use_count: u64,
    pub risk_tier: RiskTier,
    pub created_from_action_id: Option<Uuid>,
}

impl ApprovalRule {
    /// Total specificity across all constraints; used as the primary
    /// precedence key. Sum over constraints of exact=3, pattern=2, any=0.
    pub fn specificity(&self) -> u32 {
        self.arg_constraints.values().map(ArgConstraint::specificity).sum()
    }

    pub fn has_exact_or_pattern(&self) -> bool {
        self.arg_constraints.values().any(|c| !matches!(c, ArgConstraint::Any))
    }

    pub fn is_bounded(&self) -> bool {
        self.expires_at.is_some() || self.max_uses.is_some()
    }

    /// The risk-tier invariant: high/critical rules must have at least one
    /// exact-or-pattern constraint, and at least one of expires_at/max_uses.
    pub fn satisfies_risk_invariant(&self) -> bool {
        if self.risk_tier.requires_bounded_rule() {
            self.has_exact_or_pattern() && self.is_bounded()
        } else {
            true
        }
    }

    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.active
            && self.expires_at.is_none_or(|exp| exp > now)
            && self.max_uses.is_none_or(|max| self.use_count < max)
    }

    pub fn matches_args(&self, args: &Value) -> bool {
        self.arg_constraints.iter().all(|(key, constraint)| constraint.matches(args.get(key)))
    }
}

/// An immutable entry in the approval audit stream. Insert-only; UPDATE and
/// DELETE are rejected at the schema level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalEventType {
    ActionQueued,
    AutoApproved,
    Approved,
    Rejected,
    Expired,
    ExecutionSucceeded,
    ExecutionFailed,
    RuleCreated,
    RuleRevoked,
}

impl ApprovalEventType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ActionQueued => "action_queued",
            Self::AutoApproved => "auto_approved",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
            Self::ExecutionSucceeded => "execution_succeeded",
            Self::ExecutionFailed => "execution_failed",
            Self::RuleCreated => "rule_created",
            Self::RuleRevoked => "rule_revoked",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "action_queued" => Some(Self::ActionQueued),
            "auto_approved" => Some(Self::AutoApproved),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "expired" => Some(Self::Expired),
            "execution_succeeded" => Some(Self::ExecutionSucceeded),
            "execution_failed" => Some(Self::ExecutionFailed),
            "rule_created" => Some(Self::RuleCreated),
            "rule_revoked" => Some(Self::RuleRevoked),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApprovalEvent {
    pub event_id: Uuid,
    pub event_type: ApprovalEventType,
    pub action_id: Option<Uuid>,
    pub rule_id: Option<Uuid>,
    pub actor: String,
    pub occurred_at: DateTime<Utc>,
    pub reason: Option<String>,
    pub payload_metadata: Value,
}

impl ApprovalEvent {
    pub fn new(
        event_type: ApprovalEventType,
        action_id: Option<Uuid>,
        rule_id: Option<Uuid>,
        actor: impl Into<String>,
        reason: Option<String>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_type,
            action_id,
            rule_id,
            actor: actor.into(),
            occurred_at: Utc::now(),
            reason,
            payload_metadata: Value::Object(Default::default()),
        }
    }
}
