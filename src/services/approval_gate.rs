//! Approval Gate: intercepts gated tool invocations, decides auto-approve,
//! park, or reject, and carries the CAS-based state machine for
//! `PendingAction`.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::models::{
    ActionStatus, ApprovalEvent, ApprovalEventType, ApprovalRule, ArgConstraint, ExecutionResult,
    PendingAction, ResolvedIdentity, RiskTier,
};
use crate::domain::ports::{
    ActionFilter, ApprovalEventRepository, ApprovalRuleRepository, Clock, ContactChannelRepository,
    ContactRepository, PendingActionRepository, ToolHandler,
};
use crate::services::executor::Executor;
use crate::services::identity_resolver::IdentityResolver;
use crate::services::redaction::{is_sensitive_key, redact_text};

#[derive(Debug, Error)]
pub enum GateError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("rule does not satisfy the risk-tier invariant: high/critical rules need an exact-or-pattern constraint and a bound")]
    RiskInvariantViolation,
    #[error("no handler registered for tool {0}")]
    NoHandler(String),
}

pub type GateResult<T> = Result<T, GateError>;

/// Per-tool approval policy, sourced from `[modules.approvals.gated_tools]`.
#[derive(Debug, Clone)]
pub struct GatedToolPolicy {
    pub expiry_hours: Option<i64>,
    pub risk_tier: Option<RiskTier>,
}

/// Outcome of routing a tool call through the gate.
#[derive(Debug, Clone)]
pub enum GateOutcome {
    Ok(Value),
    PendingApproval { action_id: Uuid, message: String },
    Error { error: String, error_type: String },
}

pub struct ApprovalGate {
    actions: Arc<dyn PendingActionRepository>,
    rules: Arc<dyn ApprovalRuleRepository>,
    events: Arc<dyn ApprovalEventRepository>,
    contacts: Arc<dyn ContactRepository>,
    channels: Arc<dyn ContactChannelRepository>,
    clock: Arc<dyn Clock>,
    gated_tools: HashMap<String, GatedToolPolicy>,
    default_expiry_hours: i64,
    default_risk_tier: RiskTier,
    executor: Arc<Executor>,
}

impl ApprovalGate {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        actions: Arc<dyn PendingActionRepository>,
        rules: Arc<dyn ApprovalRuleRepository>,
        events: Arc<dyn ApprovalEventRepository>,
        contacts: Arc<dyn ContactRepository>,
        channels: Arc<dyn ContactChannelRepository>,
        clock: Arc<dyn Clock>,
        gated_tools: HashMap<String, GatedToolPolicy>,
        default_expiry_hours: i64,
        default_risk_tier: RiskTier,
        executor: Arc<Executor>,
    ) -> Self {
        Self { actions, rules, events, contacts, channels, clock, gated_tools, default_expiry_hours, default_risk_tier, executor }
    }

    pub fn is_gated(&self, tool_name: &str) -> bool {
        self.gated_tools.contains_key(tool_name)
    }

    fn effective_expiry(&self, tool_name: &str) -> chrono::Duration {
        let hours = self
            .gated_tools
            .get(tool_name)
            .and_then(|p| p.expiry_hours)
            .unwrap_or(self.default_expiry_hours);
        chrono::Duration::hours(hours)
    }

    fn effective_risk_tier(&self, tool_name: &str) -> RiskTier {
        self.gated_tools.get(tool_name).and_then(|p| p.risk_tier).unwrap_or(self.default_risk_tier)
    }

    /// Extract the target contact from a fixed-order set of argument shapes:
    /// explicit `contact_id`, `channel`+`recipient`, channel-specific
    /// `chat_id`, or `to` (email).
    async fn resolve_target(&self, args: &Value) -> Result<ResolvedIdentity, DomainError> {
        if let Some(id) = args.get("contact_id").and_then(Value::as_str) {
            if let Ok(uuid) = Uuid::parse_str(id) {
                if let Some(contact) = self.contacts.get(uuid).await? {
                    return Ok(if contact.is_owner() { ResolvedIdentity::Owner(contact) } else { ResolvedIdentity::Known(contact) });
                }
            }
            return Ok(ResolvedIdentity::Unresolvable);
        }

        let (channel_type, channel_value) = if let (Some(channel), Some(recipient)) =
            (args.get("channel").and_then(Value::as_str), args.get("recipient").and_then(Value::as_str))
        {
            (channel.to_string(), recipient.to_string())
        } else if let Some(chat_id) = args.get("chat_id").and_then(Value::as_str) {
            ("chat".to_string(), chat_id.to_string())
        } else if let Some(to) = args.get("to").and_then(Value::as_str) {
            ("email".to_string(), to.to_string())
        } else {
            return Ok(ResolvedIdentity::Unresolvable);
        };

        match self.channels.find_by_channel(&channel_type, &channel_value).await? {
            Some(binding) => match self.contacts.get(binding.contact_id).await? {
                Some(contact) if contact.is_owner() => Ok(ResolvedIdentity::Owner(contact)),
                Some(contact) => Ok(ResolvedIdentity::Known(contact)),
                None => Ok(ResolvedIdentity::Unresolvable),
            },
            None => Ok(ResolvedIdentity::Unresolvable),
        }
    }

    /// Sort candidate rules by deterministic precedence: specificity desc,
    /// bounded-before-unbounded, newer-before-older, rule_id tiebreak.
    fn rank_candidates(mut candidates: Vec<ApprovalRule>) -> Vec<ApprovalRule> {
        candidates.sort_by(|a, b| {
            b.specificity()
                .cmp(&a.specificity())
                .then_with(|| b.is_bounded().cmp(&a.is_bounded()))
                .then_with(|| b.created_at.cmp(&a.created_at))
                .then_with(|| a.rule_id.cmp(&b.rule_id))
        });
        candidates
    }

    async fn find_winning_rule(&self, tool_name: &str, args: &Value, now: DateTime<Utc>) -> Result<Option<ApprovalRule>, DomainError> {
        let candidates: Vec<ApprovalRule> = self
            .rules
            .candidates_for_tool(tool_name, now)
            .await?
            .into_iter()
            .filter(|r| r.is_usable(now) && r.matches_args(args))
            .collect();
        Ok(Self::rank_candidates(candidates).into_iter().next())
    }

    /// Route a tool call through the gate, dispatching to `handler` when
    /// execution proceeds inline (owner auto-approve or rule auto-approve).
    pub async fn dispatch(
        &self,
        tool_name: &str,
        args: Value,
        handler: Option<Arc<dyn ToolHandler>>,
        session_id: Option<Uuid>,
        agent_summary: Option<String>,
    ) -> GateResult<GateOutcome> {
        if !self.is_gated(tool_name) {
            return Ok(self.run_handler(tool_name, args, handler).await);
        }

        let now = self.clock.now();
        let identity = self.resolve_target(&args).await?;

        if identity.is_owner() {
            let outcome = self.run_handler(tool_name, args.clone(), handler).await;
            self.record_auto_approval(tool_name, &args, None, session_id, agent_summary, &outcome, now).await?;
            return Ok(outcome);
        }

        if let Some(rule) = self.find_winning_rule(tool_name, &args, now).await? {
            let outcome = self.run_handler(tool_name, args.clone(), handler).await;
            self.rules.increment_use_count(rule.rule_id).await?;
            self.record_auto_approval(tool_name, &args, Some(rule.rule_id), session_id, agent_summary, &outcome, now)
                .await?;
            return Ok(outcome);
        }

        let risk_tier = self.effective_risk_tier(tool_name);
        let expires_at = now + self.effective_expiry(tool_name);
        // tool_args are kept unredacted here: the Executor needs the exact
        // arguments to run the action once approved. Redaction is applied
        // when these fields are surfaced in logs, events, or the dashboard.
        let agent_summary = agent_summary.map(|s| redact_text(&s));
        let action = PendingAction::new_pending(tool_name, args.clone(), expires_at, risk_tier, session_id, agent_summary);
        self.actions.create(&action).await?;
        self.events
            .append(&ApprovalEvent::new(ApprovalEventType::ActionQueued, Some(action.action_id), None, "system", None))
            .await?;

        Ok(GateOutcome::PendingApproval {
            action_id: action.action_id,
            message: format!("{tool_name} requires approval before it runs"),
        })
    }

    async fn run_handler(&self, tool_name: &str, args: Value, handler: Option<Arc<dyn ToolHandler>>) -> GateOutcome {
        let Some(handler) = handler else {
            return GateOutcome::Error { error: format!("no handler for {tool_name}"), error_type: "no_handler".to_string() };
        };
        match handler.call(args).await {
            Ok(value) => GateOutcome::Ok(value),
            Err(e) => GateOutcome::Error { error: e.to_string(), error_type: "execution_failed".to_string() },
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn record_auto_approval(
        &self,
        tool_name: &str,
        args: &Value,
        rule_id: Option<Uuid>,
        session_id: Option<Uuid>,
        agent_summary: Option<String>,
        outcome: &GateOutcome,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let risk_tier = self.effective_risk_tier(tool_name);
        let result = match outcome {
            GateOutcome::Ok(v) => ExecutionResult::success(v.clone()),
            GateOutcome::Error { error, .. } => ExecutionResult::failure(error.clone()),
            GateOutcome::PendingApproval { .. } => unreachable!("auto-approval path never parks"),
        };

        let agent_summary = agent_summary.map(|s| redact_text(&s));
        let action = PendingAction {
            status: ActionStatus::Executed,
            decided_by: Some("system".to_string()),
            decided_at: Some(now),
            execution_result: Some(result.clone()),
            rule_id,
            ..PendingAction::new_pending(tool_name, args.clone(), now, risk_tier, session_id, agent_summary)
        };
        self.actions.create(&action).await?;

        let event_type = ApprovalEventType::AutoApproved;
        self.events
            .append(&ApprovalEvent::new(event_type, Some(action.action_id), rule_id, "system", None))
            .await?;
        let exec_event = if result.success { ApprovalEventType::ExecutionSucceeded } else { ApprovalEventType::ExecutionFailed };
        self.events
            .append(&ApprovalEvent::new(exec_event, Some(action.action_id), rule_id, "system", result.error.clone()))
            .await?;
        Ok(())
    }

    /// CAS `pending -> approved`, idempotent on an already-terminal action.
    pub async fn approve(&self, action_id: Uuid, actor: &str, reason: Option<String>) -> GateResult<ActionStatus> {
        let Some(action) = self.actions.get(action_id).await? else {
            return Err(DomainError::ActionNotFound(action_id).into());
        };
        if action.status.is_terminal() {
            return Ok(action.status);
        }
        let now = self.clock.now();
        let transitioned = self
            .actions
            .cas_status(action_id, ActionStatus::Pending, ActionStatus::Approved, Some(actor), Some(now))
            .await?;
        if transitioned {
            self.events
                .append(&ApprovalEvent::new(ApprovalEventType::Approved, Some(action_id), action.rule_id, actor, reason))
                .await?;
            if let Err(e) = self.executor.execute(action_id).await {
                warn!(action_id = %action_id, error = %e, "execution after approval failed, left for reconciliation");
            }
            Ok(ActionStatus::Approved)
        } else {
            let current = self.actions.get(action_id).await?.ok_or(DomainError::ActionNotFound(action_id))?;
            Ok(current.status)
        }
    }

    /// CAS `pending -> rejected`.
    pub async fn reject(&self, action_id: Uuid, actor: &str, reason: Option<String>) -> GateResult<ActionStatus> {
        let Some(action) = self.actions.get(action_id).await? else {
            return Err(DomainError::ActionNotFound(action_id).into());
        };
        if action.status.is_terminal() {
            return Ok(action.status);
        }
        let now = self.clock.now();
        let transitioned = self
            .actions
            .cas_status(action_id, ActionStatus::Pending, ActionStatus::Rejected, Some(actor), Some(now))
            .await?;
        if transitioned {
            self.events
                .append(&ApprovalEvent::new(ApprovalEventType::Rejected, Some(action_id), action.rule_id, actor, reason))
                .await?;
            Ok(ActionStatus::Rejected)
        } else {
            let current = self.actions.get(action_id).await?.ok_or(DomainError::ActionNotFound(action_id))?;
            Ok(current.status)
        }
    }

    /// Batch-approve is sugar over per-item CAS; partial failure of one item
    /// never rolls back another.
    pub async fn approve_batch(&self, action_ids: &[Uuid], actor: &str) -> Vec<(Uuid, GateResult<ActionStatus>)> {
        let mut results = Vec::with_capacity(action_ids.len());
        for &id in action_ids {
            results.push((id, self.approve(id, actor, None).await));
        }
        results
    }

    pub async fn reject_batch(&self, action_ids: &[Uuid], actor: &str) -> Vec<(Uuid, GateResult<ActionStatus>)> {
        let mut results = Vec::with_capacity(action_ids.len());
        for &id in action_ids {
            results.push((id, self.reject(id, actor, None).await));
        }
        results
    }

    /// Scan pending actions past expiry and CAS each to `expired`.
    pub async fn expire_stale(&self, now: DateTime<Utc>) -> GateResult<usize> {
        let expired = self.actions.list_expired(now).await?;
        let mut count = 0;
        for action in expired {
            let transitioned = self
                .actions
                .cas_status(action.action_id, ActionStatus::Pending, ActionStatus::Expired, None, Some(now))
                .await?;
            if transitioned {
                self.events
                    .append(&ApprovalEvent::new(ApprovalEventType::Expired, Some(action.action_id), action.rule_id, "system", None))
                    .await?;
                count += 1;
            }
        }
        Ok(count)
    }

    /// Validate and persist an operator-declared rule.
    pub async fn create_rule(&self, mut rule: ApprovalRule, actor: &str) -> GateResult<ApprovalRule> {
        if !rule.satisfies_risk_invariant() {
            return Err(GateError::RiskInvariantViolation);
        }
        rule.created_at = self.clock.now();
        self.rules.create(&rule).await?;
        self.events
            .append(&ApprovalEvent::new(ApprovalEventType::RuleCreated, None, Some(rule.rule_id), actor, None))
            .await?;
        Ok(rule)
    }

    /// Build a rule from a decided action, applying sensitivity heuristics:
    /// sensitive-named args become `exact` constraints, everything else
    /// becomes `any`.
    pub async fn create_rule_from_action(&self, action_id: Uuid, actor: &str) -> GateResult<ApprovalRule> {
        let action = self.actions.get(action_id).await?.ok_or(DomainError::ActionNotFound(action_id))?;
        let mut constraints = HashMap::new();
        if let Value::Object(map) = &action.tool_args {
            for (key, value) in map {
                let constraint =
                    if is_sensitive_key(key) { ArgConstraint::Exact { v: value.clone() } } else { ArgConstraint::Any };
                constraints.insert(key.clone(), constraint);
            }
        }

        let rule = ApprovalRule {
            rule_id: Uuid::new_v4(),
            tool_name: action.tool_name.clone(),
            arg_constraints: constraints,
            description: format!("Auto-derived from action {action_id}"),
            created_at: self.clock.now(),
            active: true,
            expires_at: if action.risk_tier.requires_bounded_rule() { Some(self.clock.now() + chrono::Duration::days(30)) } else { None },
            max_uses: None,
            use_count: 0,
            risk_tier: action.risk_tier,
            created_from_action_id: Some(action_id),
        };

        self.create_rule(rule, actor).await
    }

    pub async fn revoke_rule(&self, rule_id: Uuid, actor: &str) -> GateResult<()> {
        self.rules.set_active(rule_id, false).await?;
        self.events
            .append(&ApprovalEvent::new(ApprovalEventType::RuleRevoked, None, Some(rule_id), actor, None))
            .await?;
        Ok(())
    }

    pub async fn list_executed(&self, filter: ActionFilter) -> GateResult<Vec<PendingAction>> {
        Ok(self.actions.list(filter).await?)
    }

    pub async fn list_rules(&self) -> GateResult<Vec<ApprovalRule>> {
        Ok(self.rules.list().await?)
    }

    /// At startup: find `approved` rows with no persisted `execution_result`
    /// and flag them for operator reconciliation.
    pub async fn reconcile_unfinished(&self) -> GateResult<usize> {
        let unreconciled = self.actions.list_unreconciled().await?;
        for action in &unreconciled {
            self.actions.mark_needs_reconciliation(action.action_id).await?;
        }
        Ok(unreconciled.len())
    }
}
