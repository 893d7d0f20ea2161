//! Integration tests for the approval gate's CAS state machine, rule
//! auto-approval, and expiry sweep, against a real migrated SQLite pool.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use butler::adapters::sqlite::{
    create_migrated_test_pool, SqliteApprovalEventRepository, SqliteApprovalRuleRepository,
    SqliteContactChannelRepository, SqliteContactRepository, SqlitePendingActionRepository,
};
use butler::domain::errors::DomainResult;
use butler::domain::models::{ActionStatus, ApprovalRule, ArgConstraint, Contact, PendingAction, RiskTier};
use butler::domain::ports::{ActionFilter, Clock, FixedClock, PendingActionRepository, ToolHandler};
use butler::services::{ApprovalGate, Executor, GateOutcome, ModuleRegistry};

struct EchoHandler;

#[async_trait]
impl ToolHandler for EchoHandler {
    async fn call(&self, args: serde_json::Value) -> DomainResult<serde_json::Value> {
        Ok(args)
    }
}

async fn gate_with_owner(clock: Arc<dyn Clock>) -> (ApprovalGate, Contact, Arc<SqlitePendingActionRepository>) {
    let pool = create_migrated_test_pool().await.expect("migrated pool");
    let contacts = Arc::new(SqliteContactRepository::new(pool.clone()));
    let channels = Arc::new(SqliteContactChannelRepository::new(pool.clone()));
    let actions = Arc::new(SqlitePendingActionRepository::new(pool.clone()));
    let rules = Arc::new(SqliteApprovalRuleRepository::new(pool.clone()));
    let events = Arc::new(SqliteApprovalEventRepository::new(pool.clone()));

    let owner = Contact::new_owner("Operator");
    butler::domain::ports::ContactRepository::create(contacts.as_ref(), &owner).await.unwrap();

    let mut gated = HashMap::new();
    gated.insert("send_message".to_string(), butler::services::GatedToolPolicy { expiry_hours: Some(1), risk_tier: None });

    let registry = ModuleRegistry::load(Vec::new()).await.unwrap();
    let registry_lookup: Arc<dyn butler::domain::ports::ModuleRegistryLookup> = Arc::new(registry);
    let executor = Arc::new(Executor::new(actions.clone(), events.clone(), registry_lookup));

    let gate =
        ApprovalGate::new(actions.clone(), rules, events, contacts, channels, clock, gated, 24, RiskTier::Medium, executor);
    (gate, owner, actions)
}

#[tokio::test]
async fn owner_requests_auto_approve_and_record_event() {
    let clock: Arc<dyn Clock> = Arc::new(FixedClock(Utc::now()));
    let (gate, owner, _actions) = gate_with_owner(clock).await;

    let args = json!({"contact_id": owner.contact_id.to_string(), "text": "hi"});
    let outcome = gate
        .dispatch("send_message", args, Some(Arc::new(EchoHandler)), None, None)
        .await
        .unwrap();

    match outcome {
        GateOutcome::Ok(v) => assert_eq!(v["text"], "hi"),
        other => panic!("expected Ok outcome, got {other:?}"),
    }

    let executed = gate.list_executed(ActionFilter { status: Some(ActionStatus::Executed), ..Default::default() }).await.unwrap();
    assert_eq!(executed.len(), 1);
    assert_eq!(executed[0].decided_by.as_deref(), Some("system"));
}

#[tokio::test]
async fn unknown_sender_parks_pending_approval_then_can_be_approved() {
    let clock: Arc<dyn Clock> = Arc::new(FixedClock(Utc::now()));
    let (gate, _owner, _actions) = gate_with_owner(clock).await;

    let args = json!({"channel": "telegram", "recipient": "999", "text": "hello"});
    let outcome = gate.dispatch("send_message", args, Some(Arc::new(EchoHandler)), None, None).await.unwrap();

    let action_id = match outcome {
        GateOutcome::PendingApproval { action_id, .. } => action_id,
        other => panic!("expected PendingApproval, got {other:?}"),
    };

    let status = gate.approve(action_id, "operator", Some("looks fine".to_string())).await.unwrap();
    assert_eq!(status, ActionStatus::Approved);

    // Second approve on an already-terminal-bound action is idempotent: it
    // stays Approved rather than erroring or double-recording the event.
    let status_again = gate.approve(action_id, "operator", None).await.unwrap();
    assert_eq!(status_again, ActionStatus::Approved);
}

#[tokio::test]
async fn double_approve_race_converges_to_one_terminal_state() {
    let clock: Arc<dyn Clock> = Arc::new(FixedClock(Utc::now()));
    let (gate, _owner, _actions) = gate_with_owner(clock).await;
    let gate = Arc::new(gate);

    let args = json!({"channel": "telegram", "recipient": "123", "text": "race"});
    let outcome = gate.dispatch("send_message", args, Some(Arc::new(EchoHandler)), None, None).await.unwrap();
    let action_id = match outcome {
        GateOutcome::PendingApproval { action_id, .. } => action_id,
        other => panic!("expected PendingApproval, got {other:?}"),
    };

    let a = gate.clone();
    let b = gate.clone();
    let (r1, r2) = tokio::join!(
        tokio::spawn(async move { a.approve(action_id, "alice", None).await }),
        tokio::spawn(async move { b.reject(action_id, "bob", None).await }),
    );

    let r1 = r1.unwrap().unwrap();
    let r2 = r2.unwrap().unwrap();
    // Exactly one of the two CAS attempts wins; both callers observe the
    // same terminal status either way.
    assert_eq!(r1, r2);
    assert!(matches!(r1, ActionStatus::Approved | ActionStatus::Rejected));
}

#[tokio::test]
async fn active_rule_auto_approves_without_parking() {
    let clock: Arc<dyn Clock> = Arc::new(FixedClock(Utc::now()));
    let (gate, _owner, _actions) = gate_with_owner(clock).await;

    let mut constraints = HashMap::new();
    constraints.insert("recipient".to_string(), ArgConstraint::Exact { v: json!("555") });
    let rule = ApprovalRule {
        rule_id: Uuid::new_v4(),
        tool_name: "send_message".to_string(),
        arg_constraints: constraints,
        description: "always allow 555".to_string(),
        created_at: Utc::now(),
        active: true,
        expires_at: Some(Utc::now() + Duration::days(1)),
        max_uses: None,
        use_count: 0,
        risk_tier: RiskTier::Medium,
        created_from_action_id: None,
    };
    gate.create_rule(rule, "operator").await.unwrap();

    let args = json!({"channel": "telegram", "recipient": "555", "text": "hi"});
    let outcome = gate.dispatch("send_message", args, Some(Arc::new(EchoHandler)), None, None).await.unwrap();
    assert!(matches!(outcome, GateOutcome::Ok(_)));
}

#[tokio::test]
async fn high_risk_rule_without_bound_is_rejected_at_creation() {
    let clock: Arc<dyn Clock> = Arc::new(FixedClock(Utc::now()));
    let (gate, _owner, _actions) = gate_with_owner(clock).await;

    let mut constraints = HashMap::new();
    constraints.insert("recipient".to_string(), ArgConstraint::Exact { v: json!("555") });
    let rule = ApprovalRule {
        rule_id: Uuid::new_v4(),
        tool_name: "wire_transfer".to_string(),
        arg_constraints: constraints,
        description: "unbounded high-risk rule".to_string(),
        created_at: Utc::now(),
        active: true,
        expires_at: None,
        max_uses: None,
        use_count: 0,
        risk_tier: RiskTier::High,
        created_from_action_id: None,
    };

    let err = gate.create_rule(rule, "operator").await.unwrap_err();
    assert!(matches!(err, butler::services::GateError::RiskInvariantViolation));
}

#[tokio::test]
async fn expiry_sweep_transitions_stale_pending_actions() {
    let clock: Arc<dyn Clock> = Arc::new(FixedClock(Utc::now()));
    let (gate, _owner, _actions) = gate_with_owner(clock.clone()).await;

    let args = json!({"channel": "telegram", "recipient": "777", "text": "expire me"});
    let outcome = gate.dispatch("send_message", args, Some(Arc::new(EchoHandler)), None, None).await.unwrap();
    assert!(matches!(outcome, GateOutcome::PendingApproval { .. }));

    let later = clock.now() + Duration::hours(2);
    let swept = gate.expire_stale(later).await.unwrap();
    assert_eq!(swept, 1);

    let executed = gate.list_executed(ActionFilter { status: Some(ActionStatus::Expired), ..Default::default() }).await.unwrap();
    assert_eq!(executed.len(), 1);
}

#[tokio::test]
async fn create_rule_from_action_marks_sensitive_args_exact() {
    let clock: Arc<dyn Clock> = Arc::new(FixedClock(Utc::now()));
    let (gate, _owner, _actions) = gate_with_owner(clock).await;

    let args = json!({"channel": "telegram", "recipient": "321", "password": "s3cr3t"});
    let outcome = gate.dispatch("send_message", args, Some(Arc::new(EchoHandler)), None, None).await.unwrap();
    let action_id = match outcome {
        GateOutcome::PendingApproval { action_id, .. } => action_id,
        other => panic!("expected PendingApproval, got {other:?}"),
    };
    gate.approve(action_id, "operator", None).await.unwrap();

    let rule = gate.create_rule_from_action(action_id, "operator").await.unwrap();
    assert!(matches!(rule.arg_constraints.get("password"), Some(ArgConstraint::Exact { .. })));
    assert!(matches!(rule.arg_constraints.get("recipient"), Some(ArgConstraint::Exact { .. })));
    assert!(matches!(rule.arg_constraints.get("channel"), Some(ArgConstraint::Any)));

    let rules = gate.list_rules().await.unwrap();
    assert_eq!(rules.len(), 1);
}

#[tokio::test]
async fn reconcile_unfinished_flags_approved_with_no_execution_result() {
    let clock: Arc<dyn Clock> = Arc::new(FixedClock(Utc::now()));
    let (gate, _owner, actions) = gate_with_owner(clock).await;

    // Simulate a daemon crash between the approve CAS and the Executor
    // persisting execution_result: insert the row directly in `approved`
    // state, bypassing `gate.approve` (which would run the Executor itself).
    let action = PendingAction {
        status: ActionStatus::Approved,
        decided_by: Some("operator".to_string()),
        decided_at: Some(Utc::now()),
        ..PendingAction::new_pending(
            "send_message",
            json!({"channel": "telegram", "recipient": "111", "text": "crash before exec"}),
            Utc::now() + Duration::hours(1),
            RiskTier::Medium,
            None,
            None,
        )
    };
    actions.create(&action).await.unwrap();

    let flagged = gate.reconcile_unfinished().await.unwrap();
    assert_eq!(flagged, 1);
}
