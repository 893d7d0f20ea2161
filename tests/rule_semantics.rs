//! Property tests for approval-rule constraint matching and specificity,
//! plus a precedence test exercising the gate's rule-selection ordering
//! end-to-end.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use proptest::prelude::*;
use serde_json::{json, Value};
use uuid::Uuid;

use butler::adapters::sqlite::{
    create_migrated_test_pool, SqliteApprovalEventRepository, SqliteApprovalRuleRepository,
    SqliteContactChannelRepository, SqliteContactRepository, SqlitePendingActionRepository,
};
use butler::domain::errors::DomainResult;
use butler::domain::models::{ApprovalRule, ArgConstraint, RiskTier};
use butler::domain::ports::{Clock, FixedClock, ModuleRegistryLookup, ToolHandler};
use butler::services::{ApprovalGate, Executor, ModuleRegistry};

fn arb_scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::from),
        any::<i32>().prop_map(Value::from),
        "[a-z]{1,8}".prop_map(Value::from),
    ]
}

proptest! {
    #[test]
    fn exact_constraint_matches_iff_value_equal(a in arb_scalar(), b in arb_scalar()) {
        let constraint = ArgConstraint::Exact { v: a.clone() };
        prop_assert_eq!(constraint.matches(Some(&b)), a == b);
    }

    #[test]
    fn any_constraint_always_matches(v in arb_scalar()) {
        prop_assert!(ArgConstraint::Any.matches(Some(&v)));
        prop_assert!(ArgConstraint::Any.matches(None));
    }

    #[test]
    fn specificity_is_exact_ge_pattern_ge_any(v in arb_scalar()) {
        let exact = ArgConstraint::Exact { v };
        let pattern = ArgConstraint::Pattern { regex: ".*".to_string() };
        let any = ArgConstraint::Any;
        prop_assert!(exact.specificity() > pattern.specificity());
        prop_assert!(pattern.specificity() > any.specificity());
    }

    #[test]
    fn rule_specificity_is_sum_of_constraint_specificities(n_exact in 0usize..4, n_pattern in 0usize..4) {
        let mut constraints = HashMap::new();
        for i in 0..n_exact {
            constraints.insert(format!("exact_{i}"), ArgConstraint::Exact { v: json!(i) });
        }
        for i in 0..n_pattern {
            constraints.insert(format!("pattern_{i}"), ArgConstraint::Pattern { regex: ".*".to_string() });
        }
        let rule = make_rule("t", constraints, RiskTier::Low, None, None);
        prop_assert_eq!(rule.specificity(), (n_exact as u32) * 3 + (n_pattern as u32) * 2);
    }

    #[test]
    fn high_risk_rule_satisfies_invariant_iff_bounded_and_specific(bounded in any::<bool>(), specific in any::<bool>()) {
        let mut constraints = HashMap::new();
        if specific {
            constraints.insert("x".to_string(), ArgConstraint::Exact { v: json!(1) });
        }
        let expires_at = if bounded { Some(Utc::now() + chrono::Duration::days(1)) } else { None };
        let rule = make_rule("t", constraints, RiskTier::High, expires_at, None);
        prop_assert_eq!(rule.satisfies_risk_invariant(), bounded && specific);
    }
}

fn make_rule(
    tool_name: &str,
    arg_constraints: HashMap<String, ArgConstraint>,
    risk_tier: RiskTier,
    expires_at: Option<chrono::DateTime<Utc>>,
    max_uses: Option<u64>,
) -> ApprovalRule {
    ApprovalRule {
        rule_id: Uuid::new_v4(),
        tool_name: tool_name.to_string(),
        arg_constraints,
        description: "test rule".to_string(),
        created_at: Utc::now(),
        active: true,
        expires_at,
        max_uses,
        use_count: 0,
        risk_tier,
        created_from_action_id: None,
    }
}

struct EchoHandler;

#[async_trait]
impl ToolHandler for EchoHandler {
    async fn call(&self, args: Value) -> DomainResult<Value> {
        Ok(args)
    }
}

#[tokio::test]
async fn more_specific_rule_wins_over_broader_bounded_rule() {
    let pool = create_migrated_test_pool().await.expect("migrated pool");
    let contacts = Arc::new(SqliteContactRepository::new(pool.clone()));
    let channels = Arc::new(SqliteContactChannelRepository::new(pool.clone()));
    let actions = Arc::new(SqlitePendingActionRepository::new(pool.clone()));
    let rules = Arc::new(SqliteApprovalRuleRepository::new(pool.clone()));
    let events = Arc::new(SqliteApprovalEventRepository::new(pool.clone()));
    let clock: Arc<dyn Clock> = Arc::new(FixedClock(Utc::now()));

    let mut gated = HashMap::new();
    gated.insert("send_message".to_string(), butler::services::GatedToolPolicy { expiry_hours: Some(1), risk_tier: None });

    let registry = ModuleRegistry::load(Vec::new()).await.unwrap();
    let registry_lookup: Arc<dyn ModuleRegistryLookup> = Arc::new(registry);
    let executor = Arc::new(Executor::new(actions.clone(), events.clone(), registry_lookup));

    let gate = ApprovalGate::new(actions, rules, events, contacts, channels, clock, gated, 24, RiskTier::Medium, executor);

    // Broad rule: matches any recipient. Specific rule: matches exactly "42".
    let broad = make_rule("send_message", HashMap::new(), RiskTier::Low, None, None);
    let mut specific_constraints = HashMap::new();
    specific_constraints.insert("recipient".to_string(), ArgConstraint::Exact { v: json!("42") });
    let specific = make_rule("send_message", specific_constraints, RiskTier::Low, None, None);
    let specific_id = specific.rule_id;

    gate.create_rule(broad, "operator").await.unwrap();
    gate.create_rule(specific, "operator").await.unwrap();

    let args = json!({"channel": "telegram", "recipient": "42", "text": "hi"});
    gate.dispatch("send_message", args, Some(Arc::new(EchoHandler)), None, None).await.unwrap();

    let winning = gate.list_rules().await.unwrap().into_iter().find(|r| r.rule_id == specific_id).unwrap();
    assert_eq!(winning.use_count, 1, "the more specific rule must be the one whose use_count is incremented");

    let other = gate.list_rules().await.unwrap().into_iter().find(|r| r.rule_id != specific_id).unwrap();
    assert_eq!(other.use_count, 0, "the broader rule must not have fired when a more specific candidate matched");
}
