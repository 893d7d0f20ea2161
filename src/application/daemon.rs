//! Boots a single butler's repositories and services against its own
//! SQLite pool, and drives its background task loops (scheduler tick,
//! pending-approval expiry sweep, notification batch flush).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::SqlitePool;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::adapters::sqlite::{
    SqliteApprovalEventRepository, SqliteApprovalRuleRepository, SqliteContactChannelRepository,
    SqliteContactRepository, SqliteInboxRepository, SqliteKvStore, SqlitePendingActionRepository,
    SqliteScheduledTaskRepository, SqliteSessionRepository,
};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::{Clock, ModuleRegistryLookup, SystemClock};
use crate::services::config::ButlerConfig;
use crate::services::{
    ApprovalGate, Executor, IdentityResolver, ModuleRegistry, NotificationChannel, Notifier, Scheduler,
    Switchboard, WorkerSpawner, WorkerSpawnerConfig,
};

const EXPIRY_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Fallback notification transport: logs the message rather than delivering
/// it anywhere. Real deployments wire a concrete channel (the owner's
/// primary contact channel) in place of this at startup; none ships here
/// since outbound connectors are a non-goal of this crate.
struct LoggingChannel {
    butler: String,
}

#[async_trait]
impl NotificationChannel for LoggingChannel {
    async fn send(&self, text: &str) -> DomainResult<()> {
        info!(butler = %self.butler, notification = %text, "owner notification (no transport configured)");
        Ok(())
    }
}

/// One running butler: its config, pool, and fully wired service set.
pub struct Daemon {
    pub name: String,
    pub config: ButlerConfig,
    pub pool: SqlitePool,
    pub clock: Arc<dyn Clock>,
    pub gate: Arc<ApprovalGate>,
    pub executor: Arc<Executor>,
    pub scheduler: Arc<Scheduler>,
    pub switchboard: Arc<Switchboard<SqliteContactRepository, SqliteContactChannelRepository>>,
    pub spawner: Arc<WorkerSpawner>,
    pub notifier: Arc<Notifier>,
    pub registry: Arc<ModuleRegistry>,
}

/// Background loop join handles for a running [`Daemon`], returned so the
/// caller can await them alongside sibling butlers' handles.
pub struct DaemonHandles {
    pub scheduler: tokio::task::JoinHandle<()>,
    pub expiry_sweep: tokio::task::JoinHandle<()>,
    pub notifier_flush: tokio::task::JoinHandle<()>,
}

impl Daemon {
    /// Construct every repository, service, and the (currently empty)
    /// module registry for one butler against its own pool. No concrete
    /// domain modules ship in this crate: a deployment links its own
    /// `Module` implementations in and passes them here in place of the
    /// empty vector, once that wiring point is needed.
    pub async fn bootstrap(config: ButlerConfig, pool: SqlitePool) -> DomainResult<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let contacts = Arc::new(SqliteContactRepository::new(pool.clone()));
        let channels = Arc::new(SqliteContactChannelRepository::new(pool.clone()));
        let actions = Arc::new(SqlitePendingActionRepository::new(pool.clone()));
        let rules = Arc::new(SqliteApprovalRuleRepository::new(pool.clone()));
        let events = Arc::new(SqliteApprovalEventRepository::new(pool.clone()));
        let inbox = Arc::new(SqliteInboxRepository::new(pool.clone()));
        let kv = Arc::new(SqliteKvStore::new(pool.clone()));
        let tasks = Arc::new(SqliteScheduledTaskRepository::new(pool.clone()));
        let sessions = Arc::new(SqliteSessionRepository::new(pool.clone()));

        let identity = IdentityResolver::new(contacts.clone(), channels.clone());
        identity.bootstrap_owner(&config.name).await?;

        let mut gated_tools = config
            .modules
            .approvals
            .gated_tool_policies()
            .map_err(|e| DomainError::ConfigurationError(e.to_string()))?;
        let default_risk_tier =
            config.modules.approvals.default_risk_tier().map_err(|e| DomainError::ConfigurationError(e.to_string()))?;

        let registry = Arc::new(ModuleRegistry::load(Vec::new()).await?);
        config
            .validate_against_registry(&registry)
            .map_err(|e| DomainError::ConfigurationError(e.to_string()))?;

        let registry_lookup: Arc<dyn ModuleRegistryLookup> = registry.clone();
        let executor = Arc::new(Executor::new(actions.clone(), events.clone(), registry_lookup));

        // Descriptor-driven safety net: a tool the registry marks `always`
        // gated is gated even if the operator's TOML never mentions it.
        let configured_names: std::collections::HashSet<String> = gated_tools.keys().cloned().collect();
        for name in registry.gated_tool_names(&configured_names) {
            gated_tools.entry(name).or_insert(crate::services::GatedToolPolicy { expiry_hours: None, risk_tier: None });
        }

        let gate = Arc::new(ApprovalGate::new(
            actions.clone(),
            rules.clone(),
            events.clone(),
            contacts.clone(),
            channels.clone(),
            clock.clone(),
            gated_tools,
            config.modules.approvals.default_expiry_hours,
            default_risk_tier,
            executor.clone(),
        ));

        let scheduler = Arc::new(Scheduler::new(tasks.clone(), clock.clone()));
        scheduler.reconcile_toml_tasks(&config.static_tasks()).await?;

        let channel: Arc<dyn NotificationChannel> = Arc::new(LoggingChannel { butler: config.name.clone() });
        let notifier = Arc::new(Notifier::new(channel, config.notifications.max_per_minute));

        let mut routes = HashMap::new();
        for route in &config.routes {
            routes.insert((route.channel_type.clone(), route.role.clone()), config.name.clone());
        }
        let switchboard =
            Arc::new(Switchboard::new(inbox.clone(), kv.clone(), identity, routes, notifier.clone()));

        let spawner =
            Arc::new(WorkerSpawner::new(sessions.clone(), registry.clone(), gate.clone(), WorkerSpawnerConfig::default()));

        let reconciled = gate.reconcile_unfinished().await?;
        if reconciled > 0 {
            warn!(butler = %config.name, count = reconciled, "actions flagged for manual reconciliation on startup");
        }

        Ok(Self {
            name: config.name.clone(),
            config,
            pool,
            clock,
            gate,
            executor,
            scheduler,
            switchboard,
            spawner,
            notifier,
            registry,
        })
    }

    /// Spawn this butler's background loops, each subscribing its own
    /// receiver off `shutdown_tx` so a single broadcast fans out to all
    /// three. The returned handles are not awaited here so a caller hosting
    /// several butlers in one process can join all of them together.
    pub fn spawn_loops(self: &Arc<Self>, shutdown_tx: &broadcast::Sender<()>) -> DaemonHandles {
        let this = self.clone();
        let scheduler_shutdown = shutdown_tx.subscribe();
        let scheduler = tokio::spawn(async move {
            let spawner = this.spawner.clone();
            let notifier = this.notifier.clone();
            let butler = this.name.clone();
            this.scheduler
                .run(scheduler_shutdown, move |trigger| {
                    let spawner = spawner.clone();
                    let notifier = notifier.clone();
                    let butler = butler.clone();
                    async move {
                        let request = crate::services::worker_spawner::SpawnRequest {
                            butler,
                            trigger_kind: crate::domain::models::TriggerKind::Schedule,
                            prompt: trigger.prompt,
                            identity_preamble: None,
                            session_id: None,
                        };
                        if let Err(e) = spawner.spawn(request).await {
                            warn!(task_id = %trigger.task_id, error = %e, "scheduled worker spawn failed");
                            notifier.notify_schedule_failure(&trigger.task_id.to_string(), &e.to_string()).await;
                        }
                    }
                })
                .await;
        });

        let this = self.clone();
        let mut sweep_shutdown = shutdown_tx.subscribe();
        let expiry_sweep = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(EXPIRY_SWEEP_INTERVAL);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let now = this.clock.now();
                        if let Err(e) = this.gate.expire_stale(now).await {
                            warn!(error = %e, "expiry sweep failed");
                        }
                    }
                    _ = sweep_shutdown.recv() => break,
                }
            }
        });

        let this = self.clone();
        let flush_shutdown = shutdown_tx.subscribe();
        let notifier_flush = tokio::spawn(crate::services::notifier::run_flush_loop(
            this.notifier.clone(),
            Duration::from_secs(30),
            flush_shutdown,
        ));

        DaemonHandles { scheduler, expiry_sweep, notifier_flush }
    }
}
