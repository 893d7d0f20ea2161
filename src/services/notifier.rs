//! Notifier: out-of-band owner notifications for pending approvals,
//! unknown-sender first contact, and scheduled-task failures.
//!
//! Transport is pluggable — identical in shape to any outbound tool — and
//! is itself subject to the approval gate's semantics whenever a
//! notification targets a non-owner channel. Notifications to the owner
//! are always auto-approved, which is what keeps this acyclic: the
//! Notifier never blocks on its own gate decision for the owner channel.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use tokio::sync::Mutex;
use tracing::warn;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::PendingAction;

/// A transport the Notifier can deliver a message through — an owner's
/// primary channel, or any configured fallback.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn send(&self, text: &str) -> DomainResult<()>;
}

/// Batches pending-approval notices so a burst of parked actions produces
/// one message instead of one per action.
struct ApprovalBatch {
    action_ids: Vec<Uuid>,
    summaries: Vec<String>,
}

pub struct Notifier {
    channel: Arc<dyn NotificationChannel>,
    limiter: RateLimiter<governor::state::NotKeyed, governor::state::InMemoryState, governor::clock::DefaultClock>,
    pending_batch: Mutex<Option<ApprovalBatch>>,
}

impl Notifier {
    /// `max_per_minute` bounds how often a batch is allowed to flush, so a
    /// storm of approvals collapses into one message per window.
    pub fn new(channel: Arc<dyn NotificationChannel>, max_per_minute: u32) -> Self {
        let per_minute = std::num::NonZeroU32::new(max_per_minute).unwrap_or(std::num::NonZeroU32::new(1).unwrap());
        let quota = Quota::per_minute(per_minute);
        Self { channel, limiter: RateLimiter::direct(quota), pending_batch: Mutex::new(None) }
    }

    /// Queue one pending action into the current batch, flushing immediately
    /// if the rate limiter allows it.
    pub async fn notify_pending_approval(&self, action: &PendingAction) {
        let mut guard = self.pending_batch.lock().await;
        let batch = guard.get_or_insert_with(|| ApprovalBatch { action_ids: Vec::new(), summaries: Vec::new() });
        batch.action_ids.push(action.action_id);
        batch.summaries.push(format!("{} ({})", action.tool_name, action.action_id));

        if self.limiter.check().is_ok() {
            if let Some(batch) = guard.take() {
                drop(guard);
                self.flush_batch(batch).await;
            }
        }
    }

    async fn flush_batch(&self, batch: ApprovalBatch) {
        let text = if batch.action_ids.len() == 1 {
            format!("1 action awaiting approval: {}", batch.summaries[0])
        } else {
            format!("{} actions awaiting approval:\n{}", batch.action_ids.len(), batch.summaries.join("\n"))
        };
        if let Err(e) = self.channel.send(&text).await {
            warn!(error = %e, "failed to deliver pending-approval notification");
        }
    }

    /// Force-flush whatever is queued, e.g. on a periodic tick independent
    /// of the rate limiter's own cadence.
    pub async fn flush(&self) {
        let batch = self.pending_batch.lock().await.take();
        if let Some(batch) = batch {
            self.flush_batch(batch).await;
        }
    }

    /// Unknown-sender first contact — called once per `(channel_type,
    /// channel_value)` by the Switchboard, which gates the "once" behavior
    /// via its own KV flag.
    pub async fn notify_unknown_sender(&self, contact_name: &str, channel_type: &str, channel_value: &str) {
        let text = format!("New contact via {channel_type} ({channel_value}): {contact_name} -- pending disambiguation");
        if let Err(e) = self.channel.send(&text).await {
            warn!(error = %e, "failed to deliver unknown-sender notification");
        }
    }

    /// Scheduled-task failure summary.
    pub async fn notify_schedule_failure(&self, task_name: &str, error: &str) {
        let text = format!("scheduled task '{task_name}' failed: {error}");
        if let Err(e) = self.channel.send(&text).await {
            warn!(error = %e, "failed to deliver schedule-failure notification");
        }
    }
}

/// Background loop flushing any batch still queued after `interval`, so a
/// single slow trickle of approvals is never held indefinitely.
pub async fn run_flush_loop(notifier: Arc<Notifier>, interval: Duration, mut shutdown: tokio::sync::broadcast::Receiver<()>) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => notifier.flush().await,
            _ = shutdown.recv() => break,
        }
    }
}
