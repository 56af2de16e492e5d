use crate::entities::outbox_event::{self, OutboxStatus};
use crate::errors::ServiceError;
use crate::events::{Notification, NotificationDispatcher};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use metrics::counter;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait,
    DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

const BASE_BACKOFF_SECS: i64 = 2;
const MAX_BACKOFF_SECS: i64 = 600;

/// Worker tuning
#[derive(Debug, Clone)]
pub struct OutboxSettings {
    pub poll_interval: Duration,
    pub batch_size: u64,
    pub max_attempts: i32,
    /// How long a claimed row may stay `processing` before another drain retakes it
    pub lease: Duration,
}

impl Default for OutboxSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1000),
            batch_size: 50,
            max_attempts: 10,
            lease: Duration::from_secs(300),
        }
    }
}

impl From<&crate::config::AppConfig> for OutboxSettings {
    fn from(cfg: &crate::config::AppConfig) -> Self {
        Self {
            poll_interval: cfg.outbox_poll_interval(),
            batch_size: cfg.outbox_batch_size,
            max_attempts: cfg.outbox_max_attempts,
            lease: Duration::from_secs(cfg.outbox_lease_secs),
        }
    }
}

/// Counts from one drain pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    pub claimed: usize,
    pub delivered: usize,
    pub retried: usize,
    pub failed: usize,
}

/// Enqueue a notification into the outbox table. Call it with the same
/// transaction as the write it belongs to.
pub async fn enqueue(
    db: &impl ConnectionTrait,
    notification: &Notification,
) -> Result<(), ServiceError> {
    let payload = serde_json::to_value(notification).map_err(|e| {
        error!("failed to serialize notification: {}", e);
        ServiceError::InternalError(format!("Failed to serialize notification: {}", e))
    })?;

    let now = Utc::now();
    let row = outbox_event::ActiveModel {
        event_type: Set(notification.event_type().to_string()),
        payload: Set(payload),
        status: Set(OutboxStatus::Pending),
        attempts: Set(0),
        available_at: Set(now),
        last_error: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        processed_at: Set(None),
        ..Default::default()
    };
    let saved = row.insert(db).await.map_err(|e| {
        error!("failed to enqueue outbox event: {}", e);
        ServiceError::DatabaseError(e)
    })?;

    debug!(
        "enqueued outbox event {} type={}",
        saved.id,
        notification.event_type()
    );
    Ok(())
}

/// Enqueue several notifications in order
pub async fn enqueue_all(
    db: &impl ConnectionTrait,
    notifications: &[Notification],
) -> Result<(), ServiceError> {
    for notification in notifications {
        enqueue(db, notification).await?;
    }
    Ok(())
}

/// Background worker that polls the outbox and dispatches due rows.
/// Finishes the batch in flight and exits once `shutdown` flips to true.
pub fn start_worker(
    db: Arc<DatabaseConnection>,
    dispatcher: NotificationDispatcher,
    settings: OutboxSettings,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    info!(
        poll_ms = settings.poll_interval.as_millis() as u64,
        batch = settings.batch_size,
        lease_secs = settings.lease.as_secs(),
        "starting outbox worker"
    );
    tokio::spawn(async move {
        loop {
            if *shutdown.borrow() {
                break;
            }
            if let Err(e) = drain_once(&db, &dispatcher, &settings).await {
                error!("outbox worker error: {}", e);
            }
            tokio::select! {
                _ = sleep(settings.poll_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        info!("outbox worker stopped");
    })
}

/// Exponential backoff after the given number of failed attempts
pub fn backoff_delay(attempts: i32) -> ChronoDuration {
    let exponent = attempts.saturating_sub(1).clamp(0, 30) as u32;
    let secs = BASE_BACKOFF_SECS
        .saturating_mul(2_i64.saturating_pow(exponent))
        .min(MAX_BACKOFF_SECS);
    ChronoDuration::seconds(secs)
}

/// Rows a drain may take: pending and due, or processing with an expired lease
fn claimable(now: DateTime<Utc>, lease_cutoff: DateTime<Utc>) -> Condition {
    Condition::any()
        .add(
            Condition::all()
                .add(outbox_event::Column::Status.eq(OutboxStatus::Pending))
                .add(outbox_event::Column::AvailableAt.lte(now)),
        )
        .add(
            Condition::all()
                .add(outbox_event::Column::Status.eq(OutboxStatus::Processing))
                .add(outbox_event::Column::UpdatedAt.lt(lease_cutoff)),
        )
}

/// Claim and dispatch one batch of due outbox rows.
///
/// A row left in `processing` by a worker that died mid-delivery is taken
/// again once its lease runs out, so delivery is at-least-once.
pub async fn drain_once(
    db: &DatabaseConnection,
    dispatcher: &NotificationDispatcher,
    settings: &OutboxSettings,
) -> Result<DrainReport, ServiceError> {
    let now = Utc::now();
    let lease_cutoff = now
        - ChronoDuration::from_std(settings.lease).unwrap_or_else(|_| ChronoDuration::seconds(300));
    let due = outbox_event::Entity::find()
        .filter(claimable(now, lease_cutoff))
        .order_by_asc(outbox_event::Column::Id)
        .limit(settings.batch_size)
        .all(db)
        .await?;

    let mut report = DrainReport::default();

    for row in due {
        // conditional update so two workers never claim the same row
        let claimed = outbox_event::Entity::update_many()
            .col_expr(
                outbox_event::Column::Status,
                Expr::value(OutboxStatus::Processing),
            )
            .col_expr(
                outbox_event::Column::Attempts,
                Expr::col(outbox_event::Column::Attempts).add(1),
            )
            .col_expr(outbox_event::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(outbox_event::Column::Id.eq(row.id))
            .filter(claimable(now, lease_cutoff))
            .exec(db)
            .await?;
        if claimed.rows_affected != 1 {
            continue;
        }
        if row.status == OutboxStatus::Processing {
            warn!("outbox {} lease expired, reclaiming", row.id);
        }
        report.claimed += 1;
        let row_id = row.id;

        // a failed bookkeeping write leaves the row processing; the lease brings it back
        match deliver(db, dispatcher, settings, row).await {
            Ok(Delivery::Delivered) => report.delivered += 1,
            Ok(Delivery::Retried) => report.retried += 1,
            Ok(Delivery::Failed) => report.failed += 1,
            Err(e) => error!("outbox {} bookkeeping failed: {}", row_id, e),
        }
    }

    Ok(report)
}

enum Delivery {
    Delivered,
    Retried,
    Failed,
}

async fn deliver(
    db: &DatabaseConnection,
    dispatcher: &NotificationDispatcher,
    settings: &OutboxSettings,
    row: outbox_event::Model,
) -> Result<Delivery, ServiceError> {
    let attempts = row.attempts + 1;

    let outcome = match serde_json::from_value::<Notification>(row.payload.clone()) {
        Ok(notification) => dispatcher.dispatch(&notification).await,
        Err(e) => {
            warn!("outbox {} has an undecodable payload: {}", row.id, e);
            mark_failed(db, row, attempts, format!("undecodable payload: {e}")).await?;
            return Ok(Delivery::Failed);
        }
    };

    match outcome {
        Ok(()) => {
            mark_delivered(db, row, attempts).await?;
            counter!("fitmarket_outbox.delivered", 1);
            Ok(Delivery::Delivered)
        }
        Err(e) if attempts < settings.max_attempts => {
            warn!("outbox {} delivery failed (attempt {}): {}", row.id, attempts, e);
            schedule_retry(db, row, attempts, e).await?;
            counter!("fitmarket_outbox.retried", 1);
            Ok(Delivery::Retried)
        }
        Err(e) => {
            error!("outbox {} giving up after {} attempts: {}", row.id, attempts, e);
            mark_failed(db, row, attempts, format!("max attempts exceeded: {e}")).await?;
            Ok(Delivery::Failed)
        }
    }
}

async fn mark_delivered(
    db: &DatabaseConnection,
    row: outbox_event::Model,
    attempts: i32,
) -> Result<(), ServiceError> {
    let now = Utc::now();
    let mut active: outbox_event::ActiveModel = row.into();
    active.status = Set(OutboxStatus::Delivered);
    active.attempts = Set(attempts);
    active.processed_at = Set(Some(now));
    active.updated_at = Set(now);
    active.last_error = Set(None);
    active.update(db).await?;
    Ok(())
}

async fn schedule_retry(
    db: &DatabaseConnection,
    row: outbox_event::Model,
    attempts: i32,
    last_error: String,
) -> Result<(), ServiceError> {
    let now = Utc::now();
    let mut active: outbox_event::ActiveModel = row.into();
    active.status = Set(OutboxStatus::Pending);
    active.attempts = Set(attempts);
    active.available_at = Set(now + backoff_delay(attempts));
    active.updated_at = Set(now);
    active.last_error = Set(Some(last_error));
    active.update(db).await?;
    Ok(())
}

async fn mark_failed(
    db: &DatabaseConnection,
    row: outbox_event::Model,
    attempts: i32,
    last_error: String,
) -> Result<(), ServiceError> {
    let now = Utc::now();
    let mut active: outbox_event::ActiveModel = row.into();
    active.status = Set(OutboxStatus::Failed);
    active.attempts = Set(attempts);
    active.updated_at = Set(now);
    active.last_error = Set(Some(last_error));
    active.update(db).await?;
    counter!("fitmarket_outbox.failed", 1);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_then_caps() {
        assert_eq!(backoff_delay(1), ChronoDuration::seconds(2));
        assert_eq!(backoff_delay(2), ChronoDuration::seconds(4));
        assert_eq!(backoff_delay(4), ChronoDuration::seconds(16));
        assert_eq!(backoff_delay(20), ChronoDuration::seconds(MAX_BACKOFF_SECS));
        assert_eq!(backoff_delay(0), ChronoDuration::seconds(2));
    }
}
