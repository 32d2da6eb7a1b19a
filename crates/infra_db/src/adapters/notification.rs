//! Notification outbox adapter
//!
//! Implements `NotificationPort` by appending rows to the notifications
//! table. The engine's contract ends at the outbox: a delivery process
//! (mail, websocket, digest) consumes the table on its own schedule.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, instrument};

use core_kernel::{DomainPort, HealthCheckResult, HealthCheckable, PortError};
use domain_bordereau::{Notification, NotificationPort};

use crate::adapters::bordereau::ping;
use crate::error::DatabaseError;

/// PostgreSQL outbox implementation of the `NotificationPort`
#[derive(Debug, Clone)]
pub struct PgNotificationOutbox {
    pool: PgPool,
}

impl PgNotificationOutbox {
    /// Creates a new adapter over the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl DomainPort for PgNotificationOutbox {}

#[async_trait]
impl HealthCheckable for PgNotificationOutbox {
    async fn health_check(&self) -> HealthCheckResult {
        ping(&self.pool, "postgres-notification-outbox").await
    }
}

#[async_trait]
impl NotificationPort for PgNotificationOutbox {
    #[instrument(skip(self, notification), fields(bordereau_id = %notification.bordereau_id))]
    async fn publish(&self, notification: Notification) -> Result<(), PortError> {
        debug!(kind = notification.kind.as_str(), "queueing notification");

        let audience = serde_json::to_value(notification.audience)
            .map_err(|e| PortError::from(DatabaseError::mapping("audience", e)))?;

        sqlx::query(
            "INSERT INTO notifications (id, kind, bordereau_id, audience, message, actor_id, sweep_id, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(*notification.id.as_uuid())
        .bind(notification.kind.as_str())
        .bind(*notification.bordereau_id.as_uuid())
        .bind(audience)
        .bind(&notification.message)
        .bind(notification.actor_id.map(|id| *id.as_uuid()))
        .bind(notification.sweep_id.map(|id| *id.as_uuid()))
        .bind(notification.created_at)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from)?;

        Ok(())
    }
}
