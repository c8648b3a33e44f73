//! PostgreSQL implementation of the persistence layer.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::models::{Record, StoredActivity};
use crate::error::ApiError;

/// PostgreSQL-backed persistence layer using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresPersistence {
    pool: PgPool,
}

impl PostgresPersistence {
    /// Creates a new persistence layer with the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the embedded schema migrations.
    ///
    /// # Errors
    ///
    /// Returns a [`ApiError::PersistenceError`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), ApiError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| ApiError::PersistenceError(e.to_string()))
    }

    /// Inserts or replaces an entity record.
    ///
    /// # Errors
    ///
    /// Returns a [`ApiError::PersistenceError`] on database failure.
    pub async fn upsert_record(&self, record: &Record) -> Result<(), ApiError> {
        let data = record.to_json()?;
        sqlx::query(
            "INSERT INTO records (kind, id, data, updated_at) VALUES ($1, $2, $3, now()) \
             ON CONFLICT (kind, id) DO UPDATE SET data = EXCLUDED.data, updated_at = now()",
        )
        .bind(record.kind())
        .bind(record.key())
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(|e| ApiError::PersistenceError(e.to_string()))?;
        Ok(())
    }

    /// Deletes an entity record.
    ///
    /// # Errors
    ///
    /// Returns a [`ApiError::PersistenceError`] on database failure.
    pub async fn delete_record(&self, kind: &str, id: &str) -> Result<u64, ApiError> {
        let result = sqlx::query("DELETE FROM records WHERE kind = $1 AND id = $2")
            .bind(kind)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| ApiError::PersistenceError(e.to_string()))?;
        Ok(result.rows_affected())
    }

    /// Loads every stored record, oldest first.
    ///
    /// Rows that no longer deserialize are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns a [`ApiError::PersistenceError`] on database failure.
    pub async fn load_records(&self) -> Result<Vec<Record>, ApiError> {
        let rows = sqlx::query_as::<_, (String, String, serde_json::Value)>(
            "SELECT kind, id, data FROM records ORDER BY updated_at ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ApiError::PersistenceError(e.to_string()))?;

        let mut records = Vec::with_capacity(rows.len());
        for (kind, id, data) in rows {
            match Record::from_row(&kind, data) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(%kind, %id, error = %e, "skipping unreadable record"),
            }
        }
        Ok(records)
    }

    /// Appends an activity to the activity log.
    ///
    /// # Errors
    ///
    /// Returns a [`ApiError::PersistenceError`] on database failure.
    pub async fn append_activity(
        &self,
        event_id: Uuid,
        activity_type: &str,
        payload: &serde_json::Value,
    ) -> Result<i64, ApiError> {
        let row = sqlx::query_scalar::<_, i64>(
            "INSERT INTO activity_log (event_id, activity_type, payload) VALUES ($1, $2, $3) \
             RETURNING id",
        )
        .bind(event_id)
        .bind(activity_type)
        .bind(payload)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| ApiError::PersistenceError(e.to_string()))?;

        Ok(row)
    }

    /// Loads activities after the given timestamp, optionally for one event.
    ///
    /// # Errors
    ///
    /// Returns a [`ApiError::PersistenceError`] on database failure.
    pub async fn load_activities_after(
        &self,
        after: DateTime<Utc>,
        event_id: Option<Uuid>,
    ) -> Result<Vec<StoredActivity>, ApiError> {
        let rows = if let Some(eid) = event_id {
            sqlx::query_as::<_, (i64, Uuid, String, serde_json::Value, DateTime<Utc>)>(
                "SELECT id, event_id, activity_type, payload, created_at FROM activity_log \
                 WHERE created_at > $1 AND event_id = $2 ORDER BY created_at ASC",
            )
            .bind(after)
            .bind(eid)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, (i64, Uuid, String, serde_json::Value, DateTime<Utc>)>(
                "SELECT id, event_id, activity_type, payload, created_at FROM activity_log \
                 WHERE created_at > $1 ORDER BY created_at ASC",
            )
            .bind(after)
            .fetch_all(&self.pool)
            .await
        }
        .map_err(|e| ApiError::PersistenceError(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(
                |(id, event_id, activity_type, payload, created_at)| StoredActivity {
                    id,
                    event_id,
                    activity_type,
                    payload,
                    created_at,
                },
            )
            .collect())
    }

    /// Deletes activity-log rows older than the given number of days.
    ///
    /// # Errors
    ///
    /// Returns a [`ApiError::PersistenceError`] on database failure.
    pub async fn delete_old_activities(&self, before_days: u64) -> Result<u64, ApiError> {
        let days = i64::try_from(before_days).unwrap_or(i64::MAX);
        let cutoff = chrono::Duration::try_days(days)
            .and_then(|age| Utc::now().checked_sub_signed(age))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let result = sqlx::query("DELETE FROM activity_log WHERE created_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(|e| ApiError::PersistenceError(e.to_string()))?;

        Ok(result.rows_affected())
    }
}
