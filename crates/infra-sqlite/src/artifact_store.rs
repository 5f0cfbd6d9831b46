// SQLite PersistencePort Implementation

use crate::error::{classify_persist_error, map_sqlx_error};
use async_trait::async_trait;
use bulkgen_core::domain::{Artifact, JobDescriptor, JobId, OrderKey};
use bulkgen_core::error::Result;
use bulkgen_core::port::{PersistencePort, PortError, TimeProvider};
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::debug;

/// Artifact as stored, with the descriptor fields it was generated from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredArtifact {
    pub job_id: JobId,
    pub group_key: String,
    pub order_key: OrderKey,
    pub payload: serde_json::Value,
    pub artifact: serde_json::Value,
    pub created_at: i64,
    pub updated_at: i64,
}

pub struct SqliteArtifactStore {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteArtifactStore {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            time_provider,
        }
    }

    /// Stored artifacts in `order_key` order, optionally for one group
    pub async fn list_artifacts(&self, group_key: Option<&str>) -> Result<Vec<StoredArtifact>> {
        let rows: Vec<ArtifactRow> = match group_key {
            Some(key) => sqlx::query_as(
                r#"
                SELECT * FROM generated_artifacts
                WHERE group_key = ?
                ORDER BY order_key ASC, job_id ASC
                "#,
            )
            .bind(key)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?,
            None => sqlx::query_as(
                "SELECT * FROM generated_artifacts ORDER BY order_key ASC, job_id ASC",
            )
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?,
        };

        Ok(rows.into_iter().map(ArtifactRow::into_stored).collect())
    }

    pub async fn find_artifact(&self, job_id: &str) -> Result<Option<StoredArtifact>> {
        let row: Option<ArtifactRow> =
            sqlx::query_as("SELECT * FROM generated_artifacts WHERE job_id = ?")
                .bind(job_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        Ok(row.map(ArtifactRow::into_stored))
    }

    pub async fn count_artifacts(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM generated_artifacts")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }
}

#[async_trait]
impl PersistencePort for SqliteArtifactStore {
    async fn persist(
        &self,
        descriptor: &JobDescriptor,
        artifact: &Artifact,
    ) -> std::result::Result<(), PortError> {
        let now = self.time_provider.now_millis();

        // Upsert: a job re-run in a fresh batch replaces its earlier artifact
        sqlx::query(
            r#"
            INSERT INTO generated_artifacts (
                job_id, group_key, order_key, payload, artifact, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(job_id) DO UPDATE SET
                group_key = excluded.group_key,
                order_key = excluded.order_key,
                payload = excluded.payload,
                artifact = excluded.artifact,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&descriptor.id)
        .bind(&descriptor.group_key)
        .bind(descriptor.order_key)
        .bind(descriptor.payload.as_value().to_string())
        .bind(artifact.as_value().to_string())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| classify_persist_error(&e))?;

        debug!(job_id = %descriptor.id, "Artifact stored");
        Ok(())
    }
}

/// SQLite row representation
#[derive(Debug, sqlx::FromRow)]
struct ArtifactRow {
    job_id: String,
    group_key: String,
    order_key: i64,
    payload: String,
    artifact: String,
    created_at: i64,
    updated_at: i64,
}

impl ArtifactRow {
    fn into_stored(self) -> StoredArtifact {
        // Columns are written from serde_json values, so parsing only fails on manual edits
        let parse = |text: &str| {
            serde_json::from_str(text).unwrap_or_else(|_| serde_json::Value::String(text.to_string()))
        };

        StoredArtifact {
            payload: parse(&self.payload),
            artifact: parse(&self.artifact),
            job_id: self.job_id,
            group_key: self.group_key,
            order_key: self.order_key,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
