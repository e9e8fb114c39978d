//! Session store: external persistence of allocated identifiers
//!
//! The session database groups every identifier assigned in a run under a
//! session row keyed by the authority's id-set token, and records one
//! `stable_identifier_record` plus a `create` action per feature. The
//! engine only knows this surface; the schema belongs to the session
//! service.

use async_trait::async_trait;
use idalloc_common::Result;
use sqlx::{PgPool, Row};

/// Feature level recorded in the session store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureType {
    Gene,
    Transcript,
}

impl FeatureType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureType::Gene => "gene",
            FeatureType::Transcript => "transcript",
        }
    }
}

/// Audit/session persistence consumed by the session writer
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Id of a registered assigning application, if any
    async fn application_id(&self, name: &str, version: &str) -> Result<Option<i64>>;

    /// Id of a production database row by name, if any
    async fn production_database_id(&self, name: &str) -> Result<Option<i64>>;

    /// Register a production database and return its id
    async fn create_production_database(&self, name: &str) -> Result<i64>;

    /// Session already recorded for an authority id-set, if any
    async fn session_for_id_set(&self, id_set: i64) -> Result<Option<i64>>;

    /// Open a session row for an id-set and return its id
    async fn create_session(
        &self,
        application_id: i64,
        production_database_id: i64,
        id_set: i64,
        message: &str,
    ) -> Result<i64>;

    /// Record one allocated identifier as current, with a `create` action
    /// linking it to the session
    async fn record_identifier(
        &self,
        session_id: i64,
        stable_id: &str,
        feature_type: FeatureType,
    ) -> Result<()>;
}

/// Session store backed by the session-service database
pub struct DbSessionStore {
    pool: PgPool,
}

impl DbSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for DbSessionStore {
    async fn application_id(&self, name: &str, version: &str) -> Result<Option<i64>> {
        let row = sqlx::query(
            "SELECT application_id FROM assigning_application WHERE name = $1 AND version = $2",
        )
        .bind(name)
        .bind(version)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.try_get("application_id")).transpose().map_err(Into::into)
    }

    async fn production_database_id(&self, name: &str) -> Result<Option<i64>> {
        let row = sqlx::query(
            "SELECT production_database_id FROM production_database WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.try_get("production_database_id"))
            .transpose()
            .map_err(Into::into)
    }

    async fn create_production_database(&self, name: &str) -> Result<i64> {
        let row = sqlx::query(
            "INSERT INTO production_database (name) VALUES ($1) RETURNING production_database_id",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("production_database_id")?)
    }

    async fn session_for_id_set(&self, id_set: i64) -> Result<Option<i64>> {
        let row = sqlx::query("SELECT session_id FROM session WHERE osid_idsetid = $1")
            .bind(id_set)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| r.try_get("session_id")).transpose().map_err(Into::into)
    }

    async fn create_session(
        &self,
        application_id: i64,
        production_database_id: i64,
        id_set: i64,
        message: &str,
    ) -> Result<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO session (ses_application_id, ses_production_database_id, osid_idsetid, message)
            VALUES ($1, $2, $3, $4)
            RETURNING session_id
            "#,
        )
        .bind(application_id)
        .bind(production_database_id)
        .bind(id_set)
        .bind(message)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("session_id")?)
    }

    async fn record_identifier(
        &self,
        session_id: i64,
        stable_id: &str,
        feature_type: FeatureType,
    ) -> Result<()> {
        let row = sqlx::query(
            r#"
            INSERT INTO stable_identifier_record (stable_identifier, status, feature_type)
            VALUES ($1, 'current', $2)
            RETURNING stable_identifier_record_id
            "#,
        )
        .bind(stable_id)
        .bind(feature_type.as_str())
        .fetch_one(&self.pool)
        .await?;
        let record_id: i64 = row.try_get("stable_identifier_record_id")?;

        sqlx::query(
            r#"
            INSERT INTO session_identifier_action (stable_identifier_record_id, session_id, action)
            VALUES ($1, $2, 'create')
            "#,
        )
        .bind(record_id)
        .bind(session_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
