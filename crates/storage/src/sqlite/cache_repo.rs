use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use study_core::model::{RequestKey, ResponseSnapshot};

use super::SqliteRepository;
use super::mapping::{conn, map_response_row, ser};
use crate::repository::{CacheStorage, StorageError};

impl SqliteRepository {
    async fn ensure_cache<'e, E>(executor: E, name: &str) -> Result<(), StorageError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        sqlx::query(
            r"
            INSERT INTO caches (name, created_at)
            VALUES (?1, ?2)
            ON CONFLICT(name) DO NOTHING
            ",
        )
        .bind(name)
        .bind(Utc::now())
        .execute(executor)
        .await
        .map_err(conn)?;
        Ok(())
    }
}

#[async_trait]
impl CacheStorage for SqliteRepository {
    async fn open_cache(&self, name: &str) -> Result<(), StorageError> {
        Self::ensure_cache(&self.pool, name).await
    }

    async fn cache_names(&self) -> Result<Vec<String>, StorageError> {
        let rows = sqlx::query("SELECT name FROM caches ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;
        rows.iter()
            .map(|row| row.try_get::<String, _>("name").map_err(ser))
            .collect()
    }

    async fn delete_cache(&self, name: &str) -> Result<bool, StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;
        sqlx::query("DELETE FROM cache_entries WHERE cache_name = ?1")
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        let res = sqlx::query("DELETE FROM caches WHERE name = ?1")
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        tx.commit().await.map_err(conn)?;
        Ok(res.rows_affected() > 0)
    }

    async fn put(
        &self,
        cache: &str,
        key: &RequestKey,
        response: &ResponseSnapshot,
    ) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;
        Self::ensure_cache(&mut *tx, cache).await?;
        sqlx::query(
            r"
            INSERT INTO cache_entries (
                cache_name, request_key, status, content_type, body, stored_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(cache_name, request_key) DO UPDATE SET
                status = excluded.status,
                content_type = excluded.content_type,
                body = excluded.body,
                stored_at = excluded.stored_at
            ",
        )
        .bind(cache)
        .bind(key.as_str())
        .bind(i64::from(response.status))
        .bind(response.content_type.as_deref())
        .bind(response.body.as_slice())
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(conn)?;
        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn lookup(
        &self,
        cache: &str,
        key: &RequestKey,
    ) -> Result<Option<ResponseSnapshot>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT status, content_type, body
            FROM cache_entries
            WHERE cache_name = ?1 AND request_key = ?2
            ",
        )
        .bind(cache)
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_response_row).transpose()
    }

    async fn lookup_any(&self, key: &RequestKey) -> Result<Option<ResponseSnapshot>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT status, content_type, body
            FROM cache_entries
            WHERE request_key = ?1
            ORDER BY cache_name
            LIMIT 1
            ",
        )
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_response_row).transpose()
    }

    async fn keys(&self, cache: &str) -> Result<Vec<RequestKey>, StorageError> {
        let rows = sqlx::query(
            "SELECT request_key FROM cache_entries WHERE cache_name = ?1 ORDER BY request_key",
        )
        .bind(cache)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;
        rows.iter()
            .map(|row| {
                row.try_get::<String, _>("request_key")
                    .map(RequestKey::from_persisted)
                    .map_err(ser)
            })
            .collect()
    }
}
