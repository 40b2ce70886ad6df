use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coordinator_core::{
    config::StorageConfig,
    models::{Document, DocumentKey, DocumentQuery},
    traits::DocumentStore,
    CoordinatorError, CoordinatorResult,
};
use sqlx::{sqlite::SqlitePoolOptions, Row, SqlitePool};
use tracing::{debug, info};

/// SQLite 文档存储
///
/// 所有文档保存在一张表中，(object_type, doc_key, site) 唯一。
/// 时间以微秒整数保存，便于按创建时间做范围查询。
pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

fn db_error(e: sqlx::Error) -> CoordinatorError {
    CoordinatorError::Persistence(format!("数据库操作失败: {e}"))
}

fn from_micros(micros: i64) -> CoordinatorResult<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| CoordinatorError::Persistence(format!("无效的时间戳: {micros}")))
}

impl SqliteDocumentStore {
    pub async fn new(config: &StorageConfig) -> CoordinatorResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&config.url)
            .await
            .map_err(db_error)?;

        let store = Self::from_pool(pool);
        store.migrate().await?;
        info!("SQLite document store ready at {}", config.url);
        Ok(store)
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> CoordinatorResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                object_type TEXT NOT NULL,
                doc_key TEXT NOT NULL,
                site TEXT NOT NULL,
                body TEXT NOT NULL,
                created_us INTEGER NOT NULL,
                modified_us INTEGER NOT NULL,
                UNIQUE (object_type, doc_key, site)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_documents_type_created ON documents (object_type, created_us)",
        )
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(())
    }

    pub async fn health_check(&self) -> CoordinatorResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn row_to_document(row: &sqlx::sqlite::SqliteRow) -> CoordinatorResult<Document> {
        let body: String = row.try_get("body").map_err(db_error)?;
        Ok(Document {
            id: row.try_get("id").map_err(db_error)?,
            object_type: row.try_get("object_type").map_err(db_error)?,
            key: row.try_get("doc_key").map_err(db_error)?,
            site: row.try_get("site").map_err(db_error)?,
            body: serde_json::from_str(&body)?,
            created: from_micros(row.try_get("created_us").map_err(db_error)?)?,
            last_modified: from_micros(row.try_get("modified_us").map_err(db_error)?)?,
        })
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn save(&self, document: Document) -> CoordinatorResult<Document> {
        let body = serde_json::to_string(&document.body)?;
        let now = Utc::now().timestamp_micros();

        sqlx::query(
            r#"
            INSERT INTO documents (id, object_type, doc_key, site, body, created_us, modified_us)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT(object_type, doc_key, site) DO UPDATE SET
                body = excluded.body,
                modified_us = excluded.modified_us
            "#,
        )
        .bind(&document.id)
        .bind(&document.object_type)
        .bind(&document.key)
        .bind(&document.site)
        .bind(body)
        .bind(document.created.timestamp_micros())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        debug!(
            "保存文档成功: {}/{}@{}",
            document.object_type, document.key, document.site
        );

        self.get(&document.document_key()).await?.ok_or_else(|| {
            CoordinatorError::Persistence(format!("保存后读取文档失败: {}", document.key))
        })
    }

    async fn get(&self, key: &DocumentKey) -> CoordinatorResult<Option<Document>> {
        let row = sqlx::query(
            "SELECT id, object_type, doc_key, site, body, created_us, modified_us FROM documents WHERE object_type = $1 AND doc_key = $2 AND site = $3",
        )
        .bind(&key.object_type)
        .bind(&key.key)
        .bind(&key.site)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.as_ref().map(Self::row_to_document).transpose()
    }

    async fn purge(&self, key: &DocumentKey) -> CoordinatorResult<u64> {
        let result = sqlx::query(
            "DELETE FROM documents WHERE object_type = $1 AND doc_key = $2 AND site = $3",
        )
        .bind(&key.object_type)
        .bind(&key.key)
        .bind(&key.site)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        debug!("删除文档: {}/{}@{} ({})", key.object_type, key.key, key.site, result.rows_affected());
        Ok(result.rows_affected())
    }

    async fn find(&self, query: &DocumentQuery) -> CoordinatorResult<Vec<Document>> {
        let after = query
            .created_after
            .map(|t| t.timestamp_micros())
            .unwrap_or(i64::MIN);

        let rows = sqlx::query(
            r#"
            SELECT id, object_type, doc_key, site, body, created_us, modified_us
            FROM documents
            WHERE object_type = $1 AND ($2 IS NULL OR site = $2) AND created_us > $3
            ORDER BY created_us ASC
            "#,
        )
        .bind(&query.object_type)
        .bind(query.site.as_deref())
        .bind(after)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter().map(Self::row_to_document).collect()
    }
}
