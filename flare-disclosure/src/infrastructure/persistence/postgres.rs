use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, Pool, Postgres};
use tracing::{debug, instrument};

use crate::config::DisclosureConfig;
use crate::domain::model::{
    DisclosureStatus, FieldValue, FieldWrite, Message, MessageColumn, MessagePatch, Precondition,
    RevealDelay,
};
use crate::domain::repository::MessageStore;
use crate::error::{DisclosureError, DisclosureResult};
use crate::infrastructure::persistence::access_rules::StorageAccessRules;

const SELECT_COLUMNS: &str = "id, sender_id, recipient_id, content, is_anonymous, \
    reveal_delay_seconds, created_at, opened_at, reveal_at, sender_revealed_at, status";

pub struct PostgresMessageStore {
    pool: Pool<Postgres>,
}

impl PostgresMessageStore {
    pub async fn new(config: &DisclosureConfig) -> Result<Option<Self>> {
        let url = match &config.postgres_url {
            Some(url) => url,
            None => return Ok(None),
        };

        let pool = PgPoolOptions::new()
            .max_connections(config.postgres_max_connections)
            .min_connections(config.postgres_min_connections)
            .acquire_timeout(Duration::from_secs(config.postgres_acquire_timeout_seconds))
            .connect(url)
            .await
            .context("Failed to connect to PostgreSQL")?;

        let store = Self::from_pool(pool);

        // 初始化数据库表结构
        store
            .init_schema()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to initialize PostgreSQL schema: {}", e))?;

        Ok(Some(store))
    }

    pub fn from_pool(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }

    /// 初始化数据库表结构（如果不存在）
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS anonymous_messages (
                id TEXT PRIMARY KEY,
                sender_id TEXT NOT NULL,
                recipient_id TEXT NOT NULL,
                content TEXT NOT NULL,
                is_anonymous BOOLEAN NOT NULL,
                reveal_delay_seconds BIGINT,
                created_at TIMESTAMP WITH TIME ZONE NOT NULL,
                opened_at TIMESTAMP WITH TIME ZONE,
                reveal_at TIMESTAMP WITH TIME ZONE,
                sender_revealed_at TIMESTAMP WITH TIME ZONE,
                status TEXT NOT NULL DEFAULT 'unopened',
                CHECK (is_anonymous = (reveal_delay_seconds IS NOT NULL)),
                CHECK (reveal_delay_seconds IS NULL OR reveal_delay_seconds BETWEEN 0 AND 259200)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // 调度器按 (status, reveal_at) 扫描到期消息
        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_anonymous_messages_due
            ON anonymous_messages(status, reveal_at)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_anonymous_messages_recipient
            ON anonymous_messages(recipient_id, created_at DESC)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn apply_open(&self, id: &str, opened_at: DateTime<Utc>) -> Result<u64> {
        // reveal_at 与 status 由存储层在同一条语句内派生
        let result = sqlx::query(
            r#"
            UPDATE anonymous_messages
            SET opened_at = $2,
                reveal_at = CASE
                    WHEN is_anonymous THEN $2 + reveal_delay_seconds * INTERVAL '1 second'
                    ELSE NULL
                END,
                status = CASE
                    WHEN is_anonymous THEN 'opened_pending_reveal'
                    ELSE 'opened'
                END
            WHERE id = $1 AND opened_at IS NULL
            "#,
        )
        .bind(id)
        .bind(opened_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn apply_reveal(&self, id: &str, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE anonymous_messages
            SET sender_revealed_at = $2,
                status = 'revealed'
            WHERE id = $1
              AND sender_revealed_at IS NULL
              AND status = 'opened_pending_reveal'
              AND reveal_at <= $2
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn apply_content_edit(&self, id: &str, content: &str) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE anonymous_messages
            SET content = $2
            WHERE id = $1 AND opened_at IS NULL
            "#,
        )
        .bind(id)
        .bind(content)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[derive(Debug, FromRow)]
struct MessageRow {
    id: String,
    sender_id: String,
    recipient_id: String,
    content: String,
    is_anonymous: bool,
    reveal_delay_seconds: Option<i64>,
    created_at: DateTime<Utc>,
    opened_at: Option<DateTime<Utc>>,
    reveal_at: Option<DateTime<Utc>>,
    sender_revealed_at: Option<DateTime<Utc>>,
    status: String,
}

impl TryFrom<MessageRow> for Message {
    type Error = DisclosureError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        let reveal_delay = row
            .reveal_delay_seconds
            .map(RevealDelay::from_seconds)
            .transpose()?;
        let status: DisclosureStatus = row.status.parse()?;
        Ok(Message {
            id: row.id,
            sender_id: row.sender_id,
            recipient_id: row.recipient_id,
            content: row.content,
            is_anonymous: row.is_anonymous,
            reveal_delay,
            created_at: row.created_at,
            opened_at: row.opened_at,
            reveal_at: row.reveal_at,
            sender_revealed_at: row.sender_revealed_at,
            status,
        })
    }
}

#[async_trait]
impl MessageStore for PostgresMessageStore {
    #[instrument(skip(self, message), fields(message_id = %message.id))]
    async fn insert(&self, message: &Message) -> DisclosureResult<String> {
        sqlx::query(
            r#"
            INSERT INTO anonymous_messages (
                id, sender_id, recipient_id, content, is_anonymous,
                reveal_delay_seconds, created_at, opened_at, reveal_at,
                sender_revealed_at, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(&message.id)
        .bind(&message.sender_id)
        .bind(&message.recipient_id)
        .bind(&message.content)
        .bind(message.is_anonymous)
        .bind(message.reveal_delay.map(|delay| delay.seconds()))
        .bind(message.created_at)
        .bind(message.opened_at)
        .bind(message.reveal_at)
        .bind(message.sender_revealed_at)
        .bind(message.status.as_str())
        .execute(&self.pool)
        .await
        .context("Failed to insert anonymous message")?;

        Ok(message.id.clone())
    }

    #[instrument(skip(self))]
    async fn get_by_id(&self, id: &str) -> DisclosureResult<Option<Message>> {
        let row = sqlx::query_as::<_, MessageRow>(&format!(
            "SELECT {} FROM anonymous_messages WHERE id = $1",
            SELECT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to load anonymous message")?;

        row.map(Message::try_from).transpose()
    }

    #[instrument(skip(self, precondition, patch), fields(patch = patch.kind()))]
    async fn conditional_update(
        &self,
        id: &str,
        precondition: &Precondition,
        patch: &MessagePatch,
    ) -> DisclosureResult<bool> {
        StorageAccessRules::authorize(precondition, patch)?;

        let rows_affected = match patch {
            MessagePatch::Open { opened_at } => self.apply_open(id, *opened_at).await?,
            MessagePatch::CommitReveal { revealed_at } => {
                self.apply_reveal(id, *revealed_at).await?
            }
        };

        debug!(message_id = %id, rows_affected, "Conditional update executed");
        Ok(rows_affected == 1)
    }

    #[instrument(skip(self, writes), fields(columns = writes.len()))]
    async fn update_fields(&self, id: &str, writes: &[FieldWrite]) -> DisclosureResult<bool> {
        StorageAccessRules::authorize_edit(writes)?;

        // 规则保证只有 content 且只出现一次，整个修改是一条条件 UPDATE
        let content = match writes {
            [FieldWrite {
                column: MessageColumn::Content,
                value: FieldValue::Text(content),
            }] => content,
            _ => {
                return Err(DisclosureError::Validation(
                    "content must be a single text write".to_string(),
                ));
            }
        };

        let rows_affected = self.apply_content_edit(id, content).await?;
        debug!(message_id = %id, rows_affected, "Field update executed");
        Ok(rows_affected == 1)
    }

    #[instrument(skip(self))]
    async fn query_due(&self, now: DateTime<Utc>, limit: usize) -> DisclosureResult<Vec<Message>> {
        let rows = sqlx::query_as::<_, MessageRow>(&format!(
            "SELECT {} FROM anonymous_messages \
             WHERE status = 'opened_pending_reveal' \
               AND sender_revealed_at IS NULL \
               AND reveal_at <= $1 \
             ORDER BY reveal_at ASC \
             LIMIT $2",
            SELECT_COLUMNS
        ))
        .bind(now)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .context("Failed to query due messages")?;

        rows.into_iter().map(Message::try_from).collect()
    }
}
