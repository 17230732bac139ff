use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::config::DisclosureConfig;
use crate::domain::repository::ConnectionOracle;

/// 内存好友关系（开发与测试用）
///
/// 保存有向边 owner -> contact，双向都存在才算互相关注
#[derive(Default)]
pub struct InMemoryConnectionOracle {
    edges: Arc<RwLock<HashSet<(String, String)>>>,
}

impl InMemoryConnectionOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// 单向关注
    pub async fn follow(&self, owner_id: &str, contact_id: &str) {
        self.edges
            .write()
            .await
            .insert((owner_id.to_string(), contact_id.to_string()));
    }

    /// 建立互相关注
    pub async fn connect(&self, party_a: &str, party_b: &str) {
        let mut edges = self.edges.write().await;
        edges.insert((party_a.to_string(), party_b.to_string()));
        edges.insert((party_b.to_string(), party_a.to_string()));
    }

    /// 解除关系（双向）
    pub async fn disconnect(&self, party_a: &str, party_b: &str) {
        let mut edges = self.edges.write().await;
        edges.remove(&(party_a.to_string(), party_b.to_string()));
        edges.remove(&(party_b.to_string(), party_a.to_string()));
    }
}

#[async_trait]
impl ConnectionOracle for InMemoryConnectionOracle {
    async fn is_mutually_connected(&self, party_a: &str, party_b: &str) -> Result<bool> {
        let edges = self.edges.read().await;
        Ok(edges.contains(&(party_a.to_string(), party_b.to_string()))
            && edges.contains(&(party_b.to_string(), party_a.to_string())))
    }
}

/// 基于 contacts 表的好友关系查询
pub struct PostgresConnectionOracle {
    pool: Pool<Postgres>,
}

impl PostgresConnectionOracle {
    pub async fn new(config: &DisclosureConfig) -> Result<Option<Self>> {
        let url = match &config.contacts_postgres_url {
            Some(url) => url,
            None => return Ok(None),
        };

        let pool = PgPoolOptions::new()
            .max_connections(config.postgres_max_connections)
            .acquire_timeout(Duration::from_secs(config.postgres_acquire_timeout_seconds))
            .connect(url)
            .await
            .context("Failed to connect to contacts PostgreSQL")?;

        Ok(Some(Self::from_pool(pool)))
    }

    pub fn from_pool(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

/// 双向关注各自存在才算互相关注，自己与自己不算
fn is_mutual(party_a: &str, party_b: &str, forward: bool, backward: bool) -> bool {
    party_a != party_b && forward && backward
}

#[async_trait]
impl ConnectionOracle for PostgresConnectionOracle {
    #[instrument(skip(self))]
    async fn is_mutually_connected(&self, party_a: &str, party_b: &str) -> Result<bool> {
        // contacts 表不保证唯一，按方向分别判断是否存在
        let (forward, backward): (bool, bool) = sqlx::query_as(
            r#"
            SELECT
                EXISTS(SELECT 1 FROM contacts WHERE owner_id = $1 AND contact_id = $2),
                EXISTS(SELECT 1 FROM contacts WHERE owner_id = $2 AND contact_id = $1)
            "#,
        )
        .bind(party_a)
        .bind(party_b)
        .fetch_one(&self.pool)
        .await
        .context("Failed to query contacts")?;

        let mutual = is_mutual(party_a, party_b, forward, backward);
        debug!(party_a, party_b, forward, backward, mutual, "Mutual connection checked");
        Ok(mutual)
    }
}
