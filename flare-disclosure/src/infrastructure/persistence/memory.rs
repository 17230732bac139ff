//! 内存消息存储（开发与测试用）
//!
//! 条件更新在同一把写锁内完成检查与写入，等价于数据库的单行原子更新

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::model::{
    FieldValue, FieldWrite, Message, MessageColumn, MessagePatch, Precondition,
};
use crate::domain::repository::MessageStore;
use crate::domain::service::DisclosureStateMachine;
use crate::error::{DisclosureError, DisclosureResult};
use crate::infrastructure::persistence::access_rules::StorageAccessRules;

#[derive(Default)]
pub struct InMemoryMessageStore {
    messages: Arc<RwLock<HashMap<String, Message>>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.messages.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.messages.read().await.is_empty()
    }

    fn apply(message: &mut Message, patch: &MessagePatch) -> DisclosureResult<()> {
        match patch {
            MessagePatch::Open { opened_at } => DisclosureStateMachine::open(message, *opened_at),
            MessagePatch::CommitReveal { revealed_at } => {
                DisclosureStateMachine::commit_reveal(message, *revealed_at).map(|_| ())
            }
        }
    }

    fn apply_writes(message: &mut Message, writes: &[FieldWrite]) -> DisclosureResult<()> {
        for write in writes {
            match (write.column, &write.value) {
                (MessageColumn::Content, FieldValue::Text(content)) => {
                    DisclosureStateMachine::edit_content(message, content.clone())?;
                }
                (column, value) => {
                    return Err(DisclosureError::Validation(format!(
                        "unsupported write {} = {:?}",
                        column, value
                    )));
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn insert(&self, message: &Message) -> DisclosureResult<String> {
        let mut guard = self.messages.write().await;
        if guard.contains_key(&message.id) {
            return Err(DisclosureError::Store(anyhow::anyhow!(
                "duplicate message id {}",
                message.id
            )));
        }
        guard.insert(message.id.clone(), message.clone());
        Ok(message.id.clone())
    }

    async fn get_by_id(&self, id: &str) -> DisclosureResult<Option<Message>> {
        let guard = self.messages.read().await;
        Ok(guard.get(id).cloned())
    }

    async fn conditional_update(
        &self,
        id: &str,
        precondition: &Precondition,
        patch: &MessagePatch,
    ) -> DisclosureResult<bool> {
        StorageAccessRules::authorize(precondition, patch)?;

        let mut guard = self.messages.write().await;
        let Some(current) = guard.get_mut(id) else {
            return Ok(false);
        };
        if !precondition.holds(current) {
            debug!(message_id = %id, patch = patch.kind(), "Precondition not met, update skipped");
            return Ok(false);
        }

        // 在副本上应用，失败时记录保持不变
        let mut updated = current.clone();
        Self::apply(&mut updated, patch)?;
        *current = updated;
        Ok(true)
    }

    async fn update_fields(&self, id: &str, writes: &[FieldWrite]) -> DisclosureResult<bool> {
        StorageAccessRules::authorize_edit(writes)?;

        let mut guard = self.messages.write().await;
        let Some(current) = guard.get_mut(id) else {
            return Ok(false);
        };
        if !Precondition::Unopened.holds(current) {
            debug!(message_id = %id, "Message already opened, edit skipped");
            return Ok(false);
        }

        let mut updated = current.clone();
        Self::apply_writes(&mut updated, writes)?;
        *current = updated;
        Ok(true)
    }

    async fn query_due(&self, now: DateTime<Utc>, limit: usize) -> DisclosureResult<Vec<Message>> {
        let guard = self.messages.read().await;
        let mut due: Vec<Message> = guard
            .values()
            .filter(|message| message.is_reveal_due(now))
            .cloned()
            .collect();
        due.sort_by_key(|message| message.reveal_at);
        due.truncate(limit);
        Ok(due)
    }
}
