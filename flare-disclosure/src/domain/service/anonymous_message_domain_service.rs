//! 匿名消息领域服务 - 编排状态机、访问策略与存储
//!
//! 所有时间戳均来自注入的服务端时钟，调用方无法提供可信时间

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::domain::model::{
    FieldValue, FieldWrite, Message, MessageColumn, MessagePatch, MessageView, NewMessage,
    Precondition, ViewerRole,
};
use crate::domain::repository::{Clock, ConnectionOracle, MessageStore};
use crate::domain::service::{AccessPolicy, DisclosureStateMachine};
use crate::error::{DisclosureError, DisclosureResult};

/// 匿名消息领域服务
pub struct AnonymousMessageDomainService {
    store: Arc<dyn MessageStore>,
    oracle: Arc<dyn ConnectionOracle>,
    clock: Arc<dyn Clock>,
}

impl AnonymousMessageDomainService {
    pub fn new(
        store: Arc<dyn MessageStore>,
        oracle: Arc<dyn ConnectionOracle>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            oracle,
            clock,
        }
    }

    /// 创建消息
    ///
    /// 互相关注只在创建时校验一次，之后关系解除不影响已创建的消息
    #[instrument(skip(self, input), fields(sender_id = %input.sender_id, recipient_id = %input.recipient_id, anonymous = input.is_anonymous))]
    pub async fn create_message(&self, input: NewMessage) -> DisclosureResult<Message> {
        let now = self.clock.now();
        let message = DisclosureStateMachine::create(Uuid::new_v4().to_string(), input, now)?;

        if message.is_anonymous {
            let connected = self
                .oracle
                .is_mutually_connected(&message.sender_id, &message.recipient_id)
                .await?;
            if !connected {
                warn!(
                    sender_id = %message.sender_id,
                    recipient_id = %message.recipient_id,
                    "Rejected anonymous message between parties that are not mutually connected"
                );
                return Err(DisclosureError::Authorization(
                    "anonymous messages require a mutual connection".to_string(),
                ));
            }
        }

        self.store.insert(&message).await?;

        info!(message_id = %message.id, "Message created");
        Ok(message)
    }

    /// 接收方打开消息
    #[instrument(skip(self), fields(message_id = %id, viewer_id = %viewer_id))]
    pub async fn open_message(&self, id: &str, viewer_id: &str) -> DisclosureResult<MessageView> {
        let message = self.require(id).await?;
        if AccessPolicy::resolve_viewer(&message, viewer_id)? != ViewerRole::Recipient {
            return Err(DisclosureError::Authorization(
                "only the recipient can open a message".to_string(),
            ));
        }

        let now = self.clock.now();
        // 先在副本上校验迁移，再交给存储层做带条件的原子写入
        let mut expected = message.clone();
        DisclosureStateMachine::open(&mut expected, now)?;

        let applied = self
            .store
            .conditional_update(id, &Precondition::Unopened, &MessagePatch::Open { opened_at: now })
            .await?;
        if !applied {
            // 并发的重复打开请求，先到者生效
            return Err(DisclosureError::InvalidState(format!(
                "message {} has already been opened",
                id
            )));
        }

        let stored = self.store.get_by_id(id).await?.unwrap_or(expected);
        info!(
            message_id = %id,
            reveal_at = ?stored.reveal_at,
            "Message opened"
        );
        Ok(AccessPolicy::mask(&stored, ViewerRole::Recipient, now))
    }

    /// 查看消息（按查看者打码）
    #[instrument(skip(self), fields(message_id = %id, viewer_id = %viewer_id))]
    pub async fn view_message(&self, id: &str, viewer_id: &str) -> DisclosureResult<MessageView> {
        let message = self.require(id).await?;
        AccessPolicy::view_for(&message, viewer_id, self.clock.now())
    }

    /// 发送方修改消息
    ///
    /// 只接受字段写入，生命周期迁移（打开、揭示）不能经由此路径；
    /// 字段白名单由请求校验层与存储访问规则分别独立把关
    #[instrument(skip(self, writes), fields(message_id = %id, viewer_id = %viewer_id, columns = writes.len()))]
    pub async fn update_message(
        &self,
        id: &str,
        viewer_id: &str,
        writes: Vec<FieldWrite>,
    ) -> DisclosureResult<MessageView> {
        let message = self.require(id).await?;
        if AccessPolicy::resolve_viewer(&message, viewer_id)? != ViewerRole::Sender {
            return Err(DisclosureError::Authorization(
                "only the sender can update a message".to_string(),
            ));
        }

        let mut expected = message.clone();
        for write in writes.iter().filter(|w| w.column == MessageColumn::Content) {
            match &write.value {
                FieldValue::Text(content) => {
                    DisclosureStateMachine::edit_content(&mut expected, content.clone())?
                }
                other => {
                    return Err(DisclosureError::Validation(format!(
                        "content must be text, got {:?}",
                        other
                    )));
                }
            }
        }

        let applied = self.store.update_fields(id, &writes).await?;
        if !applied {
            return Err(DisclosureError::InvalidState(format!(
                "message {} can no longer be edited after it was opened",
                id
            )));
        }

        let stored = self.store.get_by_id(id).await?.unwrap_or(expected);
        debug!(message_id = %id, "Message updated");
        Ok(AccessPolicy::mask(&stored, ViewerRole::Sender, self.clock.now()))
    }

    async fn require(&self, id: &str) -> DisclosureResult<Message> {
        self.store
            .get_by_id(id)
            .await?
            .ok_or_else(|| DisclosureError::NotFound(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{ANONYMOUS_SENDER, DisclosureStatus};
    use crate::infrastructure::clock::ManualClock;
    use crate::infrastructure::external::InMemoryConnectionOracle;
    use crate::infrastructure::persistence::InMemoryMessageStore;
    use chrono::{Duration, TimeZone, Utc};

    struct Fixture {
        service: AnonymousMessageDomainService,
        store: Arc<InMemoryMessageStore>,
        oracle: Arc<InMemoryConnectionOracle>,
        clock: Arc<ManualClock>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryMessageStore::new());
        let oracle = Arc::new(InMemoryConnectionOracle::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        ));
        let service =
            AnonymousMessageDomainService::new(store.clone(), oracle.clone(), clock.clone());
        Fixture {
            service,
            store,
            oracle,
            clock,
        }
    }

    fn anonymous(delay: i64) -> NewMessage {
        NewMessage {
            sender_id: "alice".to_string(),
            recipient_id: "bob".to_string(),
            content: "guess who".to_string(),
            is_anonymous: true,
            reveal_delay_seconds: Some(delay),
        }
    }

    #[tokio::test]
    async fn test_anonymous_create_without_connection_persists_nothing() {
        let fx = fixture();
        let err = fx.service.create_message(anonymous(60)).await.unwrap_err();
        assert!(matches!(err, DisclosureError::Authorization(_)));
        assert_eq!(fx.store.len().await, 0);
    }

    #[tokio::test]
    async fn test_validation_runs_before_connection_check() {
        let fx = fixture();
        let err = fx
            .service
            .create_message(anonymous(72 * 3600 + 1))
            .await
            .unwrap_err();
        assert!(matches!(err, DisclosureError::Validation(_)));
    }

    #[tokio::test]
    async fn test_non_anonymous_create_skips_connection_check() {
        let fx = fixture();
        let mut input = anonymous(60);
        input.is_anonymous = false;
        input.reveal_delay_seconds = None;
        let message = fx.service.create_message(input).await.unwrap();
        assert_eq!(message.status, DisclosureStatus::Unopened);
        assert_eq!(fx.store.len().await, 1);
    }

    #[tokio::test]
    async fn test_open_is_recipient_only_and_fires_once() {
        let fx = fixture();
        fx.oracle.connect("alice", "bob").await;
        let message = fx.service.create_message(anonymous(3600)).await.unwrap();

        let err = fx.service.open_message(&message.id, "alice").await.unwrap_err();
        assert!(matches!(err, DisclosureError::Authorization(_)));

        let t0 = fx.clock.now();
        let view = fx.service.open_message(&message.id, "bob").await.unwrap();
        assert_eq!(view.sender_id, ANONYMOUS_SENDER);
        assert_eq!(view.reveal_at, Some(t0 + Duration::hours(1)));

        fx.clock.advance(Duration::minutes(5));
        let err = fx.service.open_message(&message.id, "bob").await.unwrap_err();
        assert!(matches!(err, DisclosureError::InvalidState(_)));

        let stored = fx.store.get_by_id(&message.id).await.unwrap().unwrap();
        assert_eq!(stored.opened_at, Some(t0));
        assert_eq!(stored.reveal_at, Some(t0 + Duration::hours(1)));
    }

    #[tokio::test]
    async fn test_view_unknown_message_is_not_found() {
        let fx = fixture();
        let err = fx.service.view_message("missing", "bob").await.unwrap_err();
        assert!(matches!(err, DisclosureError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_bypassing_schema_is_blocked_by_store_rules() {
        let fx = fixture();
        fx.oracle.connect("alice", "bob").await;
        let message = fx.service.create_message(anonymous(3600)).await.unwrap();

        let writes = vec![FieldWrite::new(
            MessageColumn::SenderRevealedAt,
            FieldValue::Timestamp(fx.clock.now()),
        )];
        let err = fx
            .service
            .update_message(&message.id, "alice", writes)
            .await
            .unwrap_err();
        assert!(matches!(err, DisclosureError::ForbiddenField(_)));

        let stored = fx.store.get_by_id(&message.id).await.unwrap().unwrap();
        assert_eq!(stored, message);
    }

    #[tokio::test]
    async fn test_sender_cannot_forge_open_or_reveal_through_update() {
        let fx = fixture();
        fx.oracle.connect("alice", "bob").await;
        let message = fx.service.create_message(anonymous(3600)).await.unwrap();
        let far_future = fx.clock.now() + Duration::days(365 * 100);

        for write in [
            FieldWrite::new(MessageColumn::OpenedAt, FieldValue::Timestamp(far_future)),
            FieldWrite::new(MessageColumn::RevealAt, FieldValue::Timestamp(far_future)),
            FieldWrite::new(
                MessageColumn::SenderRevealedAt,
                FieldValue::Timestamp(fx.clock.now()),
            ),
            FieldWrite::new(
                MessageColumn::Status,
                FieldValue::Status(DisclosureStatus::OpenedPendingReveal),
            ),
        ] {
            let err = fx
                .service
                .update_message(&message.id, "alice", vec![write])
                .await
                .unwrap_err();
            assert!(matches!(err, DisclosureError::ForbiddenField(_)));
        }
        assert_eq!(fx.store.get_by_id(&message.id).await.unwrap().unwrap(), message);

        // 接收方仍可正常打开，揭示时间来自服务端时钟
        let t0 = fx.clock.now();
        let view = fx.service.open_message(&message.id, "bob").await.unwrap();
        assert_eq!(view.opened_at, Some(t0));
        assert_eq!(view.reveal_at, Some(t0 + Duration::hours(1)));
    }

    #[tokio::test]
    async fn test_sender_edit_before_open() {
        let fx = fixture();
        fx.oracle.connect("alice", "bob").await;
        let message = fx.service.create_message(anonymous(3600)).await.unwrap();

        let writes = vec![FieldWrite::new(
            MessageColumn::Content,
            FieldValue::Text("second thoughts".to_string()),
        )];
        let err = fx
            .service
            .update_message(&message.id, "bob", writes.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, DisclosureError::Authorization(_)));

        let view = fx
            .service
            .update_message(&message.id, "alice", writes.clone())
            .await
            .unwrap();
        assert_eq!(view.content, "second thoughts");

        fx.service.open_message(&message.id, "bob").await.unwrap();
        let err = fx
            .service
            .update_message(&message.id, "alice", writes)
            .await
            .unwrap_err();
        assert!(matches!(err, DisclosureError::InvalidState(_)));
    }
}
