//! 匿名消息完整流程测试：创建、打开、查看、修改与调度揭示

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{Map, Value, json};

use flare_disclosure::application::{
    CreateMessageCommand, OpenMessageCommand, UpdateMessageCommand, ViewMessageQuery,
};
use flare_disclosure::config::DisclosureConfig;
use flare_disclosure::domain::model::ANONYMOUS_SENDER;
use flare_disclosure::domain::repository::MessageStore;
use flare_disclosure::infrastructure::clock::ManualClock;
use flare_disclosure::infrastructure::external::InMemoryConnectionOracle;
use flare_disclosure::infrastructure::persistence::InMemoryMessageStore;
use flare_disclosure::service::ApplicationContext;
use flare_disclosure::service::wire::build_context;
use flare_disclosure::{DisclosureError, DisclosureStatus, MessageView};

struct Harness {
    context: ApplicationContext,
    store: Arc<InMemoryMessageStore>,
    oracle: Arc<InMemoryConnectionOracle>,
    clock: Arc<ManualClock>,
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

fn harness() -> Harness {
    let store = Arc::new(InMemoryMessageStore::new());
    let oracle = Arc::new(InMemoryConnectionOracle::new());
    let clock = Arc::new(ManualClock::new(t0()));
    let context = build_context(
        Arc::new(DisclosureConfig::default()),
        store.clone(),
        oracle.clone(),
        clock.clone(),
    );
    Harness {
        context,
        store,
        oracle,
        clock,
    }
}

fn create(is_anonymous: bool, delay: Option<i64>) -> CreateMessageCommand {
    CreateMessageCommand {
        sender_id: "alice".to_string(),
        recipient_id: "bob".to_string(),
        content: "guess who".to_string(),
        is_anonymous,
        reveal_delay_seconds: delay,
    }
}

impl Harness {
    async fn open(&self, id: &str, viewer: &str) -> Result<MessageView, DisclosureError> {
        self.context
            .command_handler
            .handle_open_message(OpenMessageCommand {
                message_id: id.to_string(),
                viewer_id: viewer.to_string(),
            })
            .await
    }

    async fn view(&self, id: &str, viewer: &str) -> Result<MessageView, DisclosureError> {
        self.context
            .query_handler
            .handle_view_message(ViewMessageQuery {
                message_id: id.to_string(),
                viewer_id: viewer.to_string(),
            })
            .await
    }

    async fn update(&self, id: &str, viewer: &str, fields: Value) -> Result<MessageView, DisclosureError> {
        let fields: Map<String, Value> = match fields {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        self.context
            .command_handler
            .handle_update_message(UpdateMessageCommand {
                message_id: id.to_string(),
                viewer_id: viewer.to_string(),
                fields,
            })
            .await
    }
}

#[tokio::test]
async fn test_one_hour_anonymous_scenario() {
    let h = harness();
    h.oracle.connect("alice", "bob").await;

    let created = h
        .context
        .command_handler
        .handle_create_message(create(true, Some(3600)))
        .await
        .unwrap();
    assert_eq!(created.sender_id, "alice");
    assert_eq!(created.status, DisclosureStatus::Unopened);

    // 打开前接收方看到的是匿名
    let before_open = h.view(&created.id, "bob").await.unwrap();
    assert_eq!(before_open.sender_id, ANONYMOUS_SENDER);

    let opened = h.open(&created.id, "bob").await.unwrap();
    assert_eq!(opened.sender_id, ANONYMOUS_SENDER);
    assert_eq!(opened.reveal_at, Some(t0() + Duration::hours(1)));
    assert_eq!(opened.status, DisclosureStatus::OpenedPendingReveal);

    h.clock.set(t0() + Duration::minutes(30));
    let masked = h.view(&created.id, "bob").await.unwrap();
    assert_eq!(masked.sender_id, ANONYMOUS_SENDER);
    assert!(masked.sender_masked);

    h.clock.set(t0() + Duration::minutes(61));
    let report = h.context.scheduler.run_tick().await;
    assert_eq!(report.committed, 1);

    h.clock.set(t0() + Duration::minutes(62));
    let revealed = h.view(&created.id, "bob").await.unwrap();
    assert_eq!(revealed.sender_id, "alice");
    assert_eq!(revealed.status, DisclosureStatus::Revealed);
    assert_eq!(
        revealed.sender_revealed_at,
        Some(t0() + Duration::minutes(61))
    );

    // 再次调度不会重复提交
    let report = h.context.scheduler.run_tick().await;
    assert_eq!(report.committed, 0);
}

#[tokio::test]
async fn test_reveal_visible_at_deadline_before_scheduler_runs() {
    let h = harness();
    h.oracle.connect("alice", "bob").await;
    let created = h
        .context
        .command_handler
        .handle_create_message(create(true, Some(600)))
        .await
        .unwrap();
    h.open(&created.id, "bob").await.unwrap();

    h.clock.set(t0() + Duration::seconds(599));
    assert_eq!(h.view(&created.id, "bob").await.unwrap().sender_id, ANONYMOUS_SENDER);

    h.clock.set(t0() + Duration::seconds(600));
    let view = h.view(&created.id, "bob").await.unwrap();
    assert_eq!(view.sender_id, "alice");
    assert_eq!(view.status, DisclosureStatus::OpenedPendingReveal);
}

#[tokio::test]
async fn test_non_anonymous_sender_always_visible() {
    let h = harness();
    let created = h
        .context
        .command_handler
        .handle_create_message(create(false, None))
        .await
        .unwrap();

    assert_eq!(h.view(&created.id, "bob").await.unwrap().sender_id, "alice");
    let opened = h.open(&created.id, "bob").await.unwrap();
    assert_eq!(opened.sender_id, "alice");
    assert_eq!(opened.status, DisclosureStatus::Opened);
    assert_eq!(opened.reveal_at, None);

    // 非匿名消息不会进入调度
    h.clock.advance(Duration::days(10));
    assert_eq!(h.context.scheduler.run_tick().await.matched, 0);
}

#[tokio::test]
async fn test_delay_boundaries() {
    let h = harness();
    h.oracle.connect("alice", "bob").await;
    let handler = &h.context.command_handler;

    let max = handler
        .handle_create_message(create(true, Some(72 * 3600)))
        .await
        .unwrap();
    let opened = h.open(&max.id, "bob").await.unwrap();
    assert_eq!(opened.reveal_at, Some(t0() + Duration::hours(72)));

    let err = handler
        .handle_create_message(create(true, Some(72 * 3600 + 1)))
        .await
        .unwrap_err();
    assert!(matches!(err, DisclosureError::Validation(_)));

    let err = handler
        .handle_create_message(create(true, None))
        .await
        .unwrap_err();
    assert!(matches!(err, DisclosureError::Validation(_)));

    let err = handler
        .handle_create_message(create(false, Some(60)))
        .await
        .unwrap_err();
    assert!(matches!(err, DisclosureError::Validation(_)));

    let zero = handler
        .handle_create_message(create(true, Some(0)))
        .await
        .unwrap();
    let opened = h.open(&zero.id, "bob").await.unwrap();
    assert_eq!(opened.reveal_at, opened.opened_at);
    assert_eq!(h.context.scheduler.run_tick().await.committed, 1);
    assert_eq!(h.store.len().await, 2);
}

#[tokio::test]
async fn test_anonymous_without_connection_is_not_persisted() {
    let h = harness();
    h.oracle.follow("alice", "bob").await;

    let err = h
        .context
        .command_handler
        .handle_create_message(create(true, Some(60)))
        .await
        .unwrap_err();
    assert!(matches!(err, DisclosureError::Authorization(_)));
    assert_eq!(err.code(), "AUTHORIZATION_ERROR");
    assert!(h.store.is_empty().await);
}

#[tokio::test]
async fn test_protected_fields_rejected_and_record_unchanged() {
    let h = harness();
    h.oracle.connect("alice", "bob").await;
    let created = h
        .context
        .command_handler
        .handle_create_message(create(true, Some(3600)))
        .await
        .unwrap();
    h.open(&created.id, "bob").await.unwrap();
    let before = h.store.get_by_id(&created.id).await.unwrap().unwrap();

    for fields in [
        json!({ "reveal_at": "2026-03-01T12:00:00Z" }),
        json!({ "sender_id": "mallory" }),
        json!({ "sender_revealed_at": "2026-03-01T12:00:00Z" }),
        json!({ "content": "sneaky", "status": "revealed" }),
    ] {
        for viewer in ["alice", "bob"] {
            let err = h.update(&created.id, viewer, fields.clone()).await.unwrap_err();
            assert!(
                matches!(err, DisclosureError::ForbiddenField(_)),
                "{fields} by {viewer} gave {err:?}"
            );
        }
    }

    let after = h.store.get_by_id(&created.id).await.unwrap().unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_sender_edits_content_only_while_unopened() {
    let h = harness();
    h.oracle.connect("alice", "bob").await;
    let created = h
        .context
        .command_handler
        .handle_create_message(create(true, Some(3600)))
        .await
        .unwrap();

    let edited = h
        .update(&created.id, "alice", json!({ "content": "on second thought" }))
        .await
        .unwrap();
    assert_eq!(edited.content, "on second thought");

    let err = h
        .update(&created.id, "bob", json!({ "content": "not mine" }))
        .await
        .unwrap_err();
    assert!(matches!(err, DisclosureError::Authorization(_)));

    h.open(&created.id, "bob").await.unwrap();
    let err = h
        .update(&created.id, "alice", json!({ "content": "too late" }))
        .await
        .unwrap_err();
    assert!(matches!(err, DisclosureError::InvalidState(_)));
}

#[tokio::test]
async fn test_third_party_and_double_open_are_rejected() {
    let h = harness();
    h.oracle.connect("alice", "bob").await;
    let created = h
        .context
        .command_handler
        .handle_create_message(create(true, Some(3600)))
        .await
        .unwrap();

    let err = h.view(&created.id, "carol").await.unwrap_err();
    assert!(matches!(err, DisclosureError::Authorization(_)));
    let err = h.open(&created.id, "carol").await.unwrap_err();
    assert!(matches!(err, DisclosureError::Authorization(_)));

    h.open(&created.id, "bob").await.unwrap();
    h.clock.advance(Duration::minutes(10));
    let err = h.open(&created.id, "bob").await.unwrap_err();
    assert!(matches!(err, DisclosureError::InvalidState(_)));

    let view = h.view(&created.id, "bob").await.unwrap();
    assert_eq!(view.opened_at, Some(t0()));
    assert_eq!(view.reveal_at, Some(t0() + Duration::hours(1)));
}

#[tokio::test]
async fn test_severed_connection_does_not_affect_existing_message() {
    let h = harness();
    h.oracle.connect("alice", "bob").await;
    let created = h
        .context
        .command_handler
        .handle_create_message(create(true, Some(60)))
        .await
        .unwrap();
    h.oracle.disconnect("alice", "bob").await;

    h.open(&created.id, "bob").await.unwrap();
    h.clock.advance(Duration::minutes(2));
    assert_eq!(h.context.scheduler.run_tick().await.committed, 1);
    assert_eq!(h.view(&created.id, "bob").await.unwrap().sender_id, "alice");
}
