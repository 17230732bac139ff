//! 读取访问策略：解析查看者角色并对发送方身份打码

use chrono::{DateTime, Utc};

use crate::domain::model::{Message, MessageView, ViewerRole};
use crate::error::{DisclosureError, DisclosureResult};

/// 读取访问策略
pub struct AccessPolicy;

impl AccessPolicy {
    /// 解析查看者角色，第三方一律拒绝
    pub fn resolve_viewer(message: &Message, viewer_id: &str) -> DisclosureResult<ViewerRole> {
        message.role_of(viewer_id).ok_or_else(|| {
            DisclosureError::Authorization(format!(
                "viewer {} is not a party to message {}",
                viewer_id, message.id
            ))
        })
    }

    /// 发送方身份对该角色是否可见
    ///
    /// 接收方在 `now >= reveal_at` 时即可见，不依赖调度器是否已经运行
    pub fn sender_visible(message: &Message, role: ViewerRole, now: DateTime<Utc>) -> bool {
        match role {
            ViewerRole::Sender => true,
            ViewerRole::Recipient => {
                !message.is_anonymous
                    || message.sender_revealed_at.is_some()
                    || message.reveal_at.is_some_and(|reveal_at| now >= reveal_at)
            }
        }
    }

    /// 生成面向查看者的视图
    pub fn mask(message: &Message, role: ViewerRole, now: DateTime<Utc>) -> MessageView {
        MessageView::build(message, !Self::sender_visible(message, role, now))
    }

    /// 解析角色并生成视图
    pub fn view_for(
        message: &Message,
        viewer_id: &str,
        now: DateTime<Utc>,
    ) -> DisclosureResult<MessageView> {
        let role = Self::resolve_viewer(message, viewer_id)?;
        Ok(Self::mask(message, role, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{ANONYMOUS_SENDER, NewMessage};
    use crate::domain::service::DisclosureStateMachine;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn message(is_anonymous: bool) -> Message {
        DisclosureStateMachine::create(
            "m-1".to_string(),
            NewMessage {
                sender_id: "alice".to_string(),
                recipient_id: "bob".to_string(),
                content: "hi".to_string(),
                is_anonymous,
                reveal_delay_seconds: is_anonymous.then_some(3600),
            },
            t0(),
        )
        .unwrap()
    }

    #[test]
    fn test_sender_always_sees_full_message() {
        let msg = message(true);
        let view = AccessPolicy::view_for(&msg, "alice", t0()).unwrap();
        assert_eq!(view.sender_id, "alice");
        assert!(!view.sender_masked);
    }

    #[test]
    fn test_non_anonymous_is_never_masked() {
        let mut msg = message(false);
        let before_open = AccessPolicy::view_for(&msg, "bob", t0()).unwrap();
        assert_eq!(before_open.sender_id, "alice");

        DisclosureStateMachine::open(&mut msg, t0()).unwrap();
        let after_open = AccessPolicy::view_for(&msg, "bob", t0()).unwrap();
        assert_eq!(after_open.sender_id, "alice");
    }

    #[test]
    fn test_anonymous_masked_while_unopened() {
        let msg = message(true);
        let view = AccessPolicy::view_for(&msg, "bob", t0() + Duration::days(30)).unwrap();
        assert_eq!(view.sender_id, ANONYMOUS_SENDER);
        assert!(view.sender_masked);
        assert_eq!(view.content, "hi");
    }

    #[test]
    fn test_anonymous_unmasked_at_reveal_time_without_scheduler() {
        let mut msg = message(true);
        DisclosureStateMachine::open(&mut msg, t0()).unwrap();
        let deadline = t0() + Duration::hours(1);

        let before = AccessPolicy::view_for(&msg, "bob", deadline - Duration::seconds(1)).unwrap();
        assert!(before.sender_masked);
        assert_eq!(before.reveal_at, Some(deadline));

        let at = AccessPolicy::view_for(&msg, "bob", deadline).unwrap();
        assert_eq!(at.sender_id, "alice");
        assert!(msg.sender_revealed_at.is_none());
    }

    #[test]
    fn test_committed_reveal_unmasks_regardless_of_clock() {
        let mut msg = message(true);
        DisclosureStateMachine::open(&mut msg, t0()).unwrap();
        DisclosureStateMachine::commit_reveal(&mut msg, t0() + Duration::hours(2)).unwrap();

        // 查看者时钟落后于揭示时间
        let view = AccessPolicy::view_for(&msg, "bob", t0()).unwrap();
        assert_eq!(view.sender_id, "alice");
    }

    #[test]
    fn test_third_party_is_rejected() {
        let msg = message(true);
        let err = AccessPolicy::view_for(&msg, "mallory", t0()).unwrap_err();
        assert!(matches!(err, DisclosureError::Authorization(_)));
    }
}
