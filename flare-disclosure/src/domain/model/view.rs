//! 面向查看者的消息视图

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DisclosureStatus, Message};

/// 发送方身份被隐藏时的占位值
pub const ANONYMOUS_SENDER: &str = "anonymous";

/// 查看者在消息中的角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewerRole {
    Sender,
    Recipient,
}

/// 消息视图（可能已对发送方身份打码）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageView {
    pub id: String,
    /// 打码时为 `ANONYMOUS_SENDER`
    pub sender_id: String,
    pub sender_masked: bool,
    pub recipient_id: String,
    pub content: String,
    pub is_anonymous: bool,
    pub reveal_delay_seconds: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub opened_at: Option<DateTime<Utc>>,
    pub reveal_at: Option<DateTime<Utc>>,
    pub sender_revealed_at: Option<DateTime<Utc>>,
    pub status: DisclosureStatus,
}

impl MessageView {
    pub(crate) fn build(message: &Message, mask_sender: bool) -> Self {
        let sender_id = if mask_sender {
            ANONYMOUS_SENDER.to_string()
        } else {
            message.sender_id.clone()
        };

        Self {
            id: message.id.clone(),
            sender_id,
            sender_masked: mask_sender,
            recipient_id: message.recipient_id.clone(),
            content: message.content.clone(),
            is_anonymous: message.is_anonymous,
            reveal_delay_seconds: message.reveal_delay.map(|d| d.seconds()),
            created_at: message.created_at,
            opened_at: message.opened_at,
            reveal_at: message.reveal_at,
            sender_revealed_at: message.sender_revealed_at,
            status: message.status,
        }
    }
}
